//! Process-lifecycle collaborator
//!
//! Starting, stopping and freezing game-server processes is platform work
//! done outside the hub. The hub only asks for it through [`ProcessControl`]
//! and hears back through `LauncherInfo` events.

use lobby_core::Result;
use std::path::Path;

pub trait ProcessControl: Send {
    fn start(&mut self, server_name: &str) -> Result<()>;
    fn stop(&mut self, server_name: &str) -> Result<()>;
    fn freeze(&mut self, server_name: &str) -> Result<()>;
    fn unfreeze(&mut self, server_name: &str) -> Result<()>;
    fn inject(&mut self, process_id: u32, module_path: &Path) -> Result<()>;
}

/// Stand-in used when no process manager is wired up: logs every request
#[derive(Debug, Default)]
pub struct LoggingProcessControl;

impl ProcessControl for LoggingProcessControl {
    fn start(&mut self, server_name: &str) -> Result<()> {
        tracing::info!("Process control: start {}", server_name);
        Ok(())
    }

    fn stop(&mut self, server_name: &str) -> Result<()> {
        tracing::info!("Process control: stop {}", server_name);
        Ok(())
    }

    fn freeze(&mut self, server_name: &str) -> Result<()> {
        tracing::info!("Process control: freeze {}", server_name);
        Ok(())
    }

    fn unfreeze(&mut self, server_name: &str) -> Result<()> {
        tracing::info!("Process control: unfreeze {}", server_name);
        Ok(())
    }

    fn inject(&mut self, process_id: u32, module_path: &Path) -> Result<()> {
        tracing::info!("Process control: inject {} into {}", module_path.display(), process_id);
        Ok(())
    }
}
