//! Registration codes handed out by the auth bot

use lobby_accounts::normalize_login;
use lobby_core::PeerId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;

pub const AUTH_CODE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Issued {
    code: String,
    issuer: PeerId,
}

/// At most one live code per login name; a new request replaces the old code
#[derive(Debug, Default)]
pub struct AuthCodes {
    codes: HashMap<String, Issued>,
}

impl AuthCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, login_name: &str, issuer: PeerId) -> String {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(AUTH_CODE_LEN)
            .map(char::from)
            .collect();
        self.codes.insert(
            normalize_login(login_name),
            Issued {
                code: code.clone(),
                issuer,
            },
        );
        code
    }

    /// Consume the code if it is the live one for this login
    pub fn redeem(&mut self, login_name: &str, code: &str) -> bool {
        let key = normalize_login(login_name);
        match self.codes.get(&key) {
            Some(issued) if issued.code == code => {
                self.codes.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Drop a code that timed out, unless it has been replaced since
    pub fn expire(&mut self, login_name: &str, code: &str) -> bool {
        let key = normalize_login(login_name);
        if self.codes.get(&key).is_some_and(|issued| issued.code == code) {
            self.codes.remove(&key);
            return true;
        }
        false
    }

    /// Drop every code a disconnected bot issued
    pub fn revoke_issued_by(&mut self, issuer: PeerId) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, issued| issued.issuer != issuer);
        before - self.codes.len()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
