//! Shared terminal state read by the precondition checks.
//!
//! The activated-code list is swapped as a whole: readers clone the `Arc`
//! and keep working on their snapshot even if an activation lands meanwhile.

use crate::records::UserRecord;
use crate::sdk::{PosSdk, SdkResult};
use log::debug;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Credentials of the QR-code (PIX) payment provider.
#[derive(Clone, PartialEq, Eq)]
pub struct PixCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl PixCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        PixCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

// Keeps the secret out of logs
impl fmt::Debug for PixCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Default)]
pub struct TerminalState {
    activated: RwLock<Option<Arc<Vec<UserRecord>>>>,
    pix: RwLock<Option<PixCredentials>>,
}

impl TerminalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current activated-code snapshot; `None` until the SDK has been
    /// initialized.
    pub fn activated(&self) -> Option<Arc<Vec<UserRecord>>> {
        self.activated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace_activated(&self, users: Vec<UserRecord>) {
        debug!("Activated code list now has {} entries", users.len());
        *self.activated.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(users));
    }

    pub fn activated_count(&self) -> usize {
        self.activated().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_code_activated(&self, code: &str) -> bool {
        self.activated()
            .map(|users| users.iter().any(|u| u.terminal_code == code))
            .unwrap_or(false)
    }

    /// Re-reads the activated codes from the SDK and swaps them in.
    pub fn resync(&self, sdk: &dyn PosSdk) -> SdkResult<()> {
        let users = sdk.activated_users()?;
        self.replace_activated(users);
        Ok(())
    }

    pub fn set_pix_credentials(&self, credentials: Option<PixCredentials>) {
        *self.pix.write().unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    pub fn pix_credentials(&self) -> Option<PixCredentials> {
        self.pix.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_replacement() {
        let state = TerminalState::new();
        assert!(state.activated().is_none());

        state.replace_activated(vec![UserRecord::new("111", "A")]);
        let snapshot = state.activated().unwrap();

        state.replace_activated(vec![UserRecord::new("111", "A"), UserRecord::new("222", "B")]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(state.activated_count(), 2);
        assert!(state.is_code_activated("222"));
        assert!(!state.is_code_activated("333"));
    }

    #[test]
    fn test_pix_credentials_completeness_and_debug() {
        assert!(!PixCredentials::new("id", " ").is_complete());
        let creds = PixCredentials::new("id", "very-secret");
        assert!(creds.is_complete());
        assert!(!format!("{:?}", creds).contains("very-secret"));

        let state = TerminalState::new();
        state.set_pix_credentials(Some(creds.clone()));
        assert_eq!(state.pix_credentials(), Some(creds));
    }
}
