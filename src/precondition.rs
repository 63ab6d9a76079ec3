//! Precondition checks run before anything is sent to hardware.
//!
//! Each check is a pure function of a state snapshot the caller passes in.
//! They never mutate anything; failing means returning the matching
//! [`BridgeError`].

use crate::config::RuntimeMode;
use crate::error::{BridgeError, Result};
use crate::records::{Pinpad, UserRecord};
use crate::state::PixCredentials;

pub fn require_sdk_initialized(initialized: bool) -> Result<()> {
    if initialized {
        Ok(())
    } else {
        Err(BridgeError::SdkNotInitialized)
    }
}

/// `activated` is `None` when no snapshot has been taken yet.
pub fn require_terminal_activated(activated: Option<&[UserRecord]>) -> Result<()> {
    match activated {
        Some(users) if !users.is_empty() => Ok(()),
        _ => Err(BridgeError::NoTerminalActivated),
    }
}

/// For operations that only exist on dedicated terminals (printer, MIFARE).
pub fn require_dedicated_mode(mode: RuntimeMode, operation: &'static str) -> Result<()> {
    match mode {
        RuntimeMode::Dedicated => Ok(()),
        RuntimeMode::Generic => Err(BridgeError::UnsupportedInRuntimeMode {
            operation,
            mode: mode.as_str(),
        }),
    }
}

/// For pinpad operations, which make no sense with an integrated pinpad.
pub fn require_not_dedicated_mode(mode: RuntimeMode, operation: &'static str) -> Result<()> {
    match mode {
        RuntimeMode::Generic => Ok(()),
        RuntimeMode::Dedicated => Err(BridgeError::UnsupportedInRuntimeMode {
            operation,
            mode: mode.as_str(),
        }),
    }
}

pub fn require_pinpad_connected(connected: bool) -> Result<()> {
    if connected {
        Ok(())
    } else {
        Err(BridgeError::NoPinpadConnected)
    }
}

/// Deactivation guard: the last active code stays unless `bypass` is set.
pub fn require_other_active_code(active_count: usize, bypass: bool) -> Result<()> {
    if active_count > 1 || bypass {
        Ok(())
    } else {
        Err(BridgeError::CannotDeactivateLastCode)
    }
}

pub fn require_pix_credentials(credentials: Option<&PixCredentials>) -> Result<()> {
    match credentials {
        Some(creds) if creds.is_complete() => Ok(()),
        _ => Err(BridgeError::MissingPixCredentials),
    }
}

/// Picks the acting merchant code: the explicit one (last match wins) or the
/// most recently activated.
pub fn select_user(users: &[UserRecord], code: Option<&str>) -> Result<UserRecord> {
    match code {
        Some(code) => users
            .iter()
            .rev()
            .find(|u| u.terminal_code == code)
            .cloned()
            .ok_or_else(|| BridgeError::TerminalCodeNotFound {
                code: code.to_string(),
            }),
        None => users.last().cloned().ok_or(BridgeError::NoTerminalActivated),
    }
}

/// Picks a pinpad: an explicit MAC (last match wins) or the first connected.
pub fn select_pinpad(connected: &[Pinpad], mac_address: Option<&str>) -> Result<Pinpad> {
    match mac_address.map(str::trim).filter(|mac| !mac.is_empty()) {
        Some(mac) => connected
            .iter()
            .rev()
            .find(|p| p.mac_address == mac)
            .cloned()
            .ok_or_else(|| BridgeError::PinpadNotFound {
                mac_address: mac.to_string(),
            }),
        None => connected.first().cloned().ok_or(BridgeError::NoPinpadConnected),
    }
}
