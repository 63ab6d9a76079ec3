//! Activation and deactivation of merchant codes.

use crate::adapter::CallbackAdapter;
use crate::bridge::{Dialog, PosBridge};
use crate::error::{BridgeError, Result};
use crate::precondition;
use crate::records::UserRecord;
use crate::sdk::{DialogOptions, OperationReport, OperationRequest};
use crate::settle::{Pending, Settlement};
use log::debug;
use std::sync::Arc;

impl PosBridge {
    /// Activates `code` on this device.
    ///
    /// Resolves `true` straight away if the code is already active. On
    /// success the activated-code list is re-read before resolving.
    pub fn activate_code(&self, code: &str, dialog: Dialog) -> Pending<bool> {
        self.run("activateCode", |settlement| {
            if self.terminal.is_code_activated(code) {
                debug!("Code {} already activated", code);
                settlement.resolve(true);
                return Ok(());
            }

            let dialog = dialog.resolve(true, "Activation", "Activating your code");
            let request = OperationRequest::Activate {
                code: code.to_string(),
            };
            self.dispatch_activation(request, dialog, settlement)
        })
    }

    /// Deactivates `code`.
    ///
    /// Refuses to remove the only active code unless
    /// `ignore_last_code_check` is set.
    pub fn deactivate_code(
        &self,
        code: &str,
        dialog: Dialog,
        ignore_last_code_check: bool,
    ) -> Pending<bool> {
        self.run("deactivateCode", |settlement| {
            if !self.terminal.is_code_activated(code) {
                return Err(BridgeError::CodeNotActivated {
                    code: code.to_string(),
                });
            }
            precondition::require_other_active_code(
                self.terminal.activated_count(),
                ignore_last_code_check,
            )?;

            let dialog = dialog.resolve(true, "Deactivation", "Deactivating your code");
            let request = OperationRequest::Deactivate {
                code: code.to_string(),
            };
            self.dispatch_activation(request, dialog, settlement)
        })
    }

    /// Codes activated on this device, most recent last.
    pub fn get_activated_codes(&self) -> Pending<Vec<UserRecord>> {
        self.run("getActivatedCodes", |settlement| {
            let users = self
                .terminal
                .activated()
                .ok_or(BridgeError::ActivatedCodesUnavailable)?;
            settlement.resolve(users.as_ref().clone());
            Ok(())
        })
    }

    fn dispatch_activation(
        &self,
        request: OperationRequest,
        dialog: DialogOptions,
        settlement: Settlement<bool>,
    ) -> Result<()> {
        let use_default_ui = dialog.use_default_ui;
        let request_label = request.label();
        let operation = self.sdk.create_operation(request, dialog)?;

        let sdk = Arc::clone(&self.sdk);
        let terminal = Arc::clone(&self.terminal);
        let adapter = CallbackAdapter::new(request_label, settlement, Arc::clone(&operation), move |_| {
            terminal.resync(sdk.as_ref())?;
            Ok(true)
        })
        .on_error(activation_failure)
        .default_ui(use_default_ui);

        self.dispatch(&operation, adapter, None)
    }
}

fn activation_failure(report: &OperationReport) -> BridgeError {
    let errors = if report.errors.is_empty() {
        "unknown activation error".to_string()
    } else {
        report.errors.join(", ")
    };
    BridgeError::ActivationFailed { errors }
}
