//! Card and PIX transactions; the only cancelable operation.

use crate::adapter::CallbackAdapter;
use crate::bridge::PosBridge;
use crate::error::BridgeError;
use crate::precondition;
use crate::records::{TransactionRecord, TransactionStatus};
use crate::sdk::{DialogOptions, OperationReport, OperationRequest, VendorAction};
use crate::settle::Pending;
use crate::transaction::{TransactionKind, TransactionSetup};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry name of the running transaction.
pub const MAKE_TRANSACTION_TASK: &str = "makeTransaction";

impl PosBridge {
    /// Starts a transaction and resolves with its stored record.
    ///
    /// Progress goes to `progress_channel`, or the configured transaction
    /// channel when `None`, unless the setup asks for the vendor's own UI.
    /// Resolves `None` if the datastore has no record after success.
    pub fn make_transaction(
        &self,
        setup: TransactionSetup,
        progress_channel: Option<&str>,
    ) -> Pending<Option<TransactionRecord>> {
        self.run("makeTransaction", |settlement| {
            let users = self.activated_users()?;
            if !self.is_running_in_pos() {
                precondition::require_pinpad_connected(self.sdk.is_connected_to_pinpad())?;
            }

            let user = precondition::select_user(&users, setup.terminal_code.as_deref())?;
            let target = self.hardware_target(setup.pinpad_mac_address.as_deref())?;
            let request = setup.validate()?;

            if request.kind == TransactionKind::Pix {
                precondition::require_pix_credentials(self.terminal.pix_credentials().as_ref())?;
            }

            let use_default_ui = setup.use_default_ui.unwrap_or(false);
            let dialog = DialogOptions {
                use_default_ui,
                title: setup
                    .dialog_title
                    .clone()
                    .unwrap_or_else(|| "Processing...".to_string()),
                message: setup
                    .dialog_message
                    .clone()
                    .unwrap_or_else(|| "Running transaction...".to_string()),
            };

            let correlation_key = request.initiator_transaction_key.clone();
            let operation = self.sdk.create_operation(
                OperationRequest::Transaction {
                    request,
                    user,
                    target,
                },
                dialog,
            )?;

            let store = Arc::clone(&self.store);
            let channel = progress_channel.unwrap_or(&self.config.progress.make_transaction);
            let adapter = CallbackAdapter::new(
                "makeTransaction",
                settlement,
                Arc::clone(&operation),
                move |report| {
                    let record = match store.last_transaction_id()? {
                        Some(id) => store.find_by_id(id)?,
                        None => None,
                    };
                    Ok(record.map(|trx| with_authorizer_message(trx, report)))
                },
            )
            .on_error(transaction_failure)
            .with_progress(
                self.progress_route(channel)
                    .correlated(correlation_key)
                    .with_extra(transaction_progress),
            )
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, Some(MAKE_TRANSACTION_TASK))
        })
    }

    /// Asks the running transaction to abort.
    ///
    /// Resolves `true` once the registration is gone; the transaction's own
    /// pending settles through its normal error path when the abort lands.
    pub fn cancel_running_transaction(&self) -> Pending<bool> {
        self.run("cancelRunningTransaction", |settlement| {
            self.registry
                .cancel_with(MAKE_TRANSACTION_TASK, |task| task.operation().abort_payment())?;
            settlement.resolve(true);
            Ok(())
        })
    }
}

/// Attaches the authorizer message the vendor reported for this run.
pub(crate) fn with_authorizer_message(
    mut record: TransactionRecord,
    report: &OperationReport,
) -> TransactionRecord {
    if let Some(message) = &report.message_from_authorizer {
        record.message_from_authorizer = Some(message.clone());
    }
    record
}

fn transaction_failure(report: &OperationReport) -> BridgeError {
    match report.transaction_status {
        Some(status) if status != TransactionStatus::Unknown => BridgeError::Declined {
            status,
            message: report.message_from_authorizer.clone().unwrap_or_default(),
        },
        _ => BridgeError::generic_failure(),
    }
}

fn transaction_progress(
    action: &VendorAction,
    report: &OperationReport,
) -> BTreeMap<String, Option<String>> {
    let status = report.transaction_status.unwrap_or(TransactionStatus::Unknown);
    let qr_code = match action {
        VendorAction::TransactionWaitingQrcodeScan => report.qr_code.clone(),
        _ => None,
    };

    let mut extra = BTreeMap::new();
    extra.insert("transactionStatus".to_string(), Some(status.as_str().to_string()));
    extra.insert(
        "messageFromAuthorizer".to_string(),
        report.message_from_authorizer.clone(),
    );
    extra.insert("qrCode".to_string(), qr_code);
    extra
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_prefers_vendor_status() {
        let report = OperationReport {
            transaction_status: Some(TransactionStatus::DeclinedByCard),
            message_from_authorizer: Some("card blocked".into()),
            ..Default::default()
        };
        let err = transaction_failure(&report);
        assert_eq!(err.code(), "DECLINED_BY_CARD");
        assert!(err.to_string().contains("card blocked"));
    }

    #[test]
    fn test_unknown_status_is_generic_failure() {
        let report = OperationReport {
            transaction_status: Some(TransactionStatus::Unknown),
            ..Default::default()
        };
        assert_eq!(transaction_failure(&report).code(), "405");
        assert_eq!(transaction_failure(&OperationReport::default()).code(), "405");
    }

    #[test]
    fn test_qr_code_only_while_waiting_for_scan() {
        let report = OperationReport {
            transaction_status: Some(TransactionStatus::Pending),
            qr_code: Some("00020126".into()),
            ..Default::default()
        };

        let waiting = transaction_progress(&VendorAction::TransactionWaitingQrcodeScan, &report);
        assert_eq!(waiting["qrCode"].as_deref(), Some("00020126"));
        assert_eq!(waiting["transactionStatus"].as_deref(), Some("PENDING"));

        let sending = transaction_progress(&VendorAction::TransactionSending, &report);
        assert_eq!(sending["qrCode"], None);
    }
}
