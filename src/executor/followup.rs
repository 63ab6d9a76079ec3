//! Operations on stored transactions: void, capture, reversal of pending
//! transactions and receipt e-mails.

use crate::adapter::CallbackAdapter;
use crate::bridge::{Dialog, PosBridge};
use crate::error::{BridgeError, Result};
use crate::executor::transaction::with_authorizer_message;
use crate::records::{MailContact, ReceiptType, TransactionRecord};
use crate::sdk::{Contact, DialogOptions, OperationRequest, TransactionStore};
use crate::settle::{Pending, Settlement};
use std::sync::Arc;

const DEFAULT_SENDER_NAME: &str = "Application Name";
const DEFAULT_RECIPIENT_NAME: &str = "Customer Name";

impl PosBridge {
    /// Voids the transaction with acquirer key `atk`.
    pub fn void_transaction(&self, atk: &str, dialog: Dialog) -> Pending<Option<TransactionRecord>> {
        self.run("voidTransaction", |settlement| {
            self.activated_users()?;
            let transaction = self.transaction_by_atk(atk)?;

            let dialog = dialog.resolve(true, "Processing...", "Voiding transaction...");
            let channel = self.config.progress.void_transaction.clone();
            self.dispatch_followup(
                "voidTransaction",
                OperationRequest::Void {
                    transaction: transaction.clone(),
                },
                dialog,
                &channel,
                transaction,
                settlement,
            )
        })
    }

    /// Captures a transaction made with `capture = false`.
    pub fn capture_transaction(
        &self,
        atk: &str,
        dialog: Dialog,
    ) -> Pending<Option<TransactionRecord>> {
        self.run("captureTransaction", |settlement| {
            self.activated_users()?;
            let transaction = self.transaction_by_atk(atk)?;
            if transaction.is_capture {
                return Err(BridgeError::TransactionAlreadyCaptured {
                    atk: atk.to_string(),
                });
            }

            let dialog = dialog.resolve(true, "Please wait...", "Capturing transaction...");
            let channel = self.config.progress.capture_transaction.clone();
            self.dispatch_followup(
                "captureTransaction",
                OperationRequest::Capture {
                    transaction: transaction.clone(),
                },
                dialog,
                &channel,
                transaction,
                settlement,
            )
        })
    }

    /// Reverses every transaction the vendor left pending after an error.
    pub fn reverse_pending_transactions(&self, dialog: Dialog) -> Pending<bool> {
        self.run("reversePendingTransactions", |settlement| {
            self.activated_users()?;

            let dialog = dialog.resolve(true, "Cancelling...", "Cancelling failed transactions");
            let use_default_ui = dialog.use_default_ui;
            let operation = self
                .sdk
                .create_operation(OperationRequest::ReversePending, dialog)?;

            let adapter = CallbackAdapter::new(
                "reversePendingTransactions",
                settlement,
                Arc::clone(&operation),
                |_| Ok(true),
            )
            .with_progress(self.progress_route(&self.config.progress.reverse_pending_transactions))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }

    /// E-mails a receipt of the transaction with key `atk`.
    ///
    /// `from` needs an e-mail; `to` needs at least one contact and every
    /// contact an e-mail. Missing names get a placeholder.
    pub fn send_transaction_receipt_mail(
        &self,
        atk: &str,
        receipt_type: ReceiptType,
        to: &[MailContact],
        from: &MailContact,
        dialog: Dialog,
    ) -> Pending<Option<TransactionRecord>> {
        self.run("sendTransactionReceiptMail", |settlement| {
            self.activated_users()?;
            let transaction = self.transaction_by_atk(atk)?;
            let from = sender(from)?;
            let to = recipients(to)?;

            let dialog = dialog.resolve(true, "Please wait", "Sending e-mail...");
            let channel = self.config.progress.send_receipt_mail.clone();
            self.dispatch_followup(
                "sendTransactionReceiptMail",
                OperationRequest::ReceiptMail {
                    transaction: transaction.clone(),
                    receipt_type,
                    from,
                    to,
                },
                dialog,
                &channel,
                transaction,
                settlement,
            )
        })
    }

    /// Dispatches an operation on `transaction` that resolves with the
    /// transaction as re-read after success.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_followup(
        &self,
        label: &'static str,
        request: OperationRequest,
        dialog: DialogOptions,
        channel: &str,
        transaction: TransactionRecord,
        settlement: Settlement<Option<TransactionRecord>>,
    ) -> Result<()> {
        let use_default_ui = dialog.use_default_ui;
        let operation = self.sdk.create_operation(request, dialog)?;

        let store: Arc<dyn TransactionStore> = Arc::clone(&self.store);
        let atk = transaction.acquirer_transaction_key.clone();
        let adapter = CallbackAdapter::new(label, settlement, Arc::clone(&operation), move |report| {
            Ok(store
                .find_by_atk(&atk)?
                .map(|trx| with_authorizer_message(trx, report)))
        })
        .with_progress(
            self.progress_route(channel)
                .correlated(transaction.initiator_transaction_key.clone()),
        )
        .default_ui(use_default_ui);

        self.dispatch(&operation, adapter, None)
    }
}

fn sender(contact: &MailContact) -> Result<Contact> {
    let email = filled(&contact.email).ok_or_else(|| BridgeError::MissingRequiredField {
        field: "fromContact.email".to_string(),
    })?;
    Ok(Contact {
        email: email.to_string(),
        name: filled(&contact.name).unwrap_or(DEFAULT_SENDER_NAME).to_string(),
    })
}

fn recipients(contacts: &[MailContact]) -> Result<Vec<Contact>> {
    if contacts.is_empty() {
        return Err(BridgeError::MissingRequiredField {
            field: "toContacts".to_string(),
        });
    }

    contacts
        .iter()
        .enumerate()
        .map(|(index, contact)| {
            let email = filled(&contact.email).ok_or_else(|| BridgeError::InvalidFieldValue {
                field: format!("toContacts[{}].email", index),
                reason: "an e-mail address is required".to_string(),
            })?;
            Ok(Contact {
                email: email.to_string(),
                name: filled(&contact.name)
                    .unwrap_or(DEFAULT_RECIPIENT_NAME)
                    .to_string(),
            })
        })
        .collect()
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
