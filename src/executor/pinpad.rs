//! External pinpad operations, plus the card lookup that runs on whichever
//! reader the device has.

use crate::adapter::CallbackAdapter;
use crate::bridge::{Dialog, PosBridge};
use crate::precondition;
use crate::records::{Pinpad, TransactionRecord};
use crate::sdk::OperationRequest;
use crate::settle::Pending;
use std::sync::Arc;

impl PosBridge {
    /// Pairs with the pinpad `name` at `mac_address`. Generic devices only.
    pub fn connect_to_pinpad(&self, name: &str, mac_address: &str, dialog: Dialog) -> Pending<bool> {
        self.run("connectToPinpad", |settlement| {
            self.activated_users()?;
            precondition::require_not_dedicated_mode(self.config.runtime_mode, "connectToPinpad")?;

            let dialog = dialog.resolve(true, "Connecting...", "Connecting to the selected pinpad");
            let use_default_ui = dialog.use_default_ui;
            let operation = self.sdk.create_operation(
                OperationRequest::ConnectPinpad {
                    pinpad: Pinpad::new(name, mac_address),
                },
                dialog,
            )?;

            let adapter = CallbackAdapter::new(
                "connectToPinpad",
                settlement,
                Arc::clone(&operation),
                |_| Ok(true),
            )
            .with_progress(self.progress_route(&self.config.progress.connect_to_pinpad))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }

    /// Shows `message` on a connected pinpad; the first one when
    /// `mac_address` is `None`.
    pub fn display_message_in_pinpad(
        &self,
        message: &str,
        mac_address: Option<&str>,
        dialog: Dialog,
    ) -> Pending<bool> {
        self.run("displayMessageInPinpad", |settlement| {
            self.activated_users()?;
            precondition::require_not_dedicated_mode(
                self.config.runtime_mode,
                "displayMessageInPinpad",
            )?;
            precondition::require_pinpad_connected(self.sdk.is_connected_to_pinpad())?;
            let pinpad = precondition::select_pinpad(&self.sdk.connected_pinpads(), mac_address)?;

            let dialog = dialog.resolve(true, "Please wait", "Sending message to pinpad");
            let use_default_ui = dialog.use_default_ui;
            let operation = self.sdk.create_operation(
                OperationRequest::DisplayMessage {
                    pinpad,
                    message: message.to_string(),
                },
                dialog,
            )?;

            let adapter = CallbackAdapter::new(
                "displayMessageInPinpad",
                settlement,
                Arc::clone(&operation),
                |_| Ok(true),
            )
            .with_progress(self.progress_route(&self.config.progress.display_message_in_pinpad))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }

    /// Reads a card and resolves with the stored transactions made with it.
    pub fn fetch_transactions_for_card(
        &self,
        pinpad_mac_address: Option<&str>,
        dialog: Dialog,
    ) -> Pending<Vec<TransactionRecord>> {
        self.run("fetchTransactionsForCard", |settlement| {
            self.activated_users()?;
            let target = self.hardware_target(pinpad_mac_address)?;

            let dialog = dialog.resolve(true, "Please wait", "Validating transaction");
            let use_default_ui = dialog.use_default_ui;
            let operation = self
                .sdk
                .create_operation(OperationRequest::CardTransactions { target }, dialog)?;

            let adapter = CallbackAdapter::new(
                "fetchTransactionsForCard",
                settlement,
                Arc::clone(&operation),
                |report| Ok(report.card_transactions.clone()),
            )
            .with_progress(self.progress_route(&self.config.progress.fetch_transactions_for_card))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }
}
