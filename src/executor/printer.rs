//! Printing on the integrated printer of a dedicated terminal.

use crate::adapter::CallbackAdapter;
use crate::bridge::{Dialog, PosBridge};
use crate::error::BridgeError;
use crate::precondition;
use crate::records::ReceiptType;
use crate::sdk::{Bitmap, OperationRequest};
use crate::settle::Pending;
use log::debug;
use std::sync::Arc;

/// Width HTML is rendered at, matching the printer's paper.
pub const HTML_RENDER_WIDTH: u32 = 380;

/// Tallest bitmap the printer accepts in one piece.
pub const PRINT_STRIP_HEIGHT: u32 = 595;

impl PosBridge {
    /// Prints (or reprints) the `receipt_type` copy of transaction `atk`.
    pub fn print_receipt_in_pos_printer(
        &self,
        receipt_type: ReceiptType,
        atk: &str,
        is_reprint: bool,
        dialog: Dialog,
    ) -> Pending<bool> {
        self.run("printReceiptInPosPrinter", |settlement| {
            precondition::require_dedicated_mode(self.config.runtime_mode, "printReceiptInPosPrinter")?;
            self.activated_users()?;
            let transaction = self.transaction_by_atk(atk)?;

            let dialog = dialog.resolve(true, "Please wait", "Printing receipt...");
            let use_default_ui = dialog.use_default_ui;
            let operation = self.sdk.create_operation(
                OperationRequest::PrintReceipt {
                    transaction,
                    receipt_type,
                    reprint: is_reprint,
                },
                dialog,
            )?;

            let adapter = CallbackAdapter::new(
                "printReceiptInPosPrinter",
                settlement,
                Arc::clone(&operation),
                |_| Ok(true),
            )
            .with_progress(self.progress_route(&self.config.progress.print_in_pos_printer))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }

    /// Renders `html` and prints it in printer-sized strips.
    pub fn print_html_in_pos_printer(&self, html: &str, dialog: Dialog) -> Pending<bool> {
        self.run("printHtmlInPosPrinter", |settlement| {
            precondition::require_dedicated_mode(self.config.runtime_mode, "printHtmlInPosPrinter")?;
            self.activated_users()?;

            let bitmap = self
                .renderer
                .render(html, HTML_RENDER_WIDTH)?
                .ok_or(BridgeError::HtmlRenderFailed)?;
            let strips = split_into_strips(&bitmap, PRINT_STRIP_HEIGHT);
            debug!(
                "Rendered {}x{} bitmap into {} strips",
                bitmap.width,
                bitmap.height,
                strips.len()
            );

            let dialog = dialog.resolve(true, "Please wait", "Printing receipt...");
            let use_default_ui = dialog.use_default_ui;
            let operation = self
                .sdk
                .create_operation(OperationRequest::PrintBitmaps { strips }, dialog)?;

            let adapter = CallbackAdapter::new(
                "printHtmlInPosPrinter",
                settlement,
                Arc::clone(&operation),
                |_| Ok(true),
            )
            .with_progress(self.progress_route(&self.config.progress.print_in_pos_printer))
            .default_ui(use_default_ui);

            self.dispatch(&operation, adapter, None)
        })
    }
}

/// Consecutive strips of at most `max_rows` rows covering `bitmap` once.
pub fn split_into_strips(bitmap: &Bitmap, max_rows: u32) -> Vec<Bitmap> {
    let max_rows = max_rows.max(1);
    let mut strips = Vec::new();
    let mut top = 0;

    while top < bitmap.height {
        let rows = max_rows.min(bitmap.height - top);
        strips.push(bitmap.crop_rows(top, rows));
        top += rows;
    }
    strips
}
