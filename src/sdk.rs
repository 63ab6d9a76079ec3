//! Seams to the vendor SDK and the other external collaborators.
//!
//! Nothing in here talks to hardware. The bridge drives these traits and a
//! platform layer (or [`crate::sim`]) implements them.

use crate::error::SdkError;
use crate::records::{Pinpad, ReceiptType, TransactionRecord, TransactionStatus, UserRecord};
use crate::transaction::TransactionRequest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result type alias for collaborator calls
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Progress tag reported by a vendor operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VendorAction {
    TransactionWaitingCard,
    TransactionWaitingPassword,
    TransactionWaitingQrcodeScan,
    TransactionSending,
    TransactionRemoveCard,
    TransactionCardRemoved,
    TransactionTypeSelection,
    ReversingTransactionWithError,
    Other(String),
}

impl VendorAction {
    pub fn as_str(&self) -> &str {
        match self {
            VendorAction::TransactionWaitingCard => "TRANSACTION_WAITING_CARD",
            VendorAction::TransactionWaitingPassword => "TRANSACTION_WAITING_PASSWORD",
            VendorAction::TransactionWaitingQrcodeScan => "TRANSACTION_WAITING_QRCODE_SCAN",
            VendorAction::TransactionSending => "TRANSACTION_SENDING",
            VendorAction::TransactionRemoveCard => "TRANSACTION_REMOVE_CARD",
            VendorAction::TransactionCardRemoved => "TRANSACTION_CARD_REMOVED",
            VendorAction::TransactionTypeSelection => "TRANSACTION_TYPE_SELECTION",
            VendorAction::ReversingTransactionWithError => "REVERSING_TRANSACTION_WITH_ERROR",
            VendorAction::Other(name) => name,
        }
    }
}

impl fmt::Display for VendorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three callbacks a vendor operation reports, as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    Succeeded,
    Failed,
    StatusChanged(VendorAction),
}

/// Receives the events of one vendor operation.
///
/// Events may arrive on any thread. `Succeeded`/`Failed` are terminal but a
/// defective vendor may still send more than one.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: VendorEvent);
}

/// What the vendor knows about an operation after (or while) it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationReport {
    pub transaction_status: Option<TransactionStatus>,
    pub message_from_authorizer: Option<String>,
    /// Vendor error tags collected while running.
    pub errors: Vec<String>,
    /// Payment QR code, while the operation waits for a scan.
    pub qr_code: Option<String>,
    /// Transactions the vendor found for the presented card.
    pub card_transactions: Vec<TransactionRecord>,
}

/// Handle of a constructed vendor operation.
pub trait VendorOperation: Send + Sync {
    /// Starts the operation. Events are delivered to `listener` until one
    /// terminal event has been sent.
    fn execute(&self, listener: Arc<dyn Listener>) -> SdkResult<()>;

    /// Default abort capability.
    fn cancel(&self) -> SdkResult<()>;

    /// Payment-specific abort; providers without one fall back to `cancel`.
    fn abort_payment(&self) -> SdkResult<()> {
        self.cancel()
    }

    fn report(&self) -> OperationReport;
}

/// Hardware an operation is routed to, resolved once per call from the
/// runtime mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareTarget {
    /// Integrated reader/printer of a dedicated terminal.
    Terminal,
    Pinpad(Pinpad),
}

/// Display options shared by every vendor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogOptions {
    /// Let the vendor draw its own progress dialog.
    pub use_default_ui: bool,
    pub title: String,
    pub message: String,
}

/// A single recipient or sender of a receipt e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

/// A rendered image, one byte per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Bitmap {
            width,
            height,
            pixels,
        }
    }

    /// Copies `rows` rows starting at row `top`.
    pub fn crop_rows(&self, top: u32, rows: u32) -> Bitmap {
        let width = self.width as usize;
        let start = (top as usize * width).min(self.pixels.len());
        let end = ((top + rows) as usize * width).min(self.pixels.len());
        Bitmap {
            width: self.width,
            height: rows,
            pixels: self.pixels[start..end].to_vec(),
        }
    }
}

/// Everything the bridge can ask the vendor SDK to build.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Activate {
        code: String,
    },
    Deactivate {
        code: String,
    },
    Transaction {
        request: TransactionRequest,
        user: UserRecord,
        target: HardwareTarget,
    },
    Void {
        transaction: TransactionRecord,
    },
    Capture {
        transaction: TransactionRecord,
    },
    ReversePending,
    ReceiptMail {
        transaction: TransactionRecord,
        receipt_type: ReceiptType,
        from: Contact,
        to: Vec<Contact>,
    },
    CardTransactions {
        target: HardwareTarget,
    },
    ConnectPinpad {
        pinpad: Pinpad,
    },
    DisplayMessage {
        pinpad: Pinpad,
        message: String,
    },
    PrintReceipt {
        transaction: TransactionRecord,
        receipt_type: ReceiptType,
        reprint: bool,
    },
    PrintBitmaps {
        strips: Vec<Bitmap>,
    },
}

impl OperationRequest {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            OperationRequest::Activate { .. } => "activate",
            OperationRequest::Deactivate { .. } => "deactivate",
            OperationRequest::Transaction { .. } => "transaction",
            OperationRequest::Void { .. } => "void",
            OperationRequest::Capture { .. } => "capture",
            OperationRequest::ReversePending => "reversal",
            OperationRequest::ReceiptMail { .. } => "receipt-mail",
            OperationRequest::CardTransactions { .. } => "card-transactions",
            OperationRequest::ConnectPinpad { .. } => "connect-pinpad",
            OperationRequest::DisplayMessage { .. } => "display-message",
            OperationRequest::PrintReceipt { .. } => "print-receipt",
            OperationRequest::PrintBitmaps { .. } => "print-bitmaps",
        }
    }
}

/// MIFARE key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MifareKeyType {
    A,
    B,
}

impl MifareKeyType {
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(MifareKeyType::A),
            1 => Some(MifareKeyType::B),
            _ => None,
        }
    }
}

/// Contactless reader of a dedicated terminal.
///
/// `execute` waits for a card; the card operations are only valid after it
/// has reported success and until `cancel_detection` powers the card off.
pub trait ContactlessReader: Send + Sync {
    fn execute(&self, listener: Arc<dyn Listener>) -> SdkResult<()>;
    fn cancel_detection(&self);
    fn card_uuid(&self) -> Vec<u8>;
    fn authenticate_sector(&self, key_type: MifareKeyType, key: &[u8], sector: u8) -> SdkResult<()>;
    fn read_block(&self, sector: u8, block: u8) -> SdkResult<[u8; 16]>;
    fn write_block(&self, sector: u8, block: u8, data: &[u8; 16]) -> SdkResult<()>;
    /// Vendor error tags from the last failed card action.
    fn errors(&self) -> Vec<String>;
}

/// The vendor SDK.
pub trait PosSdk: Send + Sync {
    fn is_initialized(&self) -> bool;

    /// Runs the SDK start-up handshake and returns the activated codes.
    fn initialize(&self, app_name: &str) -> SdkResult<Vec<UserRecord>>;

    /// Re-reads the activated codes from the SDK.
    fn activated_users(&self) -> SdkResult<Vec<UserRecord>>;

    fn is_connected_to_pinpad(&self) -> bool;

    /// Pinpads in connection order.
    fn connected_pinpads(&self) -> Vec<Pinpad>;

    fn create_operation(
        &self,
        request: OperationRequest,
        dialog: DialogOptions,
    ) -> SdkResult<Arc<dyn VendorOperation>>;

    fn create_contactless_reader(
        &self,
        dialog: DialogOptions,
    ) -> SdkResult<Arc<dyn ContactlessReader>>;
}

/// Query-only access to the vendor's transaction datastore.
pub trait TransactionStore: Send + Sync {
    fn find_by_id(&self, id: u32) -> SdkResult<Option<TransactionRecord>>;
    fn find_by_atk(&self, atk: &str) -> SdkResult<Option<TransactionRecord>>;
    fn find_by_authorization_code(&self, code: &str) -> SdkResult<Option<TransactionRecord>>;
    fn last_transaction_id(&self) -> SdkResult<Option<u32>>;
    fn all_order_by_id_desc(&self) -> SdkResult<Vec<TransactionRecord>>;
}

/// Out-of-band progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Initiator key of the transaction the event belongs to, when there is one.
    pub correlation_key: Option<String>,
    pub status: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Option<String>>,
}

/// Publishes named progress events; subscription is the sink's business.
pub trait EventSink: Send + Sync {
    fn publish(&self, channel: &str, event: ProgressEvent);
}

/// Turns HTML into a printable bitmap.
pub trait HtmlRenderer: Send + Sync {
    /// Returns `Ok(None)` when the content could not be rendered.
    fn render(&self, html: &str, width: u32) -> SdkResult<Option<Bitmap>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_rows_copies_requested_band() {
        let bitmap = Bitmap::new(2, 3, vec![1, 1, 2, 2, 3, 3]);
        let band = bitmap.crop_rows(1, 2);
        assert_eq!(band.height, 2);
        assert_eq!(band.pixels, vec![2, 2, 3, 3]);
    }

    #[test]
    fn test_key_type_ordinals() {
        assert_eq!(MifareKeyType::from_ordinal(0), Some(MifareKeyType::A));
        assert_eq!(MifareKeyType::from_ordinal(1), Some(MifareKeyType::B));
        assert_eq!(MifareKeyType::from_ordinal(2), None);
    }

    #[test]
    fn test_other_action_keeps_vendor_name() {
        let action = VendorAction::Other("SWITCH_INTERFACE".to_string());
        assert_eq!(action.to_string(), "SWITCH_INTERFACE");
        assert_eq!(
            VendorAction::TransactionWaitingQrcodeScan.as_str(),
            "TRANSACTION_WAITING_QRCODE_SCAN"
        );
    }
}
