//! Records read from the vendor SDK and its transaction datastore.
//!
//! These are the shapes resolved to the application layer. They serialize
//! with camelCase keys, which is what the cross-platform layer consumes.

use crate::amount::Cents;
use crate::transaction::{EntryMode, InstallmentPlan, TransactionKind};
use serde::Serialize;
use std::fmt;

/// Merchant postal address attached to an activated code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub district: String,
    pub city: String,
    pub street: String,
    pub door_number: String,
    pub neighborhood: String,
}

/// A merchant code activated on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Activation code identifying the merchant account.
    pub terminal_code: String,
    pub merchant_name: String,
    pub merchant_address: Address,
    pub merchant_document_number: String,
    pub sale_affiliation_key: String,
}

impl UserRecord {
    /// Creates a record with only the code and merchant name filled in.
    pub fn new(terminal_code: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        UserRecord {
            terminal_code: terminal_code.into(),
            merchant_name: merchant_name.into(),
            merchant_address: Address::default(),
            merchant_document_number: String::new(),
            sale_affiliation_key: String::new(),
        }
    }
}

/// Status the vendor assigns to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Unknown,
    Approved,
    Declined,
    DeclinedByCard,
    Cancelled,
    PartialApproved,
    TechnicalError,
    Rejected,
    WithError,
    PendingReversal,
    Pending,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Unknown => "UNKNOWN",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::DeclinedByCard => "DECLINED_BY_CARD",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::PartialApproved => "PARTIAL_APPROVED",
            TransactionStatus::TechnicalError => "TECHNICAL_ERROR",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::WithError => "WITH_ERROR",
            TransactionStatus::PendingReversal => "PENDING_REVERSAL",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction as persisted by the vendor datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Datastore row id; the most recent transaction has the highest id.
    pub id: u32,
    pub amount: Cents,
    pub initiator_transaction_key: Option<String>,
    /// ATK, the key follow-up operations (void, capture, receipts) use.
    pub acquirer_transaction_key: String,
    pub authorization_code: Option<String>,
    pub card_holder_name: Option<String>,
    pub card_brand_name: Option<String>,
    pub entry_mode: Option<EntryMode>,
    pub type_of_transaction: TransactionKind,
    pub instalment_transaction: InstallmentPlan,
    pub transaction_status: TransactionStatus,
    pub is_capture: bool,
    pub short_name: Option<String>,
    /// Code of the merchant the transaction was made under.
    pub terminal_code: String,
    pub message_from_authorizer: Option<String>,
}

impl TransactionRecord {
    pub fn is_approved(&self) -> bool {
        self.transaction_status == TransactionStatus::Approved
    }
}

/// A pinpad known to the SDK, addressed by its Bluetooth MAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pinpad {
    pub name: String,
    pub mac_address: String,
}

impl Pinpad {
    pub fn new(name: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Pinpad {
            name: name.into(),
            mac_address: mac_address.into(),
        }
    }
}

/// Which copy of a receipt to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptType {
    /// The cardholder's copy.
    Client,
    Merchant,
}

impl ReceiptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptType::Client => "CLIENT",
            ReceiptType::Merchant => "MERCHANT",
        }
    }
}

impl std::str::FromStr for ReceiptType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "CLIENT" => Ok(ReceiptType::Client),
            "MERCHANT" => Ok(ReceiptType::Merchant),
            other => Err(format!("unknown receipt type {:?}", other)),
        }
    }
}

/// E-mail contact as supplied by the caller; `email` is validated by the
/// receipt executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailContact {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl MailContact {
    pub fn new(email: impl Into<String>) -> Self {
        MailContact {
            email: Some(email.into()),
            name: None,
        }
    }

    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        MailContact {
            email: Some(email.into()),
            name: Some(name.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_names_match_vendor_enum() {
        assert_eq!(TransactionStatus::DeclinedByCard.as_str(), "DECLINED_BY_CARD");
        assert_eq!(TransactionStatus::PendingReversal.to_string(), "PENDING_REVERSAL");
    }

    #[test]
    fn test_receipt_type_parsing_is_strict() {
        assert_eq!(ReceiptType::from_str("CLIENT").unwrap(), ReceiptType::Client);
        assert_eq!(
            ReceiptType::from_str(" MERCHANT ").unwrap(),
            ReceiptType::Merchant
        );
        assert!(ReceiptType::from_str("client").is_err());
    }

    #[test]
    fn test_user_record_defaults() {
        let user = UserRecord::new("206192723", "Loja Teste");
        assert_eq!(user.terminal_code, "206192723");
        assert_eq!(user.merchant_address, Address::default());
    }
}
