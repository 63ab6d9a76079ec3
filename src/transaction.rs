//! Transaction setup parsing and validation.
//!
//! Callers hand over a loosely typed [`TransactionSetup`] (every field
//! optional, strings where the vendor expects enums). It is validated once,
//! at executor entry, into a [`TransactionRequest`] that the rest of the
//! bridge can trust.

use crate::amount::Cents;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest statement descriptor the acquirer accepts.
pub const SHORT_NAME_MAX_LEN: usize = 14;

/// Highest installment count the vendor defines a plan for.
pub const MAX_INSTALLMENTS: u32 = 18;

/// Raw transaction setup as received from the application layer.
///
/// Uses string-based fields for the enum-like values so unknown values are
/// reported with the offending field name instead of a generic parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSetup {
    /// Amount in minor units, e.g. `"100"` for 1.00
    pub amount_in_cents: Option<String>,

    /// One of `DEBIT`, `CREDIT`, `VOUCHER`, `INSTANT_PAYMENT`, `PIX`
    pub type_of_transaction: Option<String>,

    /// When `false` the transaction must be captured later
    pub capture: Option<bool>,

    pub installment_count: Option<u32>,
    pub installment_has_interest: Option<bool>,

    /// Acting merchant code when more than one is activated
    pub terminal_code: Option<String>,

    /// Pinpad to use on generic devices; the first connected one otherwise
    pub pinpad_mac_address: Option<String>,

    pub entry_mode: Option<String>,
    pub initiator_transaction_key: Option<String>,
    pub short_name: Option<String>,
    pub sub_merchant_category_code: Option<String>,
    pub sub_merchant_address: Option<String>,
    pub sub_merchant_city: Option<String>,
    pub sub_merchant_postal_address: Option<String>,
    pub sub_merchant_registered_identifier: Option<String>,
    pub sub_merchant_tax_identification_number: Option<String>,

    #[serde(rename = "useDefaultUI")]
    pub use_default_ui: Option<bool>,
    pub dialog_title: Option<String>,
    pub dialog_message: Option<String>,
}

impl TransactionSetup {
    /// Setup with just the required fields.
    pub fn new(
        amount_in_cents: impl Into<String>,
        kind: TransactionKind,
        capture: bool,
        installment_count: u32,
        installment_has_interest: bool,
    ) -> Self {
        TransactionSetup {
            amount_in_cents: Some(amount_in_cents.into()),
            type_of_transaction: Some(kind.as_str().to_string()),
            capture: Some(capture),
            installment_count: Some(installment_count),
            installment_has_interest: Some(installment_has_interest),
            ..Default::default()
        }
    }

    /// Validates the setup into a typed request.
    ///
    /// Required fields are checked first, in a fixed order, so the reported
    /// field is deterministic when several are missing.
    pub fn validate(&self) -> Result<TransactionRequest> {
        let amount_raw = required("amountInCents", self.amount_in_cents.as_deref())?;
        let kind_raw = required("typeOfTransaction", self.type_of_transaction.as_deref())?;
        let capture = required("capture", self.capture)?;
        let count = required("installmentCount", self.installment_count)?;
        let interest = required("installmentHasInterest", self.installment_has_interest)?;

        let amount = Cents::from_str(amount_raw).map_err(|e| invalid("amountInCents", e))?;
        if amount.is_zero() {
            return Err(invalid("amountInCents", "amount must be greater than zero"));
        }

        let kind = TransactionKind::from_str(kind_raw).map_err(|e| invalid("typeOfTransaction", e))?;
        let installment = InstallmentPlan::find(count, interest)?;

        let entry_mode = match non_empty(&self.entry_mode) {
            Some(raw) => Some(EntryMode::from_str(raw).map_err(|e| invalid("entryMode", e))?),
            None => None,
        };

        Ok(TransactionRequest {
            amount,
            kind,
            capture,
            installment,
            entry_mode,
            initiator_transaction_key: non_empty(&self.initiator_transaction_key).map(str::to_string),
            short_name: non_empty(&self.short_name)
                .map(|name| name.chars().take(SHORT_NAME_MAX_LEN).collect()),
            sub_merchant: SubMerchant {
                category_code: non_empty(&self.sub_merchant_category_code).map(str::to_string),
                address: non_empty(&self.sub_merchant_address).map(str::to_string),
                city: non_empty(&self.sub_merchant_city).map(str::to_string),
                postal_address: non_empty(&self.sub_merchant_postal_address).map(str::to_string),
                registered_identifier: non_empty(&self.sub_merchant_registered_identifier)
                    .map(str::to_string),
                tax_identification_number: non_empty(&self.sub_merchant_tax_identification_number)
                    .map(str::to_string),
            },
        })
    }
}

fn required<T>(field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| BridgeError::MissingRequiredField {
        field: field.to_string(),
    })
}

fn invalid(field: &str, reason: impl fmt::Display) -> BridgeError {
    BridgeError::InvalidFieldValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A validated transaction ready to hand to the vendor SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub amount: Cents,
    pub kind: TransactionKind,
    pub capture: bool,
    pub installment: InstallmentPlan,
    pub entry_mode: Option<EntryMode>,
    pub initiator_transaction_key: Option<String>,
    /// Statement descriptor, already truncated to [`SHORT_NAME_MAX_LEN`].
    pub short_name: Option<String>,
    pub sub_merchant: SubMerchant,
}

/// Sub-acquirer details forwarded untouched to the acquirer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubMerchant {
    /// Also known as MCC
    pub category_code: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_address: Option<String>,
    pub registered_identifier: Option<String>,
    pub tax_identification_number: Option<String>,
}

/// Payment method of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Debit,
    Credit,
    Voucher,
    InstantPayment,
    /// QR-code payment; needs provider credentials from `init_sdk`.
    Pix,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Debit => "DEBIT",
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Voucher => "VOUCHER",
            TransactionKind::InstantPayment => "INSTANT_PAYMENT",
            TransactionKind::Pix => "PIX",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "DEBIT" => Ok(TransactionKind::Debit),
            "CREDIT" => Ok(TransactionKind::Credit),
            "VOUCHER" => Ok(TransactionKind::Voucher),
            "INSTANT_PAYMENT" => Ok(TransactionKind::InstantPayment),
            "PIX" => Ok(TransactionKind::Pix),
            other => Err(format!("unknown transaction type {:?}", other)),
        }
    }
}

/// How the card was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryMode {
    MagneticStripe,
    ChipNPin,
    Contactless,
    ContactlessMag,
    Qrcode,
    Unknown,
}

impl FromStr for EntryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "MAGNETIC_STRIPE" => Ok(EntryMode::MagneticStripe),
            "CHIP_N_PIN" => Ok(EntryMode::ChipNPin),
            "CONTACTLESS" => Ok(EntryMode::Contactless),
            "CONTACTLESS_MAG" => Ok(EntryMode::ContactlessMag),
            "QRCODE" => Ok(EntryMode::Qrcode),
            "UNKNOWN" => Ok(EntryMode::Unknown),
            other => Err(format!("unknown entry mode {:?}", other)),
        }
    }
}

/// One of the vendor's installment plans.
///
/// Only combinations the vendor defines exist: a single installment never
/// carries interest, and 2 through [`MAX_INSTALLMENTS`] exist both with and
/// without interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstallmentPlan {
    count: u32,
    interest: bool,
}

impl InstallmentPlan {
    pub const SINGLE: Self = InstallmentPlan {
        count: 1,
        interest: false,
    };

    /// Looks up the plan for a count/interest combination.
    pub fn find(count: u32, interest: bool) -> Result<Self> {
        let known = match count {
            1 => !interest,
            2..=MAX_INSTALLMENTS => true,
            _ => false,
        };

        if known {
            Ok(InstallmentPlan { count, interest })
        } else {
            Err(BridgeError::InvalidInstallmentPlan { count, interest })
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn has_interest(&self) -> bool {
        self.interest
    }

    /// Vendor identifier, e.g. `THREE_INSTALMENT_WITH_INTEREST`.
    pub fn name(&self) -> String {
        if self.count == 1 {
            return "ONE_INSTALMENT".to_string();
        }
        format!(
            "{}_INSTALMENT_{}",
            COUNT_NAMES[self.count as usize],
            if self.interest { "WITH_INTEREST" } else { "NO_INTEREST" }
        )
    }
}

const COUNT_NAMES: [&str; MAX_INSTALLMENTS as usize + 1] = [
    "ZERO", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN",
    "ELEVEN", "TWELVE", "THIRTEEN", "FOURTEEN", "FIFTEEN", "SIXTEEN", "SEVENTEEN", "EIGHTEEN",
];

impl Serialize for InstallmentPlan {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("InstallmentPlan", 3)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("interest", &self.interest)?;
        state.serialize_field("name", &self.name())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit_setup() -> TransactionSetup {
        TransactionSetup::new("100", TransactionKind::Credit, true, 1, false)
    }

    #[test]
    fn test_validate_minimal_setup() {
        let request = credit_setup().validate().unwrap();
        assert_eq!(request.amount.minor_units(), 100);
        assert_eq!(request.kind, TransactionKind::Credit);
        assert!(request.capture);
        assert_eq!(request.installment, InstallmentPlan::SINGLE);
        assert_eq!(request.entry_mode, None);
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let setup = TransactionSetup {
            amount_in_cents: Some("100".into()),
            type_of_transaction: Some("DEBIT".into()),
            ..Default::default()
        };

        match setup.validate() {
            Err(BridgeError::MissingRequiredField { field }) => assert_eq!(field, "capture"),
            other => panic!("Expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_missing_installment_fields() {
        let mut setup = credit_setup();
        setup.installment_has_interest = None;

        match setup.validate() {
            Err(BridgeError::MissingRequiredField { field }) => {
                assert_eq!(field, "installmentHasInterest")
            }
            other => panic!("Expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_amounts() {
        for amount in ["abc", "10.00", "0", "-5"] {
            let mut setup = credit_setup();
            setup.amount_in_cents = Some(amount.into());
            let err = setup.validate().unwrap_err();
            assert_eq!(err.code(), "502", "amount {:?}", amount);
        }
    }

    #[test]
    fn test_validate_rejects_unknown_kind_and_entry_mode() {
        let mut setup = credit_setup();
        setup.type_of_transaction = Some("CHEQUE".into());
        assert!(matches!(
            setup.validate(),
            Err(BridgeError::InvalidFieldValue { ref field, .. }) if field == "typeOfTransaction"
        ));

        let mut setup = credit_setup();
        setup.entry_mode = Some("TELEPATHY".into());
        assert!(matches!(
            setup.validate(),
            Err(BridgeError::InvalidFieldValue { ref field, .. }) if field == "entryMode"
        ));
    }

    #[test]
    fn test_empty_optional_strings_are_ignored() {
        let mut setup = credit_setup();
        setup.entry_mode = Some("  ".into());
        setup.initiator_transaction_key = Some(String::new());

        let request = setup.validate().unwrap();
        assert_eq!(request.entry_mode, None);
        assert_eq!(request.initiator_transaction_key, None);
    }

    #[test]
    fn test_short_name_is_truncated() {
        let mut setup = credit_setup();
        setup.short_name = Some("Padaria do Bairro Central".into());

        let request = setup.validate().unwrap();
        assert_eq!(request.short_name.as_deref(), Some("Padaria do Bai"));
    }

    #[test]
    fn test_sub_merchant_fields_are_kept_apart() {
        let mut setup = credit_setup();
        setup.sub_merchant_registered_identifier = Some("merchant-42".into());
        setup.sub_merchant_tax_identification_number = Some("12345678000199".into());

        let request = setup.validate().unwrap();
        assert_eq!(
            request.sub_merchant.registered_identifier.as_deref(),
            Some("merchant-42")
        );
        assert_eq!(
            request.sub_merchant.tax_identification_number.as_deref(),
            Some("12345678000199")
        );
    }

    #[test]
    fn test_installment_plan_lookup() {
        assert!(InstallmentPlan::find(1, false).is_ok());
        assert!(InstallmentPlan::find(3, true).is_ok());
        assert!(InstallmentPlan::find(18, false).is_ok());

        assert_eq!(
            InstallmentPlan::find(1, true).unwrap_err(),
            BridgeError::InvalidInstallmentPlan {
                count: 1,
                interest: true
            }
        );
        assert!(InstallmentPlan::find(0, false).is_err());
        assert!(InstallmentPlan::find(19, true).is_err());
    }

    #[test]
    fn test_installment_plan_names() {
        assert_eq!(InstallmentPlan::SINGLE.name(), "ONE_INSTALMENT");
        assert_eq!(
            InstallmentPlan::find(3, true).unwrap().name(),
            "THREE_INSTALMENT_WITH_INTEREST"
        );
        assert_eq!(
            InstallmentPlan::find(12, false).unwrap().name(),
            "TWELVE_INSTALMENT_NO_INTEREST"
        );
    }

    #[test]
    fn test_invalid_plan_in_setup() {
        let setup = TransactionSetup::new("100", TransactionKind::Credit, true, 1, true);
        assert_eq!(setup.validate().unwrap_err().code(), "503");
    }
}
