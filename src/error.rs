//! Error types for the bridge.
//!
//! Every failure that reaches the application layer is a [`BridgeError`]. Its
//! [`code`](BridgeError::code) is the stable identifier callers branch on; the
//! `Display` text is free-form and may carry vendor-supplied detail.

use crate::records::TransactionStatus;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Broad class of a failure, used by callers that only care about the kind of
/// problem rather than the exact code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Locally detectable state problem (SDK, activation, runtime mode).
    Precondition,
    /// Raised by the task registry.
    Concurrency,
    /// Malformed or missing request fields.
    Validation,
    /// Reported by the vendor callback.
    Hardware,
    /// A transaction, pinpad or code lookup missed.
    NotFound,
    /// Anything else.
    Unexpected,
}

/// Errors surfaced by the bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Catch-all for collaborator failures and lost settlements
    #[error("Unexpected error: {message}")]
    Unexpected { message: String },

    #[error("SDK is not initialized")]
    SdkNotInitialized,

    #[error("No activated code list available, initialize the SDK first")]
    ActivatedCodesUnavailable,

    /// Vendor rejected an activation or deactivation
    #[error("Activation failed: {errors}")]
    ActivationFailed { errors: String },

    #[error("Code {code} is not currently activated")]
    CodeNotActivated { code: String },

    #[error("Cannot deactivate the only activated code on this device")]
    CannotDeactivateLastCode,

    #[error("Task with reference {name} is already executing, please cancel it first")]
    TaskAlreadyRunning { name: String },

    #[error("Task with reference {name} is not executing")]
    TaskNotRunning { name: String },

    #[error("You need to activate the terminal first")]
    NoTerminalActivated,

    #[error("You need to connect to a pinpad first")]
    NoPinpadConnected,

    #[error("{operation} is not supported when running on a {mode} device")]
    UnsupportedInRuntimeMode {
        operation: &'static str,
        mode: &'static str,
    },

    #[error("Pinpad {mac_address} not found")]
    PinpadNotFound { mac_address: String },

    /// Vendor reported failure without a usable status
    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    #[error("PIX transactions need QR-code provider credentials, pass them to init_sdk")]
    MissingPixCredentials,

    #[error("Transaction {key} not found")]
    TransactionNotFound { key: String },

    #[error("Code {code} is not in the activated code list")]
    TerminalCodeNotFound { code: String },

    #[error("Transaction {atk} is already captured")]
    TransactionAlreadyCaptured { atk: String },

    /// Vendor reported a terminal transaction status
    #[error("Transaction {status}: {message}")]
    Declined {
        status: TransactionStatus,
        message: String,
    },

    #[error("{field} is required")]
    MissingRequiredField { field: String },

    #[error("{field} is not valid: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("No installment plan with {count} installments and interest={interest}")]
    InvalidInstallmentPlan { count: u32, interest: bool },

    #[error("Error detecting card")]
    CardDetectionFailed,

    #[error("Key type {key_type} is not valid")]
    InvalidKeyType { key_type: u8 },

    #[error("{action} error: {errors}")]
    CardAccessFailed {
        action: &'static str,
        errors: String,
    },

    #[error("Block data must be exactly 16 bytes, got {len}")]
    InvalidBlockData { len: usize },

    #[error("Could not render HTML into a bitmap")]
    HtmlRenderFailed,
}

impl BridgeError {
    /// Stable machine-readable code.
    ///
    /// Vendor declines use the reported status name as their code, everything
    /// else a numeric string grouped by category.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Unexpected { .. } => "100",
            BridgeError::SdkNotInitialized => "101",
            BridgeError::ActivatedCodesUnavailable => "102",
            BridgeError::ActivationFailed { .. } => "201",
            BridgeError::CodeNotActivated { .. } => "202",
            BridgeError::CannotDeactivateLastCode => "203",
            BridgeError::TaskAlreadyRunning { .. } => "300",
            BridgeError::TaskNotRunning { .. } => "301",
            BridgeError::NoTerminalActivated => "401",
            BridgeError::NoPinpadConnected => "402",
            BridgeError::UnsupportedInRuntimeMode { .. } => "403",
            BridgeError::PinpadNotFound { .. } => "404",
            BridgeError::OperationFailed { .. } => "405",
            BridgeError::MissingPixCredentials => "406",
            BridgeError::TransactionNotFound { .. } => "407",
            BridgeError::TerminalCodeNotFound { .. } => "408",
            BridgeError::TransactionAlreadyCaptured { .. } => "409",
            BridgeError::Declined { status, .. } => status.as_str(),
            BridgeError::MissingRequiredField { .. } => "501",
            BridgeError::InvalidFieldValue { .. } => "502",
            BridgeError::InvalidInstallmentPlan { .. } => "503",
            BridgeError::CardDetectionFailed => "601",
            BridgeError::InvalidKeyType { .. } => "602",
            BridgeError::CardAccessFailed { .. } => "603",
            BridgeError::InvalidBlockData { .. } => "604",
            BridgeError::HtmlRenderFailed => "701",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Unexpected { .. } => ErrorCategory::Unexpected,
            BridgeError::SdkNotInitialized
            | BridgeError::ActivatedCodesUnavailable
            | BridgeError::CodeNotActivated { .. }
            | BridgeError::CannotDeactivateLastCode
            | BridgeError::NoTerminalActivated
            | BridgeError::NoPinpadConnected
            | BridgeError::UnsupportedInRuntimeMode { .. }
            | BridgeError::MissingPixCredentials
            | BridgeError::TransactionAlreadyCaptured { .. } => ErrorCategory::Precondition,
            BridgeError::TaskAlreadyRunning { .. } | BridgeError::TaskNotRunning { .. } => {
                ErrorCategory::Concurrency
            }
            BridgeError::MissingRequiredField { .. }
            | BridgeError::InvalidFieldValue { .. }
            | BridgeError::InvalidInstallmentPlan { .. }
            | BridgeError::InvalidKeyType { .. }
            | BridgeError::InvalidBlockData { .. } => ErrorCategory::Validation,
            BridgeError::ActivationFailed { .. }
            | BridgeError::OperationFailed { .. }
            | BridgeError::Declined { .. }
            | BridgeError::CardDetectionFailed
            | BridgeError::CardAccessFailed { .. }
            | BridgeError::HtmlRenderFailed => ErrorCategory::Hardware,
            BridgeError::PinpadNotFound { .. }
            | BridgeError::TransactionNotFound { .. }
            | BridgeError::TerminalCodeNotFound { .. } => ErrorCategory::NotFound,
        }
    }

    /// Generic vendor failure used when no specific status is available.
    pub fn generic_failure() -> Self {
        BridgeError::OperationFailed {
            message: "Generic error, onError from provider".to_string(),
        }
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        BridgeError::Unexpected {
            message: message.into(),
        }
    }
}

/// Rejection payload handed to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
}

impl From<&BridgeError> for Rejection {
    fn from(err: &BridgeError) -> Self {
        Rejection {
            code: err.code().to_string(),
            message: err.to_string(),
            category: err.category(),
        }
    }
}

/// Failure raised by a collaborator (vendor SDK, datastore, renderer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("vendor SDK error: {0}")]
    Vendor(String),

    #[error("datastore error: {0}")]
    Store(String),
}

impl From<SdkError> for BridgeError {
    fn from(err: SdkError) -> Self {
        BridgeError::unexpected(err.to_string())
    }
}

/// Errors that can occur while running a CLI scenario.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Failed to open or read the scenario file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Missing scenario file argument
    #[error("Missing scenario file argument. Usage: pos-bridge-sim <scenario.csv>")]
    MissingArgument,
}
