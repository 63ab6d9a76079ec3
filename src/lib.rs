//! # POS Bridge
//!
//! Promise-style bridge between an application layer and a payment-terminal
//! vendor SDK whose operations report through callbacks.
//!
//! ## Design Principles
//!
//! - **One outcome per call**: every operation returns a [`Pending`] that
//!   settles exactly once, even if the vendor misbehaves
//! - **Fail before hardware**: preconditions and validation reject a call
//!   before any vendor operation is built
//! - **Single-flight payments**: at most one transaction runs at a time and
//!   it can be aborted by name
//! - **Progress as events**: intermediate vendor statuses are published on
//!   named channels, correlated by initiator key
//!
//! ## Example
//!
//! ```no_run
//! use pos_bridge::sim::{RecordingSink, SimulatedSdk};
//! use pos_bridge::{BridgeConfig, Dialog, PosBridge, TransactionKind, TransactionSetup};
//! use std::sync::Arc;
//!
//! # async fn demo() -> pos_bridge::Result<()> {
//! let config = BridgeConfig::default();
//! let sim = SimulatedSdk::new(&config.sim).with_activated_code("206192723");
//! let bridge = PosBridge::new(config, sim.collaborators(Arc::new(RecordingSink::new())));
//!
//! bridge.init_sdk(Some("Padaria"), None).await?;
//! bridge.connect_to_pinpad("PAX-D180", "00:11:22:33:44:55", Dialog::default()).await?;
//! let setup = TransactionSetup::new("1000", TransactionKind::Credit, true, 1, false);
//! if let Some(record) = bridge.make_transaction(setup, None).await? {
//!     println!("{} {}", record.acquirer_transaction_key, record.transaction_status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod amount;
pub mod bridge;
pub mod config;
pub mod error;
pub mod executor;
pub mod precondition;
pub mod records;
pub mod registry;
pub mod script;
pub mod sdk;
pub mod settle;
pub mod sim;
pub mod state;
pub mod transaction;

pub use amount::Cents;
pub use bridge::{Collaborators, Dialog, PosBridge};
pub use config::{BridgeConfig, RuntimeMode};
pub use error::{BridgeError, ErrorCategory, Rejection, Result, ScriptError};
pub use executor::SectorKey;
pub use records::{MailContact, Pinpad, ReceiptType, TransactionRecord, TransactionStatus, UserRecord};
pub use script::ScenarioRunner;
pub use settle::Pending;
pub use state::PixCredentials;
pub use transaction::{TransactionKind, TransactionSetup};
