//! Executors, one module per operation family.
//!
//! Each module adds its operations to [`PosBridge`](crate::PosBridge) and
//! follows the same shape: preconditions, parameter resolution, vendor
//! operation construction, adapter attachment, dispatch.

pub mod activation;
pub mod contactless;
pub mod followup;
pub mod pinpad;
pub mod printer;
pub mod query;
pub mod transaction;

pub use contactless::{SectorKey, BLOCK_SIZE};
pub use printer::{split_into_strips, HTML_RENDER_WIDTH, PRINT_STRIP_HEIGHT};
pub use transaction::MAKE_TRANSACTION_TASK;
