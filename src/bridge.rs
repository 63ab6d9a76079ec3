//! The bridge: public surface over the vendor SDK.
//!
//! [`PosBridge`] owns the shared state (task registry, activated-code
//! snapshot, contactless session) and the collaborators. Every public call
//! returns a [`Pending`] immediately; preconditions and validation run
//! synchronously inside the call and a failure settles the pending before
//! anything reaches the hardware. The operations themselves live in
//! [`crate::executor`], one module per operation family.

use crate::adapter::{CallbackAdapter, ProgressRoute};
use crate::config::{BridgeConfig, RuntimeMode};
use crate::executor::contactless::ReaderSlot;
use crate::error::{BridgeError, Result};
use crate::precondition;
use crate::records::{TransactionRecord, UserRecord};
use crate::registry::TaskRegistry;
use crate::sdk::{
    DialogOptions, EventSink, HardwareTarget, HtmlRenderer, PosSdk,
    TransactionStore, VendorOperation,
};
use crate::settle::{self, Pending, Settlement};
use crate::state::{PixCredentials, TerminalState};
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// External collaborators the bridge drives.
#[derive(Clone)]
pub struct Collaborators {
    pub sdk: Arc<dyn PosSdk>,
    pub store: Arc<dyn TransactionStore>,
    pub events: Arc<dyn EventSink>,
    pub renderer: Arc<dyn HtmlRenderer>,
}

/// Caller-supplied dialog settings; unset texts fall back to per-operation
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dialog {
    /// Defaults to `true` for every operation except transactions.
    pub use_default_ui: Option<bool>,
    pub title: Option<String>,
    pub message: Option<String>,
}

impl Dialog {
    /// Progress is reported through events instead of the vendor dialog.
    pub fn custom_ui() -> Self {
        Dialog {
            use_default_ui: Some(false),
            ..Default::default()
        }
    }

    pub fn with_texts(title: impl Into<String>, message: impl Into<String>) -> Self {
        Dialog {
            use_default_ui: None,
            title: Some(title.into()),
            message: Some(message.into()),
        }
    }

    pub(crate) fn resolve(&self, default_ui: bool, title: &str, message: &str) -> DialogOptions {
        DialogOptions {
            use_default_ui: self.use_default_ui.unwrap_or(default_ui),
            title: non_empty_or(&self.title, title),
            message: non_empty_or(&self.message, message),
        }
    }
}

fn non_empty_or(value: &Option<String>, fallback: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => fallback.to_string(),
    }
}

pub struct PosBridge {
    pub(crate) config: BridgeConfig,
    pub(crate) sdk: Arc<dyn PosSdk>,
    pub(crate) store: Arc<dyn TransactionStore>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) renderer: Arc<dyn HtmlRenderer>,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) terminal: Arc<TerminalState>,
    /// Reader of the live MIFARE session, if any.
    pub(crate) contactless: Arc<Mutex<ReaderSlot>>,
}

impl PosBridge {
    pub fn new(config: BridgeConfig, collaborators: Collaborators) -> Self {
        info!(
            "Starting bridge for {} in {} mode",
            config.app_name,
            config.runtime_mode.as_str()
        );
        PosBridge {
            config,
            sdk: collaborators.sdk,
            store: collaborators.store,
            events: collaborators.events,
            renderer: collaborators.renderer,
            registry: Arc::new(TaskRegistry::new()),
            terminal: Arc::new(TerminalState::new()),
            contactless: Arc::new(Mutex::new(ReaderSlot::default())),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// `true` on a dedicated POS terminal.
    pub fn is_running_in_pos(&self) -> bool {
        self.config.runtime_mode == RuntimeMode::Dedicated
    }

    /// Whether a task is currently registered under `name`.
    pub fn is_task_running(&self, name: &str) -> bool {
        self.registry.is_running(name)
    }

    /// Runs the SDK handshake, takes the first activated-code snapshot and
    /// stores the optional PIX provider credentials.
    ///
    /// `app_name` falls back to the configured application name.
    pub fn init_sdk(
        &self,
        app_name: Option<&str>,
        pix_credentials: Option<PixCredentials>,
    ) -> Pending<bool> {
        let app_name = app_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.config.app_name);

        let outcome = self.sdk.initialize(app_name).map(|users| {
            info!("SDK initialized for {} with {} activated codes", app_name, users.len());
            self.terminal.replace_activated(users);
            self.terminal.set_pix_credentials(pix_credentials);
            true
        });

        if let Err(e) = &outcome {
            warn!("initSdk rejected: {}", e);
        }
        Pending::ready(outcome.map_err(BridgeError::from))
    }

    /// Shared executor scaffolding.
    ///
    /// Checks the SDK first, then hands the settlement to `body`. An error
    /// or a panic from `body` rejects the call; `body` settles (or arranges
    /// for the adapter to settle) on success.
    pub(crate) fn run<T, F>(&self, operation: &'static str, body: F) -> Pending<T>
    where
        F: FnOnce(Settlement<T>) -> Result<()>,
    {
        let (settlement, pending) = settle::channel();

        let outcome = precondition::require_sdk_initialized(self.sdk.is_initialized())
            .and_then(|()| {
                panic::catch_unwind(AssertUnwindSafe(|| body(settlement.clone()))).unwrap_or_else(
                    |_| Err(BridgeError::unexpected(format!("{} panicked", operation))),
                )
            });

        if let Err(err) = outcome {
            warn!("{} rejected: {} ({})", operation, err, err.code());
            settlement.reject(err);
        }
        pending
    }

    /// Attaches `adapter` and starts `operation`.
    ///
    /// With a `task` name the operation is registered first, so a second
    /// dispatch under the same name fails before reaching the vendor.
    pub(crate) fn dispatch<T: Send + 'static>(
        &self,
        operation: &Arc<dyn VendorOperation>,
        adapter: CallbackAdapter<T>,
        task: Option<&str>,
    ) -> Result<()> {
        let adapter = Arc::new(adapter);

        if let Some(name) = task {
            let id = self.registry.register_or_fail(name, Arc::clone(operation))?;
            adapter.bind_task(Arc::clone(&self.registry), name, id);
        }

        debug!("Dispatching {}", task.unwrap_or("untracked operation"));
        let execute = AssertUnwindSafe(|| operation.execute(adapter.clone()));
        let started = panic::catch_unwind(execute)
            .map_err(|_| BridgeError::unexpected("vendor operation panicked on execute"))
            .and_then(|started| started.map_err(BridgeError::from));
        if started.is_err() {
            adapter.release_task();
        }
        started
    }

    pub(crate) fn progress_route(&self, channel: &str) -> ProgressRoute {
        ProgressRoute::new(Arc::clone(&self.events), channel)
    }

    /// Activated-code snapshot, failing when none are activated.
    pub(crate) fn activated_users(&self) -> Result<Arc<Vec<UserRecord>>> {
        let snapshot = self.terminal.activated();
        precondition::require_terminal_activated(snapshot.as_deref().map(Vec::as_slice))?;
        snapshot.ok_or(BridgeError::NoTerminalActivated)
    }

    /// Resolves where a card operation runs: the integrated reader, or the
    /// chosen pinpad on a generic device.
    pub(crate) fn hardware_target(&self, pinpad_mac: Option<&str>) -> Result<HardwareTarget> {
        match self.config.runtime_mode {
            RuntimeMode::Dedicated => Ok(HardwareTarget::Terminal),
            RuntimeMode::Generic => {
                precondition::require_pinpad_connected(self.sdk.is_connected_to_pinpad())?;
                let pinpad =
                    precondition::select_pinpad(&self.sdk.connected_pinpads(), pinpad_mac)?;
                Ok(HardwareTarget::Pinpad(pinpad))
            }
        }
    }

    pub(crate) fn transaction_by_atk(&self, atk: &str) -> Result<TransactionRecord> {
        self.store
            .find_by_atk(atk)?
            .ok_or_else(|| BridgeError::TransactionNotFound {
                key: atk.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_defaults_fill_blanks() {
        let dialog = Dialog {
            use_default_ui: None,
            title: Some("  ".into()),
            message: Some("Custom".into()),
        };
        let resolved = dialog.resolve(true, "Wait", "Working");
        assert!(resolved.use_default_ui);
        assert_eq!(resolved.title, "Wait");
        assert_eq!(resolved.message, "Custom");

        assert!(!Dialog::custom_ui().resolve(true, "t", "m").use_default_ui);
    }

    #[tokio::test]
    async fn test_panicking_body_rejects_as_unexpected() {
        let mut config = BridgeConfig::default();
        config.sim.step_delay_ms = 1;
        let sim = crate::sim::SimulatedSdk::new(&config.sim);
        let bridge = PosBridge::new(
            config,
            sim.collaborators(Arc::new(crate::sim::RecordingSink::new())),
        );
        bridge.init_sdk(None, None).await.unwrap();

        let pending: Pending<bool> = bridge.run("printReceiptInPOSPrinter", |_| {
            panic!("collaborator blew up")
        });
        let err = pending.await.unwrap_err();
        assert_eq!(err.code(), "100");
        assert!(err.to_string().contains("printReceiptInPOSPrinter panicked"));
    }

    #[tokio::test]
    async fn test_panicking_execute_frees_the_task_name() {
        struct Exploding;

        impl VendorOperation for Exploding {
            fn execute(&self, _: Arc<dyn crate::sdk::Listener>) -> crate::sdk::SdkResult<()> {
                panic!("driver fault")
            }

            fn cancel(&self) -> crate::sdk::SdkResult<()> {
                Ok(())
            }

            fn report(&self) -> crate::sdk::OperationReport {
                Default::default()
            }
        }

        let sim = crate::sim::SimulatedSdk::new(&BridgeConfig::default().sim);
        let bridge = PosBridge::new(
            BridgeConfig::default(),
            sim.collaborators(Arc::new(crate::sim::RecordingSink::new())),
        );
        bridge.init_sdk(None, None).await.unwrap();

        let pending: Pending<bool> = bridge.run("makeTransaction", |settlement| {
            let operation: Arc<dyn VendorOperation> = Arc::new(Exploding);
            let adapter =
                CallbackAdapter::new("makeTransaction", settlement, Arc::clone(&operation), |_| {
                    Ok(true)
                });
            bridge.dispatch(&operation, adapter, Some("makeTransaction"))
        });

        assert_eq!(pending.await.unwrap_err().code(), "100");
        assert!(!bridge.is_task_running("makeTransaction"));
    }
}
