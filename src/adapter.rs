//! Callback adapter: turns the vendor's event stream into one settlement.
//!
//! The adapter is the [`Listener`] handed to a vendor operation. Status
//! changes become progress events; the first `Succeeded`/`Failed` runs the
//! matching handler, releases the task registration and settles the call.
//! Any later terminal event is logged and dropped.

use crate::error::{BridgeError, Result};
use crate::registry::{TaskId, TaskRegistry};
use crate::sdk::{
    EventSink, Listener, OperationReport, ProgressEvent, VendorAction, VendorEvent,
    VendorOperation,
};
use crate::settle::Settlement;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SuccessHandler<T> = Box<dyn FnOnce(&OperationReport) -> Result<T> + Send>;
type ErrorHandler = Box<dyn FnOnce(&OperationReport) -> BridgeError + Send>;
type ExtraFields = Box<dyn Fn(&VendorAction, &OperationReport) -> BTreeMap<String, Option<String>> + Send + Sync>;

/// Where status changes of an operation are published.
pub struct ProgressRoute {
    sink: Arc<dyn EventSink>,
    channel: String,
    correlation_key: Option<String>,
    extra: Option<ExtraFields>,
}

impl ProgressRoute {
    pub fn new(sink: Arc<dyn EventSink>, channel: impl Into<String>) -> Self {
        ProgressRoute {
            sink,
            channel: channel.into(),
            correlation_key: None,
            extra: None,
        }
    }

    pub fn correlated(mut self, key: Option<String>) -> Self {
        self.correlation_key = key;
        self
    }

    /// Operation-specific payload fields, computed per status change.
    pub fn with_extra<F>(mut self, extra: F) -> Self
    where
        F: Fn(&VendorAction, &OperationReport) -> BTreeMap<String, Option<String>>
            + Send
            + Sync
            + 'static,
    {
        self.extra = Some(Box::new(extra));
        self
    }

    fn publish(&self, action: &VendorAction, operation: Option<&Arc<dyn VendorOperation>>) {
        let extra = match (&self.extra, operation) {
            (Some(extra), Some(op)) => extra(action, &op.report()),
            (Some(extra), None) => extra(action, &OperationReport::default()),
            (None, _) => BTreeMap::new(),
        };

        self.sink.publish(
            &self.channel,
            ProgressEvent {
                correlation_key: self.correlation_key.clone(),
                status: action.as_str().to_string(),
                extra,
            },
        );
    }
}

/// Everything consumed by the first terminal event.
struct Terminal<T> {
    operation: Arc<dyn VendorOperation>,
    on_success: SuccessHandler<T>,
    on_error: ErrorHandler,
}

struct TaskBinding {
    registry: Arc<TaskRegistry>,
    name: String,
    id: TaskId,
}

pub struct CallbackAdapter<T> {
    label: &'static str,
    settlement: Settlement<T>,
    terminal: Mutex<Option<Terminal<T>>>,
    progress: Option<ProgressRoute>,
    default_ui: bool,
    task: Mutex<Option<TaskBinding>>,
}

impl<T: Send + 'static> CallbackAdapter<T> {
    /// Adapter settling `settlement` from `operation`'s events.
    ///
    /// `on_success` computes the resolved value from the operation's final
    /// report; it runs before anything is settled, so inner effects such as
    /// refreshing shared state are visible to whoever awaits the result.
    pub fn new<F>(
        label: &'static str,
        settlement: Settlement<T>,
        operation: Arc<dyn VendorOperation>,
        on_success: F,
    ) -> Self
    where
        F: FnOnce(&OperationReport) -> Result<T> + Send + 'static,
    {
        CallbackAdapter {
            label,
            settlement,
            terminal: Mutex::new(Some(Terminal {
                operation,
                on_success: Box::new(on_success),
                on_error: Box::new(|_| BridgeError::generic_failure()),
            })),
            progress: None,
            default_ui: false,
            task: Mutex::new(None),
        }
    }

    /// Replaces the generic failure with an operation-specific one.
    pub fn on_error<F>(self, on_error: F) -> Self
    where
        F: FnOnce(&OperationReport) -> BridgeError + Send + 'static,
    {
        if let Some(terminal) = lock(&self.terminal).as_mut() {
            terminal.on_error = Box::new(on_error);
        }
        self
    }

    pub fn with_progress(mut self, route: ProgressRoute) -> Self {
        self.progress = Some(route);
        self
    }

    /// The vendor draws its own progress dialog; no events are published.
    pub fn default_ui(mut self, enabled: bool) -> Self {
        self.default_ui = enabled;
        self
    }
}

impl<T> CallbackAdapter<T> {
    /// Ties the adapter to a registration it must release when it finishes.
    pub fn bind_task(&self, registry: Arc<TaskRegistry>, name: &str, id: TaskId) {
        *lock(&self.task) = Some(TaskBinding {
            registry,
            name: name.to_string(),
            id,
        });
    }

    /// Drops the registration without settling, for dispatches that never
    /// reached the vendor.
    pub fn release_task(&self) {
        if let Some(binding) = lock(&self.task).take() {
            binding.registry.release(&binding.name, binding.id);
        }
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.terminal).is_none()
    }

    fn finish(&self, succeeded: bool) {
        let terminal = match lock(&self.terminal).take() {
            Some(terminal) => terminal,
            None => {
                warn!(
                    "{}: ignoring {} after the operation already finished",
                    self.label,
                    if succeeded { "success" } else { "error" }
                );
                return;
            }
        };

        let Terminal {
            operation,
            on_success,
            on_error,
        } = terminal;

        // A panicking handler must still settle the call
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let report = operation.report();
            if succeeded {
                on_success(&report)
            } else {
                Err(on_error(&report))
            }
        }))
        .unwrap_or_else(|_| Err(BridgeError::unexpected(format!("{} handler panicked", self.label))));

        // Released before settling so an awaiting caller can dispatch again
        self.release_task();

        match &outcome {
            Ok(_) => debug!("{}: succeeded", self.label),
            Err(err) => debug!("{}: failed with {} ({})", self.label, err, err.code()),
        }
        self.settlement.settle(outcome);
    }

    fn status_changed(&self, action: VendorAction) {
        let route = match &self.progress {
            Some(route) if !self.default_ui => route,
            _ => {
                debug!("{}: status {} (not published)", self.label, action);
                return;
            }
        };

        let operation = lock(&self.terminal).as_ref().map(|t| Arc::clone(&t.operation));
        route.publish(&action, operation.as_ref());
    }
}

impl<T: Send> Listener for CallbackAdapter<T> {
    fn on_event(&self, event: VendorEvent) {
        match event {
            VendorEvent::Succeeded => self.finish(true),
            VendorEvent::Failed => self.finish(false),
            VendorEvent::StatusChanged(action) => self.status_changed(action),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
