//! Single-flight task registry.
//!
//! Maps a task name to the in-flight vendor operation running under it. All
//! lookups and mutations happen under one mutex, so two dispatches of the same
//! name cannot both win and a cancel cannot interleave with a deregister.
//!
//! The lock is never held while calling into the vendor: a cancel takes the
//! entry out of the table first and aborts it afterwards, because an abort
//! may synchronously fire the adapter's terminal callback, which comes back
//! here to deregister.

use crate::error::{BridgeError, Result};
use crate::sdk::{SdkResult, VendorOperation};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies one registration; a name can be registered many times over
/// the registry's lifetime but only once at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// An in-flight operation registered under a name.
#[derive(Clone)]
pub struct TaskHandle {
    name: String,
    id: TaskId,
    operation: Arc<dyn VendorOperation>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn operation(&self) -> &Arc<dyn VendorOperation> {
        &self.operation
    }

    /// Default abort capability.
    pub fn abort(&self) -> SdkResult<()> {
        self.operation.cancel()
    }
}

/// Process-wide table of running tasks. Created empty; lives as long as the
/// bridge that owns it.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskHandle>>,
    next_id: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, TaskHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `operation` under `name`.
    ///
    /// Fails with `TaskAlreadyRunning` and leaves the existing entry untouched
    /// if the name is taken.
    pub fn register_or_fail(
        &self,
        name: &str,
        operation: Arc<dyn VendorOperation>,
    ) -> Result<TaskId> {
        let mut tasks = self.table();

        if tasks.contains_key(name) {
            debug!("Task {} already running, refusing registration", name);
            return Err(BridgeError::TaskAlreadyRunning {
                name: name.to_string(),
            });
        }

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tasks.insert(
            name.to_string(),
            TaskHandle {
                name: name.to_string(),
                id,
                operation,
            },
        );
        debug!("Registered task {} ({:?})", name, id);

        Ok(id)
    }

    /// Cancels the task running under `name` with the handle's default abort.
    pub fn cancel(&self, name: &str) -> Result<()> {
        self.cancel_with(name, TaskHandle::abort)
    }

    /// Cancels the task running under `name` using `strategy`.
    ///
    /// Fails with `TaskNotRunning` if nothing is registered. Once found, the
    /// entry is removed whether or not `strategy` succeeds; a strategy error
    /// is returned after removal.
    pub fn cancel_with<F>(&self, name: &str, strategy: F) -> Result<()>
    where
        F: FnOnce(&TaskHandle) -> SdkResult<()>,
    {
        let handle = self
            .table()
            .remove(name)
            .ok_or_else(|| BridgeError::TaskNotRunning {
                name: name.to_string(),
            })?;

        debug!("Cancelling task {} ({:?})", name, handle.id);
        strategy(&handle)?;
        Ok(())
    }

    /// Removes `name` if present. Never fails; a terminal outcome may race
    /// an explicit cancel.
    pub fn deregister(&self, name: &str) {
        if self.table().remove(name).is_some() {
            debug!("Deregistered task {}", name);
        }
    }

    /// Removes `name` only if it is still the registration `id`.
    ///
    /// Returns `true` when an entry was removed.
    pub fn release(&self, name: &str, id: TaskId) -> bool {
        let mut tasks = self.table();
        match tasks.get(name) {
            Some(handle) if handle.id == id => {
                tasks.remove(name);
                debug!("Released task {} ({:?})", name, id);
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.table().contains_key(name)
    }

    pub fn running_count(&self) -> usize {
        self.table().len()
    }
}
