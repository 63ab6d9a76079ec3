//! In-memory stand-ins for the external collaborators.
//!
//! [`SimulatedSdk`] behaves like a terminal SDK closely enough to drive the
//! bridge end to end: operations run on spawned tokio tasks, report status
//! changes with a configurable delay, can be aborted while waiting, and
//! persist their effects into a [`MemoryStore`].
//!
//! Simulated rules:
//! - only codes in the merchant directory activate;
//! - amounts whose last two digits are `51` are declined by the authorizer;
//! - the MIFARE card answers to the default key `FFFFFFFFFFFF`.

use crate::amount::Cents;
use crate::bridge::Collaborators;
use crate::config::SimConfig;
use crate::error::SdkError;
use crate::records::{Pinpad, ReceiptType, TransactionRecord, TransactionStatus, UserRecord};
use crate::sdk::{
    Bitmap, Contact, ContactlessReader, DialogOptions, EventSink, HardwareTarget, HtmlRenderer,
    Listener, MifareKeyType, OperationReport, OperationRequest, PosSdk, ProgressEvent, SdkResult,
    TransactionStore, VendorAction, VendorEvent, VendorOperation,
};
use crate::transaction::{EntryMode, TransactionKind, TransactionRequest};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;

/// Cents suffix the simulated authorizer declines.
pub const DECLINED_CENTS_SUFFIX: u64 = 51;

/// Key both MIFARE key slots of the simulated card accept.
pub const DEFAULT_MIFARE_KEY: [u8; 6] = [0xFF; 6];

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transaction datastore kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TransactionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the record built by `build` under the next id.
    pub fn add<F>(&self, build: F) -> TransactionRecord
    where
        F: FnOnce(u32) -> TransactionRecord,
    {
        let mut records = lock(&self.records);
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = build(id);
        records.push(record.clone());
        record
    }

    /// Applies `change` to the record with acquirer key `atk`.
    pub fn update<F>(&self, atk: &str, change: F) -> bool
    where
        F: FnOnce(&mut TransactionRecord),
    {
        match lock(&self.records)
            .iter_mut()
            .find(|r| r.acquirer_transaction_key == atk)
        {
            Some(record) => {
                change(record);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find<P>(&self, predicate: P) -> Option<TransactionRecord>
    where
        P: Fn(&TransactionRecord) -> bool,
    {
        lock(&self.records).iter().find(|r| predicate(r)).cloned()
    }
}

impl TransactionStore for MemoryStore {
    fn find_by_id(&self, id: u32) -> SdkResult<Option<TransactionRecord>> {
        Ok(self.find(|r| r.id == id))
    }

    fn find_by_atk(&self, atk: &str) -> SdkResult<Option<TransactionRecord>> {
        Ok(self.find(|r| r.acquirer_transaction_key == atk))
    }

    fn find_by_authorization_code(&self, code: &str) -> SdkResult<Option<TransactionRecord>> {
        Ok(self.find(|r| r.authorization_code.as_deref() == Some(code)))
    }

    fn last_transaction_id(&self) -> SdkResult<Option<u32>> {
        Ok(lock(&self.records).iter().map(|r| r.id).max())
    }

    fn all_order_by_id_desc(&self) -> SdkResult<Vec<TransactionRecord>> {
        let mut records = lock(&self.records).clone();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }
}

/// Event sink that keeps every event, for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, ProgressEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, ProgressEvent)> {
        lock(&self.events).clone()
    }

    /// Statuses published on `channel`, in order.
    pub fn statuses(&self, channel: &str) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, e)| e.status.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, channel: &str, event: ProgressEvent) {
        lock(&self.events).push((channel.to_string(), event));
    }
}

/// Event sink that writes events to the log.
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, channel: &str, event: ProgressEvent) {
        info!(
            "{}: {} (key: {})",
            channel,
            event.status,
            event.correlation_key.as_deref().unwrap_or("-")
        );
    }
}

/// Renders each non-blank HTML line as a solid band of rows.
pub struct BlockRenderer {
    pub rows_per_line: u32,
}

impl Default for BlockRenderer {
    fn default() -> Self {
        BlockRenderer { rows_per_line: 40 }
    }
}

impl HtmlRenderer for BlockRenderer {
    fn render(&self, html: &str, width: u32) -> SdkResult<Option<Bitmap>> {
        let lines = html.lines().filter(|l| !l.trim().is_empty()).count() as u32;
        if lines == 0 {
            return Ok(None);
        }

        let height = lines * self.rows_per_line;
        let pixels = vec![0u8; (width * height) as usize];
        Ok(Some(Bitmap::new(width, height, pixels)))
    }
}

/// Something the simulated printer printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintJob {
    Receipt {
        atk: String,
        receipt_type: ReceiptType,
        reprint: bool,
    },
    Bitmaps {
        heights: Vec<u32>,
    },
}

/// A receipt e-mail the simulator "sent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub atk: String,
    pub receipt_type: ReceiptType,
    pub from: Contact,
    pub to: Vec<Contact>,
}

/// State shared by the simulated SDK and the operations it creates.
struct SimCore {
    step_delay: Duration,
    directory: Vec<String>,
    initialized: AtomicBool,
    activated: Mutex<Vec<UserRecord>>,
    pinpads: Mutex<Vec<Pinpad>>,
    store: Arc<MemoryStore>,
    card_present: AtomicBool,
    card_blocks: Mutex<HashMap<(u8, u8), [u8; 16]>>,
    printed: Mutex<Vec<PrintJob>>,
    mails: Mutex<Vec<SentMail>>,
    pinpad_messages: Mutex<Vec<(String, String)>>,
    created: AtomicUsize,
    detections_cancelled: AtomicUsize,
}

/// Simulated terminal SDK.
#[derive(Clone)]
pub struct SimulatedSdk {
    core: Arc<SimCore>,
}

impl SimulatedSdk {
    pub fn new(settings: &SimConfig) -> Self {
        SimulatedSdk {
            core: Arc::new(SimCore {
                step_delay: Duration::from_millis(settings.step_delay_ms),
                directory: settings.known_codes.clone(),
                initialized: AtomicBool::new(false),
                activated: Mutex::new(Vec::new()),
                pinpads: Mutex::new(Vec::new()),
                store: Arc::new(MemoryStore::new()),
                card_present: AtomicBool::new(true),
                card_blocks: Mutex::new(HashMap::new()),
                printed: Mutex::new(Vec::new()),
                mails: Mutex::new(Vec::new()),
                pinpad_messages: Mutex::new(Vec::new()),
                created: AtomicUsize::new(0),
                detections_cancelled: AtomicUsize::new(0),
            }),
        }
    }

    /// Marks `code` as activated before the SDK is initialized, as if a
    /// previous session had activated it.
    pub fn with_activated_code(self, code: &str) -> Self {
        lock(&self.core.activated).push(merchant(code));
        self
    }

    pub fn with_pinpad(self, pinpad: Pinpad) -> Self {
        lock(&self.core.pinpads).push(pinpad);
        self
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.core.store)
    }

    /// Collaborators wired to this SDK and its store.
    pub fn collaborators(&self, events: Arc<dyn EventSink>) -> Collaborators {
        Collaborators {
            sdk: Arc::new(self.clone()),
            store: self.store(),
            events,
            renderer: Arc::new(BlockRenderer::default()),
        }
    }

    /// Takes the MIFARE card away from (or back to) the reader.
    pub fn set_card_present(&self, present: bool) {
        self.core.card_present.store(present, Ordering::SeqCst);
    }

    /// Number of vendor operations and reader sessions created so far.
    pub fn operations_created(&self) -> usize {
        self.core.created.load(Ordering::SeqCst)
    }

    /// Number of times any reader was told to stop detecting.
    pub fn detections_cancelled(&self) -> usize {
        self.core.detections_cancelled.load(Ordering::SeqCst)
    }

    pub fn printed(&self) -> Vec<PrintJob> {
        lock(&self.core.printed).clone()
    }

    pub fn sent_mails(&self) -> Vec<SentMail> {
        lock(&self.core.mails).clone()
    }

    /// `(mac address, message)` pairs shown on pinpads.
    pub fn pinpad_messages(&self) -> Vec<(String, String)> {
        lock(&self.core.pinpad_messages).clone()
    }
}

fn merchant(code: &str) -> UserRecord {
    UserRecord::new(code, format!("Merchant {}", code))
}

impl PosSdk for SimulatedSdk {
    fn is_initialized(&self) -> bool {
        self.core.initialized.load(Ordering::SeqCst)
    }

    fn initialize(&self, app_name: &str) -> SdkResult<Vec<UserRecord>> {
        debug!("Simulated SDK initialized for {}", app_name);
        self.core.initialized.store(true, Ordering::SeqCst);
        Ok(lock(&self.core.activated).clone())
    }

    fn activated_users(&self) -> SdkResult<Vec<UserRecord>> {
        Ok(lock(&self.core.activated).clone())
    }

    fn is_connected_to_pinpad(&self) -> bool {
        !lock(&self.core.pinpads).is_empty()
    }

    fn connected_pinpads(&self) -> Vec<Pinpad> {
        lock(&self.core.pinpads).clone()
    }

    fn create_operation(
        &self,
        request: OperationRequest,
        dialog: DialogOptions,
    ) -> SdkResult<Arc<dyn VendorOperation>> {
        self.core.created.fetch_add(1, Ordering::SeqCst);
        debug!("Creating simulated {} (\"{}\")", request.label(), dialog.message);
        Ok(Arc::new(SimOperation {
            core: Arc::clone(&self.core),
            request,
            report: Arc::new(Mutex::new(OperationReport::default())),
            abort: Arc::new(Notify::new()),
            started: AtomicBool::new(false),
        }))
    }

    fn create_contactless_reader(
        &self,
        _dialog: DialogOptions,
    ) -> SdkResult<Arc<dyn ContactlessReader>> {
        self.core.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimReader {
            core: Arc::clone(&self.core),
            abort: Arc::new(Notify::new()),
            started: AtomicBool::new(false),
            authenticated: Mutex::new(None),
            errors: Mutex::new(Vec::new()),
        }))
    }
}

/// Waits one step; `false` if aborted meanwhile.
async fn step(delay: Duration, abort: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = abort.notified() => false,
    }
}

fn spawn_job<F>(started: &AtomicBool, job: F) -> SdkResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if started.swap(true, Ordering::SeqCst) {
        return Err(SdkError::Vendor("operation already started".to_string()));
    }
    let handle = Handle::try_current()
        .map_err(|e| SdkError::Vendor(format!("no async runtime to run on: {}", e)))?;
    handle.spawn(job);
    Ok(())
}

struct SimOperation {
    core: Arc<SimCore>,
    request: OperationRequest,
    report: Arc<Mutex<OperationReport>>,
    abort: Arc<Notify>,
    started: AtomicBool,
}

impl VendorOperation for SimOperation {
    fn execute(&self, listener: Arc<dyn Listener>) -> SdkResult<()> {
        let job = Job {
            core: Arc::clone(&self.core),
            request: self.request.clone(),
            report: Arc::clone(&self.report),
            abort: Arc::clone(&self.abort),
        };
        spawn_job(&self.started, job.run(listener))
    }

    fn cancel(&self) -> SdkResult<()> {
        debug!("Aborting simulated {}", self.request.label());
        self.abort.notify_one();
        Ok(())
    }

    fn report(&self) -> OperationReport {
        lock(&self.report).clone()
    }
}

struct Job {
    core: Arc<SimCore>,
    request: OperationRequest,
    report: Arc<Mutex<OperationReport>>,
    abort: Arc<Notify>,
}

impl Job {
    async fn run(self, listener: Arc<dyn Listener>) {
        for action in self.steps() {
            if !step(self.core.step_delay, &self.abort).await {
                return self.aborted(listener.as_ref());
            }
            if action == VendorAction::TransactionWaitingQrcodeScan {
                lock(&self.report).qr_code = Some(pix_payload(&self.request));
            }
            listener.on_event(VendorEvent::StatusChanged(action));
        }

        if !step(self.core.step_delay, &self.abort).await {
            return self.aborted(listener.as_ref());
        }

        let event = if self.complete() {
            VendorEvent::Succeeded
        } else {
            VendorEvent::Failed
        };
        listener.on_event(event);
    }

    fn aborted(&self, listener: &dyn Listener) {
        debug!("Simulated {} aborted", self.request.label());
        {
            let mut report = lock(&self.report);
            report.transaction_status = Some(TransactionStatus::Cancelled);
            report.message_from_authorizer = Some("Operation aborted".to_string());
            report.qr_code = None;
        }
        listener.on_event(VendorEvent::Failed);
    }

    fn steps(&self) -> Vec<VendorAction> {
        match &self.request {
            OperationRequest::Transaction { request, .. } if request.kind == TransactionKind::Pix => {
                vec![
                    VendorAction::TransactionWaitingQrcodeScan,
                    VendorAction::TransactionSending,
                ]
            }
            OperationRequest::Transaction { .. } => vec![
                VendorAction::TransactionWaitingCard,
                VendorAction::TransactionWaitingPassword,
                VendorAction::TransactionSending,
                VendorAction::TransactionRemoveCard,
            ],
            OperationRequest::Void { .. }
            | OperationRequest::Capture { .. }
            | OperationRequest::ReversePending => vec![VendorAction::TransactionSending],
            OperationRequest::CardTransactions { .. } => vec![
                VendorAction::TransactionWaitingCard,
                VendorAction::TransactionCardRemoved,
            ],
            _ => Vec::new(),
        }
    }

    /// Applies the operation's effect; `false` when the vendor would call
    /// `onError`.
    fn complete(&self) -> bool {
        let core = &self.core;
        match &self.request {
            OperationRequest::Activate { code } => {
                if !core.directory.iter().any(|known| known == code) {
                    lock(&self.report).errors = vec!["USER_NOT_FOUND".to_string()];
                    return false;
                }
                let mut activated = lock(&core.activated);
                if !activated.iter().any(|u| &u.terminal_code == code) {
                    activated.push(merchant(code));
                }
                true
            }
            OperationRequest::Deactivate { code } => {
                lock(&core.activated).retain(|u| &u.terminal_code != code);
                true
            }
            OperationRequest::Transaction { request, user, target } => {
                self.authorize(request, user, target)
            }
            OperationRequest::Void { transaction } => core.store.update(
                &transaction.acquirer_transaction_key,
                |trx| trx.transaction_status = TransactionStatus::Cancelled,
            ),
            OperationRequest::Capture { transaction } => {
                core.store
                    .update(&transaction.acquirer_transaction_key, |trx| trx.is_capture = true)
            }
            OperationRequest::ReversePending => {
                let pending = core
                    .store
                    .all_order_by_id_desc()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|trx| {
                        matches!(
                            trx.transaction_status,
                            TransactionStatus::PendingReversal | TransactionStatus::WithError
                        )
                    });
                for trx in pending {
                    core.store.update(&trx.acquirer_transaction_key, |trx| {
                        trx.transaction_status = TransactionStatus::Reversed
                    });
                }
                true
            }
            OperationRequest::ReceiptMail {
                transaction,
                receipt_type,
                from,
                to,
            } => {
                lock(&core.mails).push(SentMail {
                    atk: transaction.acquirer_transaction_key.clone(),
                    receipt_type: *receipt_type,
                    from: from.clone(),
                    to: to.clone(),
                });
                true
            }
            OperationRequest::CardTransactions { .. } => {
                let approved = core
                    .store
                    .all_order_by_id_desc()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|trx| trx.card_brand_name.is_some())
                    .collect();
                lock(&self.report).card_transactions = approved;
                true
            }
            OperationRequest::ConnectPinpad { pinpad } => {
                if pinpad.mac_address.trim().is_empty() {
                    return false;
                }
                let mut pinpads = lock(&core.pinpads);
                if !pinpads.iter().any(|p| p.mac_address == pinpad.mac_address) {
                    pinpads.push(pinpad.clone());
                }
                true
            }
            OperationRequest::DisplayMessage { pinpad, message } => {
                lock(&core.pinpad_messages).push((pinpad.mac_address.clone(), message.clone()));
                true
            }
            OperationRequest::PrintReceipt {
                transaction,
                receipt_type,
                reprint,
            } => {
                lock(&core.printed).push(PrintJob::Receipt {
                    atk: transaction.acquirer_transaction_key.clone(),
                    receipt_type: *receipt_type,
                    reprint: *reprint,
                });
                true
            }
            OperationRequest::PrintBitmaps { strips } => {
                lock(&core.printed).push(PrintJob::Bitmaps {
                    heights: strips.iter().map(|s| s.height).collect(),
                });
                true
            }
        }
    }

    fn authorize(
        &self,
        request: &TransactionRequest,
        user: &UserRecord,
        target: &HardwareTarget,
    ) -> bool {
        let declined = request.amount.minor_units() % 100 == DECLINED_CENTS_SUFFIX;
        let (status, message) = if declined {
            (TransactionStatus::Declined, "51 - Insufficient funds")
        } else {
            (TransactionStatus::Approved, "00 - Approved")
        };

        let record = self
            .core
            .store
            .add(|id| build_record(id, request, user, status, message));
        debug!(
            "Simulated {} of {} on {:?}: {} ({})",
            request.kind.as_str(),
            request.amount,
            target,
            status,
            record.acquirer_transaction_key
        );

        let mut report = lock(&self.report);
        report.transaction_status = Some(status);
        report.message_from_authorizer = Some(message.to_string());
        report.qr_code = None;
        !declined
    }
}

fn build_record(
    id: u32,
    request: &TransactionRequest,
    user: &UserRecord,
    status: TransactionStatus,
    message: &str,
) -> TransactionRecord {
    let pix = request.kind == TransactionKind::Pix;
    TransactionRecord {
        id,
        amount: request.amount,
        initiator_transaction_key: request.initiator_transaction_key.clone(),
        acquirer_transaction_key: format!("{:015}", 701_000_000_000_000u64 + u64::from(id)),
        authorization_code: Some(format!("{:06}", 100_000 + id)),
        card_holder_name: if pix { None } else { Some("SIM CARDHOLDER".to_string()) },
        card_brand_name: if pix { None } else { Some("VISA".to_string()) },
        entry_mode: Some(if pix {
            EntryMode::Qrcode
        } else {
            request.entry_mode.unwrap_or(EntryMode::ChipNPin)
        }),
        type_of_transaction: request.kind,
        instalment_transaction: request.installment,
        transaction_status: status,
        is_capture: request.capture && status == TransactionStatus::Approved,
        short_name: request.short_name.clone(),
        terminal_code: user.terminal_code.clone(),
        message_from_authorizer: Some(message.to_string()),
    }
}

fn pix_payload(request: &OperationRequest) -> String {
    let amount = match request {
        OperationRequest::Transaction { request, .. } => request.amount,
        _ => Cents::ZERO,
    };
    format!("00020126SIMPIX54{}", amount)
}

struct SimReader {
    core: Arc<SimCore>,
    abort: Arc<Notify>,
    started: AtomicBool,
    authenticated: Mutex<Option<u8>>,
    errors: Mutex<Vec<String>>,
}

impl SimReader {
    fn fail(&self, error: &str) -> SdkError {
        *lock(&self.errors) = vec![error.to_string()];
        SdkError::Vendor(error.to_string())
    }

    fn require_sector(&self, sector: u8, block: u8) -> SdkResult<()> {
        if *lock(&self.authenticated) != Some(sector) {
            return Err(self.fail("NOT_AUTHENTICATED"));
        }
        if block > 3 {
            return Err(self.fail("INVALID_BLOCK"));
        }
        Ok(())
    }
}

impl ContactlessReader for SimReader {
    fn execute(&self, listener: Arc<dyn Listener>) -> SdkResult<()> {
        let core = Arc::clone(&self.core);
        let abort = Arc::clone(&self.abort);
        spawn_job(&self.started, async move {
            if !step(core.step_delay, &abort).await {
                listener.on_event(VendorEvent::Failed);
                return;
            }
            listener.on_event(VendorEvent::StatusChanged(VendorAction::TransactionWaitingCard));

            if !step(core.step_delay, &abort).await || !core.card_present.load(Ordering::SeqCst) {
                listener.on_event(VendorEvent::Failed);
                return;
            }
            listener.on_event(VendorEvent::Succeeded);
        })
    }

    fn cancel_detection(&self) {
        self.core.detections_cancelled.fetch_add(1, Ordering::SeqCst);
        self.abort.notify_one();
        *lock(&self.authenticated) = None;
    }

    fn card_uuid(&self) -> Vec<u8> {
        vec![0x04, 0xA2, 0x2B, 0x91]
    }

    fn authenticate_sector(&self, key_type: MifareKeyType, key: &[u8], sector: u8) -> SdkResult<()> {
        if sector > 15 || key != DEFAULT_MIFARE_KEY {
            debug!("Simulated card refused key {:?} for sector {}", key_type, sector);
            return Err(self.fail("AUTHENTICATION_FAILED"));
        }
        *lock(&self.authenticated) = Some(sector);
        Ok(())
    }

    fn read_block(&self, sector: u8, block: u8) -> SdkResult<[u8; 16]> {
        self.require_sector(sector, block)?;
        Ok(lock(&self.core.card_blocks)
            .get(&(sector, block))
            .copied()
            .unwrap_or([0u8; 16]))
    }

    fn write_block(&self, sector: u8, block: u8, data: &[u8; 16]) -> SdkResult<()> {
        self.require_sector(sector, block)?;
        lock(&self.core.card_blocks).insert((sector, block), *data);
        Ok(())
    }

    fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::InstallmentPlan;

    fn record(id: u32, status: TransactionStatus) -> TransactionRecord {
        TransactionRecord {
            id,
            amount: Cents::new(100),
            initiator_transaction_key: None,
            acquirer_transaction_key: format!("atk-{}", id),
            authorization_code: Some(format!("auth-{}", id)),
            card_holder_name: None,
            card_brand_name: None,
            entry_mode: None,
            type_of_transaction: TransactionKind::Credit,
            instalment_transaction: InstallmentPlan::SINGLE,
            transaction_status: status,
            is_capture: true,
            short_name: None,
            terminal_code: "206192723".into(),
            message_from_authorizer: None,
        }
    }

    #[test]
    fn test_memory_store_assigns_increasing_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.last_transaction_id().unwrap(), None);

        store.add(|id| record(id, TransactionStatus::Approved));
        store.add(|id| record(id, TransactionStatus::Declined));

        assert_eq!(store.last_transaction_id().unwrap(), Some(2));
        let all = store.all_order_by_id_desc().unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(
            store.find_by_authorization_code("auth-1").unwrap().unwrap().id,
            1
        );
    }

    #[test]
    fn test_memory_store_update_by_atk() {
        let store = MemoryStore::new();
        store.add(|id| record(id, TransactionStatus::Approved));

        assert!(store.update("atk-1", |r| r.is_capture = false));
        assert!(!store.update("atk-9", |r| r.is_capture = false));
        assert!(!store.find_by_atk("atk-1").unwrap().unwrap().is_capture);
    }

    #[test]
    fn test_block_renderer() {
        let renderer = BlockRenderer::default();
        assert!(renderer.render("   \n", 380).unwrap().is_none());

        let bitmap = renderer.render("<p>a</p>\n<p>b</p>", 380).unwrap().unwrap();
        assert_eq!(bitmap.width, 380);
        assert_eq!(bitmap.height, 80);
        assert_eq!(bitmap.pixels.len(), 380 * 80);
    }

    #[test]
    fn test_execute_outside_runtime_is_an_error() {
        let sdk = SimulatedSdk::new(&SimConfig::default());
        let dialog = DialogOptions {
            use_default_ui: true,
            title: String::new(),
            message: String::new(),
        };
        let op = sdk.create_operation(OperationRequest::ReversePending, dialog).unwrap();

        struct Ignore;
        impl Listener for Ignore {
            fn on_event(&self, _event: VendorEvent) {}
        }

        assert!(op.execute(Arc::new(Ignore)).is_err());
    }
}
