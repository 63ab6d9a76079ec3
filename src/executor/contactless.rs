//! Low-level MIFARE access through the terminal's contactless reader.
//!
//! Each call opens a reader session, waits for a card, runs one card action
//! and powers the card off again. Starting a session cancels detection on
//! the previous one, so at most one reader is live.

use crate::adapter::CallbackAdapter;
use crate::bridge::{Dialog, PosBridge};
use crate::error::{BridgeError, Result};
use crate::precondition;
use crate::sdk::{
    ContactlessReader, Listener, MifareKeyType, OperationReport, SdkResult, VendorOperation,
};
use crate::settle::Pending;
use std::sync::{Arc, Mutex, PoisonError};

/// Size of a MIFARE Classic data block.
pub const BLOCK_SIZE: usize = 16;

/// The live reader session, numbered so a finished session only clears
/// itself.
#[derive(Default)]
pub(crate) struct ReaderSlot {
    opened: u64,
    live: Option<(u64, Arc<dyn ContactlessReader>)>,
}

impl ReaderSlot {
    /// Makes `reader` the live session; returns its number and the reader
    /// it replaced.
    fn open(
        &mut self,
        reader: Arc<dyn ContactlessReader>,
    ) -> (u64, Option<Arc<dyn ContactlessReader>>) {
        self.opened += 1;
        let previous = self.live.replace((self.opened, reader));
        (self.opened, previous.map(|(_, reader)| reader))
    }

    fn close(&mut self, session: u64) {
        if matches!(&self.live, Some((live, _)) if *live == session) {
            self.live = None;
        }
    }

    #[cfg(test)]
    fn is_live(&self) -> bool {
        self.live.is_some()
    }
}

fn close_session(slot: &Mutex<ReaderSlot>, session: u64) {
    slot.lock().unwrap_or_else(PoisonError::into_inner).close(session);
}

/// Presents a reader session as a vendor operation so the adapter can drive
/// it like any other.
struct ReaderSession(Arc<dyn ContactlessReader>);

impl VendorOperation for ReaderSession {
    fn execute(&self, listener: Arc<dyn Listener>) -> SdkResult<()> {
        self.0.execute(listener)
    }

    fn cancel(&self) -> SdkResult<()> {
        self.0.cancel_detection();
        Ok(())
    }

    fn report(&self) -> OperationReport {
        OperationReport {
            errors: self.0.errors(),
            ..Default::default()
        }
    }
}

/// Sector key as sent by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorKey {
    pub key_type: u8,
    /// Even-length hex string, e.g. `FFFFFFFFFFFF`.
    pub key: String,
}

impl SectorKey {
    pub fn new(key_type: u8, key: impl Into<String>) -> Self {
        SectorKey {
            key_type,
            key: key.into(),
        }
    }

    fn parse(&self) -> Result<(MifareKeyType, Vec<u8>)> {
        let key_type = MifareKeyType::from_ordinal(self.key_type).ok_or(
            BridgeError::InvalidKeyType {
                key_type: self.key_type,
            },
        )?;
        let key = hex::decode(self.key.trim()).map_err(|e| BridgeError::InvalidFieldValue {
            field: "key".to_string(),
            reason: e.to_string(),
        })?;
        Ok((key_type, key))
    }
}

impl PosBridge {
    /// Waits for a card and resolves with its UUID.
    pub fn mifare_detect_card(&self, dialog: Dialog) -> Pending<Vec<u8>> {
        self.with_card("mifareDetectCard", dialog, |reader| Ok(reader.card_uuid()))
    }

    pub fn mifare_authenticate_sector(
        &self,
        key: SectorKey,
        sector: u8,
        dialog: Dialog,
    ) -> Pending<bool> {
        match key.parse() {
            Ok((key_type, key)) => self.with_card("mifareAuthenticateSector", dialog, move |reader| {
                authenticate(reader, key_type, &key, sector, "Authentication")?;
                Ok(true)
            }),
            Err(err) => self.reject_invalid("mifareAuthenticateSector", err),
        }
    }

    /// Authenticates `sector` and reads one block from it.
    pub fn mifare_read_block(
        &self,
        key: SectorKey,
        sector: u8,
        block: u8,
        dialog: Dialog,
    ) -> Pending<Vec<u8>> {
        match key.parse() {
            Ok((key_type, key)) => self.with_card("mifareReadBlock", dialog, move |reader| {
                authenticate(reader, key_type, &key, sector, "Read")?;
                let data = reader
                    .read_block(sector, block)
                    .map_err(|_| access_failed(reader, "Read"))?;
                Ok(data.to_vec())
            }),
            Err(err) => self.reject_invalid("mifareReadBlock", err),
        }
    }

    /// Authenticates `sector` and overwrites one block with `data`.
    pub fn mifare_write_block(
        &self,
        key: SectorKey,
        sector: u8,
        block: u8,
        data: &[u8],
        dialog: Dialog,
    ) -> Pending<bool> {
        let parsed = key.parse().and_then(|(key_type, key)| {
            let data: [u8; BLOCK_SIZE] = data
                .try_into()
                .map_err(|_| BridgeError::InvalidBlockData { len: data.len() })?;
            Ok((key_type, key, data))
        });

        match parsed {
            Ok((key_type, key, data)) => self.with_card("mifareWriteBlock", dialog, move |reader| {
                authenticate(reader, key_type, &key, sector, "Write")?;
                reader
                    .write_block(sector, block, &data)
                    .map_err(|_| access_failed(reader, "Write"))?;
                Ok(true)
            }),
            Err(err) => self.reject_invalid("mifareWriteBlock", err),
        }
    }

    /// Rejects a call whose arguments failed validation, after the usual
    /// SDK check.
    fn reject_invalid<T>(&self, label: &'static str, err: BridgeError) -> Pending<T> {
        self.run(label, |_| Err(err))
    }

    fn with_card<T, F>(&self, label: &'static str, dialog: Dialog, action: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ContactlessReader) -> Result<T> + Send + 'static,
    {
        self.run(label, |settlement| {
            precondition::require_dedicated_mode(self.config.runtime_mode, label)?;

            let dialog = dialog.resolve(true, "Please wait...", "Waiting for card...");
            let use_default_ui = dialog.use_default_ui;
            let reader = self.sdk.create_contactless_reader(dialog)?;

            let (number, previous) = self
                .contactless
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .open(Arc::clone(&reader));
            if let Some(previous) = previous {
                previous.cancel_detection();
            }

            let session: Arc<dyn VendorOperation> = Arc::new(ReaderSession(Arc::clone(&reader)));
            let on_card = Arc::clone(&reader);
            let on_failure = Arc::clone(&reader);
            let slot = Arc::clone(&self.contactless);
            let failure_slot = Arc::clone(&self.contactless);
            let adapter = CallbackAdapter::new(label, settlement, Arc::clone(&session), move |_| {
                let outcome = action(on_card.as_ref());
                on_card.cancel_detection();
                close_session(&slot, number);
                outcome
            })
            .on_error(move |_| {
                on_failure.cancel_detection();
                close_session(&failure_slot, number);
                BridgeError::CardDetectionFailed
            })
            .with_progress(self.progress_route(&self.config.progress.mifare))
            .default_ui(use_default_ui);

            self.dispatch(&session, adapter, None)
        })
    }
}

fn authenticate(
    reader: &dyn ContactlessReader,
    key_type: MifareKeyType,
    key: &[u8],
    sector: u8,
    action: &'static str,
) -> Result<()> {
    reader
        .authenticate_sector(key_type, key, sector)
        .map_err(|_| access_failed(reader, action))
}

fn access_failed(reader: &dyn ContactlessReader, action: &'static str) -> BridgeError {
    BridgeError::CardAccessFailed {
        action,
        errors: reader.errors().join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, RuntimeMode};
    use crate::sdk::PosSdk;
    use crate::sim::{RecordingSink, SimulatedSdk};

    #[test]
    fn test_sector_key_parsing() {
        let (key_type, key) = SectorKey::new(1, "FFFFFFFFFFFF").parse().unwrap();
        assert_eq!(key_type, MifareKeyType::B);
        assert_eq!(key, vec![0xFF; 6]);

        assert_eq!(
            SectorKey::new(2, "FFFF").parse().unwrap_err(),
            BridgeError::InvalidKeyType { key_type: 2 }
        );
        assert_eq!(SectorKey::new(0, "FFF").parse().unwrap_err().code(), "502");
        assert_eq!(SectorKey::new(0, "ZZ").parse().unwrap_err().code(), "502");
    }

    #[tokio::test]
    async fn test_finished_session_leaves_no_live_reader() {
        let mut config = BridgeConfig::default().with_runtime_mode(RuntimeMode::Dedicated);
        config.sim.step_delay_ms = 1;
        let sim = SimulatedSdk::new(&config.sim).with_activated_code("206192723");
        let bridge = PosBridge::new(config, sim.collaborators(Arc::new(RecordingSink::new())));
        bridge.init_sdk(None, None).await.unwrap();

        bridge.mifare_detect_card(Dialog::default()).await.unwrap();
        assert!(!bridge.contactless.lock().unwrap().is_live());
        assert_eq!(sim.detections_cancelled(), 1);

        // Only the new session's own power-off, nothing sent to the old reader
        bridge.mifare_detect_card(Dialog::default()).await.unwrap();
        assert_eq!(sim.detections_cancelled(), 2);
    }

    #[test]
    fn test_closing_a_replaced_session_keeps_the_newer_one() {
        let sim = SimulatedSdk::new(&BridgeConfig::default().sim);
        let reader = || {
            let dialog = Dialog::default().resolve(true, "Wait", "Card");
            sim.create_contactless_reader(dialog).unwrap()
        };

        let mut slot = ReaderSlot::default();
        let (first, previous) = slot.open(reader());
        assert!(previous.is_none());
        let (second, previous) = slot.open(reader());
        assert!(previous.is_some());

        slot.close(first);
        assert!(slot.is_live());
        slot.close(second);
        assert!(!slot.is_live());
    }
}
