//! End-to-end flows of the bridge against the simulated SDK.

use pos_bridge::sim::{PrintJob, RecordingSink, SimulatedSdk};
use pos_bridge::{
    BridgeConfig, Dialog, MailContact, Pinpad, PixCredentials, PosBridge, ReceiptType,
    RuntimeMode, SectorKey, TransactionKind, TransactionSetup, TransactionStatus,
};
use std::sync::Arc;

const CODE: &str = "206192723";
const MAC: &str = "00:11:22:33:44:55";

struct Harness {
    bridge: PosBridge,
    sim: SimulatedSdk,
    events: Arc<RecordingSink>,
}

/// Initialized bridge with one activated code and, on generic devices, one
/// connected pinpad.
async fn ready(mode: RuntimeMode, pix: Option<PixCredentials>) -> Harness {
    let mut config = BridgeConfig::default().with_runtime_mode(mode);
    config.sim.step_delay_ms = 2;

    let mut sim = SimulatedSdk::new(&config.sim).with_activated_code(CODE);
    if mode == RuntimeMode::Generic {
        sim = sim.with_pinpad(Pinpad::new("PAX D180", MAC));
    }
    let events = Arc::new(RecordingSink::new());
    let bridge = PosBridge::new(config, sim.collaborators(events.clone()));

    assert!(bridge.init_sdk(Some("Padaria"), pix).await.unwrap());
    Harness {
        bridge,
        sim,
        events,
    }
}

fn credit(amount: &str) -> TransactionSetup {
    TransactionSetup::new(amount, TransactionKind::Credit, true, 1, false)
}

#[tokio::test]
async fn test_credit_transaction_resolves_stored_record() {
    let h = ready(RuntimeMode::Generic, None).await;

    let record = h
        .bridge
        .make_transaction(credit("2500"), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.amount.minor_units(), 2500);
    assert_eq!(record.transaction_status, TransactionStatus::Approved);
    assert_eq!(record.terminal_code, CODE);
    assert!(record.is_capture);
    assert_eq!(record.message_from_authorizer.as_deref(), Some("00 - Approved"));
    assert!(!h.bridge.is_task_running("makeTransaction"));
}

#[tokio::test]
async fn test_transaction_progress_is_correlated_and_ordered() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    let mut setup = credit("100");
    setup.initiator_transaction_key = Some("order-7".into());

    h.bridge.make_transaction(setup, None).await.unwrap();

    let events = h.events.events();
    assert!(!events.is_empty());
    assert!(events
        .iter()
        .all(|(channel, event)| channel == "MAKE_TRANSACTION_PROGRESS"
            && event.correlation_key.as_deref() == Some("order-7")));
    assert_eq!(
        h.events.statuses("MAKE_TRANSACTION_PROGRESS"),
        vec![
            "TRANSACTION_WAITING_CARD",
            "TRANSACTION_WAITING_PASSWORD",
            "TRANSACTION_SENDING",
            "TRANSACTION_REMOVE_CARD",
        ]
    );
    assert!(events
        .iter()
        .all(|(_, event)| event.extra.get("qrCode") == Some(&None)));
}

#[tokio::test]
async fn test_custom_progress_channel_and_default_ui() {
    let h = ready(RuntimeMode::Dedicated, None).await;

    h.bridge
        .make_transaction(credit("100"), Some("CHECKOUT"))
        .await
        .unwrap();
    assert_eq!(h.events.statuses("CHECKOUT").len(), 4);

    let mut setup = credit("100");
    setup.use_default_ui = Some(true);
    h.bridge.make_transaction(setup, Some("SILENT")).await.unwrap();
    assert!(h.events.statuses("SILENT").is_empty());
}

#[tokio::test]
async fn test_pix_transaction_publishes_qr_code() {
    let creds = PixCredentials::new("client-id", "client-secret");
    let h = ready(RuntimeMode::Dedicated, Some(creds)).await;
    let setup = TransactionSetup::new("1990", TransactionKind::Pix, true, 1, false);

    let record = h.bridge.make_transaction(setup, None).await.unwrap().unwrap();
    assert_eq!(record.type_of_transaction, TransactionKind::Pix);

    let events = h.events.events();
    let (_, waiting) = events
        .iter()
        .find(|(_, e)| e.status == "TRANSACTION_WAITING_QRCODE_SCAN")
        .expect("QR code status");
    let qr_code = waiting.extra.get("qrCode").cloned().flatten().unwrap();
    assert!(qr_code.ends_with("19.90"));

    let (_, sending) = events
        .iter()
        .find(|(_, e)| e.status == "TRANSACTION_SENDING")
        .unwrap();
    assert_eq!(sending.extra.get("qrCode"), Some(&None));
}

#[tokio::test]
async fn test_cancel_running_transaction() {
    let mut config = BridgeConfig::default().with_runtime_mode(RuntimeMode::Dedicated);
    config.sim.step_delay_ms = 50;
    let sim = SimulatedSdk::new(&config.sim).with_activated_code(CODE);
    let bridge = PosBridge::new(config, sim.collaborators(Arc::new(RecordingSink::new())));
    bridge.init_sdk(None, None).await.unwrap();

    let running = bridge.make_transaction(credit("100"), None);
    assert!(bridge.is_task_running("makeTransaction"));

    assert!(bridge.cancel_running_transaction().await.unwrap());
    assert!(!bridge.is_task_running("makeTransaction"));

    let err = running.await.unwrap_err();
    assert_eq!(err.code(), "CANCELLED");

    // The name is free again
    let record = bridge.make_transaction(credit("100"), None).await.unwrap();
    assert!(record.is_some());
}

#[tokio::test]
async fn test_capture_later() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    let mut setup = credit("4200");
    setup.capture = Some(false);

    let record = h.bridge.make_transaction(setup, None).await.unwrap().unwrap();
    assert!(!record.is_capture);

    let atk = record.acquirer_transaction_key.clone();
    let captured = h
        .bridge
        .capture_transaction(&atk, Dialog::default())
        .await
        .unwrap()
        .unwrap();
    assert!(captured.is_capture);
    assert_eq!(captured.acquirer_transaction_key, atk);
}

#[tokio::test]
async fn test_void_marks_transaction_cancelled() {
    let h = ready(RuntimeMode::Generic, None).await;
    let record = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();

    let voided = h
        .bridge
        .void_transaction(&record.acquirer_transaction_key, Dialog::custom_ui())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(voided.transaction_status, TransactionStatus::Cancelled);
    assert_eq!(
        h.events.statuses("VOID_TRANSACTION_PROGRESS"),
        vec!["TRANSACTION_SENDING"]
    );
}

#[tokio::test]
async fn test_reverse_pending_transactions() {
    let h = ready(RuntimeMode::Generic, None).await;
    assert!(h
        .bridge
        .reverse_pending_transactions(Dialog::default())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_receipt_mail_fills_default_names() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    let record = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();

    let resolved = h
        .bridge
        .send_transaction_receipt_mail(
            &record.acquirer_transaction_key,
            ReceiptType::Merchant,
            &[MailContact::new("buyer@example.com")],
            &MailContact::named("shop@example.com", "Padaria"),
            Dialog::default(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, record.id);

    let mails = h.sim.sent_mails();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].receipt_type, ReceiptType::Merchant);
    assert_eq!(mails[0].from.name, "Padaria");
    assert_eq!(mails[0].to[0].name, "Customer Name");
}

#[tokio::test]
async fn test_activation_lifecycle() {
    let h = ready(RuntimeMode::Dedicated, None).await;

    // Already active: no vendor round trip
    assert!(h.bridge.activate_code(CODE, Dialog::default()).await.unwrap());
    assert_eq!(h.sim.operations_created(), 0);

    assert!(h
        .bridge
        .activate_code("564019274", Dialog::default())
        .await
        .unwrap());
    let codes: Vec<String> = h
        .bridge
        .get_activated_codes()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.terminal_code)
        .collect();
    assert_eq!(codes, vec![CODE, "564019274"]);

    assert!(h
        .bridge
        .deactivate_code(CODE, Dialog::default(), false)
        .await
        .unwrap());
    let err = h
        .bridge
        .deactivate_code("564019274", Dialog::default(), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "203");

    assert!(h
        .bridge
        .deactivate_code("564019274", Dialog::default(), true)
        .await
        .unwrap());
    assert!(h.bridge.get_activated_codes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transaction_under_explicit_code() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    h.bridge
        .activate_code("564019274", Dialog::default())
        .await
        .unwrap();

    let mut setup = credit("100");
    setup.terminal_code = Some(CODE.into());
    let record = h.bridge.make_transaction(setup, None).await.unwrap().unwrap();
    assert_eq!(record.terminal_code, CODE);

    let record = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.terminal_code, "564019274");
}

#[tokio::test]
async fn test_queries() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    assert!(h.bridge.get_last_transaction().await.unwrap().is_none());

    let first = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();
    let second = h
        .bridge
        .make_transaction(credit("200"), None)
        .await
        .unwrap()
        .unwrap();

    let all = h.bridge.get_all_transactions_order_by_id_desc().await.unwrap();
    assert_eq!(
        all.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(
        h.bridge.get_last_transaction().await.unwrap().unwrap().id,
        second.id
    );

    let code = first.authorization_code.clone().unwrap();
    assert_eq!(
        h.bridge
            .find_transaction_with_authorization_code(&code)
            .await
            .unwrap()
            .unwrap()
            .id,
        first.id
    );
    assert_eq!(
        h.bridge
            .find_transaction_with_initiator_transaction_key(&second.acquirer_transaction_key)
            .await
            .unwrap()
            .unwrap()
            .id,
        second.id
    );
    assert_eq!(
        h.bridge.find_transaction_with_id(first.id).await.unwrap(),
        Some(first)
    );
    assert!(h.bridge.find_transaction_with_id(99).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pinpad_operations() {
    let h = ready(RuntimeMode::Generic, None).await;

    assert!(h
        .bridge
        .connect_to_pinpad("Gertec", "AA:BB:CC:DD:EE:FF", Dialog::default())
        .await
        .unwrap());
    assert!(h
        .bridge
        .display_message_in_pinpad("Hello", Some("AA:BB:CC:DD:EE:FF"), Dialog::default())
        .await
        .unwrap());
    assert!(h
        .bridge
        .display_message_in_pinpad("First", None, Dialog::default())
        .await
        .unwrap());

    assert_eq!(
        h.sim.pinpad_messages(),
        vec![
            ("AA:BB:CC:DD:EE:FF".to_string(), "Hello".to_string()),
            (MAC.to_string(), "First".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_fetch_transactions_for_card() {
    let h = ready(RuntimeMode::Generic, None).await;
    let record = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();

    let found = h
        .bridge
        .fetch_transactions_for_card(None, Dialog::default())
        .await
        .unwrap();
    assert_eq!(found, vec![record]);
}

#[tokio::test]
async fn test_printing_on_dedicated_terminal() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    let record = h
        .bridge
        .make_transaction(credit("100"), None)
        .await
        .unwrap()
        .unwrap();

    assert!(h
        .bridge
        .print_receipt_in_pos_printer(
            ReceiptType::Client,
            &record.acquirer_transaction_key,
            true,
            Dialog::default()
        )
        .await
        .unwrap());

    // 30 lines at 40 rows each
    let html: String = (0..30).map(|i| format!("<p>line {}</p>\n", i)).collect();
    assert!(h
        .bridge
        .print_html_in_pos_printer(&html, Dialog::default())
        .await
        .unwrap());

    assert_eq!(
        h.sim.printed(),
        vec![
            PrintJob::Receipt {
                atk: record.acquirer_transaction_key,
                receipt_type: ReceiptType::Client,
                reprint: true,
            },
            PrintJob::Bitmaps {
                heights: vec![595, 595, 10],
            },
        ]
    );
}

#[tokio::test]
async fn test_mifare_write_then_read() {
    let h = ready(RuntimeMode::Dedicated, None).await;
    let key = || SectorKey::new(0, "FFFFFFFFFFFF");
    let data: Vec<u8> = (0u8..16).collect();

    let uuid = h.bridge.mifare_detect_card(Dialog::custom_ui()).await.unwrap();
    assert_eq!(uuid.len(), 4);

    assert!(h
        .bridge
        .mifare_authenticate_sector(key(), 1, Dialog::default())
        .await
        .unwrap());
    assert!(h
        .bridge
        .mifare_write_block(key(), 1, 2, &data, Dialog::default())
        .await
        .unwrap());
    assert_eq!(
        h.bridge
            .mifare_read_block(key(), 1, 2, Dialog::default())
            .await
            .unwrap(),
        data
    );
    assert_eq!(
        h.bridge
            .mifare_read_block(key(), 1, 3, Dialog::default())
            .await
            .unwrap(),
        vec![0u8; 16]
    );

    assert_eq!(
        h.events.statuses("MIFARE_PROGRESS"),
        vec!["TRANSACTION_WAITING_CARD"]
    );
}
