//! CSV-driven scenario runner behind the `pos-bridge-sim` binary.
//!
//! A scenario is a CSV file with the columns
//! `step,op,arg1,arg2,arg3,arg4,arg5,wait`. Each row calls one bridge
//! operation against the simulator. With `wait` left empty or `true` the
//! runner awaits the outcome before the next row; with `false` the call is
//! left in flight, which is how overlapping operations are scripted.
//!
//! The output has one row per step, `step,op,outcome,code,detail`, sorted
//! by step.

use crate::bridge::{Dialog, PosBridge};
use crate::config::BridgeConfig;
use crate::error::ScriptError;
use crate::executor::SectorKey;
use crate::records::{MailContact, ReceiptType, TransactionRecord, UserRecord};
use crate::settle::Pending;
use crate::sim::{LogSink, SimulatedSdk};
use crate::state::PixCredentials;
use crate::transaction::{TransactionKind, TransactionSetup};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::Deserialize;
use std::future::Future;
use std::io::{Read, Write};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

/// Sender used for receipt e-mails sent from a scenario.
pub const SCENARIO_SENDER: &str = "receipts@pos-bridge.local";

/// One scenario row as read from CSV.
#[derive(Debug, Deserialize)]
pub struct ScenarioRow {
    pub step: u32,
    pub op: String,
    #[serde(default)]
    pub arg1: Option<String>,
    #[serde(default)]
    pub arg2: Option<String>,
    #[serde(default)]
    pub arg3: Option<String>,
    #[serde(default)]
    pub arg4: Option<String>,
    #[serde(default)]
    pub arg5: Option<String>,
    /// Await the outcome before the next row; defaults to `true`.
    #[serde(default)]
    pub wait: Option<bool>,
}

impl ScenarioRow {
    /// Positional argument `index` (1-based), blank treated as absent.
    fn arg(&self, index: usize) -> Option<&str> {
        let value = match index {
            1 => &self.arg1,
            2 => &self.arg2,
            3 => &self.arg3,
            4 => &self.arg4,
            5 => &self.arg5,
            _ => return None,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn required(&self, index: usize, name: &str) -> Result<&str, String> {
        self.arg(index)
            .ok_or_else(|| format!("arg{} ({}) is required", index, name))
    }

    fn parsed<T>(&self, index: usize, name: &str) -> Result<T, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(index, name)?;
        raw.parse()
            .map_err(|e| format!("arg{} ({}) {:?} is not valid: {}", index, name, raw, e))
    }

    fn flag(&self, index: usize, name: &str) -> Result<bool, String> {
        match self.arg(index) {
            Some(_) => self.parsed(index, name),
            None => Ok(false),
        }
    }
}

/// Outcome of one scenario step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: u32,
    pub op: String,
    /// `resolved`, `rejected`, or `invalid` for rows the runner could not start.
    pub outcome: &'static str,
    /// Bridge error code of a rejection, empty otherwise.
    pub code: String,
    pub detail: String,
}

struct Settled {
    outcome: &'static str,
    code: String,
    detail: String,
}

type Outcome = Pin<Box<dyn Future<Output = Settled> + Send>>;

/// Turns a pending bridge call into a step outcome, describing a resolved
/// value with `describe`.
fn settled<T, F>(pending: Pending<T>, describe: F) -> Outcome
where
    T: Send + 'static,
    F: FnOnce(T) -> String + Send + 'static,
{
    Box::pin(async move {
        match pending.await {
            Ok(value) => Settled {
                outcome: "resolved",
                code: String::new(),
                detail: describe(value),
            },
            Err(e) => Settled {
                outcome: "rejected",
                code: e.code().to_string(),
                detail: e.to_string(),
            },
        }
    })
}

fn flag(value: bool) -> String {
    value.to_string()
}

fn transaction(record: Option<TransactionRecord>) -> String {
    match record {
        Some(trx) => format!(
            "{} {} {}{}",
            trx.acquirer_transaction_key,
            trx.amount,
            trx.transaction_status,
            if trx.is_capture { "" } else { " (not captured)" }
        ),
        None => "none".to_string(),
    }
}

fn transactions(records: Vec<TransactionRecord>) -> String {
    records
        .iter()
        .map(|trx| trx.acquirer_transaction_key.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn codes(users: Vec<UserRecord>) -> String {
    users
        .iter()
        .map(|user| user.terminal_code.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

/// Runs scenario rows against a [`PosBridge`] backed by the simulator.
pub struct ScenarioRunner {
    bridge: PosBridge,
    records: Vec<StepRecord>,
    in_flight: Vec<(u32, String, Outcome)>,
}

impl ScenarioRunner {
    pub fn new(config: BridgeConfig) -> Self {
        let sim = SimulatedSdk::new(&config.sim);
        let bridge = PosBridge::new(config, sim.collaborators(Arc::new(LogSink)));
        ScenarioRunner {
            bridge,
            records: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    /// Runs every row of `reader`, then waits for the calls left in flight.
    ///
    /// Rows that fail to parse are logged at warn level and skipped.
    pub async fn process_csv<R: Read>(&mut self, reader: R) -> Result<(), ScriptError> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<ScenarioRow>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(row) => self.process_row(row).await,
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        for (step, op, outcome) in std::mem::take(&mut self.in_flight) {
            let settled = outcome.await;
            self.record(step, op, settled);
        }
        Ok(())
    }

    async fn process_row(&mut self, row: ScenarioRow) {
        debug!("Step {}: {}", row.step, row.op);
        match self.start(&row) {
            Ok(outcome) if row.wait.unwrap_or(true) => {
                let settled = outcome.await;
                self.record(row.step, row.op, settled);
            }
            Ok(outcome) => self.in_flight.push((row.step, row.op, outcome)),
            Err(reason) => {
                warn!("Step {}: {}", row.step, reason);
                self.record(
                    row.step,
                    row.op,
                    Settled {
                        outcome: "invalid",
                        code: String::new(),
                        detail: reason,
                    },
                );
            }
        }
    }

    fn record(&mut self, step: u32, op: String, settled: Settled) {
        self.records.push(StepRecord {
            step,
            op,
            outcome: settled.outcome,
            code: settled.code,
            detail: settled.detail,
        });
    }

    /// Starts the bridge call for `row`.
    fn start(&self, row: &ScenarioRow) -> Result<Outcome, String> {
        let bridge = &self.bridge;
        let dialog = Dialog::custom_ui;

        let outcome = match row.op.as_str() {
            "initSdk" => {
                let pix = match (row.arg(2), row.arg(3)) {
                    (Some(id), Some(secret)) => Some(PixCredentials::new(id, secret)),
                    _ => None,
                };
                settled(bridge.init_sdk(row.arg(1), pix), flag)
            }
            "isRunningInPos" => settled(Pending::ready(Ok(bridge.is_running_in_pos())), flag),
            "activateCode" => settled(bridge.activate_code(row.required(1, "code")?, dialog()), flag),
            "deactivateCode" => settled(
                bridge.deactivate_code(
                    row.required(1, "code")?,
                    dialog(),
                    row.flag(2, "ignoreLastCodeCheck")?,
                ),
                flag,
            ),
            "getActivatedCodes" => settled(bridge.get_activated_codes(), codes),
            "makeTransaction" => {
                let kind: TransactionKind = row.parsed(2, "typeOfTransaction")?;
                let mut setup =
                    TransactionSetup::new(row.required(1, "amountInCents")?, kind, true, 1, false);
                setup.initiator_transaction_key = row.arg(3).map(str::to_string);
                if row.arg(4).is_some() {
                    setup.capture = Some(row.parsed(4, "capture")?);
                }
                setup.pinpad_mac_address = row.arg(5).map(str::to_string);
                settled(bridge.make_transaction(setup, None), transaction)
            }
            "cancelRunningTransaction" => settled(bridge.cancel_running_transaction(), flag),
            "voidTransaction" => settled(
                bridge.void_transaction(row.required(1, "atk")?, dialog()),
                transaction,
            ),
            "captureTransaction" => settled(
                bridge.capture_transaction(row.required(1, "atk")?, dialog()),
                transaction,
            ),
            "reversePendingTransactions" => {
                settled(bridge.reverse_pending_transactions(dialog()), flag)
            }
            "sendTransactionReceiptMail" => {
                let receipt_type = match row.arg(3) {
                    Some(_) => row.parsed(3, "receiptType")?,
                    None => ReceiptType::Client,
                };
                let to = [MailContact::new(row.required(2, "toEmail")?)];
                settled(
                    bridge.send_transaction_receipt_mail(
                        row.required(1, "atk")?,
                        receipt_type,
                        &to,
                        &MailContact::new(SCENARIO_SENDER),
                        dialog(),
                    ),
                    transaction,
                )
            }
            "fetchTransactionsForCard" => settled(
                bridge.fetch_transactions_for_card(row.arg(1), dialog()),
                transactions,
            ),
            "connectToPinpad" => settled(
                bridge.connect_to_pinpad(
                    row.required(1, "name")?,
                    row.required(2, "macAddress")?,
                    dialog(),
                ),
                flag,
            ),
            "displayMessageInPinpad" => settled(
                bridge.display_message_in_pinpad(row.required(1, "message")?, row.arg(2), dialog()),
                flag,
            ),
            "printReceiptInPosPrinter" => settled(
                bridge.print_receipt_in_pos_printer(
                    row.parsed(2, "receiptType")?,
                    row.required(1, "atk")?,
                    row.flag(3, "isReprint")?,
                    dialog(),
                ),
                flag,
            ),
            "printHtmlInPosPrinter" => settled(
                bridge.print_html_in_pos_printer(row.required(1, "html")?, dialog()),
                flag,
            ),
            "mifareDetectCard" => settled(bridge.mifare_detect_card(dialog()), hex::encode),
            "mifareAuthenticateSector" => settled(
                bridge.mifare_authenticate_sector(sector_key(row)?, row.parsed(3, "sector")?, dialog()),
                flag,
            ),
            "mifareReadBlock" => settled(
                bridge.mifare_read_block(
                    sector_key(row)?,
                    row.parsed(3, "sector")?,
                    row.parsed(4, "block")?,
                    dialog(),
                ),
                hex::encode,
            ),
            "mifareWriteBlock" => {
                let data = hex::decode(row.required(5, "data")?)
                    .map_err(|e| format!("arg5 (data) is not hex: {}", e))?;
                settled(
                    bridge.mifare_write_block(
                        sector_key(row)?,
                        row.parsed(3, "sector")?,
                        row.parsed(4, "block")?,
                        &data,
                        dialog(),
                    ),
                    flag,
                )
            }
            "getLastTransaction" => settled(bridge.get_last_transaction(), transaction),
            "getAllTransactionsOrderByIdDesc" => {
                settled(bridge.get_all_transactions_order_by_id_desc(), transactions)
            }
            "findTransactionWithId" => settled(
                bridge.find_transaction_with_id(row.parsed(1, "id")?),
                transaction,
            ),
            "findTransactionWithAuthorizationCode" => settled(
                bridge.find_transaction_with_authorization_code(row.required(1, "code")?),
                transaction,
            ),
            "findTransactionWithInitiatorTransactionKey" => settled(
                bridge.find_transaction_with_initiator_transaction_key(row.required(1, "key")?),
                transaction,
            ),
            other => return Err(format!("unknown operation {:?}", other)),
        };
        Ok(outcome)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Writes the step outcomes as CSV, sorted by step.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<(), ScriptError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["step", "op", "outcome", "code", "detail"])?;

        // Calls left in flight finish out of row order
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by_key(|r| r.step);

        for record in records {
            csv_writer.write_record([
                record.step.to_string(),
                record.op.clone(),
                record.outcome.to_string(),
                record.code.clone(),
                record.detail.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn sector_key(row: &ScenarioRow) -> Result<SectorKey, String> {
    Ok(SectorKey::new(
        row.parsed(1, "keyType")?,
        row.required(2, "key")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeMode;
    use std::io::Cursor;

    fn config(mode: RuntimeMode) -> BridgeConfig {
        let mut config = BridgeConfig::default().with_runtime_mode(mode);
        config.sim.step_delay_ms = 1;
        config
    }

    async fn run(mode: RuntimeMode, scenario: &str) -> Vec<StepRecord> {
        let mut runner = ScenarioRunner::new(config(mode));
        runner.process_csv(Cursor::new(scenario)).await.unwrap();
        let mut records = runner.records().to_vec();
        records.sort_by_key(|r| r.step);
        records
    }

    #[tokio::test]
    async fn test_activate_and_pay_on_dedicated_terminal() {
        let scenario = "\
step,op,arg1,arg2,arg3,arg4,arg5,wait
1,initSdk,Padaria,,,,,
2,activateCode,206192723,,,,,
3,makeTransaction,1000,CREDIT,order-1,,,
4,getLastTransaction,,,,,,
";
        let records = run(RuntimeMode::Dedicated, scenario).await;

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.outcome == "resolved"), "{:?}", records);
        assert!(records[2].detail.contains("10.00 APPROVED"));
        assert_eq!(records[2].detail, records[3].detail);
    }

    #[tokio::test]
    async fn test_overlapping_transactions() {
        let scenario = "\
step,op,arg1,arg2,arg3,arg4,arg5,wait
1,initSdk,,,,,,
2,activateCode,206192723,,,,,
3,makeTransaction,100,DEBIT,,,,false
4,makeTransaction,100,DEBIT,,,,
";
        let records = run(RuntimeMode::Dedicated, scenario).await;

        assert_eq!(records[2].outcome, "resolved");
        assert_eq!(records[3].outcome, "rejected");
        assert_eq!(records[3].code, "300");
    }

    #[tokio::test]
    async fn test_unknown_op_and_bad_args_are_invalid() {
        let scenario = "\
step,op,arg1,arg2,arg3,arg4,arg5,wait
1,teleport,,,,,,
2,findTransactionWithId,abc,,,,,
3,makeTransaction,100,,,,,
";
        let records = run(RuntimeMode::Generic, scenario).await;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.outcome == "invalid"));
        assert!(records[0].detail.contains("teleport"));
    }

    #[tokio::test]
    async fn test_uninitialized_sdk_rejects() {
        let scenario = "step,op\n1,getLastTransaction\n";
        let records = run(RuntimeMode::Generic, scenario).await;

        assert_eq!(records[0].outcome, "rejected");
        assert_eq!(records[0].code, "101");
    }

    #[tokio::test]
    async fn test_output_is_sorted_by_step() {
        let mut runner = ScenarioRunner::new(config(RuntimeMode::Generic));
        let scenario = "step,op\n2,isRunningInPos\n1,isRunningInPos\n";
        runner.process_csv(Cursor::new(scenario)).await.unwrap();

        let mut output = Vec::new();
        runner.write_output(&mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(
            output,
            "step,op,outcome,code,detail\n1,isRunningInPos,resolved,,false\n2,isRunningInPos,resolved,,false\n"
        );
    }
}
