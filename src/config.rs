//! Bridge configuration.
//!
//! Loaded with the `config` crate: built-in defaults, then an optional
//! `config/pos-bridge.{toml,yaml,json}` file, then `POS_BRIDGE_*` environment
//! variables (`POS_BRIDGE_RUNTIME_MODE=dedicated`,
//! `POS_BRIDGE_SIM__STEP_DELAY_MS=5`, ...).

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Whether the host has integrated card-reading/printing hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Dedicated POS terminal with integrated reader, pinpad and printer.
    Dedicated,
    /// Phone or tablet that talks to an external pinpad.
    #[default]
    Generic,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Dedicated => "dedicated",
            RuntimeMode::Generic => "generic",
        }
    }
}

/// Channel names progress events are published on, per operation family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProgressChannels {
    pub make_transaction: String,
    pub void_transaction: String,
    pub capture_transaction: String,
    pub reverse_pending_transactions: String,
    pub send_receipt_mail: String,
    pub fetch_transactions_for_card: String,
    pub connect_to_pinpad: String,
    pub display_message_in_pinpad: String,
    pub print_in_pos_printer: String,
    pub mifare: String,
}

impl Default for ProgressChannels {
    fn default() -> Self {
        ProgressChannels {
            make_transaction: "MAKE_TRANSACTION_PROGRESS".into(),
            void_transaction: "VOID_TRANSACTION_PROGRESS".into(),
            capture_transaction: "CAPTURE_TRANSACTION_PROGRESS".into(),
            reverse_pending_transactions: "REVERSE_PENDING_TRANSACTIONS_PROGRESS".into(),
            send_receipt_mail: "SEND_TRANSACTION_RECEIPT_MAIL_PROGRESS".into(),
            fetch_transactions_for_card: "FETCH_TRANSACTION_FOR_CARD_PROGRESS".into(),
            connect_to_pinpad: "CONNECT_TO_PINPAD_PROGRESS".into(),
            display_message_in_pinpad: "DISPLAY_MESSAGE_IN_PINPAD_PROGRESS".into(),
            print_in_pos_printer: "PRINT_RECEIPT_IN_POS_PRINTER_PROGRESS".into(),
            mifare: "MIFARE_PROGRESS".into(),
        }
    }
}

/// Settings of the in-memory simulator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Pause between simulated hardware status changes.
    pub step_delay_ms: u64,
    /// Codes the simulated activation service accepts.
    pub known_codes: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            step_delay_ms: 20,
            known_codes: vec!["206192723".into(), "564019274".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    pub app_name: String,
    #[serde(default)]
    pub runtime_mode: RuntimeMode,
    #[serde(default)]
    pub progress: ProgressChannels,
    #[serde(default)]
    pub sim: SimConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            app_name: "pos-bridge".into(),
            runtime_mode: RuntimeMode::default(),
            progress: ProgressChannels::default(),
            sim: SimConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn with_runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None, None)
    }

    /// Loads from `file` (or `config/pos-bridge` when `None`) and either the
    /// process environment or, when given, `env_vars` as overrides.
    pub fn load_with_sources(
        file: Option<&Path>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config/pos-bridge").required(false),
        };

        let mut builder = ConfigLib::builder()
            .set_default("app_name", "pos-bridge")?
            .set_default("runtime_mode", "generic")?
            .add_source(file_source);

        // Explicit overrides keep tests independent of the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("POS_BRIDGE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sim.known_codes")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = BridgeConfig::load_with_sources(None, Some(HashMap::new())).unwrap();
        assert_eq!(config.app_name, "pos-bridge");
        assert_eq!(config.runtime_mode, RuntimeMode::Generic);
        assert_eq!(config.progress.make_transaction, "MAKE_TRANSACTION_PROGRESS");
        assert_eq!(config.sim, SimConfig::default());
    }

    #[test]
    fn test_overrides_win() {
        let mut vars = HashMap::new();
        vars.insert("runtime_mode".to_string(), "dedicated".to_string());
        vars.insert("app_name".to_string(), "Padaria".to_string());
        vars.insert("progress.mifare".to_string(), "CARD".to_string());

        let config = BridgeConfig::load_with_sources(None, Some(vars)).unwrap();
        assert_eq!(config.runtime_mode, RuntimeMode::Dedicated);
        assert_eq!(config.app_name, "Padaria");
        assert_eq!(config.progress.mifare, "CARD");
        assert_eq!(config.progress.void_transaction, "VOID_TRANSACTION_PROGRESS");
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "app_name = \"from-file\"\nruntime_mode = \"dedicated\"\n\n[sim]\nstep_delay_ms = 1\nknown_codes = [\"123\"]"
        )
        .unwrap();

        let config =
            BridgeConfig::load_with_sources(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.app_name, "from-file");
        assert_eq!(config.runtime_mode, RuntimeMode::Dedicated);
        assert_eq!(config.sim.step_delay_ms, 1);
        assert_eq!(config.sim.known_codes, vec!["123".to_string()]);
    }

    #[test]
    fn test_unknown_runtime_mode_is_an_error() {
        let mut vars = HashMap::new();
        vars.insert("runtime_mode".to_string(), "toaster".to_string());
        assert!(BridgeConfig::load_with_sources(None, Some(vars)).is_err());
    }
}
