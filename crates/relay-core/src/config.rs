//! The enumerated, typed configuration registry.
//!
//! Every entry the relay reads from its environment is declared once in
//! [`CONFIG_ENTRIES`] with a type, an optional default, the operating modes in
//! which it is required, and whether it is sensitive (and therefore masked on
//! export). [`RelayConfig::resolve`] walks that table exactly once at process
//! start; the result is frozen behind [`RelayConfig::init`]/[`RelayConfig::global`]
//! for the remainder of the process lifetime.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueType {
    String,
    Number,
    Boolean,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigEntrySpec {
    pub key: &'static str,
    pub value_type: ConfigValueType,
    pub default: Option<&'static str>,
    pub required_in_modes: &'static [OperatingMode],
    pub sensitive: bool,
}

/// The process-wide enumerated configuration surface (§6 of the spec).
pub static CONFIG_ENTRIES: &[ConfigEntrySpec] = &[
    ConfigEntrySpec {
        key: "CHAIN_ID",
        value_type: ConfigValueType::String,
        default: None,
        required_in_modes: &[OperatingMode::ReadWrite, OperatingMode::ReadOnly],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "HEDERA_NETWORK",
        value_type: ConfigValueType::String,
        default: None,
        required_in_modes: &[OperatingMode::ReadWrite, OperatingMode::ReadOnly],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "OPERATOR_ID_MAIN",
        value_type: ConfigValueType::String,
        default: None,
        required_in_modes: &[OperatingMode::ReadWrite],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "OPERATOR_KEY_MAIN",
        value_type: ConfigValueType::String,
        default: None,
        required_in_modes: &[OperatingMode::ReadWrite],
        sensitive: true,
    },
    ConfigEntrySpec {
        key: "READ_ONLY",
        value_type: ConfigValueType::Boolean,
        default: Some("false"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "FILE_APPEND_MAX_CHUNKS",
        value_type: ConfigValueType::Number,
        default: Some("20"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "FILE_APPEND_CHUNK_SIZE",
        value_type: ConfigValueType::Number,
        default: Some("4096"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "JUMBO_TX_ENABLED",
        value_type: ConfigValueType::Boolean,
        default: Some("false"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "MAX_GAS_ALLOWANCE_HBAR",
        value_type: ConfigValueType::Number,
        default: Some("0"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "CONSENSUS_MAX_EXECUTION_TIME",
        value_type: ConfigValueType::Number,
        default: Some("15000"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "FEE_HISTORY_MAX_RESULTS",
        value_type: ConfigValueType::Number,
        default: Some("10"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "ETH_FEE_HISTORY_FIXED",
        value_type: ConfigValueType::Boolean,
        default: Some("true"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "FILTER_API_ENABLED",
        value_type: ConfigValueType::Boolean,
        default: Some("true"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "WS_POLLING_INTERVAL",
        value_type: ConfigValueType::Number,
        default: Some("500"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "WS_NEW_HEADS_ENABLED",
        value_type: ConfigValueType::Boolean,
        default: Some("true"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "CACHE_TTL",
        value_type: ConfigValueType::Number,
        default: Some("1000"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "IP_RATE_LIMIT_STORE",
        value_type: ConfigValueType::String,
        default: Some("internal"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "RATE_LIMIT_DISABLED",
        value_type: ConfigValueType::Boolean,
        default: Some("false"),
        required_in_modes: &[],
        sensitive: false,
    },
    ConfigEntrySpec {
        key: "SHARED_STORE_URL",
        value_type: ConfigValueType::String,
        default: None,
        required_in_modes: &[],
        sensitive: true,
    },
    ConfigEntrySpec {
        key: "MAX_SUBSCRIPTIONS_PER_CONNECTION",
        value_type: ConfigValueType::Number,
        default: Some("10"),
        required_in_modes: &[],
        sensitive: false,
    },
];

fn find_entry(key: &str) -> Option<&'static ConfigEntrySpec> {
    CONFIG_ENTRIES.iter().find(|entry| entry.key == key)
}

/// Reads one entry's raw string value out of `raw`, applying its default and
/// required-ness rule for `mode`. Does not yet interpret the declared type.
fn resolve_raw(
    raw: &HashMap<String, String>,
    spec: &ConfigEntrySpec,
    mode: OperatingMode,
) -> Result<Option<String>, ConfigError> {
    if let Some(value) = raw.get(spec.key) {
        return Ok(Some(value.clone()));
    }
    if let Some(default) = spec.default {
        return Ok(Some(default.to_string()));
    }
    if spec.required_in_modes.contains(&mode) {
        return Err(ConfigError::MissingRequiredKey(spec.key));
    }
    Ok(None)
}

fn parse_bool(spec: &ConfigEntrySpec, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: spec.key,
            reason: format!("expected boolean, got {other}"),
        }),
    }
}

fn parse_number(spec: &ConfigEntrySpec, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key: spec.key,
        reason: format!("expected a non-negative integer, got {value}"),
    })
}

/// `CHAIN_ID` canonicalization (§8, scenario 1): decimal integer in → `0x`
/// lowercase hex; `0x`-prefixed hex in → lowercase-hex passthrough;
/// anything else → the literal string `0xNaN`, preserved verbatim downstream.
pub fn canonicalize_chain_id(raw: &str) -> String {
    if let Some(hex_digits) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if !hex_digits.is_empty() && hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return format!("0x{}", hex_digits.to_ascii_lowercase());
        }
        return "0xNaN".to_string();
    }
    match raw.parse::<u64>() {
        Ok(value) => format!("0x{value:x}"),
        Err(_) => "0xNaN".to_string(),
    }
}

#[derive(Clone)]
pub struct RelayConfig {
    pub chain_id: String,
    pub hedera_network: String,
    pub operator_id_main: Option<String>,
    operator_key_main: Option<String>,
    pub read_only: bool,
    pub file_append_max_chunks: u64,
    pub file_append_chunk_size: u64,
    pub jumbo_tx_enabled: bool,
    pub max_gas_allowance_hbar: u64,
    pub consensus_max_execution_time_ms: u64,
    pub fee_history_max_results: u64,
    pub eth_fee_history_fixed: bool,
    pub filter_api_enabled: bool,
    pub ws_polling_interval_ms: u64,
    pub ws_new_heads_enabled: bool,
    pub cache_ttl_ms: u64,
    pub ip_rate_limit_store_shared: bool,
    pub rate_limit_disabled: bool,
    shared_store_url: Option<String>,
    pub max_subscriptions_per_connection: u64,
}

impl RelayConfig {
    pub fn operator_key_main(&self) -> Option<&str> {
        self.operator_key_main.as_deref()
    }

    pub fn shared_store_url(&self) -> Option<&str> {
        self.shared_store_url.as_deref()
    }

    /// Resolves the whole registry against a raw key/value snapshot (the
    /// out-of-scope environment-file loading hands this crate a plain map).
    pub fn resolve(raw: &HashMap<String, String>) -> Result<Self, ConfigError> {
        // READ_ONLY gates which other entries are required, so it is resolved first.
        let read_only_spec =
            find_entry("READ_ONLY").expect("READ_ONLY is declared in CONFIG_ENTRIES");
        let read_only = parse_bool(
            read_only_spec,
            &resolve_raw(raw, read_only_spec, OperatingMode::ReadWrite)?
                .unwrap_or_else(|| "false".to_string()),
        )?;
        let mode = if read_only {
            OperatingMode::ReadOnly
        } else {
            OperatingMode::ReadWrite
        };

        let chain_id_spec = find_entry("CHAIN_ID").expect("declared");
        let chain_id_raw = resolve_raw(raw, chain_id_spec, mode)?
            .ok_or(ConfigError::MissingRequiredKey("CHAIN_ID"))?;
        let chain_id = canonicalize_chain_id(&chain_id_raw);

        let hedera_network = resolve_raw(raw, find_entry("HEDERA_NETWORK").expect("declared"), mode)?
            .ok_or(ConfigError::MissingRequiredKey("HEDERA_NETWORK"))?;

        let operator_id_main =
            resolve_raw(raw, find_entry("OPERATOR_ID_MAIN").expect("declared"), mode)?;
        let operator_key_main =
            resolve_raw(raw, find_entry("OPERATOR_KEY_MAIN").expect("declared"), mode)?;

        let file_append_max_chunks = parse_number(
            find_entry("FILE_APPEND_MAX_CHUNKS").expect("declared"),
            &resolve_raw(raw, find_entry("FILE_APPEND_MAX_CHUNKS").expect("declared"), mode)?
                .expect("has default"),
        )?;
        let file_append_chunk_size = parse_number(
            find_entry("FILE_APPEND_CHUNK_SIZE").expect("declared"),
            &resolve_raw(raw, find_entry("FILE_APPEND_CHUNK_SIZE").expect("declared"), mode)?
                .expect("has default"),
        )?;
        let jumbo_spec = find_entry("JUMBO_TX_ENABLED").expect("declared");
        let jumbo_tx_enabled = parse_bool(
            jumbo_spec,
            &resolve_raw(raw, jumbo_spec, mode)?.expect("has default"),
        )?;
        let max_gas_allowance_hbar = parse_number(
            find_entry("MAX_GAS_ALLOWANCE_HBAR").expect("declared"),
            &resolve_raw(raw, find_entry("MAX_GAS_ALLOWANCE_HBAR").expect("declared"), mode)?
                .expect("has default"),
        )?;
        let consensus_max_execution_time_ms = parse_number(
            find_entry("CONSENSUS_MAX_EXECUTION_TIME").expect("declared"),
            &resolve_raw(
                raw,
                find_entry("CONSENSUS_MAX_EXECUTION_TIME").expect("declared"),
                mode,
            )?
            .expect("has default"),
        )?;
        let fee_history_max_results = parse_number(
            find_entry("FEE_HISTORY_MAX_RESULTS").expect("declared"),
            &resolve_raw(raw, find_entry("FEE_HISTORY_MAX_RESULTS").expect("declared"), mode)?
                .expect("has default"),
        )?;
        let eth_fee_history_fixed_spec = find_entry("ETH_FEE_HISTORY_FIXED").expect("declared");
        let eth_fee_history_fixed = parse_bool(
            eth_fee_history_fixed_spec,
            &resolve_raw(raw, eth_fee_history_fixed_spec, mode)?.expect("has default"),
        )?;
        let filter_api_spec = find_entry("FILTER_API_ENABLED").expect("declared");
        let filter_api_enabled = parse_bool(
            filter_api_spec,
            &resolve_raw(raw, filter_api_spec, mode)?.expect("has default"),
        )?;
        let ws_polling_interval_ms = parse_number(
            find_entry("WS_POLLING_INTERVAL").expect("declared"),
            &resolve_raw(raw, find_entry("WS_POLLING_INTERVAL").expect("declared"), mode)?
                .expect("has default"),
        )?;
        let ws_new_heads_spec = find_entry("WS_NEW_HEADS_ENABLED").expect("declared");
        let ws_new_heads_enabled = parse_bool(
            ws_new_heads_spec,
            &resolve_raw(raw, ws_new_heads_spec, mode)?.expect("has default"),
        )?;
        let cache_ttl_ms = parse_number(
            find_entry("CACHE_TTL").expect("declared"),
            &resolve_raw(raw, find_entry("CACHE_TTL").expect("declared"), mode)?.expect("has default"),
        )?;
        let ip_rate_limit_store_raw =
            resolve_raw(raw, find_entry("IP_RATE_LIMIT_STORE").expect("declared"), mode)?
                .expect("has default");
        let ip_rate_limit_store_shared = match ip_rate_limit_store_raw.as_str() {
            "shared" => true,
            "internal" => false,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "IP_RATE_LIMIT_STORE",
                    reason: format!("expected internal|shared, got {other}"),
                });
            }
        };
        let rate_limit_disabled_spec = find_entry("RATE_LIMIT_DISABLED").expect("declared");
        let rate_limit_disabled = parse_bool(
            rate_limit_disabled_spec,
            &resolve_raw(raw, rate_limit_disabled_spec, mode)?.expect("has default"),
        )?;
        let shared_store_url =
            resolve_raw(raw, find_entry("SHARED_STORE_URL").expect("declared"), mode)?;
        let max_subscriptions_per_connection = parse_number(
            find_entry("MAX_SUBSCRIPTIONS_PER_CONNECTION").expect("declared"),
            &resolve_raw(
                raw,
                find_entry("MAX_SUBSCRIPTIONS_PER_CONNECTION").expect("declared"),
                mode,
            )?
            .expect("has default"),
        )?;

        Ok(RelayConfig {
            chain_id,
            hedera_network,
            operator_id_main,
            operator_key_main,
            read_only,
            file_append_max_chunks,
            file_append_chunk_size,
            jumbo_tx_enabled,
            max_gas_allowance_hbar,
            consensus_max_execution_time_ms,
            fee_history_max_results,
            eth_fee_history_fixed,
            filter_api_enabled,
            ws_polling_interval_ms,
            ws_new_heads_enabled,
            cache_ttl_ms,
            ip_rate_limit_store_shared,
            rate_limit_disabled,
            shared_store_url,
            max_subscriptions_per_connection,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&raw)
    }

    /// Renders every declared entry with sensitive values masked; used for
    /// diagnostics only, never for anything the dispatcher reads back.
    pub fn masked_snapshot(&self, raw: &HashMap<String, String>) -> HashMap<&'static str, String> {
        CONFIG_ENTRIES
            .iter()
            .filter_map(|entry| {
                let value = raw.get(entry.key).cloned().or(entry.default.map(str::to_string))?;
                Some((
                    entry.key,
                    if entry.sensitive {
                        "***".to_string()
                    } else {
                        value
                    },
                ))
            })
            .collect()
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("chain_id", &self.chain_id)
            .field("hedera_network", &self.hedera_network)
            .field("operator_id_main", &self.operator_id_main)
            .field("operator_key_main", &self.operator_key_main.as_ref().map(|_| "***"))
            .field("read_only", &self.read_only)
            .field("shared_store_url", &self.shared_store_url.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

static GLOBAL_CONFIG: OnceCell<RelayConfig> = OnceCell::new();

impl RelayConfig {
    /// Freezes `self` as the process-wide configuration. Fails if called twice.
    pub fn init(self) -> Result<(), RelayConfig> {
        GLOBAL_CONFIG.set(self)
    }

    pub fn global() -> &'static RelayConfig {
        GLOBAL_CONFIG
            .get()
            .expect("RelayConfig::init must run before RelayConfig::global is used")
    }

    #[cfg(test)]
    pub fn reset_for_test() {
        // `OnceCell` has no public clear; tests instead build their own
        // `RelayConfig` and pass it around explicitly rather than touching
        // the process singleton.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("CHAIN_ID".to_string(), "298".to_string());
        env.insert("HEDERA_NETWORK".to_string(), "testnet".to_string());
        env.insert("READ_ONLY".to_string(), "true".to_string());
        env
    }

    #[test]
    fn chain_id_canonicalizes_decimal() {
        assert_eq!(canonicalize_chain_id("298"), "0x12a");
    }

    #[test]
    fn chain_id_canonicalizes_hex_passthrough() {
        assert_eq!(canonicalize_chain_id("0x12A"), "0x12a");
    }

    #[test]
    fn chain_id_rejects_non_numeric() {
        assert_eq!(canonicalize_chain_id("0xhedera"), "0xNaN");
        assert_eq!(canonicalize_chain_id("hedera"), "0xNaN");
    }

    #[test]
    fn read_only_relaxes_operator_key_requirement() {
        let env = base_env();
        let config = RelayConfig::resolve(&env).expect("read-only config should resolve");
        assert!(config.read_only);
        assert_eq!(config.operator_key_main(), None);
    }

    #[test]
    fn read_write_requires_operator_key() {
        let mut env = base_env();
        env.insert("READ_ONLY".to_string(), "false".to_string());
        let err = RelayConfig::resolve(&env).expect_err("missing operator key should fail");
        assert!(matches!(
            err,
            ConfigError::MissingRequiredKey("OPERATOR_KEY_MAIN")
        ));
    }

    #[test]
    fn masked_snapshot_redacts_sensitive_entries() {
        let mut env = base_env();
        env.insert("READ_ONLY".to_string(), "false".to_string());
        env.insert("OPERATOR_ID_MAIN".to_string(), "0.0.1001".to_string());
        env.insert("OPERATOR_KEY_MAIN".to_string(), "302e0201...".to_string());
        let config = RelayConfig::resolve(&env).expect("config should resolve");
        let snapshot = config.masked_snapshot(&env);
        assert_eq!(snapshot.get("OPERATOR_KEY_MAIN"), Some(&"***".to_string()));
        assert_eq!(
            snapshot.get("OPERATOR_ID_MAIN"),
            Some(&"0.0.1001".to_string())
        );
    }
}
