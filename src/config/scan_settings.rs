// ==========================================
// 出库扫码匹配系统 - 扫码运行参数
// ==========================================
// 来源: config_kv (global) + 默认值
// 格式错误的配置值记录警告后回退默认值
// ==========================================

use crate::config::config_manager::{config_keys, ConfigManager};
use crate::domain::types::{PriorityStrategy, SkuPreference};
use crate::engine::matcher::MatchPolicy;
use crate::repository::error::RepositoryResult;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_NOTIFIER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSettings {
    pub notify_timeout: Duration,
    pub debounce: Duration,
    pub ignore_tracking_labels: bool,
    pub policy: MatchPolicy,
    pub label_dir: PathBuf,
    pub print_command: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            notify_timeout: Duration::from_millis(DEFAULT_NOTIFIER_TIMEOUT_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            ignore_tracking_labels: true,
            policy: MatchPolicy::default(),
            label_dir: default_label_dir(),
            print_command: Vec::new(),
        }
    }
}

/// 默认面单目录: <数据目录>/shipment-scan-matcher/labels
pub fn default_label_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shipment-scan-matcher")
        .join("labels")
}

impl ScanSettings {
    /// 从配置表加载
    pub fn load(config: &ConfigManager) -> RepositoryResult<Self> {
        let defaults = Self::default();

        let notify_timeout_ms = parse_or(
            config,
            config_keys::NOTIFIER_TIMEOUT_MS,
            DEFAULT_NOTIFIER_TIMEOUT_MS,
            |v| v.parse::<u64>().ok().filter(|&ms| ms > 0),
        )?;
        let debounce_ms = parse_or(
            config,
            config_keys::SCAN_DEBOUNCE_MS,
            DEFAULT_DEBOUNCE_MS,
            |v| v.parse::<u64>().ok(),
        )?;
        let ignore_tracking_labels = parse_or(
            config,
            config_keys::SCAN_IGNORE_TRACKING_LABELS,
            defaults.ignore_tracking_labels,
            parse_bool,
        )?;
        let strategy = parse_or(
            config,
            config_keys::MATCH_STRATEGY,
            PriorityStrategy::default(),
            |v| PriorityStrategy::from_str(v).ok(),
        )?;
        let sku_preference = parse_or(
            config,
            config_keys::MATCH_SKU_PREFERENCE,
            SkuPreference::default(),
            |v| SkuPreference::from_str(v).ok(),
        )?;
        let pinned = parse_or(config, config_keys::MATCH_PINNED, BTreeSet::new(), |v| {
            serde_json::from_str::<BTreeSet<String>>(v).ok()
        })?;
        let label_dir = match config.get_global_config_value(config_keys::LABEL_DIR)? {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => defaults.label_dir,
        };
        let print_command = parse_or(config, config_keys::LABEL_PRINT_COMMAND, Vec::new(), |v| {
            serde_json::from_str::<Vec<String>>(v).ok()
        })?;

        Ok(Self {
            notify_timeout: Duration::from_millis(notify_timeout_ms),
            debounce: Duration::from_millis(debounce_ms),
            ignore_tracking_labels,
            policy: MatchPolicy {
                strategy,
                sku_preference,
                pinned,
            },
            label_dir,
            print_command,
        })
    }

    /// 校验待写入的配置值
    ///
    /// # 返回
    /// - Err(String): 未知键或值格式错误
    pub fn validate(key: &str, value: &str) -> Result<(), String> {
        let ok = match key {
            config_keys::NOTIFIER_TIMEOUT_MS => value.parse::<u64>().map(|ms| ms > 0).unwrap_or(false),
            config_keys::SCAN_DEBOUNCE_MS => value.parse::<u64>().is_ok(),
            config_keys::SCAN_IGNORE_TRACKING_LABELS => parse_bool(value).is_some(),
            config_keys::MATCH_STRATEGY => PriorityStrategy::from_str(value).is_ok(),
            config_keys::MATCH_SKU_PREFERENCE => SkuPreference::from_str(value).is_ok(),
            config_keys::MATCH_PINNED => serde_json::from_str::<BTreeSet<String>>(value).is_ok(),
            config_keys::LABEL_DIR => !value.trim().is_empty(),
            config_keys::LABEL_PRINT_COMMAND => {
                serde_json::from_str::<Vec<String>>(value).is_ok()
            }
            _ => return Err(format!("未知配置键: {}", key)),
        };

        if ok {
            Ok(())
        } else {
            Err(format!("配置值格式错误: {}={}", key, value))
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(
    config: &ConfigManager,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> RepositoryResult<T> {
    let Some(raw) = config.get_global_config_value(key)? else {
        return Ok(default);
    };

    match parse(raw.trim()) {
        Some(value) => Ok(value),
        None => {
            tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = ScanSettings::load(&manager()).unwrap();
        assert_eq!(settings.notify_timeout, Duration::from_secs(10));
        assert_eq!(settings.debounce, Duration::from_millis(500));
        assert!(settings.ignore_tracking_labels);
        assert_eq!(settings.policy, MatchPolicy::default());
        assert!(settings.print_command.is_empty());
    }

    #[test]
    fn test_load_overrides() {
        let config = manager();
        config
            .set_global_config_value(config_keys::MATCH_STRATEGY, "large_first")
            .unwrap();
        config
            .set_global_config_value(config_keys::MATCH_PINNED, r#"["T9","T3"]"#)
            .unwrap();
        config
            .set_global_config_value(config_keys::MATCH_SKU_PREFERENCE, "single_first")
            .unwrap();
        config
            .set_global_config_value(config_keys::SCAN_DEBOUNCE_MS, "0")
            .unwrap();
        config
            .set_global_config_value(config_keys::LABEL_PRINT_COMMAND, r#"["lp","-d","zebra"]"#)
            .unwrap();

        let settings = ScanSettings::load(&config).unwrap();
        assert_eq!(settings.policy.strategy, PriorityStrategy::LargeFirst);
        assert!(settings.policy.pinned.contains("T3"));
        assert_eq!(settings.policy.sku_preference, SkuPreference::SingleFirst);
        assert_eq!(settings.debounce, Duration::ZERO);
        assert_eq!(settings.print_command, vec!["lp", "-d", "zebra"]);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let config = manager();
        config
            .set_global_config_value(config_keys::NOTIFIER_TIMEOUT_MS, "soon")
            .unwrap();
        let settings = ScanSettings::load(&config).unwrap();
        assert_eq!(settings.notify_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate() {
        assert!(ScanSettings::validate(config_keys::SCAN_IGNORE_TRACKING_LABELS, "false").is_ok());
        assert!(ScanSettings::validate(config_keys::NOTIFIER_TIMEOUT_MS, "0").is_err());
        assert!(ScanSettings::validate(config_keys::MATCH_PINNED, "T1").is_err());
        assert!(ScanSettings::validate(config_keys::MATCH_SKU_PREFERENCE, "combo_first").is_ok());
        assert!(ScanSettings::validate(config_keys::MATCH_SKU_PREFERENCE, "both").is_err());
        assert!(ScanSettings::validate("unknown.key", "1").is_err());
    }
}
