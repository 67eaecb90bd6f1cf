//! 設定ファイルの探索と読み込み

use crate::error::{ConfigError, Result};
use crate::resolver::ConfigResolver;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "GOVREADY_DEPLOY_CONFIG";

const CANDIDATES: [&str; 4] = [
    "configuration.local.json",
    "configuration.json",
    "configuration.local.yaml",
    "configuration.yaml",
];

/// グローバル設定ディレクトリ (~/.config/govready-deploy)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("govready-deploy"))
}

/// デプロイ設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 GOVREADY_DEPLOY_CONFIG (直接パス指定)
/// 2. カレントディレクトリ: configuration.local.json, configuration.json,
///    configuration.local.yaml, configuration.yaml
/// 3. ~/.config/govready-deploy/configuration.json (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. グローバル設定ファイル
    if let Some(config_dir) = get_config_dir() {
        let global_config = config_dir.join("configuration.json");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 設定ファイルを読み込んで設定バッグを作る
///
/// 拡張子が `.yaml` / `.yml` の場合はYAML、それ以外はJSONとして扱う。
pub fn load_config_file(path: &Path) -> Result<ConfigResolver> {
    let content = std::fs::read_to_string(path)?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let document: Value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    match document {
        Value::Object(values) => {
            tracing::debug!("Loaded {} keys from {}", values.len(), path.display());
            Ok(ConfigResolver::from_map(values))
        }
        // 空のYAMLファイルは空の設定として扱う
        Value::Null => Ok(ConfigResolver::new()),
        _ => Err(ConfigError::InvalidDocument {
            path: path.to_path_buf(),
        }),
    }
}
