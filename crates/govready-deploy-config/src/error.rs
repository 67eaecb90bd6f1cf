use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "必須の設定キー '{key}' が設定されていません\n\nヒント:\n  • configuration.json に \"{key}\" を追加してください\n  • または --set {key}=<値> で指定してください"
    )]
    MissingKey { key: String },

    #[error(
        "HOST_ADDRESS にURIは指定できません。ドメインのみを指定してください（プロトコルやパスは不要）: {value}"
    )]
    InvalidHostAddress { value: String },

    #[error("設定キー '{key}' の値が不正です: {message}")]
    InvalidValue { key: String, message: String },

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: configuration.local.json, configuration.json, configuration.local.yaml, configuration.yaml\n\
        - ~/.config/govready-deploy/configuration.json\n\
        または GOVREADY_DEPLOY_CONFIG 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("設定ファイルのルートはマッピングである必要があります: {path}")]
    InvalidDocument { path: PathBuf },

    #[error("上書き指定の形式が不正です（KEY=VALUE 形式で指定してください）: {0}")]
    InvalidOverride(String),

    #[error("JSON パースエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML パースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// エラーの原因となった設定キー（あれば）
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::MissingKey { key } | Self::InvalidValue { key, .. } => Some(key),
            Self::InvalidHostAddress { .. } => Some(crate::keys::HOST_ADDRESS),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
