use govready_deploy_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("設定エラー: {0}")]
    Configuration(#[from] ConfigError),

    #[error(
        "{tool} を利用できません: {reason}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • docker-compose（または docker compose プラグイン）がインストールされているか確認してください"
    )]
    ToolUnavailable { tool: String, reason: String },

    #[error(
        "ポート {} は既に使用されています\n\nヒント:\n  • ポートを使用しているプロセスやコンテナを停止してください\n  • 設定ファイルで別のポート番号を指定してください",
        format_ports(.ports)
    )]
    PortConflict { ports: Vec<u16> },

    #[error("コマンドが失敗しました（終了コード: {}）: {command}", format_code(.code))]
    Execution {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// エラー分類のラベル
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::ToolUnavailable { .. } => "ToolUnavailableError",
            Self::PortConflict { .. } => "PortConflictError",
            Self::Execution { .. } => "ExecutionError",
            Self::Io(_) => "IoError",
        }
    }
}

fn format_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "シグナルで終了".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_conflict_lists_every_port() {
        let err = DeployError::PortConflict {
            ports: vec![5432, 8443],
        };
        let message = err.to_string();
        assert!(message.contains("5432, 8443"));
        assert_eq!(err.kind(), "PortConflictError");
    }

    #[test]
    fn test_execution_error_message() {
        let err = DeployError::Execution {
            command: "docker-compose -f docker-compose.yaml up -d".to_string(),
            code: Some(1),
            stderr: String::new(),
        };
        let message = err.to_string();
        assert!(message.contains("終了コード: 1"));
        assert!(message.contains("docker-compose -f docker-compose.yaml up -d"));
    }

    #[test]
    fn test_configuration_error_keeps_key() {
        let err: DeployError = ConfigError::MissingKey {
            key: "HOST_ADDRESS".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("HOST_ADDRESS"));
    }
}
