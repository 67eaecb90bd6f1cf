//! ログ出力からの初期管理者アカウント抽出

use regex::Regex;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

static ADMIN_ACCOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)created administrator account \(username: ([^)\s]+)\) with password: ([a-zA-Z0-9#?!@$%^&*-]+)",
    )
    .expect("管理者アカウントの正規表現")
});

/// 初回起動時にアプリケーションが生成した管理者アカウント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCredentials {
    pub username: String,
    pub password: String,
}

/// ログから生成された管理者アカウントを取り出す
///
/// 最初に一致した行を使う。一致しなければ `None`。
pub fn extract_generated_credentials(log: &str) -> Option<GeneratedCredentials> {
    let captures = ADMIN_ACCOUNT_PATTERN.captures(log)?;
    Some(GeneratedCredentials {
        username: captures[1].to_string(),
        password: captures[2].to_string(),
    })
}

/// 認証情報を1回の実行で一度だけ表示するためのガード
#[derive(Debug, Default)]
pub struct OneTimeDisclosure {
    disclosed: AtomicBool,
}

impl OneTimeDisclosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// まだ開示していなければログから抽出して返す
    pub fn take(&self, log: &str) -> Option<GeneratedCredentials> {
        if self.disclosed.load(Ordering::SeqCst) {
            return None;
        }
        let credentials = extract_generated_credentials(log)?;
        if self.disclosed.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(credentials)
    }

    pub fn is_disclosed(&self) -> bool {
        self.disclosed.load(Ordering::SeqCst)
    }
}
