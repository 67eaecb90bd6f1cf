/// スタック停止時の後片付けの範囲
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeardownMode {
    /// コンテナのみ停止し、イメージと孤立コンテナは残す
    #[default]
    Preserve,
    /// 孤立コンテナとビルドしたイメージもすべて削除する
    Destroy,
}

const DESTRUCTIVE_SUFFIX: [&str; 3] = ["--remove-orphans", "--rmi", "all"];

impl TeardownMode {
    /// PERSIST_STACK の値から決める
    pub fn from_persist_stack(persist: bool) -> Self {
        if persist { Self::Preserve } else { Self::Destroy }
    }

    /// 停止コマンドに付ける引数
    pub fn suffix(&self) -> &'static [&'static str] {
        match self {
            Self::Preserve => &[],
            Self::Destroy => &DESTRUCTIVE_SUFFIX,
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Destroy)
    }
}
