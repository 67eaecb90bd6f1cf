//! 動的な設定値のヘルパー

use serde_json::Value;

/// 値が「真」かどうか
///
/// null / false / 0 / 空文字列 / 空配列 / 空マップ は偽とみなす。
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// 環境変数として渡すための文字列表現
///
/// null は環境変数に出力しないため `None` を返す。
pub fn to_env_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// `--set` で渡された値をパース
///
/// JSONとして解釈できればその型を使い、できなければ文字列のまま扱う。
pub fn parse_override_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
