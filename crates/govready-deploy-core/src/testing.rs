//! テスト用のエグゼキュータ
//!
//! 外部コマンドを実行せずに呼び出しを記録し、応答を差し替える。

use crate::command::{Environment, ExecOptions, ExecutionResult, Executor, ShellCommand};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// 記録された呼び出し
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub command: ShellCommand,
    pub environment: Environment,
    pub options: ExecOptions,
}

/// 呼び出しを記録するエグゼキュータ
///
/// 応答が登録されていないコマンドは空出力で成功する。
/// パターンはコマンド文字列の部分一致で、先に登録したものが優先される。
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<Vec<(String, ExecutionResult)>>,
    interrupts: Mutex<Vec<(String, CancellationToken)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// パターンに一致するコマンドの結果を登録
    pub fn respond(&self, pattern: &str, result: ExecutionResult) {
        lock(&self.responses).push((pattern.to_string(), result));
    }

    /// 標準出力付きで成功させる
    pub fn output_on(&self, pattern: &str, stdout: &str) {
        self.respond(
            pattern,
            ExecutionResult {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// 終了コード付きで失敗させる
    pub fn fail_on(&self, pattern: &str, code: i32) {
        self.respond(
            pattern,
            ExecutionResult {
                code: Some(code),
                stdout: String::new(),
                stderr: format!("exit status {}\n", code),
            },
        );
    }

    /// 一致したコマンドの実行中にトークンをキャンセルし、完了させない
    ///
    /// 最初に一致した1回だけ発火する（停止処理の同じコマンドは通常どおり完了する）。
    pub fn interrupt_on(&self, pattern: &str, token: CancellationToken) {
        lock(&self.interrupts).push((pattern.to_string(), token));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// 記録されたコマンド文字列
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| call.command.to_string())
            .collect()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(
        &self,
        command: &ShellCommand,
        env: &Environment,
        options: ExecOptions,
    ) -> Result<ExecutionResult> {
        let rendered = command.to_string();
        lock(&self.calls).push(RecordedCall {
            command: command.clone(),
            environment: env.clone(),
            options,
        });

        let interrupt = {
            let mut interrupts = lock(&self.interrupts);
            interrupts
                .iter()
                .position(|(pattern, _)| rendered.contains(pattern.as_str()))
                .map(|index| interrupts.remove(index).1)
        };
        if let Some(token) = interrupt {
            token.cancel();
            std::future::pending::<()>().await;
        }

        let response = lock(&self.responses)
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, result)| result.clone());

        Ok(response.unwrap_or(ExecutionResult {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }))
    }
}
