//! 外部コマンドの実行
//!
//! 解決済みの設定を環境変数として渡し、標準出力を常に取得する。
//! `capture_output` が無効なら同時にコンソールへ流す（表示は副作用、取得は戻り値）。

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// 外部コマンドに渡す環境変数
pub type Environment = BTreeMap<String, String>;

/// 実行するコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// シェル用にエスケープ
pub fn shell_escape(s: &str) -> String {
    // シングルクォートでラップしてエスケープ
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// 必要な場合のみクォートする
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        s.to_string()
    } else {
        shell_escape(s)
    }
}

/// 実行オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// 出力を表示せずに取得だけ行う
    pub capture_output: bool,
    /// 実行前に渡す環境変数を表示する
    pub show_environment: bool,
}

impl ExecOptions {
    /// 出力をコンソールに流しつつ取得する
    pub fn display() -> Self {
        Self::default()
    }

    /// 出力を表示せずに取得する
    pub fn captured() -> Self {
        Self {
            capture_output: true,
            show_environment: false,
        }
    }

    pub fn with_environment(mut self) -> Self {
        self.show_environment = true;
        self
    }
}

/// コマンドの実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// 終了コード（シグナルで終了した場合は `None`）
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// コマンド実行のトレイト
#[async_trait]
pub trait Executor: Send + Sync {
    /// コマンドを実行し、終了コードに関わらず結果を返す
    async fn run(
        &self,
        command: &ShellCommand,
        env: &Environment,
        options: ExecOptions,
    ) -> Result<ExecutionResult>;

    /// コマンドを実行して標準出力を返す
    ///
    /// 非ゼロ終了は `DeployError::Execution` になる。
    async fn execute(
        &self,
        command: &ShellCommand,
        env: &Environment,
        options: ExecOptions,
    ) -> Result<String> {
        let result = self.run(command, env, options).await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(DeployError::Execution {
                command: command.to_string(),
                code: result.code,
                stderr: result.stderr,
            })
        }
    }
}

/// 子プロセスとしてコマンドを実行する
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    working_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 作業ディレクトリを指定（compose ファイルの置き場所）
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(
        &self,
        command: &ShellCommand,
        env: &Environment,
        options: ExecOptions,
    ) -> Result<ExecutionResult> {
        let display = !options.capture_output;

        if options.show_environment {
            print_environment(env);
        }
        if display {
            println!("  $ {}", command.to_string().dimmed());
        }
        tracing::debug!("Running: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 割り込みで実行中のFutureが破棄されたら子プロセスも止める
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout, stderr, status) = tokio::join!(
            collect_lines(stdout, display.then_some(Stream::Stdout)),
            collect_lines(stderr, display.then_some(Stream::Stderr)),
            child.wait(),
        );
        let status = status?;

        tracing::debug!("Finished: {} ({:?})", command, status.code());

        Ok(ExecutionResult {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// 行単位で読み取り、必要ならそのまま表示する
///
/// UTF-8 として不正なバイトは置換文字にして、EOF まで読み続ける。
async fn collect_lines<R>(reader: Option<R>, echo: Option<Stream>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(reader) = reader else {
        return collected;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read command output: {}", e);
                break;
            }
        }
        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end_matches(['\n', '\r']);
        match echo {
            Some(Stream::Stdout) => println!("{}", line),
            Some(Stream::Stderr) => eprintln!("{}", line),
            None => {}
        }
        collected.push_str(line);
        collected.push('\n');
    }
    collected
}

fn print_environment(env: &Environment) {
    println!("{}", "環境変数:".dimmed());
    for (key, value) in env {
        println!("  {}", format!("{}={}", key, value).dimmed());
    }
}
