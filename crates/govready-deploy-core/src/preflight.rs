//! デプロイ前チェック
//!
//! 外部ツールの有無と、スタックがバインドするポートの空きを確認する。

use crate::command::{Environment, ExecOptions, Executor, ShellCommand};
use crate::error::{DeployError, Result};
use std::net::TcpListener;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// compose 互換のコマンドラインツール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeTool {
    program: String,
    base_args: Vec<String>,
}

impl ComposeTool {
    /// スタンドアロンの `docker-compose`
    pub fn standalone() -> Self {
        Self {
            program: "docker-compose".to_string(),
            base_args: Vec::new(),
        }
    }

    /// Docker CLI プラグインの `docker compose`
    pub fn plugin() -> Self {
        Self {
            program: "docker".to_string(),
            base_args: vec!["compose".to_string()],
        }
    }

    /// 表示用の名前
    pub fn name(&self) -> String {
        self.command().to_string()
    }

    /// サブコマンドを付ける前のベースコマンド
    pub fn command(&self) -> ShellCommand {
        ShellCommand::new(&self.program).args(&self.base_args)
    }

    /// `-f <file>` 付きのベースコマンド
    pub fn with_file(&self, compose_file: &str) -> ShellCommand {
        self.command().arg("-f").arg(compose_file)
    }
}

/// ツールが実行可能かを確認する
pub async fn check_tool_available(executor: &dyn Executor, tool: &ComposeTool) -> Result<()> {
    let probe = tool.command().arg("version");
    match executor
        .run(&probe, &Environment::new(), ExecOptions::captured())
        .await
    {
        Ok(result) if result.success() => {
            debug!("{} is available", tool.name());
            Ok(())
        }
        Ok(result) => Err(DeployError::ToolUnavailable {
            tool: tool.name(),
            reason: first_line_or(&result.stderr, "バージョン確認に失敗しました"),
        }),
        Err(DeployError::Io(e)) => Err(DeployError::ToolUnavailable {
            tool: tool.name(),
            reason: format!("コマンドを実行できません: {}", e),
        }),
        Err(e) => Err(e),
    }
}

/// 利用可能な compose ツールを検出する
///
/// `docker-compose` を優先し、無ければ `docker compose` を試す。
pub async fn detect_compose_tool(executor: &dyn Executor) -> Result<ComposeTool> {
    let standalone = ComposeTool::standalone();
    match check_tool_available(executor, &standalone).await {
        Ok(()) => return Ok(standalone),
        Err(e) => debug!("{}", e),
    }

    let plugin = ComposeTool::plugin();
    check_tool_available(executor, &plugin).await?;
    Ok(plugin)
}

/// Docker デーモンが応答するかを確認する
pub async fn check_daemon_running(executor: &dyn Executor) -> Result<()> {
    let probe = ShellCommand::new("docker").arg("info");
    let unavailable = |reason: String| DeployError::ToolUnavailable {
        tool: "docker".to_string(),
        reason,
    };

    match executor
        .run(&probe, &Environment::new(), ExecOptions::captured())
        .await
    {
        Ok(result) if result.success() => Ok(()),
        Ok(result) => Err(unavailable(first_line_or(
            &result.stderr,
            "Docker デーモンに接続できません",
        ))),
        Err(DeployError::Io(e)) => Err(unavailable(format!("コマンドを実行できません: {}", e))),
        Err(e) => Err(e),
    }
}

fn first_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// デプロイがバインドするポート（登録順、重複なし）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPorts {
    ports: Vec<u16>,
}

impl RequiredPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, port: u16) {
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
    }

    pub fn extend(&mut self, ports: impl IntoIterator<Item = u16>) {
        for port in ports {
            self.push(port);
        }
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }
}

impl FromIterator<u16> for RequiredPorts {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut ports = Self::new();
        ports.extend(iter);
        ports
    }
}

/// すべての必要ポートが空いているかを確認する
///
/// 使用中のポートは一度にまとめて報告する。
pub async fn check_ports(ports: &RequiredPorts) -> Result<()> {
    check_ports_with(ports, is_port_in_use).await
}

/// ポートの使用判定を差し替えて確認する
pub async fn check_ports_with<F>(ports: &RequiredPorts, in_use: F) -> Result<()>
where
    F: Fn(u16) -> bool,
{
    let conflicts: Vec<u16> = ports
        .as_slice()
        .iter()
        .copied()
        .filter(|port| in_use(*port))
        .collect();

    if conflicts.is_empty() {
        info!("Required ports are free: {:?}", ports.as_slice());
        return Ok(());
    }

    for &port in &conflicts {
        match listening_pids(port).await.as_slice() {
            [] => warn!("Port {} is in use", port),
            pids => warn!("Port {} is in use by PID {:?}", port, pids),
        }
    }

    Err(DeployError::PortConflict { ports: conflicts })
}

/// ポートが他のプロセスにバインドされているか
///
/// bind はブロックしないので同期で判定する。
pub fn is_port_in_use(port: u16) -> bool {
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(_) => false,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => true,
        Err(e) => {
            // 特権ポートなど判定できない場合は空きとみなす
            debug!("Could not probe port {}: {}", port, e);
            false
        }
    }
}

/// ポートで待ち受けているプロセスのPID（診断用、取得できなければ空）
async fn listening_pids(port: u16) -> Vec<u32> {
    let output = Command::new("lsof")
        .args(["-nP", "-t", "-sTCP:LISTEN"])
        .arg(format!("-iTCP:{}", port))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            debug!("lsof is not available: {}", e);
            return Vec::new();
        }
    };

    let mut pids: Vec<u32> = String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .filter_map(|pid| pid.parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}
