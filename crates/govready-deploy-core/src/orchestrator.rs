//! デプロイのライフサイクル
//!
//! ```text
//! NotStarted -> PreflightChecking -> Resolving -> Executing -> Completed
//!                      |                 |            |
//!                      +-----------------+------------+-> Failed / Interrupted
//! ```
//!
//! 終端状態に入ったら対応するフックを一度だけ呼ぶ。

use crate::command::{Environment, ExecOptions, Executor, ShellCommand};
use crate::error::{DeployError, Result};
use crate::preflight::{
    ComposeTool, RequiredPorts, check_daemon_running, check_ports_with, detect_compose_tool,
    is_port_in_use,
};
use crate::teardown::TeardownMode;
use async_trait::async_trait;
use govready_deploy_config::ConfigResolver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    PreflightChecking,
    Resolving,
    Executing,
    Completed,
    Failed,
    Interrupted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }
}

/// 実行の結末
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    Interrupted,
}

impl From<Outcome> for RunState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => Self::Completed,
            Outcome::Failed => Self::Failed,
            Outcome::Interrupted => Self::Interrupted,
        }
    }
}

/// 実行結果のレポート
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    /// 失敗の原因（`Outcome::Failed` のときのみ）
    pub error: Option<DeployError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

/// 解決パスの結果として組み立てるコマンド列
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub teardown: TeardownMode,
    /// ポート確認の前に実行する準備コマンド（前回のスタックの停止など）
    pub prepare: Vec<ShellCommand>,
    /// 主コマンド
    pub primary: ShellCommand,
}

/// フックに渡す実行時の情報
pub struct HookContext<'a> {
    executor: &'a dyn Executor,
    environment: &'a Environment,
    tool: Option<&'a ComposeTool>,
    teardown: TeardownMode,
    output: Option<&'a str>,
    error: Option<&'a DeployError>,
}

impl<'a> HookContext<'a> {
    pub fn new(executor: &'a dyn Executor, environment: &'a Environment) -> Self {
        Self {
            executor,
            environment,
            tool: None,
            teardown: TeardownMode::default(),
            output: None,
            error: None,
        }
    }

    pub fn with_tool(mut self, tool: Option<&'a ComposeTool>) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_teardown(mut self, teardown: TeardownMode) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn with_output(mut self, output: Option<&'a str>) -> Self {
        self.output = output;
        self
    }

    pub fn with_error(mut self, error: Option<&'a DeployError>) -> Self {
        self.error = error;
        self
    }

    /// 検出済みのツール（検出前に中断した場合は `None`）
    pub fn tool(&self) -> Option<&ComposeTool> {
        self.tool
    }

    pub fn teardown(&self) -> TeardownMode {
        self.teardown
    }

    /// 主コマンドの標準出力
    pub fn output(&self) -> Option<&str> {
        self.output
    }

    pub fn error(&self) -> Option<&DeployError> {
        self.error
    }

    pub fn environment(&self) -> &Environment {
        self.environment
    }

    /// 解決済みの環境でコマンドを実行する
    pub async fn execute(&self, command: &ShellCommand, options: ExecOptions) -> Result<String> {
        self.executor
            .execute(command, self.environment, options)
            .await
    }
}

/// 実行結果ごとのフック
///
/// `on_fail` の実装は最後に `on_sig_kill` を呼び、スタックを必ず停止すること。
/// `on_sig_kill` は何度呼ばれても安全でなければならない。
#[async_trait]
pub trait OutcomeHooks: Send + Sync {
    async fn on_complete(&self, ctx: &HookContext<'_>) -> Result<()>;

    async fn on_fail(&self, ctx: &HookContext<'_>) -> Result<()>;

    async fn on_sig_kill(&self, ctx: &HookContext<'_>) -> Result<()>;
}

/// デプロイ種別ごとの解決処理
pub trait Deployment: OutcomeHooks {
    /// 設定を解決してコマンド列を組み立て、必要なポートを登録する
    fn resolve(
        &self,
        resolver: &mut ConfigResolver,
        ports: &mut RequiredPorts,
        tool: &ComposeTool,
    ) -> Result<ExecutionPlan>;
}

/// デプロイの実行を管理する
pub struct DeploymentOrchestrator<E: Executor> {
    executor: E,
    resolver: ConfigResolver,
    required_ports: RequiredPorts,
    state: RunState,
    tool: Option<ComposeTool>,
    plan: Option<ExecutionPlan>,
    environment: Environment,
    port_probe: fn(u16) -> bool,
}

impl<E: Executor> DeploymentOrchestrator<E> {
    pub fn new(executor: E, resolver: ConfigResolver) -> Self {
        Self {
            executor,
            resolver,
            required_ports: RequiredPorts::new(),
            state: RunState::NotStarted,
            tool: None,
            plan: None,
            environment: Environment::new(),
            port_probe: is_port_in_use,
        }
    }

    /// ポートの使用判定を差し替える
    pub fn with_port_probe(mut self, probe: fn(u16) -> bool) -> Self {
        self.port_probe = probe;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn required_ports(&self) -> &RequiredPorts {
        &self.required_ports
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// デプロイを実行し、結末に応じたフックを呼ぶ
    ///
    /// `cancel` がキャンセルされると実行中のコマンドを破棄し、
    /// `on_sig_kill` を一度だけ呼んで `Outcome::Interrupted` を返す。
    pub async fn run<D>(&mut self, deployment: &D, cancel: &CancellationToken) -> RunReport
    where
        D: Deployment + ?Sized,
    {
        if self.state != RunState::NotStarted {
            warn!("Orchestrator already ran ({:?})", self.state);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.drive(deployment) => Some(result),
        };

        match result {
            Some(Ok(output)) => {
                info!("Deployment completed");
                self.finish(deployment, Outcome::Completed, Some(output), None)
                    .await
            }
            // SIGINT は子プロセスにも届くため、キャンセル済みなら失敗ではなく中断として扱う
            Some(Err(e)) if !cancel.is_cancelled() => {
                warn!("Deployment failed in {:?}: {}", self.state, e);
                self.finish(deployment, Outcome::Failed, None, Some(e)).await
            }
            _ => {
                warn!("Deployment interrupted in {:?}", self.state);
                self.finish(deployment, Outcome::Interrupted, None, None)
                    .await
            }
        }
    }

    async fn drive<D>(&mut self, deployment: &D) -> Result<String>
    where
        D: Deployment + ?Sized,
    {
        self.state = RunState::PreflightChecking;
        let tool = detect_compose_tool(&self.executor).await?;
        check_daemon_running(&self.executor).await?;
        info!("Using {}", tool.name());
        self.tool = Some(tool.clone());

        self.state = RunState::Resolving;
        let plan = deployment.resolve(&mut self.resolver, &mut self.required_ports, &tool)?;
        self.environment = self.resolver.to_environment();
        self.plan = Some(plan.clone());

        for command in &plan.prepare {
            self.executor
                .execute(command, &self.environment, ExecOptions::display())
                .await?;
        }
        check_ports_with(&self.required_ports, self.port_probe).await?;

        self.state = RunState::Executing;
        self.executor
            .execute(
                &plan.primary,
                &self.environment,
                ExecOptions::display().with_environment(),
            )
            .await
    }

    async fn finish<D>(
        &mut self,
        deployment: &D,
        outcome: Outcome,
        output: Option<String>,
        error: Option<DeployError>,
    ) -> RunReport
    where
        D: Deployment + ?Sized,
    {
        self.state = outcome.into();

        let teardown = self
            .plan
            .as_ref()
            .map(|plan| plan.teardown)
            .unwrap_or_default();
        let ctx = HookContext::new(&self.executor, &self.environment)
            .with_tool(self.tool.as_ref())
            .with_teardown(teardown)
            .with_output(output.as_deref())
            .with_error(error.as_ref());

        let hook_result = match outcome {
            Outcome::Completed => deployment.on_complete(&ctx).await,
            Outcome::Failed => deployment.on_fail(&ctx).await,
            Outcome::Interrupted => deployment.on_sig_kill(&ctx).await,
        };
        if let Err(e) = hook_result {
            warn!("{:?} hook failed: {}", outcome, e);
        }

        RunReport { outcome, error }
    }
}
