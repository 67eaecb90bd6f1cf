//! docker-compose による GovReady-Q スタック

use crate::staging::{self, StagedBuildFiles};
use async_trait::async_trait;
use colored::Colorize;
use govready_deploy_config::{ConfigResolver, DeploymentSettings};
use govready_deploy_core::{
    ComposeTool, Deployment, ExecOptions, ExecutionPlan, HookContext, OneTimeDisclosure,
    OutcomeHooks, RequiredPorts, Result, ShellCommand, TeardownMode,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};

struct ResolvedStack {
    settings: DeploymentSettings,
    tool: ComposeTool,
}

/// docker-compose でスタックを構築するデプロイ
pub struct ComposeDeployment {
    stack_dir: PathBuf,
    stage_build_files: bool,
    resolved: OnceLock<ResolvedStack>,
    staged: Mutex<Option<StagedBuildFiles>>,
    disclosure: OneTimeDisclosure,
}

impl ComposeDeployment {
    /// `stack_dir` は compose ファイルとイメージのビルドコンテキストがあるディレクトリ
    pub fn new(stack_dir: impl Into<PathBuf>) -> Self {
        Self {
            stack_dir: stack_dir.into(),
            stage_build_files: true,
            resolved: OnceLock::new(),
            staged: Mutex::new(None),
            disclosure: OneTimeDisclosure::new(),
        }
    }

    /// ビルド用ファイルを配置しない（停止のみの場合）
    pub fn without_staging(mut self) -> Self {
        self.stage_build_files = false;
        self
    }

    pub fn stack_dir(&self) -> &Path {
        &self.stack_dir
    }

    /// 解決済みの設定
    pub fn settings(&self) -> Option<&DeploymentSettings> {
        self.resolved.get().map(|stack| &stack.settings)
    }

    pub fn credentials_disclosed(&self) -> bool {
        self.disclosure.is_disclosed()
    }

    /// 一時配置したビルド用ファイルを削除する
    pub fn clean_staged_files(&self) {
        let staged = self
            .staged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(staged);
    }

    /// compose のベースコマンド
    ///
    /// 解決前でもツールが分かっていればデフォルトの compose ファイルで実行する。
    fn base_command(&self, ctx: &HookContext<'_>) -> Option<ShellCommand> {
        match self.resolved.get() {
            Some(stack) => Some(stack.tool.with_file(stack.settings.compose_file())),
            None => ctx.tool().map(ComposeTool::command),
        }
    }
}

fn down_command(base: ShellCommand, teardown: TeardownMode) -> ShellCommand {
    base.arg("down").args(teardown.suffix().iter().copied())
}

impl Deployment for ComposeDeployment {
    fn resolve(
        &self,
        resolver: &mut ConfigResolver,
        ports: &mut RequiredPorts,
        tool: &ComposeTool,
    ) -> Result<ExecutionPlan> {
        if self.stage_build_files {
            let staged = staging::stage_build_files(resolver, &self.stack_dir)?;
            *self
                .staged
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(staged);
        }

        let settings = DeploymentSettings::resolve(resolver, &self.stack_dir)?;
        ports.extend(settings.required_ports());

        let teardown = TeardownMode::from_persist_stack(settings.persist_stack);
        let base = tool.with_file(settings.compose_file());
        let plan = ExecutionPlan {
            teardown,
            prepare: vec![down_command(base.clone(), teardown)],
            primary: base.args(["up", "-d"]),
        };

        let stack = ResolvedStack {
            settings,
            tool: tool.clone(),
        };
        if self.resolved.set(stack).is_err() {
            warn!("Deployment was already resolved; keeping the first settings");
        }

        Ok(plan)
    }
}

#[async_trait]
impl OutcomeHooks for ComposeDeployment {
    async fn on_complete(&self, ctx: &HookContext<'_>) -> Result<()> {
        let Some(stack) = self.resolved.get() else {
            return Ok(());
        };
        let settings = &stack.settings;

        // 認証情報の抽出はベストエフォート。ログが取れなくても報告は続ける
        let logs = match ctx
            .execute(
                &stack.tool.with_file(settings.compose_file()).arg("logs"),
                ExecOptions::captured(),
            )
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Failed to capture logs for credential extraction: {}", e);
                String::new()
            }
        };

        println!();
        if let Some(credentials) = self.disclosure.take(&logs) {
            println!(
                "{} 管理者アカウントを作成しました - {} / {} - {}",
                "⚠".yellow(),
                credentials.username.cyan(),
                credentials.password.cyan(),
                "このメッセージは一度しか表示されません。必ず控えてください".red()
            );
        }
        println!(
            "{} ログとコンテナの成果物: {}",
            "ℹ".blue(),
            settings.mount_folder.display().to_string().cyan()
        );
        println!(
            "{} ブラウザからアクセス: {}",
            "ℹ".blue(),
            settings.access_url().cyan()
        );
        if settings.persist_stack {
            println!(
                "{}",
                "⚠ PERSIST_STACK が有効です。コンテナはキャッシュされ、前回の作成以降の設定変更は再ビルドされません"
                    .yellow()
            );
        }
        Ok(())
    }

    async fn on_fail(&self, ctx: &HookContext<'_>) -> Result<()> {
        if let Some(error) = ctx.error() {
            println!("{} {}", "✗".red().bold(), error.kind().red());
        }
        if let Some(base) = self.base_command(ctx) {
            println!("{}", "コンテナのログ:".dimmed());
            if let Err(e) = ctx.execute(&base.arg("logs"), ExecOptions::display()).await {
                warn!("Failed to show logs: {}", e);
            }
        }
        self.on_sig_kill(ctx).await
    }

    async fn on_sig_kill(&self, ctx: &HookContext<'_>) -> Result<()> {
        let Some(base) = self.base_command(ctx) else {
            info!("Nothing was started; skipping teardown");
            return Ok(());
        };

        println!();
        println!("{}", "スタックを停止中...".yellow());
        ctx.execute(&down_command(base, ctx.teardown()), ExecOptions::display())
            .await?;
        println!("  ✓ 停止完了");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govready_deploy_config::ConfigError;
    use govready_deploy_core::testing::RecordingExecutor;
    use govready_deploy_core::{
        DeployError, DeploymentOrchestrator, Environment, Outcome, RunState,
    };
    use serde_json::json;
    use std::fs;
    use tokio_util::sync::CancellationToken;

    const ADMIN_LOG: &str =
        "app_1 | Created administrator account (username: admin) with password: s3cr3t!x\n";

    fn config() -> ConfigResolver {
        let mut resolver = ConfigResolver::new();
        resolver.set("HOST_ADDRESS", json!("demo.local"));
        resolver.set("HOST_PORT_HTTPS", json!(8443));
        resolver
    }

    fn orchestrator(
        executor: RecordingExecutor,
        resolver: ConfigResolver,
    ) -> DeploymentOrchestrator<RecordingExecutor> {
        DeploymentOrchestrator::new(executor, resolver).with_port_probe(|_| false)
    }

    #[tokio::test]
    async fn test_full_deploy() {
        let stack_dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::new();
        executor.output_on(" logs", ADMIN_LOG);
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, config());

        let report = orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        assert!(report.is_success());
        assert_eq!(orchestrator.required_ports().as_slice(), &[5432, 8443, 18000]);
        assert_eq!(
            orchestrator.executor().commands(),
            vec![
                "docker-compose version",
                "docker info",
                "docker-compose -f docker-compose.yaml down --remove-orphans --rmi all",
                "docker-compose -f docker-compose.yaml up -d",
                "docker-compose -f docker-compose.yaml logs",
            ]
        );
        assert!(deployment.credentials_disclosed());

        let env = &orchestrator.executor().calls()[3].environment;
        assert_eq!(
            env.get("ALLOWED_HOSTS").map(String::as_str),
            Some(r#"["app","demo.local"]"#)
        );
        assert!(!env.contains_key("PERSIST_STACK"));
    }

    #[tokio::test]
    async fn test_credentials_disclosed_once() {
        let stack_dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::new();
        executor.output_on(" logs", ADMIN_LOG);
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, config());
        orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;
        assert!(deployment.credentials_disclosed());

        // 2回目の報告では抽出済みのため表示しない
        let env = Environment::new();
        let ctx = HookContext::new(orchestrator.executor(), &env);
        deployment.on_complete(&ctx).await.unwrap();
        assert!(deployment.credentials_disclosed());
    }

    #[tokio::test]
    async fn test_log_capture_failure_still_reports() {
        let stack_dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::new();
        executor.fail_on(" logs", 1);
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, config());

        let report = orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;
        assert_eq!(report.outcome, Outcome::Completed);
        assert!(!deployment.credentials_disclosed());

        let env = Environment::new();
        let ctx = HookContext::new(orchestrator.executor(), &env);
        assert!(deployment.on_complete(&ctx).await.is_ok());
        // 停止はしない
        assert!(
            !orchestrator
                .executor()
                .commands()
                .iter()
                .skip(3)
                .any(|c| c.contains(" down"))
        );
    }

    #[tokio::test]
    async fn test_external_database() {
        let stack_dir = tempfile::tempdir().unwrap();
        let mut resolver = config();
        resolver.set(
            "DATABASE_CONNECTION_STRING",
            json!("mysql://user:pw@db.example.com:3306/q"),
        );
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(RecordingExecutor::new(), resolver);

        orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        assert_eq!(orchestrator.required_ports().as_slice(), &[8443, 18000]);
        assert_eq!(deployment.settings().unwrap().db_engine, "mysql");
        assert!(
            orchestrator
                .executor()
                .commands()
                .contains(&"docker-compose -f docker-compose.external-db.yaml up -d".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_shows_logs_then_tears_down() {
        let stack_dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::new();
        executor.fail_on("up -d", 1);
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, config());

        let report = orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        assert_eq!(report.outcome, Outcome::Failed);
        let commands = orchestrator.executor().commands();
        let tail = &commands[commands.len() - 2..];
        assert_eq!(
            tail,
            &[
                "docker-compose -f docker-compose.yaml logs".to_string(),
                "docker-compose -f docker-compose.yaml down --remove-orphans --rmi all"
                    .to_string(),
            ]
        );
        assert!(!deployment.credentials_disclosed());
    }

    #[tokio::test]
    async fn test_persist_stack_keeps_images() {
        let stack_dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::new();
        executor.fail_on("up -d", 1);
        let mut resolver = config();
        resolver.set("PERSIST_STACK", json!(true));
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, resolver);

        orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        let commands = orchestrator.executor().commands();
        assert_eq!(commands[2], "docker-compose -f docker-compose.yaml down");
        assert_eq!(
            commands.last().unwrap(),
            "docker-compose -f docker-compose.yaml down"
        );
    }

    #[tokio::test]
    async fn test_interrupt_tears_down_once() {
        let stack_dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let executor = RecordingExecutor::new();
        executor.interrupt_on("up -d", cancel.clone());
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(executor, config());

        let report = orchestrator.run(&deployment, &cancel).await;

        assert_eq!(report.outcome, Outcome::Interrupted);
        assert_eq!(orchestrator.state(), RunState::Interrupted);
        let commands = orchestrator.executor().commands();
        let teardowns = commands
            .iter()
            .skip(3)
            .filter(|c| c.contains(" down"))
            .count();
        assert_eq!(teardowns, 1);
        assert_eq!(
            commands.last().unwrap(),
            "docker-compose -f docker-compose.yaml down --remove-orphans --rmi all"
        );
    }

    #[tokio::test]
    async fn test_invalid_host_fails_with_key() {
        let stack_dir = tempfile::tempdir().unwrap();
        let mut resolver = config();
        resolver.set("HOST_ADDRESS", json!("https://demo.local"));
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(RecordingExecutor::new(), resolver);

        let report = orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        match report.error {
            Some(DeployError::Configuration(err)) => {
                assert!(matches!(err, ConfigError::InvalidHostAddress { .. }));
                assert_eq!(err.key(), Some("HOST_ADDRESS"));
            }
            other => panic!("Expected InvalidHostAddress, got {:?}", other),
        }
        // 解決前なので -f なしで停止する
        assert_eq!(
            orchestrator.executor().commands().last().unwrap(),
            "docker-compose down"
        );
    }

    #[tokio::test]
    async fn test_build_files_are_staged_during_run() {
        let stack_dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let cert = source_dir.path().join("server.crt");
        fs::write(&cert, "CERT").unwrap();

        let mut resolver = config();
        resolver.set("NGINX_CERT", json!(cert.to_string_lossy()));
        let deployment = ComposeDeployment::new(stack_dir.path());
        let mut orchestrator = orchestrator(RecordingExecutor::new(), resolver);

        orchestrator
            .run(&deployment, &CancellationToken::new())
            .await;

        let staged = stack_dir.path().join("nginx").join("tmp").join("server.crt");
        assert!(staged.exists());
        let env = &orchestrator.executor().calls()[3].environment;
        assert_eq!(env.get("NGINX_CERT").map(String::as_str), Some("server.crt"));

        deployment.clean_staged_files();
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_teardown_without_tool_is_noop() {
        let deployment = ComposeDeployment::new("/srv/q/deployments/docker_compose");
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = HookContext::new(&executor, &env);

        deployment.on_sig_kill(&ctx).await.unwrap();
        deployment.on_sig_kill(&ctx).await.unwrap();
        assert!(executor.commands().is_empty());
    }
}
