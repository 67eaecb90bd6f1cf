use crate::StackArgs;
use crate::compose::ComposeDeployment;
use crate::utils;
use colored::Colorize;
use govready_deploy_core::{DeploymentOrchestrator, Outcome, ProcessExecutor, interrupt_token};

pub async fn handle(args: &StackArgs) -> anyhow::Result<Outcome> {
    println!("{}", "GovReady-Q スタックを構築中...".green().bold());
    println!(
        "{}",
        format!("開始: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")).dimmed()
    );

    let utils::LoadedStack {
        resolver,
        stack_dir,
        config_path,
    } = utils::load_stack(args)?;
    utils::print_loaded_config_file(&config_path);
    println!("スタック: {}", stack_dir.display().to_string().cyan());
    println!();

    let cancel = interrupt_token();
    let deployment = ComposeDeployment::new(&stack_dir);
    let mut orchestrator =
        DeploymentOrchestrator::new(ProcessExecutor::in_dir(&stack_dir), resolver);

    let report = orchestrator.run(&deployment, &cancel).await;
    deployment.clean_staged_files();

    println!();
    match report.outcome {
        Outcome::Completed => {
            println!("{}", "✓ デプロイが完了しました".green().bold());
            Ok(Outcome::Completed)
        }
        Outcome::Interrupted => {
            println!("{}", "⚠ 中断しました。スタックを停止しました".yellow().bold());
            Ok(Outcome::Interrupted)
        }
        Outcome::Failed => match report.error {
            Some(error) => Err(error.into()),
            None => Err(anyhow::anyhow!("デプロイに失敗しました")),
        },
    }
}
