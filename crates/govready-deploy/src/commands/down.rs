use crate::StackArgs;
use crate::compose::ComposeDeployment;
use crate::utils;
use colored::Colorize;
use govready_deploy_core::{
    Deployment, HookContext, OutcomeHooks, ProcessExecutor, RequiredPorts, detect_compose_tool,
};

pub async fn handle(args: &StackArgs) -> anyhow::Result<()> {
    println!("{}", "GovReady-Q スタックを停止中...".yellow());

    let utils::LoadedStack {
        mut resolver,
        stack_dir,
        config_path,
    } = utils::load_stack(args)?;
    utils::print_loaded_config_file(&config_path);
    let executor = ProcessExecutor::in_dir(&stack_dir);
    let tool = detect_compose_tool(&executor).await?;

    let deployment = ComposeDeployment::new(&stack_dir).without_staging();
    let plan = deployment.resolve(&mut resolver, &mut RequiredPorts::new(), &tool)?;
    if plan.teardown.is_destructive() {
        println!(
            "{}",
            "孤立コンテナとビルドしたイメージも削除します".dimmed()
        );
    }

    let environment = resolver.to_environment();
    let ctx = HookContext::new(&executor, &environment)
        .with_tool(Some(&tool))
        .with_teardown(plan.teardown);
    deployment.on_sig_kill(&ctx).await?;

    Ok(())
}
