use crate::StackArgs;
use crate::staging;
use crate::utils;
use colored::Colorize;
use govready_deploy_config::{DatabaseMode, DeploymentSettings};
use govready_deploy_core::{
    ProcessExecutor, RequiredPorts, TeardownMode, check_ports, detect_compose_tool,
};

pub async fn handle(args: &StackArgs, skip_ports: bool, json: bool) -> anyhow::Result<()> {
    let utils::LoadedStack {
        mut resolver,
        stack_dir,
        config_path,
    } = utils::load_stack(args)?;

    if !json {
        println!("{}", "設定を検証中...".blue());
        utils::print_loaded_config_file(&config_path);
    }

    staging::validate_build_files(&resolver)?;
    let settings = DeploymentSettings::resolve(&mut resolver, &stack_dir)?;
    let ports: RequiredPorts = settings.required_ports().into_iter().collect();

    // JSON出力では stdout を解決済み設定のみにする
    if json {
        if !skip_ports {
            check_ports(&ports).await?;
        }
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("  ✓ 設定は有効です");
    print_summary(&settings);

    println!();
    let executor = ProcessExecutor::in_dir(&stack_dir);
    match detect_compose_tool(&executor).await {
        Ok(tool) => println!("  ✓ {} を使用します", tool.name().cyan()),
        Err(e) => println!("  {} {}", "⚠".yellow(), e.to_string().yellow()),
    }

    if skip_ports {
        println!("  {} ポートの確認をスキップしました", "ℹ".blue());
        return Ok(());
    }

    check_ports(&ports).await?;
    println!("  ✓ 必要なポートはすべて空いています");

    Ok(())
}

fn print_summary(settings: &DeploymentSettings) {
    let database = match settings.database {
        DatabaseMode::Internal => "スタック内 (postgres)".to_string(),
        DatabaseMode::External => format!("外部 ({})", settings.db_engine),
    };
    let teardown = TeardownMode::from_persist_stack(settings.persist_stack);
    let ports = settings
        .required_ports()
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    println!();
    println!("{}", "解決済みの設定:".bold());
    println!("  プロジェクト:     {}", settings.compose_project_name.cyan());
    println!("  ホスト:           {}", settings.host_address.cyan());
    println!("  許可ホスト:       {}", settings.allowed_hosts.join(", "));
    println!("  URL:              {}", settings.access_url().cyan());
    println!("  データベース:     {}", database);
    println!("  composeファイル:  {}", settings.compose_file());
    println!("  マウント先:       {}", settings.mount_folder.display());
    println!("  必要なポート:     {}", ports);
    println!(
        "  停止時:           {}",
        if teardown.is_destructive() {
            format!("down {}", teardown.suffix().join(" "))
        } else {
            "down (PERSIST_STACK)".to_string()
        }
    );
}
