mod commands;
mod compose;
mod staging;
mod utils;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use govready_deploy_core::Outcome;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SIGINT で中断された場合の終了コード
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "govready-deploy")]
#[command(about = "GovReady-Q の docker-compose スタックを構築・停止する", long_about = None)]
struct Cli {
    /// 詳細なログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// スタックを構築して起動
    Up {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// スタックを停止（PERSIST_STACK が無効ならイメージも削除）
    Down {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// 設定とポートを検証（何も起動しない）
    Check {
        #[command(flatten)]
        stack: StackArgs,
        /// ポートの空き確認をスキップ
        #[arg(long)]
        skip_ports: bool,
        /// 解決済みの設定をJSONで出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

/// 設定とスタックの場所
#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// 設定ファイル（省略時は configuration.json などを検索）
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// compose ファイルがあるディレクトリ（省略時はカレントディレクトリ）
    #[arg(long, value_name = "DIR")]
    pub stack_dir: Option<PathBuf>,

    /// 設定値を上書き (KEY=VALUE、複数指定可)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ログはstderrへ（stdoutはコマンド出力と報告に使う）
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Up { stack } => {
            if commands::up::handle(&stack).await? == Outcome::Interrupted {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
        Commands::Down { stack } => commands::down::handle(&stack).await?,
        Commands::Check {
            stack,
            skip_ports,
            json,
        } => commands::check::handle(&stack, skip_ports, json).await?,
        Commands::Version => {
            println!("govready-deploy {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
