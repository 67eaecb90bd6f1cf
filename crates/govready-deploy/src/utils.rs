use crate::StackArgs;
use anyhow::Context;
use colored::Colorize;
use govready_deploy_config::{ConfigResolver, find_config_file, load_config_file};
use std::path::PathBuf;

/// 読み込んだ設定とスタックの場所
pub struct LoadedStack {
    pub resolver: ConfigResolver,
    /// 正規化したスタックディレクトリ
    pub stack_dir: PathBuf,
    pub config_path: PathBuf,
}

/// 設定ファイルを読み込み、`--set` の上書きを適用する
pub fn load_stack(args: &StackArgs) -> anyhow::Result<LoadedStack> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => find_config_file()?,
    };

    let mut resolver = load_config_file(&config_path).with_context(|| {
        format!(
            "設定ファイルの読み込みに失敗しました: {}",
            config_path.display()
        )
    })?;
    for spec in &args.overrides {
        resolver.apply_override(spec)?;
    }

    let stack_dir = match &args.stack_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let stack_dir = stack_dir.canonicalize().with_context(|| {
        format!(
            "スタックディレクトリが見つかりません: {}",
            stack_dir.display()
        )
    })?;

    Ok(LoadedStack {
        resolver,
        stack_dir,
        config_path,
    })
}

/// 読み込んだ設定ファイルを表示
pub fn print_loaded_config_file(path: &std::path::Path) {
    println!("{}", "読み込んだ設定ファイル:".dimmed());
    println!("  {} {}", "•".dimmed(), path.display().to_string().dimmed());
}
