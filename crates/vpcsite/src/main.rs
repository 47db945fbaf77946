mod commands;
mod context;

use clap::{Parser, Subcommand};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vpcsite")]
#[command(
    about = "既存のデフォルト VPC に、VPC エンドポイント経由でのみ読める静的サイト構成を構築する",
    long_about = None
)]
struct Cli {
    /// EC2 に問い合わせず、vpcsite.yaml の network をデフォルト VPC として使う
    #[arg(long, global = true, env = "VPCSITE_OFFLINE")]
    offline: bool,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 両スタックのテンプレートを出力
    Synth {
        /// 出力先ディレクトリ（省略時は標準出力）
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// 適用される変更を表示
    Plan,
    /// ネットワークスタック、ストレージスタックの順にデプロイ
    Deploy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// ストレージスタック、ネットワークスタックの順に削除
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// デプロイ済みリソースを表示
    Status,
    /// 設定を検証
    Validate,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Versionコマンドは設定不要
    if matches!(cli.command, Commands::Version) {
        println!("vpcsite {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // 削除と状態表示にはインターネットゲートウェイ ID は不要
    let require_gateway = !matches!(cli.command, Commands::Destroy { .. } | Commands::Status);
    let ctx = Context::load(cli.offline, require_gateway).await?;

    // コマンドディスパッチ
    match cli.command {
        Commands::Synth { out } => commands::synth::handle(&ctx, out).await?,
        Commands::Plan => commands::plan::handle(&ctx).await?,
        Commands::Deploy { yes } => commands::deploy::handle(&ctx, yes).await?,
        Commands::Destroy { yes } => commands::destroy::handle(&ctx, yes).await?,
        Commands::Status => commands::status::handle(&ctx).await?,
        Commands::Validate => commands::validate::handle(&ctx).await?,
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
