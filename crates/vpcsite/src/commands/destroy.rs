use crate::context::Context;
use colored::Colorize;
use vpcsite_core::TopologyComposer;

pub async fn handle(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    ctx.print_target();

    if !yes {
        println!();
        println!(
            "{}",
            "警告: ストレージスタックとネットワークスタックのリソースをすべて削除します。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);
    println!("{}", "削除中...".blue());
    let report = composer.teardown().await?;

    let destroyed = report.storage.succeeded.len() + report.network.succeeded.len();
    let retained = report.retained();
    if retained.is_empty() {
        println!("{}", "✓ すべてのリソースを削除しました".green().bold());
        println!("  削除: {} 件", destroyed);
    } else {
        eprintln!("{}", "⚠ 削除されずに残ったリソースがあります".yellow().bold());
        for id in &retained {
            eprintln!("    - {}", id.cyan());
        }
        std::process::exit(1);
    }
    Ok(())
}
