use crate::commands::plan::print_plan;
use crate::context::Context;
use colored::Colorize;
use vpcsite_core::TopologyComposer;

pub async fn handle(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    ctx.print_target();
    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);

    // 確認（--yesが指定されていない場合）
    if !yes {
        let plan = composer.plan().await?;
        print_plan(&plan.network);
        print_plan(&plan.storage);
        println!();
        println!(
            "{}",
            "警告: ネットワークスタック、ストレージスタックの順に適用します。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!("{}", "デプロイ中...".blue());
    let deployed = composer.deploy().await?;

    println!();
    println!("{}", "✓ デプロイが完了しました".green().bold());
    println!(
        "  {}: {} 件適用",
        ctx.settings.network_stack_name.cyan(),
        deployed.network_result.succeeded.len()
    );
    println!(
        "  {}: {} 件適用",
        deployed.storage.name.cyan(),
        deployed.storage_result.succeeded.len()
    );
    println!("  ゲートウェイエンドポイント: {}", deployed.endpoint_id().to_string().cyan());
    println!("  バケット: {}", deployed.storage.bucket.name.cyan());
    Ok(())
}
