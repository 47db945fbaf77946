use crate::context::Context;
use colored::Colorize;
use vpcsite_cloud::{ActionType, Plan};
use vpcsite_core::TopologyComposer;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    ctx.print_target();
    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);
    let plan = composer.plan().await?;

    print_plan(&plan.network);
    print_plan(&plan.storage);
    if plan.endpoint_id.is_none() {
        println!(
            "  {}",
            "バケットポリシーはゲートウェイエンドポイント作成後に追加されます".yellow()
        );
    }

    println!();
    if plan.has_changes() {
        println!("{}", "変更があります。vpcsite deploy --yes で適用します".bold());
    } else {
        println!("{}", "✓ 変更はありません".green());
    }
    Ok(())
}

pub fn print_plan(plan: &Plan) {
    println!();
    println!("{} ({})", plan.stack.bold(), plan.summary());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => continue,
        };
        println!(
            "  {} {} {}",
            marker,
            action.resource_id.cyan(),
            action.resource_type.dimmed()
        );
    }
}
