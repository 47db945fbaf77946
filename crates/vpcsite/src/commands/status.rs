use crate::context::Context;
use colored::Colorize;
use vpcsite_cloud::ProviderState;
use vpcsite_core::TopologyComposer;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    ctx.print_target();
    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);
    let status = composer.status().await?;

    print_stack(&ctx.settings.network_stack_name, &status.network);
    print_stack(&ctx.settings.storage_stack_name, &status.storage);
    println!();
    println!(
        "状態ファイル: {}",
        ctx.engine.state_manager().state_path().display().to_string().dimmed()
    );
    Ok(())
}

fn print_stack(name: &str, state: &ProviderState) {
    println!();
    if state.is_empty() {
        println!("{} {}", name.bold(), "(未デプロイ)".dimmed());
        return;
    }
    println!("{} ({}個のリソース)", name.bold(), state.len());
    for (logical_id, resource) in state.iter() {
        println!(
            "  {} {} [{}]",
            logical_id.cyan(),
            resource.id,
            resource.status
        );
    }
}
