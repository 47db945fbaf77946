use crate::context::Context;
use colored::Colorize;
use vpcsite_core::{check_removal_policies, TopologyComposer};

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());
    ctx.print_target();

    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);
    let topology = match composer.synth().await {
        Ok(topology) => topology,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    check_removal_policies(&topology.storage.to_resource_set())?;

    let network = &topology.network;
    println!("{}", "✓ 設定は正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  VPC: {}", network.network.vpc_id.cyan());
    println!("  サブネット: {}個", network.subnets().len());
    for subnet in network.subnets() {
        println!(
            "    - {} ({}, {}, {})",
            subnet.logical_id.cyan(),
            subnet.kind,
            subnet.cidr,
            subnet.availability_zone
        );
    }
    println!("  インスタンス: {}個", network.instances().len());
    for instance in network.instances() {
        println!(
            "    - {} ({}, {})",
            instance.name.cyan(),
            instance.instance_type,
            instance.subnet
        );
    }
    println!(
        "  ゲートウェイエンドポイント: {}",
        network.endpoint.service_name.cyan()
    );
    println!("  バケット: {}", topology.storage.bucket.name.cyan());
    Ok(())
}
