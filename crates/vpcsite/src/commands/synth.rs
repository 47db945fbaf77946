use crate::context::Context;
use anyhow::Context as _;
use colored::Colorize;
use std::path::PathBuf;
use vpcsite_core::TopologyComposer;

/// 両スタックのテンプレートを出力する
///
/// ストレージスタックのバケットポリシーはエンドポイント作成後にしか
/// 決まらないため、テンプレートには含まれない。
pub async fn handle(ctx: &Context, out: Option<PathBuf>) -> anyhow::Result<()> {
    let composer = TopologyComposer::new(&ctx.engine, ctx.lookup(), &ctx.settings);
    let topology = composer.synth().await?;

    for (stack, template) in topology.templates()? {
        let rendered = serde_json::to_string_pretty(&template)?;
        match &out {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("{} を作成できません", dir.display()))?;
                let path = dir.join(format!("{}.template.json", stack));
                std::fs::write(&path, rendered)
                    .with_context(|| format!("{} に書き込めません", path.display()))?;
                eprintln!("{} {}", "✓".green(), path.display().to_string().cyan());
            }
            None => println!("{}", rendered),
        }
    }

    Ok(())
}
