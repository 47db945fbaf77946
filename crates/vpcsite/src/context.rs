//! コマンド共通の実行コンテキスト

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::PathBuf;
use vpcsite_cloud::LocalEngine;
use vpcsite_config::{Environment, SiteConfig};
use vpcsite_core::cidr::parse_cidr;
use vpcsite_core::{NetworkLookup, NetworkPartition, StaticNetworkLookup, TopologySettings};

pub struct Context {
    pub environment: Environment,
    pub config_path: Option<PathBuf>,
    pub settings: TopologySettings,
    pub engine: LocalEngine,
    lookup: Box<dyn NetworkLookup>,
}

impl Context {
    /// .env と vpcsite.yaml を読み込み、デプロイ先を解決する
    ///
    /// `require_gateway` が true の場合、IGW が未設定なら何もせずにエラーを返す。
    pub async fn load(offline: bool, require_gateway: bool) -> Result<Self> {
        vpcsite_config::load_dotenv();

        let project_root = std::env::current_dir().context("カレントディレクトリを取得できません")?;
        let environment = vpcsite_config::resolve_environment()?;
        let (site, config_path) = SiteConfig::discover()?;

        let mut settings = settings_from(&environment, &site)?;
        match vpcsite_config::internet_gateway_id() {
            Ok(gateway_id) => settings = settings.with_internet_gateway(gateway_id),
            Err(e) if require_gateway => return Err(e.into()),
            Err(_) => {}
        }

        let lookup = build_lookup(offline, &environment, &site).await?;
        let engine = LocalEngine::new(&project_root, &environment.account, &environment.region);

        tracing::debug!(
            account = %environment.account,
            region = %environment.region,
            offline,
            "Context loaded"
        );

        Ok(Self {
            environment,
            config_path,
            settings,
            engine,
            lookup,
        })
    }

    pub fn lookup(&self) -> &dyn NetworkLookup {
        self.lookup.as_ref()
    }

    /// デプロイ先の表示
    pub fn print_target(&self) {
        println!(
            "デプロイ先: {} / {}",
            self.environment.account.cyan(),
            self.environment.region.cyan()
        );
        if let Some(path) = &self.config_path {
            println!("設定ファイル: {}", path.display().to_string().cyan());
        }
    }
}

fn settings_from(environment: &Environment, site: &SiteConfig) -> Result<TopologySettings> {
    let mut settings = TopologySettings::new(&environment.account, &environment.region)?
        .with_bucket_name(&site.bucket_name)
        .with_subnet_cidrs(
            parse_cidr(&site.private_subnet_cidr)?,
            parse_cidr(&site.public_subnet_cidr)?,
        );
    settings.key_pair_name = site.key_pair_name.clone();
    settings.instance_type = site.instance_type.clone();
    settings.index_document = site.index_document.clone();
    Ok(settings)
}

fn configured_network(site: &SiteConfig) -> Result<Option<NetworkPartition>> {
    let Some(network) = &site.network else {
        return Ok(None);
    };
    let mut partition =
        NetworkPartition::new(&network.vpc_id, network.availability_zones.clone());
    if let Some(cidr) = &network.cidr {
        partition = partition.with_cidr(parse_cidr(cidr)?);
    }
    Ok(Some(partition))
}

#[cfg(feature = "aws")]
async fn build_lookup(
    offline: bool,
    environment: &Environment,
    site: &SiteConfig,
) -> Result<Box<dyn NetworkLookup>> {
    if offline {
        return Ok(Box::new(StaticNetworkLookup::new(configured_network(site)?)));
    }
    Ok(Box::new(
        vpcsite_cloud_aws::Ec2NetworkLookup::from_env(&environment.region).await,
    ))
}

#[cfg(not(feature = "aws"))]
async fn build_lookup(
    _offline: bool,
    _environment: &Environment,
    site: &SiteConfig,
) -> Result<Box<dyn NetworkLookup>> {
    Ok(Box::new(StaticNetworkLookup::new(configured_network(site)?)))
}
