//! 環境変数からのデプロイ先解決

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

pub const PRIMARY_ACCOUNT_VAR: &str = "VPCSITE_ACCOUNT";
pub const PRIMARY_REGION_VAR: &str = "VPCSITE_REGION";
pub const FALLBACK_ACCOUNT_VAR: &str = "ACCOUNT";
pub const FALLBACK_REGION_VAR: &str = "REGION";
pub const INTERNET_GATEWAY_VAR: &str = "IGW";

/// 値をどちらの変数から得たか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSource {
    Primary,
    Fallback,
}

/// デプロイ先のアカウントとリージョン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
    pub account_source: EnvSource,
    pub region_source: EnvSource,
}

/// カレントディレクトリの .env を読み込む
///
/// 既にプロセス環境に設定されている変数は上書きしない。
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), ".env を読み込みました");
            Some(path)
        }
        Err(_) => None,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn first_var(primary: &str, fallback: &str) -> Option<(String, EnvSource)> {
    non_empty_var(primary)
        .map(|v| (v, EnvSource::Primary))
        .or_else(|| non_empty_var(fallback).map(|v| (v, EnvSource::Fallback)))
}

/// アカウントとリージョンを解決する
///
/// それぞれ独立に VPCSITE_* を優先し、なければ ACCOUNT / REGION を使う。
/// どちらか一方でも値がなければエラー。
pub fn resolve_environment() -> Result<Environment> {
    let account = first_var(PRIMARY_ACCOUNT_VAR, FALLBACK_ACCOUNT_VAR);
    let region = first_var(PRIMARY_REGION_VAR, FALLBACK_REGION_VAR);

    match (account, region) {
        (Some((account, account_source)), Some((region, region_source))) => Ok(Environment {
            account,
            region,
            account_source,
            region_source,
        }),
        _ => Err(ConfigError::MissingEnvironment),
    }
}

/// パブリックサブネットのデフォルトルートに使う既存インターネットゲートウェイ ID
pub fn internet_gateway_id() -> Result<String> {
    non_empty_var(INTERNET_GATEWAY_VAR)
        .ok_or_else(|| ConfigError::MissingVariable(INTERNET_GATEWAY_VAR.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: [&str; 4] = [
        PRIMARY_ACCOUNT_VAR,
        PRIMARY_REGION_VAR,
        FALLBACK_ACCOUNT_VAR,
        FALLBACK_REGION_VAR,
    ];

    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let kvs: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(kvs, f)
    }

    #[test]
    #[serial]
    fn test_primary_pair_wins() {
        let env = with_env(
            &[
                ("VPCSITE_ACCOUNT", "111111111111"),
                ("VPCSITE_REGION", "ap-northeast-1"),
                ("ACCOUNT", "222222222222"),
                ("REGION", "us-east-1"),
            ],
            resolve_environment,
        )
        .unwrap();

        assert_eq!(env.account, "111111111111");
        assert_eq!(env.region, "ap-northeast-1");
        assert_eq!(env.account_source, EnvSource::Primary);
        assert_eq!(env.region_source, EnvSource::Primary);
    }

    #[test]
    #[serial]
    fn test_fallback_pair() {
        let env = with_env(
            &[("ACCOUNT", "222222222222"), ("REGION", "us-east-1")],
            resolve_environment,
        )
        .unwrap();

        assert_eq!(env.account, "222222222222");
        assert_eq!(env.account_source, EnvSource::Fallback);
        assert_eq!(env.region_source, EnvSource::Fallback);
    }

    #[test]
    #[serial]
    fn test_account_and_region_fall_back_independently() {
        // VPCSITE_REGION がなければ REGION だけを補う
        let env = with_env(
            &[
                ("VPCSITE_ACCOUNT", "111111111111"),
                ("ACCOUNT", "222222222222"),
                ("REGION", "us-east-1"),
            ],
            resolve_environment,
        )
        .unwrap();
        assert_eq!(env.account, "111111111111");
        assert_eq!(env.region, "us-east-1");
        assert_eq!(env.account_source, EnvSource::Primary);
        assert_eq!(env.region_source, EnvSource::Fallback);

        let env = with_env(
            &[("VPCSITE_ACCOUNT", "111111111111"), ("REGION", "us-east-1")],
            resolve_environment,
        )
        .unwrap();
        assert_eq!(env.account, "111111111111");
        assert_eq!(env.region, "us-east-1");
    }

    #[test]
    #[serial]
    fn test_missing_environment() {
        let result = with_env(&[("VPCSITE_ACCOUNT", "111111111111"), ("REGION", " ")], resolve_environment);
        assert!(matches!(result, Err(ConfigError::MissingEnvironment)));

        let result = with_env(&[("VPCSITE_REGION", "ap-northeast-1")], resolve_environment);
        assert!(matches!(result, Err(ConfigError::MissingEnvironment)));
    }

    #[test]
    #[serial]
    fn test_internet_gateway_id() {
        let id = temp_env::with_var(INTERNET_GATEWAY_VAR, Some("igw-0a1b2c3d"), internet_gateway_id);
        assert_eq!(id.unwrap(), "igw-0a1b2c3d");

        let missing = temp_env::with_var(INTERNET_GATEWAY_VAR, None::<&str>, internet_gateway_id);
        assert!(matches!(missing, Err(ConfigError::MissingVariable(name)) if name == "IGW"));

        let empty = temp_env::with_var(INTERNET_GATEWAY_VAR, Some(""), internet_gateway_id);
        assert!(empty.is_err());
    }
}
