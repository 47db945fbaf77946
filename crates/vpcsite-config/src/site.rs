//! vpcsite.yaml の検索と読み込み

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_VAR: &str = "VPCSITE_CONFIG_PATH";

/// サイト設定
///
/// 省略したキーは既定値になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub bucket_name: String,
    pub key_pair_name: String,
    pub private_subnet_cidr: String,
    pub public_subnet_cidr: String,
    pub instance_type: String,
    pub index_document: String,
    /// 事前に調べたデフォルト VPC (オフライン時に EC2 への問い合わせの代わりに使う)
    pub network: Option<NetworkConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            bucket_name: "static-website-vpce-bucket".to_string(),
            key_pair_name: "static-website-key-pair".to_string(),
            private_subnet_cidr: "172.31.48.0/20".to_string(),
            public_subnet_cidr: "172.31.64.0/20".to_string(),
            instance_type: "t2.micro".to_string(),
            index_document: "index.html".to_string(),
            network: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub vpc_id: String,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub availability_zones: Vec<String>,
}

impl SiteConfig {
    /// 設定ファイルを読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 設定ファイルを探して読み込む。見つからなければ既定値。
    pub fn discover() -> Result<(Self, Option<PathBuf>)> {
        match find_config_file()? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "設定ファイルを読み込みます");
                Ok((Self::load(&path)?, Some(path)))
            }
            None => {
                tracing::debug!("設定ファイルがないため既定値を使います");
                Ok((Self::default(), None))
            }
        }
    }
}

/// vpcsite.yaml を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 VPCSITE_CONFIG_PATH (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: vpcsite.local.yaml, vpcsite.yaml
/// 3. ./.vpcsite/vpcsite.yaml
/// 4. ~/.config/vpcsite/vpcsite.yaml (グローバル設定)
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_VAR) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in ["vpcsite.local.yaml", "vpcsite.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. ./.vpcsite/ ディレクトリ
    let project_config = current_dir.join(".vpcsite").join("vpcsite.yaml");
    if project_config.exists() {
        return Ok(Some(project_config));
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("vpcsite").join("vpcsite.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn in_dir<R>(dir: &Path, f: impl FnOnce() -> R) -> R {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_var(CONFIG_PATH_VAR, None::<&str>, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vpcsite.yaml");
        fs::write(
            &path,
            "bucket_name: my-site\nnetwork:\n  vpc_id: vpc-0abc\n  availability_zones: [ap-northeast-1a]\n",
        )
        .unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.bucket_name, "my-site");
        assert_eq!(config.instance_type, "t2.micro");
        assert_eq!(config.private_subnet_cidr, "172.31.48.0/20");

        let network = config.network.unwrap();
        assert_eq!(network.vpc_id, "vpc-0abc");
        assert_eq!(network.cidr, None);
        assert_eq!(network.availability_zones, vec!["ap-northeast-1a"]);
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vpcsite.yaml");
        fs::write(&path, "").unwrap();
        assert_eq!(SiteConfig::load(&path).unwrap(), SiteConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vpcsite.yaml");
        fs::write(&path, "bucket_name: [unterminated").unwrap();
        assert!(matches!(
            SiteConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("vpcsite.yaml"), "bucket_name: shared").unwrap();
        fs::write(temp_dir.path().join("vpcsite.local.yaml"), "bucket_name: local").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap().unwrap();
        // vpcsite.local.yaml が優先される
        assert!(found.ends_with("vpcsite.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".vpcsite");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("vpcsite.yaml"), "bucket_name: project").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap().unwrap();
        assert!(found.ends_with(".vpcsite/vpcsite.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_path_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");

        let missing = temp_env::with_var(CONFIG_PATH_VAR, Some(&config_path), find_config_file);
        assert!(matches!(missing, Err(ConfigError::ConfigFileNotFound(_))));

        fs::write(&config_path, "bucket_name: custom").unwrap();
        let found = temp_env::with_var(CONFIG_PATH_VAR, Some(&config_path), find_config_file);
        assert_eq!(found.unwrap(), Some(config_path));
    }
}
