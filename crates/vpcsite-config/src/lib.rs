pub mod env;
pub mod error;
pub mod site;

pub use env::*;
pub use error::*;
pub use site::*;

use std::path::PathBuf;

/// vpcsite のグローバル設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("vpcsite");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("vpcsite"));
        assert!(config_dir.exists());
    }
}
