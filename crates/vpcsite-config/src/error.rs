use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error("VPCSITE_CONFIG_PATH で指定された設定ファイルが見つかりません: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error(
        "アカウントまたはリージョンが設定されていません。それぞれ以下のどちらかを設定してください:\n\
        - アカウント: VPCSITE_ACCOUNT または ACCOUNT\n\
        - リージョン: VPCSITE_REGION または REGION"
    )]
    MissingEnvironment,

    #[error("環境変数 {0} が設定されていません")]
    MissingVariable(String),

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
