//! Topology error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error(
        "インターネットゲートウェイIDが設定されていません。\nパブリックサブネットのデフォルトルートに必要です。IGW に既存のゲートウェイ (igw-...) を設定してください"
    )]
    MissingInternetGateway,

    #[error("デフォルトネットワークが見つかりません: {0}")]
    NetworkNotFound(String),

    #[error("ネットワーク {0} にアベイラビリティゾーンがありません")]
    NoAvailabilityZone(String),

    #[error("無効なCIDRブロック: {cidr}\n理由: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("CIDRブロックが重複しています: {first} と {second}")]
    CidrOverlap { first: String, second: String },

    #[error("CIDRブロック {cidr} がネットワーク {network} の範囲外です")]
    CidrOutsideNetwork { cidr: String, network: String },

    #[error("エンドポイントIDが解決されていません: {0}")]
    UnresolvedEndpoint(String),

    #[error("ネットワークスタックがプロビジョニングされていません: {0}")]
    NetworkNotProvisioned(String),

    #[error(
        "バケットポリシーは既に {existing} 経由のアクセスを許可しています。{requested} の条件は追加できません"
    )]
    PolicyAlreadyAttached { existing: String, requested: String },

    #[error("{stack} のプロビジョニングに失敗しました\n理由: {reason}")]
    ProvisioningFailed { stack: String, reason: String },

    #[error("検証エラー: {subject}\n理由: {message}")]
    Validation { subject: String, message: String },

    #[error("エンジンエラー: {0}")]
    Cloud(#[from] vpcsite_cloud::CloudError),
}

impl TopologyError {
    pub(crate) fn validation(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_what_to_fix() {
        let missing = TopologyError::MissingInternetGateway.to_string();
        assert!(missing.contains("インターネットゲートウェイ"));
        assert!(missing.contains("IGW"));

        let overlap = TopologyError::CidrOverlap {
            first: "172.31.48.0/20".to_string(),
            second: "172.31.56.0/21".to_string(),
        }
        .to_string();
        assert_eq!(overlap, "CIDRブロックが重複しています: 172.31.48.0/20 と 172.31.56.0/21");

        let failed = TopologyError::ProvisioningFailed {
            stack: "StaticWebsiteS3Stack".to_string(),
            reason: "bucket name taken".to_string(),
        }
        .to_string();
        assert!(failed.starts_with("StaticWebsiteS3Stack のプロビジョニングに失敗しました"));
        assert!(failed.ends_with("理由: bucket name taken"));
    }
}
