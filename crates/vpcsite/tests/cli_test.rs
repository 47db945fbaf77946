#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SITE_CONFIG: &str = r#"
bucket_name: test-site-bucket
network:
  vpc_id: vpc-0a1b2c3d
  cidr: 172.31.0.0/16
  availability_zones:
    - ap-northeast-1a
    - ap-northeast-1c
"#;

/// 一時ディレクトリと、外部環境に依存しないコマンドを用意する
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("vpcsite.yaml"), SITE_CONFIG).unwrap();
    dir
}

fn vpcsite(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vpcsite").unwrap();
    cmd.current_dir(dir.path())
        .env("VPCSITE_CONFIG_PATH", dir.path().join("vpcsite.yaml"))
        .env("VPCSITE_ACCOUNT", "123456789012")
        .env("VPCSITE_REGION", "ap-northeast-1")
        .env("IGW", "igw-0a1b2c3d4e5f67890")
        .env_remove("ACCOUNT")
        .env_remove("REGION")
        .env_remove("RUST_LOG")
        .arg("--offline");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("vpcsite").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("synth"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("--offline"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("vpcsite").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vpcsite"));
}

/// アカウントとリージョンがなければ失敗する
#[test]
fn test_missing_environment_fails() {
    let dir = project();
    vpcsite(&dir)
        .env_remove("VPCSITE_ACCOUNT")
        .env_remove("VPCSITE_REGION")
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("VPCSITE_ACCOUNT"));
}

/// IGW がなければ何も作らずに失敗する
#[test]
fn test_missing_gateway_fails() {
    let dir = project();
    vpcsite(&dir)
        .env_remove("IGW")
        .arg("deploy")
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("IGW"));
    assert!(!dir.path().join(".vpcsite").exists());
}

#[test]
fn test_validate_offline() {
    let dir = project();
    vpcsite(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc-0a1b2c3d"))
        .stdout(predicate::str::contains("public-instance"))
        .stdout(predicate::str::contains("com.amazonaws.ap-northeast-1.s3"));
}

/// 重なる CIDR は検証で弾かれる
#[test]
fn test_validate_rejects_overlap() {
    let dir = project();
    fs::write(
        dir.path().join("vpcsite.yaml"),
        format!(
            "{}private_subnet_cidr: 172.31.48.0/20\npublic_subnet_cidr: 172.31.56.0/21\n",
            SITE_CONFIG.trim_start()
        ),
    )
    .unwrap();

    vpcsite(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("172.31.56.0/21"));
}

#[test]
fn test_synth_writes_templates() {
    let dir = project();
    let out = dir.path().join("cdk.out");
    vpcsite(&dir).arg("synth").arg("--out").arg(&out).assert().success();

    let network: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.join("StaticWebsiteVpcStack.template.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        network["Resources"]["S3VPCEndpoint"]["Type"],
        "AWS::EC2::VPCEndpoint"
    );

    let storage: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.join("StaticWebsiteS3Stack.template.json")).unwrap(),
    )
    .unwrap();
    assert!(storage["Resources"]["WebsiteBucket"].is_object());
    assert!(storage["Resources"]["WebsiteBucketPolicy"].is_null());
}

/// --yes なしでは何も適用しない
#[test]
fn test_deploy_requires_confirmation() {
    let dir = project();
    vpcsite(&dir)
        .arg("deploy")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert!(!dir.path().join(".vpcsite").join("state.json").exists());
}

#[test]
fn test_deploy_status_destroy() {
    let dir = project();

    vpcsite(&dir)
        .arg("deploy")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("vpce-"));

    vpcsite(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("S3VPCEndpoint"))
        .stdout(predicate::str::contains("WebsiteBucketPolicy"));

    vpcsite(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("変更はありません"));

    vpcsite(&dir)
        .arg("destroy")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("すべてのリソースを削除しました"));

    vpcsite(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("未デプロイ"));
}
