//! Topology validator
//!
//! Run against declared stacks before anything is applied.

use crate::cidr;
use crate::error::{Result, TopologyError};
use crate::model::{EndpointId, RouteTarget, SubnetKind};
use crate::policy::{bucket_object_arn, Principal, S3_GET_OBJECT, SOURCE_VPCE_KEY, STRING_EQUALS};
use crate::stack::{NetworkStack, StorageStack};
use std::collections::BTreeSet;
use vpcsite_cloud::{RemovalPolicy, ResourceSet};

const S3_ARN_PREFIX: &str = "arn:aws:s3:::";

/// Check a declared network topology
pub fn validate_network(stack: &NetworkStack) -> Result<()> {
    let private = &stack.private_subnet;
    let public = &stack.public_subnet;

    if private.kind != SubnetKind::Private || public.kind != SubnetKind::Public {
        return Err(TopologyError::validation(
            "subnets",
            "プライベートとパブリックのサブネットが1つずつ必要です",
        ));
    }

    cidr::ensure_disjoint(&[private.cidr, public.cidr])?;
    if let Some(network_cidr) = &stack.network.cidr {
        for subnet in stack.subnets() {
            if !cidr::contains_network(network_cidr, &subnet.cidr) {
                return Err(TopologyError::CidrOutsideNetwork {
                    cidr: subnet.cidr.to_string(),
                    network: network_cidr.to_string(),
                });
            }
        }
    }

    if private.default_routes().count() != 0 {
        return Err(TopologyError::validation(
            &private.logical_id,
            "プライベートサブネットにデフォルトルートは設定できません",
        ));
    }
    let public_routes: Vec<_> = public.default_routes().collect();
    match public_routes.as_slice() {
        [route] => {
            let RouteTarget::InternetGateway(gateway_id) = &route.target;
            if gateway_id.trim().is_empty() {
                return Err(TopologyError::MissingInternetGateway);
            }
        }
        routes => {
            return Err(TopologyError::validation(
                &public.logical_id,
                format!("パブリックサブネットにはデフォルトルートが1つだけ必要です (現在 {})", routes.len()),
            ));
        }
    }

    let mut served = BTreeSet::new();
    for group in stack.security_groups() {
        if stack.subnet(&group.subnet).is_none() {
            return Err(TopologyError::validation(
                &group.logical_id,
                format!("不明なサブネット: {}", group.subnet),
            ));
        }
        if !served.insert(group.subnet.as_str()) {
            return Err(TopologyError::validation(
                &group.logical_id,
                format!("サブネット {} には既にセキュリティグループがあります", group.subnet),
            ));
        }
    }

    let mut roles = BTreeSet::new();
    for instance in stack.instances() {
        let subnet = stack.subnet(&instance.subnet).ok_or_else(|| {
            TopologyError::validation(&instance.logical_id, format!("不明なサブネット: {}", instance.subnet))
        })?;
        let group_matches = stack
            .security_groups()
            .into_iter()
            .any(|g| g.logical_id == instance.security_group && g.subnet == subnet.logical_id);
        if !group_matches {
            return Err(TopologyError::validation(
                &instance.logical_id,
                "セキュリティグループがインスタンスのサブネットに属していません",
            ));
        }
        if !roles.insert(instance.role.as_str()) {
            return Err(TopologyError::validation(
                &instance.logical_id,
                format!("ロール {} は別のインスタンスと共有されています", instance.role),
            ));
        }
        if instance.associate_public_ip != (subnet.kind == SubnetKind::Public) {
            return Err(TopologyError::validation(
                &instance.logical_id,
                "パブリックIPを持てるのはパブリックインスタンスだけです",
            ));
        }
    }

    let endpoint = &stack.endpoint;
    let endpoint_subnets_private = !endpoint.subnets.is_empty()
        && endpoint.subnets.iter().all(|id| {
            stack
                .subnet(id)
                .is_some_and(|s| s.kind == SubnetKind::Private)
        });
    if !endpoint_subnets_private {
        return Err(TopologyError::validation(
            &endpoint.logical_id,
            "エンドポイントはプライベートサブネットにのみ関連付けてください",
        ));
    }
    let read_only = !endpoint.policy.is_empty()
        && endpoint.policy.statements.iter().all(|s| {
            s.has_exact_actions(&[S3_GET_OBJECT])
                && !s.resources.is_empty()
                && s.resources
                    .iter()
                    .all(|r| r.starts_with(S3_ARN_PREFIX) && r.ends_with("/*"))
        });
    if !read_only {
        return Err(TopologyError::validation(
            &endpoint.logical_id,
            "エンドポイントポリシーはバケットオブジェクトの読み取りのみ許可できます",
        ));
    }

    check_removal_policies(&stack.to_resource_set()?)
}

/// Check the storage topology after its policy was attached for `endpoint`
pub fn validate_storage(stack: &StorageStack, endpoint: &EndpointId) -> Result<()> {
    let bucket = &stack.bucket;
    if !bucket.block_public_access.block_public_acls
        || !bucket.block_public_access.ignore_public_acls
    {
        return Err(TopologyError::validation(
            &bucket.logical_id,
            "パブリックACLはブロックする必要があります",
        ));
    }

    let policy = stack.policy().ok_or_else(|| {
        TopologyError::validation(&bucket.logical_id, "アクセスポリシーが設定されていません")
    })?;
    let [statement] = policy.document.statements.as_slice() else {
        return Err(TopologyError::validation(
            &policy.logical_id,
            format!(
                "ステートメントは1つだけ必要です (現在 {})",
                policy.document.statements.len()
            ),
        ));
    };

    if !statement.has_exact_actions(&[S3_GET_OBJECT]) {
        return Err(TopologyError::validation(
            &policy.logical_id,
            "ステートメントで許可できるのは s3:GetObject だけです",
        ));
    }
    if statement.principal != Some(Principal::Any) {
        return Err(TopologyError::validation(
            &policy.logical_id,
            "ステートメントのプリンシパルは全員 (*) である必要があります",
        ));
    }
    if statement.resources != [bucket_object_arn(&bucket.name)] {
        return Err(TopologyError::validation(
            &policy.logical_id,
            format!("ステートメントの対象は {} のみにしてください", bucket_object_arn(&bucket.name)),
        ));
    }

    let condition_count: usize = statement.conditions.values().map(|keys| keys.len()).sum();
    let source = statement.condition(STRING_EQUALS, SOURCE_VPCE_KEY);
    if condition_count != 1 || source != Some(endpoint.as_str()) {
        return Err(TopologyError::validation(
            &policy.logical_id,
            format!(
                "条件は {} {} == {} である必要があります (現在 {:?})",
                STRING_EQUALS, SOURCE_VPCE_KEY, endpoint, statement.conditions
            ),
        ));
    }

    check_removal_policies(&stack.to_resource_set())
}

/// Every declared resource must be removed on teardown
pub fn check_removal_policies(set: &ResourceSet) -> Result<()> {
    match set
        .iter()
        .find(|r| r.removal_policy != RemovalPolicy::Destroy)
    {
        Some(resource) => Err(TopologyError::validation(
            &resource.id,
            format!("削除ポリシーが {} です。Destroy である必要があります", resource.removal_policy),
        )),
        None => Ok(()),
    }
}
