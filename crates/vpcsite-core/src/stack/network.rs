//! Network topology: subnet pair, security groups, roles, instances and the
//! storage gateway endpoint

use crate::cidr;
use crate::error::{Result, TopologyError};
use crate::model::{
    s3_service_name, EndpointId, GatewayEndpoint, IngressRule, Instance, InstanceRole,
    MachineImage, NetworkPartition, Peer, Route, RouteTarget, SecurityGroup, Subnet, SubnetKind,
    EC2_SERVICE_PRINCIPAL,
};
use crate::policy::{bucket_object_arn, PolicyDocument, PolicyStatement, Principal, S3_GET_OBJECT};
use crate::settings::TopologySettings;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;
use vpcsite_cloud::{
    reference, ApplyResult, ProviderState, RemovalPolicy, ResourceConfig, ResourceSet,
};

/// Output name under which the endpoint's physical ID is exported
pub const ENDPOINT_OUTPUT: &str = "VpcEndpointId";

/// Subnet, security group and role each instance is bound to
#[derive(Debug, Clone, Copy)]
pub struct InstanceBindings<'a> {
    pub private_subnet: &'a Subnet,
    pub public_subnet: &'a Subnet,
    pub private_security_group: &'a SecurityGroup,
    pub public_security_group: &'a SecurityGroup,
    pub private_role: &'a InstanceRole,
    pub public_role: &'a InstanceRole,
}

/// Builds the network half of the topology inside an existing network
pub struct NetworkTopologyBuilder<'a> {
    network: &'a NetworkPartition,
    settings: &'a TopologySettings,
}

impl<'a> NetworkTopologyBuilder<'a> {
    pub fn new(network: &'a NetworkPartition, settings: &'a TopologySettings) -> Self {
        Self { network, settings }
    }

    /// Private subnet without any internet route and public subnet with a
    /// single default route to the configured internet gateway, both in the
    /// network's first availability zone.
    pub fn build_subnets(&self) -> Result<(Subnet, Subnet)> {
        let gateway_id = self
            .settings
            .internet_gateway_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(TopologyError::MissingInternetGateway)?;

        let zone = self
            .network
            .first_availability_zone()
            .ok_or_else(|| TopologyError::NoAvailabilityZone(self.network.vpc_id.clone()))?;

        let private_cidr = self.settings.private_subnet_cidr;
        let public_cidr = self.settings.public_subnet_cidr;
        cidr::ensure_disjoint(&[private_cidr, public_cidr])?;

        if let Some(network_cidr) = &self.network.cidr {
            for block in [&private_cidr, &public_cidr] {
                if !cidr::contains_network(network_cidr, block) {
                    return Err(TopologyError::CidrOutsideNetwork {
                        cidr: block.to_string(),
                        network: network_cidr.to_string(),
                    });
                }
            }
        }

        let private = Subnet {
            logical_id: "PrivateSubnet".to_string(),
            kind: SubnetKind::Private,
            vpc_id: self.network.vpc_id.clone(),
            cidr: private_cidr,
            availability_zone: zone.to_string(),
            map_public_ip_on_launch: false,
            routes: Vec::new(),
            removal_policy: RemovalPolicy::Destroy,
        };

        let public = Subnet {
            logical_id: "PublicSubnet".to_string(),
            kind: SubnetKind::Public,
            vpc_id: self.network.vpc_id.clone(),
            cidr: public_cidr,
            availability_zone: zone.to_string(),
            map_public_ip_on_launch: true,
            routes: vec![Route::default_via_gateway(gateway_id)?],
            removal_policy: RemovalPolicy::Destroy,
        };

        debug!(zone, private = %private.cidr, public = %public.cidr, "Built subnets");
        Ok((private, public))
    }

    /// One group per subnet. Both allow all outbound traffic and SSH, HTTP
    /// and HTTPS from anywhere.
    pub fn build_security_groups(
        &self,
        private_subnet: &Subnet,
        public_subnet: &Subnet,
    ) -> (SecurityGroup, SecurityGroup) {
        let private = SecurityGroup {
            logical_id: "PrivateSubnetSecurityGroup".to_string(),
            group_name: "private-subnet-sg".to_string(),
            vpc_id: self.network.vpc_id.clone(),
            subnet: private_subnet.logical_id.clone(),
            allow_all_outbound: true,
            ingress: web_ingress("Allow SSH from public EC2 instance"),
            removal_policy: RemovalPolicy::Destroy,
        };

        let public = SecurityGroup {
            logical_id: "PublicSubnetSecurityGroup".to_string(),
            group_name: "public-subnet-sg".to_string(),
            vpc_id: self.network.vpc_id.clone(),
            subnet: public_subnet.logical_id.clone(),
            allow_all_outbound: true,
            ingress: web_ingress("Allow SSH from internet"),
            removal_policy: RemovalPolicy::Destroy,
        };

        (private, public)
    }

    /// Two roles trusted only by the compute service, with no permissions
    pub fn build_instance_roles(&self) -> (InstanceRole, InstanceRole) {
        let role = |logical_id: &str| InstanceRole {
            logical_id: logical_id.to_string(),
            assumed_by: EC2_SERVICE_PRINCIPAL.to_string(),
            managed_policy_arns: Vec::new(),
            removal_policy: RemovalPolicy::Destroy,
        };
        (role("PrivateInstanceRole"), role("PublicInstanceRole"))
    }

    /// Exactly one instance per subnet; only the public one gets a public IP
    pub fn build_instances(&self, bindings: &InstanceBindings<'_>) -> (Instance, Instance) {
        let instance = |logical_id: &str,
                        name: &str,
                        subnet: &Subnet,
                        group: &SecurityGroup,
                        role: &InstanceRole| Instance {
            logical_id: logical_id.to_string(),
            name: name.to_string(),
            subnet: subnet.logical_id.clone(),
            security_group: group.logical_id.clone(),
            role: role.logical_id.clone(),
            associate_public_ip: subnet.kind == SubnetKind::Public,
            instance_type: self.settings.instance_type.clone(),
            machine_image: MachineImage::LatestAmazonLinux2,
            key_name: self.settings.key_pair_name.clone(),
            removal_policy: RemovalPolicy::Destroy,
        };

        (
            instance(
                "PrivateEc2Instance",
                "private-instance",
                bindings.private_subnet,
                bindings.private_security_group,
                bindings.private_role,
            ),
            instance(
                "PublicEc2Instance",
                "public-instance",
                bindings.public_subnet,
                bindings.public_security_group,
                bindings.public_role,
            ),
        )
    }

    /// Gateway endpoint on the private subnet's route table that only
    /// allows reading objects of the website bucket. Its ID is assigned when
    /// the endpoint is created; see [`ProvisionedNetwork`].
    pub fn build_gateway_endpoint(&self, private_subnet: &Subnet) -> GatewayEndpoint {
        let policy = PolicyDocument::new().with_statement(
            PolicyStatement::allow()
                .with_principal(Principal::Any)
                .with_action(S3_GET_OBJECT)
                .with_resource(bucket_object_arn(&self.settings.bucket_name)),
        );

        GatewayEndpoint {
            logical_id: "S3VPCEndpoint".to_string(),
            vpc_id: self.network.vpc_id.clone(),
            service_name: s3_service_name(&self.settings.region),
            subnets: vec![private_subnet.logical_id.clone()],
            policy,
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    /// Build the complete network topology or fail
    pub fn build(&self) -> Result<NetworkStack> {
        let (private_subnet, public_subnet) = self.build_subnets()?;
        let (private_security_group, public_security_group) =
            self.build_security_groups(&private_subnet, &public_subnet);
        let (private_role, public_role) = self.build_instance_roles();
        let (private_instance, public_instance) = self.build_instances(&InstanceBindings {
            private_subnet: &private_subnet,
            public_subnet: &public_subnet,
            private_security_group: &private_security_group,
            public_security_group: &public_security_group,
            private_role: &private_role,
            public_role: &public_role,
        });
        let endpoint = self.build_gateway_endpoint(&private_subnet);

        Ok(NetworkStack {
            name: self.settings.network_stack_name.clone(),
            network: self.network.clone(),
            private_subnet,
            public_subnet,
            private_security_group,
            public_security_group,
            private_role,
            public_role,
            private_instance,
            public_instance,
            endpoint,
        })
    }
}

fn web_ingress(ssh_description: &str) -> Vec<IngressRule> {
    vec![
        IngressRule::tcp(22, Peer::AnyIpv4, ssh_description),
        IngressRule::tcp(80, Peer::AnyIpv4, "Allow HTTP traffic"),
        IngressRule::tcp(443, Peer::AnyIpv4, "Allow HTTPS traffic"),
    ]
}

/// Declared network topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStack {
    pub name: String,
    pub network: NetworkPartition,
    pub private_subnet: Subnet,
    pub public_subnet: Subnet,
    pub private_security_group: SecurityGroup,
    pub public_security_group: SecurityGroup,
    pub private_role: InstanceRole,
    pub public_role: InstanceRole,
    pub private_instance: Instance,
    pub public_instance: Instance,
    pub endpoint: GatewayEndpoint,
}

impl NetworkStack {
    pub fn subnets(&self) -> [&Subnet; 2] {
        [&self.private_subnet, &self.public_subnet]
    }

    pub fn security_groups(&self) -> [&SecurityGroup; 2] {
        [&self.private_security_group, &self.public_security_group]
    }

    pub fn roles(&self) -> [&InstanceRole; 2] {
        [&self.private_role, &self.public_role]
    }

    pub fn instances(&self) -> [&Instance; 2] {
        [&self.private_instance, &self.public_instance]
    }

    pub fn subnet(&self, logical_id: &str) -> Option<&Subnet> {
        self.subnets().into_iter().find(|s| s.logical_id == logical_id)
    }

    /// Declare the stack's resources and their dependencies. Fails when an
    /// instance names a subnet that is not part of the stack.
    pub fn to_resource_set(&self) -> Result<ResourceSet> {
        let mut set = ResourceSet::new(&self.name);

        for subnet in self.subnets() {
            for resource in subnet_resources(subnet) {
                set.add(resource);
            }
        }
        for group in self.security_groups() {
            set.add(security_group_resource(group));
        }
        for role in self.roles() {
            for resource in role_resources(role) {
                set.add(resource);
            }
        }
        for instance in self.instances() {
            let subnet = self.subnet(&instance.subnet).ok_or_else(|| {
                TopologyError::validation(
                    &instance.logical_id,
                    format!("サブネット {} は {} に含まれていません", instance.subnet, self.name),
                )
            })?;
            set.add(instance_resource(instance, subnet));
        }
        set.add(endpoint_resource(&self.endpoint, &self.subnets()));
        set.add_output(ENDPOINT_OUTPUT, &self.endpoint.logical_id);

        Ok(set)
    }
}

fn subnet_resources(subnet: &Subnet) -> Vec<ResourceConfig> {
    let route_table = subnet.route_table_id();
    let association = subnet.route_table_association_id();

    let mut resources = vec![
        ResourceConfig::new(
            "AWS::EC2::Subnet",
            &subnet.logical_id,
            json!({
                "VpcId": subnet.vpc_id,
                "CidrBlock": subnet.cidr.to_string(),
                "AvailabilityZone": subnet.availability_zone,
                "MapPublicIpOnLaunch": subnet.map_public_ip_on_launch,
                "Tags": [{ "Key": "aws-cdk:subnet-type", "Value": subnet.kind.to_string() }],
            }),
        )
        .with_removal_policy(subnet.removal_policy),
        ResourceConfig::new(
            "AWS::EC2::RouteTable",
            &route_table,
            json!({ "VpcId": subnet.vpc_id }),
        )
        .with_removal_policy(subnet.removal_policy),
        ResourceConfig::new(
            "AWS::EC2::SubnetRouteTableAssociation",
            &association,
            json!({
                "SubnetId": reference(&subnet.logical_id),
                "RouteTableId": reference(&route_table),
            }),
        )
        .with_removal_policy(subnet.removal_policy),
    ];

    for route in subnet.default_routes() {
        let RouteTarget::InternetGateway(gateway_id) = &route.target;
        resources.push(
            ResourceConfig::new(
                "AWS::EC2::Route",
                subnet.default_route_id(),
                json!({
                    "RouteTableId": reference(&route_table),
                    "DestinationCidrBlock": route.destination.to_string(),
                    "GatewayId": gateway_id,
                }),
            )
            .depends_on(&association)
            .with_removal_policy(subnet.removal_policy),
        );
    }

    resources
}

fn security_group_resource(group: &SecurityGroup) -> ResourceConfig {
    let ingress: Vec<serde_json::Value> = group
        .ingress
        .iter()
        .map(|rule| {
            json!({
                "IpProtocol": rule.protocol.as_str(),
                "FromPort": rule.port,
                "ToPort": rule.port,
                "CidrIp": rule.peer.to_string(),
                "Description": rule.description,
            })
        })
        .collect();

    let egress = if group.allow_all_outbound {
        json!([{ "IpProtocol": "-1", "CidrIp": "0.0.0.0/0", "Description": "Allow all outbound traffic by default" }])
    } else {
        json!([])
    };

    ResourceConfig::new(
        "AWS::EC2::SecurityGroup",
        &group.logical_id,
        json!({
            "GroupName": group.group_name,
            "GroupDescription": format!("{}/{}", group.subnet, group.logical_id),
            "VpcId": group.vpc_id,
            "SecurityGroupIngress": ingress,
            "SecurityGroupEgress": egress,
        }),
    )
    .with_removal_policy(group.removal_policy)
}

fn role_resources(role: &InstanceRole) -> Vec<ResourceConfig> {
    vec![
        ResourceConfig::new(
            "AWS::IAM::Role",
            &role.logical_id,
            json!({
                "AssumeRolePolicyDocument": role.trust_policy().to_json(),
                "ManagedPolicyArns": role.managed_policy_arns,
            }),
        )
        .with_removal_policy(role.removal_policy),
        ResourceConfig::new(
            "AWS::IAM::InstanceProfile",
            role.instance_profile_id(),
            json!({ "Roles": [reference(&role.logical_id)] }),
        )
        .with_removal_policy(role.removal_policy),
    ]
}

fn instance_resource(instance: &Instance, subnet: &Subnet) -> ResourceConfig {
    let mut resource = ResourceConfig::new(
        "AWS::EC2::Instance",
        &instance.logical_id,
        json!({
            "ImageId": instance.machine_image.image_id(),
            "InstanceType": instance.instance_type,
            "KeyName": instance.key_name,
            "IamInstanceProfile": reference(&format!("{}InstanceProfile", instance.role)),
            "AvailabilityZone": subnet.availability_zone,
            "NetworkInterfaces": [{
                "DeviceIndex": "0",
                "SubnetId": reference(&instance.subnet),
                "GroupSet": [reference(&instance.security_group)],
                "AssociatePublicIpAddress": instance.associate_public_ip,
            }],
            "Tags": [{ "Key": "Name", "Value": instance.name }],
        }),
    )
    .depends_on(&instance.role)
    .depends_on(subnet.route_table_association_id())
    .with_removal_policy(instance.removal_policy);

    // Instances in a routed subnet wait for the internet route
    if subnet.default_routes().next().is_some() {
        resource = resource.depends_on(subnet.default_route_id());
    }
    resource
}

fn endpoint_resource(endpoint: &GatewayEndpoint, subnets: &[&Subnet]) -> ResourceConfig {
    let bound: Vec<&Subnet> = subnets
        .iter()
        .copied()
        .filter(|s| endpoint.subnets.contains(&s.logical_id))
        .collect();
    let route_tables: Vec<serde_json::Value> =
        bound.iter().map(|s| reference(&s.route_table_id())).collect();

    let mut resource = ResourceConfig::new(
        "AWS::EC2::VPCEndpoint",
        &endpoint.logical_id,
        json!({
            "ServiceName": endpoint.service_name,
            "VpcEndpointType": "Gateway",
            "VpcId": endpoint.vpc_id,
            "RouteTableIds": route_tables,
            "PolicyDocument": endpoint.policy.to_json(),
        }),
    )
    .with_removal_policy(endpoint.removal_policy);

    for subnet in bound {
        resource = resource.depends_on(subnet.route_table_association_id());
    }
    resource
}

/// Network topology confirmed as created by the engine
///
/// This is the only source of an [`EndpointId`] inside a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedNetwork {
    stack: String,
    endpoint_id: EndpointId,
    physical_ids: BTreeMap<String, String>,
}

impl ProvisionedNetwork {
    /// Check that every declared resource exists and read the endpoint ID
    /// the engine exported for this run
    pub fn confirm(
        stack: &NetworkStack,
        applied: &ApplyResult,
        state: &ProviderState,
    ) -> Result<Self> {
        if !applied.is_success() {
            return Err(TopologyError::NetworkNotProvisioned(
                applied.first_error().unwrap_or("適用に失敗しました").to_string(),
            ));
        }

        let mut physical_ids = BTreeMap::new();
        for resource in stack.to_resource_set()?.iter() {
            let physical_id = state.physical_id(&resource.id).ok_or_else(|| {
                TopologyError::NetworkNotProvisioned(format!("{} が作成されていません", resource.id))
            })?;
            physical_ids.insert(resource.id.clone(), physical_id.to_string());
        }

        let exported = applied.outputs.get(ENDPOINT_OUTPUT).ok_or_else(|| {
            TopologyError::UnresolvedEndpoint(format!("出力 {} がエクスポートされていません", ENDPOINT_OUTPUT))
        })?;
        let recorded = physical_ids
            .get(&stack.endpoint.logical_id)
            .map(String::as_str)
            .unwrap_or_default();
        if exported != recorded {
            return Err(TopologyError::UnresolvedEndpoint(format!(
                "エクスポートされた {} が作成済みの {} と一致しません",
                exported, recorded
            )));
        }

        Ok(Self {
            stack: stack.name.clone(),
            endpoint_id: EndpointId::parse(exported)?,
            physical_ids,
        })
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    pub fn physical_id(&self, logical_id: &str) -> Option<&str> {
        self.physical_ids.get(logical_id).map(String::as_str)
    }
}
