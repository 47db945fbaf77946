use crate::cidr;
use crate::error::Result;
use ipnetwork::Ipv4Network;
use vpcsite_cloud::RemovalPolicy;

/// The enclosing virtual network. Looked up, never created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPartition {
    pub vpc_id: String,
    /// Primary CIDR block, when the lookup reported one
    pub cidr: Option<Ipv4Network>,
    pub availability_zones: Vec<String>,
}

impl NetworkPartition {
    pub fn new(vpc_id: impl Into<String>, availability_zones: Vec<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            cidr: None,
            availability_zones,
        }
    }

    pub fn with_cidr(mut self, cidr: Ipv4Network) -> Self {
        self.cidr = Some(cidr);
        self
    }

    pub fn first_availability_zone(&self) -> Option<&str> {
        self.availability_zones.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetKind {
    Private,
    Public,
}

impl std::fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubnetKind::Private => write!(f, "private"),
            SubnetKind::Public => write!(f, "public"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// An internet gateway that already exists in the account
    InternetGateway(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: Ipv4Network,
    pub target: RouteTarget,
}

impl Route {
    /// `0.0.0.0/0` through an existing internet gateway
    pub fn default_via_gateway(gateway_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            destination: cidr::any_ipv4()?,
            target: RouteTarget::InternetGateway(gateway_id.into()),
        })
    }

    pub fn is_default(&self) -> bool {
        self.destination.prefix() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub logical_id: String,
    pub kind: SubnetKind,
    pub vpc_id: String,
    pub cidr: Ipv4Network,
    pub availability_zone: String,
    pub map_public_ip_on_launch: bool,
    pub routes: Vec<Route>,
    pub removal_policy: RemovalPolicy,
}

impl Subnet {
    pub fn default_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.is_default())
    }

    pub fn route_table_id(&self) -> String {
        format!("{}RouteTable", self.logical_id)
    }

    pub fn route_table_association_id(&self) -> String {
        format!("{}RouteTableAssociation", self.logical_id)
    }

    pub fn default_route_id(&self) -> String {
        format!("{}DefaultRoute", self.logical_id)
    }
}
