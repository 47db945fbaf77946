use ipnetwork::Ipv4Network;
use vpcsite_cloud::RemovalPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
        }
    }
}

/// Traffic source of an ingress rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    AnyIpv4,
    Cidr(Ipv4Network),
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Peer::Cidr(cidr) => write!(f, "{}", cidr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: u16,
    pub peer: Peer,
    pub description: String,
}

impl IngressRule {
    pub fn tcp(port: u16, peer: Peer, description: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
            peer,
            description: description.into(),
        }
    }
}

/// Firewall rules for the instance of exactly one subnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub logical_id: String,
    pub group_name: String,
    pub vpc_id: String,
    /// Logical ID of the subnet this group serves
    pub subnet: String,
    pub allow_all_outbound: bool,
    pub ingress: Vec<IngressRule>,
    pub removal_policy: RemovalPolicy,
}

impl SecurityGroup {
    pub fn ingress_ports(&self) -> Vec<u16> {
        self.ingress.iter().map(|r| r.port).collect()
    }
}
