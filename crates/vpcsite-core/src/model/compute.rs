use vpcsite_cloud::RemovalPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineImage {
    /// Latest Amazon Linux 2, resolved from the public SSM parameter at deploy time
    LatestAmazonLinux2,
    /// A fixed AMI
    Ami(String),
}

impl MachineImage {
    pub fn image_id(&self) -> String {
        match self {
            MachineImage::LatestAmazonLinux2 => {
                "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}"
                    .to_string()
            }
            MachineImage::Ami(id) => id.clone(),
        }
    }
}

/// A virtual machine bound to one subnet, one role and one security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub logical_id: String,
    pub name: String,
    pub subnet: String,
    pub security_group: String,
    pub role: String,
    pub associate_public_ip: bool,
    pub instance_type: String,
    pub machine_image: MachineImage,
    pub key_name: String,
    pub removal_policy: RemovalPolicy,
}
