//! Declared resources and their dependency graph

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What happens to a resource when its stack is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource together with the stack
    Destroy,
    /// Orphan the resource (the engine stops tracking it but leaves it in place)
    #[default]
    Retain,
}

impl RemovalPolicy {
    /// CloudFormation `DeletionPolicy` value
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

impl std::fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalPolicy::Destroy => write!(f, "destroy"),
            RemovalPolicy::Retain => write!(f, "retain"),
        }
    }
}

/// Set of resources making up one stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Stack name
    pub stack: String,

    /// Resources indexed by logical ID
    pub resources: BTreeMap<String, ResourceConfig>,

    /// Stack outputs: output name -> logical ID whose physical ID is exported
    pub outputs: BTreeMap<String, String>,
}

impl ResourceSet {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn add_output(&mut self, name: impl Into<String>, logical_id: impl Into<String>) {
        self.outputs.insert(name.into(), logical_id.into());
    }

    pub fn get(&self, id: &str) -> Option<&ResourceConfig> {
        self.resources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources ordered so that every resource comes after everything it
    /// depends on. Ties are broken by logical ID, so the order is stable.
    pub fn creation_order(&self) -> Result<Vec<&ResourceConfig>> {
        let mut pending: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for resource in self.resources.values() {
            let deps = resource.dependencies();
            if let Some(missing) = deps.iter().find(|d| !self.resources.contains_key(*d)) {
                return Err(CloudError::DependencyNotFound {
                    resource: resource.id.clone(),
                    dependency: missing.clone(),
                });
            }
            pending.insert(resource.id.as_str(), deps);
        }

        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready: Vec<&str> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<&str> = pending.keys().copied().collect();
                return Err(CloudError::CircularDependency(stuck.join(", ")));
            }

            for id in ready {
                pending.remove(id);
                for deps in pending.values_mut() {
                    deps.remove(id);
                }
                order.push(&self.resources[id]);
            }
        }

        Ok(order)
    }

    /// Reverse of [`creation_order`](Self::creation_order)
    pub fn teardown_order(&self) -> Result<Vec<&ResourceConfig>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }

    /// Render as a CloudFormation-style template
    pub fn to_template(&self) -> serde_json::Value {
        let resources: serde_json::Map<String, serde_json::Value> = self
            .resources
            .values()
            .map(|r| (r.id.clone(), r.to_template()))
            .collect();

        let outputs: serde_json::Map<String, serde_json::Value> = self
            .outputs
            .iter()
            .map(|(name, id)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "Value": { "Ref": id },
                        "Export": { "Name": format!("{}:{}", self.stack, name) },
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "Description": self.stack,
            "Resources": resources,
            "Outputs": outputs,
        })
    }
}

/// Configuration for a single declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "AWS::EC2::Subnet")
    pub resource_type: String,

    /// Logical identifier, unique within the stack
    pub id: String,

    /// Resource-specific properties. `{"Ref": "<id>"}` objects are replaced
    /// with the referenced resource's physical ID at provisioning time.
    pub properties: serde_json::Value,

    /// Explicit dependencies in addition to the ones implied by `Ref`s
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            properties,
            depends_on: Vec::new(),
            removal_policy: RemovalPolicy::default(),
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Get a property value as a specific type
    pub fn get_property<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Logical IDs referenced through `{"Ref": ...}` in the properties
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        collect_refs(&self.properties, &mut refs);
        refs
    }

    /// Every logical ID this resource must be created after
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.references();
        deps.extend(self.depends_on.iter().cloned());
        deps
    }

    fn to_template(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "Type": self.resource_type,
            "Properties": self.properties,
            "DeletionPolicy": self.removal_policy.deletion_policy(),
        });
        if !self.depends_on.is_empty() {
            entry["DependsOn"] = serde_json::json!(self.depends_on);
        }
        entry
    }
}

/// Build a `{"Ref": id}` object
pub fn reference(id: &str) -> serde_json::Value {
    serde_json::json!({ "Ref": id })
}

/// Returns the target of a `{"Ref": id}` object
pub fn as_reference(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::Object(map) if map.len() == 1 => map.get("Ref")?.as_str(),
        _ => None,
    }
}

fn collect_refs(value: &serde_json::Value, out: &mut BTreeSet<String>) {
    if let Some(target) = as_reference(value) {
        out.insert(target.to_string());
        return;
    }
    match value {
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_refs(v, out)),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}
