//! Plans and their outcomes
//!
//! A [`Plan`] is the ordered list of changes an engine intends to make to
//! one stack. Applying it yields an [`ApplyResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl ActionType {
    fn as_str(self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
            ActionType::NoOp => "no-op",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change to one declared resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// `<action>-<logical id>`, unique within a plan
    pub id: String,
    pub action_type: ActionType,
    /// CloudFormation type name, e.g. `AWS::EC2::Subnet`
    pub resource_type: String,
    /// Logical ID
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_id = resource_id.into();
        Self {
            id: format!("{}-{}", action_type, resource_id),
            action_type,
            resource_type: resource_type.into(),
            resource_id,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.action_type, self.resource_id, self.resource_type)
    }
}

/// Ordered changes for one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub stack: String,
    /// In execution order: creations follow the dependency graph, deletions
    /// come last with dependents first
    pub actions: Vec<Action>,
    pub has_changes: bool,
}

impl Plan {
    pub fn new(stack: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            stack: stack.into(),
            has_changes: actions.iter().any(|a| a.action_type != ActionType::NoOp),
            actions,
        }
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        self.actions
            .iter()
            .fold(PlanSummary::default(), |mut summary, action| {
                match action.action_type {
                    ActionType::Create => summary.create += 1,
                    ActionType::Update => summary.update += 1,
                    ActionType::Delete => summary.delete += 1,
                    ActionType::NoOp => summary.no_change += 1,
                }
                summary
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} ~{} -{} ={}",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFailure {
    pub action_id: String,
    pub error: String,
}

/// What an apply or teardown did
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionOutcome>,
    pub failed: Vec<ActionFailure>,
    /// Logical IDs created and then removed again because a later action failed
    pub rolled_back: Vec<String>,
    /// Logical IDs left in the account on teardown because of their removal policy
    pub retained: Vec<String>,
    /// Stack outputs, output name to physical ID. Empty unless the apply succeeded.
    pub outputs: BTreeMap<String, String>,
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: impl Into<String>, message: impl Into<String>) {
        self.succeeded.push(ActionOutcome {
            action_id: action_id.into(),
            message: message.into(),
        });
    }

    pub fn add_failure(&mut self, action_id: impl Into<String>, error: impl Into<String>) {
        self.failed.push(ActionFailure {
            action_id: action_id.into(),
            error: error.into(),
        });
    }

    pub fn first_error(&self) -> Option<&str> {
        self.failed.first().map(|f| f.error.as_str())
    }
}
