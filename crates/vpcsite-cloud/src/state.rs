//! Provisioned-resource state
//!
//! Everything the local engine created lives in `.vpcsite/state.json`,
//! grouped by stack and keyed by logical ID. Writes go through a temporary
//! file and the previous state is kept as `state.json.backup`.

use crate::error::{CloudError, Result};
use crate::resource::RemovalPolicy;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 2;
const STATE_DIR: &str = ".vpcsite";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_MINUTES: i64 = 30;

/// Every stack known to the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub stacks: BTreeMap<String, ProviderState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            stacks: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of one stack's resources; empty if the stack is unknown
    pub fn stack(&self, name: &str) -> ProviderState {
        self.stacks.get(name).cloned().unwrap_or_default()
    }

    pub fn get(&self, stack: &str, logical_id: &str) -> Option<&ResourceState> {
        self.stacks.get(stack)?.get(logical_id)
    }

    pub fn upsert(&mut self, stack: &str, logical_id: &str, resource: ResourceState) {
        self.stacks
            .entry(stack.to_string())
            .or_default()
            .add(logical_id.to_string(), resource);
        self.updated_at = Utc::now();
    }

    /// Remove a resource, dropping the stack once it is empty
    pub fn remove(&mut self, stack: &str, logical_id: &str) -> Option<ResourceState> {
        let resources = self.stacks.get_mut(stack)?;
        let removed = resources.remove(logical_id);
        if resources.is_empty() {
            self.stacks.remove(stack);
        }
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn resource_count(&self) -> usize {
        self.stacks.values().map(ProviderState::len).sum()
    }
}

/// Provisioned resources of a single stack, keyed by logical ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderState {
    resources: BTreeMap<String, ResourceState>,
}

impl ProviderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, logical_id: String, resource: ResourceState) {
        self.resources.insert(logical_id, resource);
    }

    pub fn get(&self, logical_id: &str) -> Option<&ResourceState> {
        self.resources.get(logical_id)
    }

    pub fn remove(&mut self, logical_id: &str) -> Option<ResourceState> {
        self.resources.remove(logical_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Physical ID of a resource, only once it is running
    pub fn physical_id(&self, logical_id: &str) -> Option<&str> {
        self.resources
            .get(logical_id)
            .filter(|r| r.status == ResourceStatus::Running)
            .map(|r| r.id.as_str())
    }
}

/// One provisioned resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Physical ID assigned when the resource was created
    pub id: String,
    pub resource_type: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    /// Properties with every reference replaced by a physical ID
    #[serde(default)]
    pub properties: Value,
    /// Properties as declared; compared against the next plan
    #[serde(default)]
    pub declared: Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Creating,
            removal_policy: RemovalPolicy::default(),
            properties: Value::Null,
            declared: Value::Null,
            depends_on: Vec::new(),
            arn: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_properties(mut self, resolved: Value, declared: Value) -> Self {
        self.properties = resolved;
        self.declared = declared;
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_arn(mut self, arn: Option<String>) -> Self {
        self.arn = arn;
        self
    }

    /// Resolved property value as a specific type
    pub fn property<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Creating,
    Running,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ResourceStatus::Creating => "creating",
            ResourceStatus::Running => "running",
        };
        f.write_str(status)
    }
}

/// Reads and writes the state file of one project directory
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No state file yet");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version != STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "{} has version {}, expected {}",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        tracing::debug!(resources = state.resource_count(), "Loaded state");
        Ok(state)
    }

    /// Replace the state file. The previous file becomes the backup.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.state_path();
        let tmp = self.dir.join(STATE_TMP);
        fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;
        if path.exists() {
            fs::copy(&path, self.dir.join(STATE_BACKUP)).await?;
        }
        fs::rename(&tmp, &path).await?;

        tracing::debug!(resources = state.resource_count(), "Saved state");
        Ok(())
    }

    /// Take the project lock. Locks older than 30 minutes are broken.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let lock_path = self.dir.join(LOCK_FILE);

        if let Ok(content) = fs::read_to_string(&lock_path).await {
            let holder: LockInfo = serde_json::from_str(&content)?;
            if Utc::now() - holder.acquired_at < Duration::minutes(STALE_LOCK_MINUTES) {
                return Err(CloudError::LockError(format!(
                    "state is locked by pid {} since {}",
                    holder.pid, holder.acquired_at
                )));
            }
            tracing::warn!(pid = holder.pid, "Breaking stale state lock");
            fs::remove_file(&lock_path).await?;
        }

        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
            .map_err(|e| CloudError::LockError(format!("{}: {}", lock_path.display(), e)))?;
        file.write_all(&serde_json::to_vec(&info)?).await?;
        file.flush().await?;

        Ok(StateLock {
            path: lock_path,
            held: true,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Held project lock; removed on release or drop
pub struct StateLock {
    path: PathBuf,
    held: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.held = false;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if self.held {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn subnet() -> ResourceState {
        ResourceState::new("subnet-0a1b2c3d4e5f60718", "AWS::EC2::Subnet")
            .with_status(ResourceStatus::Running)
            .with_removal_policy(RemovalPolicy::Destroy)
            .with_properties(
                serde_json::json!({ "CidrBlock": "172.31.48.0/20" }),
                serde_json::json!({ "CidrBlock": "172.31.48.0/20" }),
            )
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.upsert("StaticWebsiteVpcStack", "PrivateSubnet", subnet());
        manager.save(&state).await.unwrap();
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        let resource = loaded.get("StaticWebsiteVpcStack", "PrivateSubnet").unwrap();
        assert_eq!(resource.property::<String>("CidrBlock").unwrap(), "172.31.48.0/20");
        assert!(temp_dir.path().join(".vpcsite/state.json.backup").exists());
        assert!(!temp_dir.path().join(".vpcsite/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_state_is_empty() {
        let temp_dir = tempdir().unwrap();
        let state = StateManager::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(state.resource_count(), 0);
    }

    #[tokio::test]
    async fn test_newer_state_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(manager.load().await, Err(CloudError::StateError(_))));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join(".vpcsite/lock.json").exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join(".vpcsite")).unwrap();
        let stale = LockInfo {
            pid: 1,
            acquired_at: Utc::now() - Duration::hours(2),
        };
        std::fs::write(
            temp_dir.path().join(".vpcsite/lock.json"),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();

        assert!(manager.acquire_lock().await.is_ok());
    }

    #[test]
    fn test_removing_last_resource_drops_stack() {
        let mut state = GlobalState::new();
        state.upsert("A", "Subnet", subnet());
        state.upsert("AB", "Subnet", subnet());

        assert_eq!(state.stack("A").physical_id("Subnet"), Some("subnet-0a1b2c3d4e5f60718"));
        assert!(state.remove("A", "Subnet").is_some());
        assert!(!state.stacks.contains_key("A"));
        assert_eq!(state.stack("AB").len(), 1);
    }

    #[test]
    fn test_physical_id_requires_running_status() {
        let mut provider = ProviderState::new();
        provider.add(
            "Endpoint".to_string(),
            ResourceState::new("vpce-0123456789abcdef0", "AWS::EC2::VPCEndpoint"),
        );
        assert_eq!(provider.physical_id("Endpoint"), None);
    }
}
