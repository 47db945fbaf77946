use crate::action::{ApplyResult, Plan};
use crate::error::Result;
use crate::resource::ResourceSet;
use crate::state::ProviderState;
use async_trait::async_trait;

/// Creates and removes declared resources.
///
/// Implementations resolve the dependency graph themselves and wait for each
/// resource to be ready before creating its dependents. Callers never see
/// physical IDs except through [`ProvisioningEngine::get_state`] and the
/// outputs of an [`ApplyResult`].
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Provisioned resources of `stack`, keyed by logical ID
    async fn get_state(&self, stack: &str) -> Result<ProviderState>;

    async fn plan(&self, desired: &ResourceSet) -> Result<Plan>;

    /// Execute `plan`. When any action fails, whatever this call created is
    /// removed again and no outputs are reported.
    async fn apply(&self, plan: &Plan, desired: &ResourceSet) -> Result<ApplyResult>;

    /// Remove every resource of `stack`, dependents first. Resources with a
    /// retain policy are forgotten, not deleted, and listed as retained.
    async fn destroy_all(&self, stack: &str) -> Result<ApplyResult>;
}
