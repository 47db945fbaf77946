//! Declared resources and the engines that provision them
//!
//! Topology builders describe a stack as a [`ResourceSet`]: CloudFormation
//! style resources with `Ref`s between them, explicit dependencies and a
//! removal policy each. A [`ProvisioningEngine`] turns that into a [`Plan`],
//! applies it and reports physical IDs back through stack outputs.
//!
//! [`LocalEngine`] is the engine shipped here. It records every resource in
//! `.vpcsite/state.json` and mints IDs in the shape EC2 and S3 use, which is
//! enough to exercise the ordering and late binding between stacks.

pub mod action;
pub mod engine;
pub mod error;
pub mod local;
pub mod resource;
pub mod state;

pub use action::{
    Action, ActionFailure, ActionOutcome, ActionType, ApplyResult, Plan, PlanSummary,
};
pub use engine::ProvisioningEngine;
pub use error::{CloudError, Result};
pub use local::LocalEngine;
pub use resource::{as_reference, reference, RemovalPolicy, ResourceConfig, ResourceSet};
pub use state::{GlobalState, ProviderState, ResourceState, ResourceStatus, StateLock, StateManager};
