pub mod deploy;
pub mod destroy;
pub mod plan;
pub mod status;
pub mod synth;
pub mod validate;
