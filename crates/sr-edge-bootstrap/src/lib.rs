//! Edge Onboarding: converts a one-time bootstrap token into validated identity
//! material, service config, and (optionally) a running local identity agent
//! (spec §4.7–§4.10, §6).

pub mod artifacts;
pub mod bootstrap;
pub mod config_synth;
pub mod deployment;
pub mod error;
pub mod mtls_bootstrap;
pub mod package;
pub mod spire;
pub mod token;

pub use artifacts::ArtifactMap;
pub use bootstrap::{ActivationReporter, BootstrapConfig, Bootstrapper, NoopActivationReporter};
pub use deployment::DeploymentType;
pub use error::BootstrapError;
pub use package::{AcquiredPackage, ComponentType, Package, PackageStatus};
