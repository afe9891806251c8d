//! Account Authority gRPC service: operator bootstrap, tenant account JWTs, user
//! credentials, claim push, and the mTLS peer allowlist guarding all of it
//! (spec §4.4–§4.6, §6).

pub mod authority;
pub mod authz;
pub mod config;
pub mod error;
pub mod resolver;
pub mod rpc;

pub mod proto {
    #![allow(dead_code, unreachable_pub)]
    tonic::include_proto!("authority");
}

pub use authority::{AccountAuthority, CredType, NoopConfigWriter, OperatorConfigWriter, PermissionOverride};
pub use authz::PeerAuthorizer;
pub use config::ResolverConfig;
pub use error::{AuthorityError, AuthzError};
pub use resolver::ResolverClient;
pub use rpc::AccountAuthorityService;
