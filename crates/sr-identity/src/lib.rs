//! Data model for the ServiceRadar trust spine: operator/account/user key material, NATS
//! JWT claims and signing, subject-mapping defaults, and credentials-file framing.
//!
//! See spec §3 (Data Model) and §4.4 (Account Authority) for the semantics this crate
//! implements mechanically; policy (what an authority *does* with these types) lives in
//! `sr-account-authority`.

pub mod claims;
pub mod creds;
pub mod error;
pub mod keys;
pub mod resolver_config;
pub mod secret;

pub use claims::{
    decode, encode, AccountClaimsData, ClaimsEnvelope, Export, ExportKind, Import,
    JetStreamLimits, NatsLimits, OperatorClaimsData, Permission, ResponsePermission,
    SubjectMapping, UserClaimsData,
};
pub use creds::render_credentials_file;
pub use error::IdentityError;
pub use keys::{Role, RoledKeyPair};
pub use resolver_config::{render_resolver_config, system_account_jwt_filename, ResolverConfigFields};
pub use secret::Secret;
