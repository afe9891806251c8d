//! NATS-link, KV Engine, Object Engine, and the Data RPC Facade (spec §4.1–§4.3, §6).

pub mod config;
pub mod error;
pub mod kv;
pub mod link;
pub mod mtls;
pub mod object;
pub mod rpc;

pub mod proto {
    #![allow(dead_code, unreachable_pub)]
    tonic::include_proto!("dataplane");
}

pub use config::NatsLinkConfig;
pub use error::{KvError, ObjectError};
pub use kv::{KvEngine, KvEntry, WatchUpdate};
pub use link::{DomainHandles, NatsLink};
pub use object::{ObjectEngine, ObjectInfo, ObjectMetadata};
pub use rpc::DataRpcFacade;
