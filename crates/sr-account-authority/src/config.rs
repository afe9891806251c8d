//! Resolver connection configuration, loaded from the environment.
//!
//! Grounded on `sr-dataplane::config`'s `from_env()` + typed-default helper style, itself
//! adapted from `pagi-core/src/config.rs`.

#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub resolver_url: String,
    pub root_ca_path: String,
    pub client_cert_path: String,
    pub client_key_path: String,
    pub creds_path: String,
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        Self {
            resolver_url: env_string("RESOLVER_URL", ""),
            root_ca_path: env_string("RESOLVER_ROOT_CA", ""),
            client_cert_path: env_string("RESOLVER_CLIENT_CERT", ""),
            client_key_path: env_string("RESOLVER_CLIENT_KEY", ""),
            creds_path: env_string("RESOLVER_CREDS_PATH", ""),
        }
    }

    /// TLS material is mandatory; an empty configuration means the resolver cannot be reached.
    pub fn is_configured(&self) -> bool {
        !self.resolver_url.is_empty()
            && !self.root_ca_path.is_empty()
            && !self.client_cert_path.is_empty()
            && !self.client_key_path.is_empty()
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
