//! Durable `OperatorConfigWriter` that writes the resolver config directory (spec §6),
//! the counterpart to `NoopConfigWriter` used in `sr-account-authority`'s tests.

use sr_account_authority::{AuthorityError, OperatorConfigWriter};
use sr_identity::{render_resolver_config, ResolverConfigFields};
use std::path::PathBuf;

pub struct FileConfigWriter {
    resolver_dir: PathBuf,
}

impl FileConfigWriter {
    pub fn new(resolver_dir: PathBuf) -> Self {
        Self { resolver_dir }
    }
}

impl OperatorConfigWriter for FileConfigWriter {
    fn write(&self, operator_jwt: &str, system_account_pub_key: Option<&str>) -> Result<(), AuthorityError> {
        std::fs::create_dir_all(&self.resolver_dir)
            .map_err(|e| AuthorityError::Internal(e.to_string()))?;

        let fields = ResolverConfigFields {
            operator_jwt: operator_jwt.to_string(),
            system_account_pubkey: system_account_pub_key.unwrap_or_default().to_string(),
            resolver_dir: self.resolver_dir.to_string_lossy().into_owned(),
        };
        let rendered = render_resolver_config(&fields);
        std::fs::write(self.resolver_dir.join("resolver.conf"), rendered)
            .map_err(|e| AuthorityError::Internal(e.to_string()))?;

        Ok(())
    }
}
