//! Edge Bootstrapper orchestrator (spec §4.7): runs the fixed pipeline and exposes the
//! resulting artifacts.

use crate::artifacts::ArtifactMap;
use crate::deployment::{self, DeploymentType};
use crate::error::BootstrapError;
use crate::package::{self, AcquiredPackage, ComponentType};
use crate::{config_synth, spire, token};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Activation notification hook (spec §9 open question: synchronous-RPC vs.
/// asynchronous-observation is ambiguous in the source). Best-effort and non-fatal either
/// way; a no-op default lets callers that rely on implicit observation skip wiring one.
pub trait ActivationReporter: Send + Sync {
    fn mark_activated(&self, component_id: &str, downstream_spiffe_id: &str);
}

pub struct NoopActivationReporter;

impl ActivationReporter for NoopActivationReporter {
    fn mark_activated(&self, _component_id: &str, _downstream_spiffe_id: &str) {}
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub storage_path: PathBuf,
    /// Offline acquisition: path to a tar.gz package archive.
    pub package_path: Option<PathBuf>,
    /// Online acquisition: the onboarding token (structured or legacy).
    pub onboarding_token: Option<String>,
    pub core_url: Option<String>,
    pub kv_endpoint_default: String,
    pub deployment_type_override: Option<DeploymentType>,
}

impl BootstrapConfig {
    /// Build from the environment variables spec'd in §6.
    pub fn from_env(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            package_path: std::env::var("ONBOARDING_PACKAGE")
                .or_else(|_| std::env::var("SR_ONBOARDING_PACKAGE"))
                .ok()
                .map(PathBuf::from),
            onboarding_token: std::env::var("ONBOARDING_TOKEN").ok(),
            core_url: std::env::var("CORE_API_URL").ok(),
            kv_endpoint_default: std::env::var("KV_ENDPOINT")
                .unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string()),
            deployment_type_override: std::env::var("DEPLOYMENT_TYPE")
                .ok()
                .and_then(|v| DeploymentType::parse(&v)),
        }
    }
}

pub struct Bootstrapper {
    config: BootstrapConfig,
    artifacts: ArtifactMap,
    activation_reporter: Arc<dyn ActivationReporter>,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            config,
            artifacts: ArtifactMap::new(),
            activation_reporter: Arc::new(NoopActivationReporter),
        }
    }

    pub fn with_activation_reporter(mut self, reporter: Arc<dyn ActivationReporter>) -> Self {
        self.activation_reporter = reporter;
        self
    }

    pub fn get_config(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.get_config(name)
    }

    pub fn get_all_configs(&self) -> Vec<(String, Vec<u8>)> {
        self.artifacts.get_all_configs()
    }

    /// Execute the fixed ordered pipeline (spec §4.7 steps 1–6).
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<(), BootstrapError> {
        let deployment_type = self
            .config
            .deployment_type_override
            .unwrap_or_else(deployment::detect);
        info!(deployment_type = deployment_type.as_str(), "deployment detected");

        let acquired = self.acquire_package().await?;
        package::validate(&acquired)?;

        let spire_outcome = spire::orchestrate(
            &self.config.storage_path,
            &acquired.package.component_id,
            acquired.package.component_type.unwrap_or(ComponentType::None),
            &acquired.package.downstream_spiffe_id,
            &acquired.bundle_pem,
            &acquired.join_token,
            &acquired.package.metadata,
            &self.artifacts,
        )?;

        self.synthesize_config(&acquired.package, &spire_outcome.trust_domain, deployment_type)?;

        // Best-effort; Core may instead detect activation implicitly via the edge
        // service's first status report under its SPIFFE ID.
        self.activation_reporter.mark_activated(
            &acquired.package.component_id,
            &acquired.package.downstream_spiffe_id,
        );

        Ok(())
    }

    async fn acquire_package(&self) -> Result<AcquiredPackage, BootstrapError> {
        if let Some(path) = &self.config.package_path {
            info!(path = %path.display(), "acquiring package offline");
            return package::acquire_offline(path);
        }

        let onboarding_token = self.config.onboarding_token.as_deref().ok_or_else(|| {
            BootstrapError::InvalidToken(
                "neither ONBOARDING_PACKAGE nor ONBOARDING_TOKEN is set".to_string(),
            )
        })?;
        let parsed = token::parse(onboarding_token)?;
        let core_url = package::resolve_core_url(
            self.config.core_url.as_deref(),
            parsed.core_url.as_deref(),
        )
        .ok_or_else(|| BootstrapError::InvalidToken("no Core API URL available".to_string()))?;

        info!(core_url = %core_url, package_id = %parsed.package_id, "acquiring package online");
        package::acquire_online(&core_url, &parsed.package_id, &parsed.download_token).await
    }

    fn synthesize_config(
        &self,
        package: &crate::package::Package,
        trust_domain: &str,
        deployment_type: DeploymentType,
    ) -> Result<(), BootstrapError> {
        match package.component_type {
            Some(ComponentType::Poller) => {
                let artifact = config_synth::synthesize_poller(
                    package,
                    &self.config.storage_path,
                    trust_domain,
                    &self.config.kv_endpoint_default,
                    deployment_type,
                )?;
                self.artifacts
                    .insert("poller.json", serde_json::to_vec_pretty(&artifact)?);
            }
            Some(ComponentType::Agent) => {
                // Metadata naming a local KV endpoint signals the legacy, KV-addressed
                // agent pairing; otherwise the minimal SaaS-gateway variant applies.
                let artifact = if package.metadata_str("datasvc_endpoint").is_some() {
                    let socket = self
                        .config
                        .storage_path
                        .join("spire")
                        .join("nested")
                        .join("workload")
                        .join("agent.sock");
                    config_synth::synthesize_agent_legacy(
                        package,
                        &self.config.storage_path,
                        &self.config.kv_endpoint_default,
                        &socket,
                        deployment_type,
                    )?
                } else {
                    config_synth::synthesize_agent_minimal(
                        package,
                        &self.config.storage_path,
                        deployment_type,
                    )?
                };
                self.artifacts
                    .insert("agent.json", serde_json::to_vec_pretty(&artifact)?);
            }
            Some(ComponentType::Checker) => {
                let artifact = config_synth::synthesize_checker(package, deployment_type)?;
                self.artifacts
                    .insert("checker.json", serde_json::to_vec_pretty(&artifact)?);
            }
            Some(ComponentType::None) | None => {
                warn!("component_type is 'none'; no config artifact synthesized");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_offline_archive(dir: &std::path::Path, metadata: serde_json::Value) -> PathBuf {
        let archive_path = dir.join("package.tar.gz");
        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let metadata_bytes = serde_json::to_vec(&metadata).unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(metadata_bytes.len() as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, "metadata.json", metadata_bytes.as_slice())
            .unwrap();

        let token_bytes = b"jointoken";
        let mut header = tar::Header::new_gnu();
        header.set_size(token_bytes.len() as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, "spire/upstream-join-token", &token_bytes[..])
            .unwrap();

        let bundle_bytes = b"-----BEGIN CERTIFICATE-----BUNDLE-----END CERTIFICATE-----";
        let mut header = tar::Header::new_gnu();
        header.set_size(bundle_bytes.len() as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, "spire/upstream-bundle.pem", &bundle_bytes[..])
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap();
        let mut f = std::fs::OpenOptions::new().append(true).open(&archive_path).unwrap();
        f.flush().unwrap();
        archive_path
    }

    #[tokio::test]
    async fn offline_poller_bootstrap_produces_poller_json_and_spire_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = serde_json::json!({
            "package_id": "pkg-1",
            "component_id": "poller-1",
            "component_type": "poller",
            "downstream_spiffe_id": "spiffe://example.org/poller-1",
            "status": "delivered",
            "metadata": {
                "core_address": "core.example:8443",
                "core_spiffe_id": "spiffe://example.org/core",
                "spire_upstream_address": "spire.example:8081",
                "spire_parent_id": "spiffe://example.org/parent",
                "agent_spiffe_id": "spiffe://example.org/agent"
            }
        });
        let archive = build_offline_archive(tmp.path(), metadata);
        let storage = tmp.path().join("storage");

        let bootstrapper = Bootstrapper::new(BootstrapConfig {
            storage_path: storage.clone(),
            package_path: Some(archive),
            onboarding_token: None,
            core_url: None,
            kv_endpoint_default: "kv.default:4222".to_string(),
            deployment_type_override: Some(DeploymentType::BareMetal),
        });

        bootstrapper.bootstrap().await.unwrap();

        assert!(bootstrapper.get_config("poller.json").is_some());
        assert!(bootstrapper.get_config("spire/upstream-bundle.pem").is_some());
        assert!(std::fs::read(storage.join("spire/upstream-join-token")).is_ok());

        let poller_json: serde_json::Value =
            serde_json::from_slice(&bootstrapper.get_config("poller.json").unwrap()).unwrap();
        assert_eq!(poller_json["poller_id"], serde_json::json!("poller-1"));
    }

    #[tokio::test]
    async fn bootstrap_fails_without_a_package_source() {
        let tmp = tempfile::tempdir().unwrap();
        let bootstrapper = Bootstrapper::new(BootstrapConfig {
            storage_path: tmp.path().to_path_buf(),
            package_path: None,
            onboarding_token: None,
            core_url: None,
            kv_endpoint_default: "kv.default:4222".to_string(),
            deployment_type_override: Some(DeploymentType::BareMetal),
        });
        assert!(bootstrapper.bootstrap().await.is_err());
    }
}
