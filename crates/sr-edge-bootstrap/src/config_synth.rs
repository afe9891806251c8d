//! Config Synthesis (spec §4.9): turns a validated package's metadata into the JSON
//! artifact(s) a component reads on startup.

use crate::deployment::DeploymentType;
use crate::error::BootstrapError;
use crate::package::Package;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;

const DEFAULT_AGENT_ADDRESS: &str = "localhost:50051";

/// The "address for deployment" resolver (spec §9 open question): currently identity,
/// but logs its decision so a later implementation can substitute LoadBalancer IPs
/// (Docker) or service DNS (Kubernetes) without changing callers.
pub fn resolve_address(deployment: DeploymentType, default: &str, metadata: &Map<String, Value>) -> String {
    debug!(
        deployment = deployment.as_str(),
        default, "resolving deployment address (currently identity)"
    );
    let _ = metadata;
    default.to_string()
}

fn require_metadata<'a>(metadata: &'a Map<String, Value>, key: &'static str) -> Result<&'a str, BootstrapError> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(BootstrapError::FieldMissing(key))
}

fn merge_passthrough(mut artifact: Map<String, Value>, metadata: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in metadata {
        artifact.entry(key.clone()).or_insert_with(|| value.clone());
    }
    artifact
}

/// `poller.json`.
pub fn synthesize_poller(
    package: &Package,
    storage_path: &Path,
    trust_domain: &str,
    kv_endpoint_default: &str,
    deployment: DeploymentType,
) -> Result<Value, BootstrapError> {
    let metadata = &package.metadata;
    let core_address = require_metadata(metadata, "core_address")?;
    let core_spiffe_id = require_metadata(metadata, "core_spiffe_id")?;
    let spire_upstream_address = require_metadata(metadata, "spire_upstream_address")?;
    let spire_parent_id = require_metadata(metadata, "spire_parent_id")?;
    let agent_spiffe_id = require_metadata(metadata, "agent_spiffe_id")?;

    let kv_endpoint = package
        .metadata_str("datasvc_endpoint")
        .map(str::to_string)
        .unwrap_or_else(|| resolve_address(deployment, kv_endpoint_default, metadata));

    let mut artifact = Map::new();
    artifact.insert("poller_id".to_string(), json!(package.component_id));
    artifact.insert("label".to_string(), json!(package.label));
    artifact.insert("component_id".to_string(), json!(package.component_id));
    artifact.insert("core_address".to_string(), json!(core_address));
    artifact.insert("kv_address".to_string(), json!(kv_endpoint));
    artifact.insert("agent_address".to_string(), json!(DEFAULT_AGENT_ADDRESS));
    artifact.insert("self_spiffe_id".to_string(), json!(package.downstream_spiffe_id));
    artifact.insert("core_spiffe_id".to_string(), json!(core_spiffe_id));
    artifact.insert("agent_spiffe_id".to_string(), json!(agent_spiffe_id));
    artifact.insert("spire_upstream_address".to_string(), json!(spire_upstream_address));
    artifact.insert("spire_parent_id".to_string(), json!(spire_parent_id));
    artifact.insert("poller_storage".to_string(), json!(storage_path.join("poller").to_string_lossy()));
    artifact.insert("spire_storage".to_string(), json!(storage_path.join("spire").to_string_lossy()));
    artifact.insert("config_storage".to_string(), json!(storage_path.join("config").to_string_lossy()));
    artifact.insert("trust_domain".to_string(), json!(trust_domain));
    artifact.insert("deployment_type".to_string(), json!(deployment.as_str()));
    artifact.insert("site".to_string(), json!(package.site));

    Ok(Value::Object(merge_passthrough(artifact, metadata)))
}

/// `agent.json`, SaaS-gateway minimal variant: no KV endpoint or monitoring config, the
/// agent learns both from the gateway after connecting.
pub fn synthesize_agent_minimal(
    package: &Package,
    storage_path: &Path,
    deployment: DeploymentType,
) -> Result<Value, BootstrapError> {
    let gateway_addr = package
        .metadata_str("gateway_addr")
        .map(str::to_string)
        .ok_or(BootstrapError::FieldMissing("gateway_addr"))?;

    let certs_dir = storage_path.join("certs");
    let artifact = json!({
        "agent_id": package.component_id,
        "gateway_addr": gateway_addr,
        "gateway_security": {
            "mode": "mtls",
            "cert_file": certs_dir.join("agent.pem").to_string_lossy(),
            "key_file": certs_dir.join("agent-key.pem").to_string_lossy(),
            "ca_file": certs_dir.join("root.pem").to_string_lossy(),
        },
        "deployment_type": deployment.as_str(),
    });
    Ok(artifact)
}

/// `agent.json`, legacy KV-addressed variant: adds `kv_address` and a workload-API socket
/// path to the minimal artifact.
pub fn synthesize_agent_legacy(
    package: &Package,
    storage_path: &Path,
    kv_endpoint_default: &str,
    workload_socket: &Path,
    deployment: DeploymentType,
) -> Result<Value, BootstrapError> {
    let mut artifact = synthesize_agent_minimal(package, storage_path, deployment)?;
    let kv_endpoint = package
        .metadata_str("datasvc_endpoint")
        .map(str::to_string)
        .unwrap_or_else(|| resolve_address(deployment, kv_endpoint_default, &package.metadata));

    if let Value::Object(map) = &mut artifact {
        map.insert("kv_address".to_string(), json!(kv_endpoint));
        map.insert(
            "workload_api_socket".to_string(),
            json!(workload_socket.to_string_lossy()),
        );
    }
    Ok(artifact)
}

/// `checker.json`.
pub fn synthesize_checker(
    package: &Package,
    deployment: DeploymentType,
) -> Result<Value, BootstrapError> {
    let agent_address = package
        .metadata_str("agent_address")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_AGENT_ADDRESS.to_string());

    let artifact = json!({
        "checker_id": package.component_id,
        "checker_kind": package.checker_kind,
        "parent_id": package.parent_id,
        "agent_address": agent_address,
        "security": {
            "mode": "mtls",
        },
        "deployment_type": deployment.as_str(),
    });
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::ComponentType;

    fn base_package() -> Package {
        let mut metadata = Map::new();
        metadata.insert("core_address".into(), json!("core.example:8443"));
        metadata.insert("core_spiffe_id".into(), json!("spiffe://example.org/core"));
        metadata.insert("spire_upstream_address".into(), json!("spire.example:8081"));
        metadata.insert("spire_parent_id".into(), json!("spiffe://example.org/parent"));
        metadata.insert("agent_spiffe_id".into(), json!("spiffe://example.org/agent"));
        Package {
            package_id: "pkg-1".into(),
            component_id: "poller-1".into(),
            component_type: Some(ComponentType::Poller),
            downstream_spiffe_id: "spiffe://example.org/poller-1".into(),
            metadata,
            ..Default::default()
        }
    }

    #[test]
    fn poller_artifact_contains_required_fields_and_passthrough() {
        let mut package = base_package();
        package
            .metadata
            .insert("custom_field".into(), json!("custom_value"));

        let artifact = synthesize_poller(
            &package,
            Path::new("/var/lib/serviceradar"),
            "example.org",
            "kv.default:4222",
            DeploymentType::BareMetal,
        )
        .unwrap();

        assert_eq!(artifact["poller_id"], json!("poller-1"));
        assert_eq!(artifact["agent_address"], json!("localhost:50051"));
        assert_eq!(artifact["kv_address"], json!("kv.default:4222"));
        assert_eq!(artifact["custom_field"], json!("custom_value"));
    }

    #[test]
    fn poller_artifact_rejects_missing_required_metadata() {
        let package = Package {
            component_type: Some(ComponentType::Poller),
            ..Default::default()
        };
        let err = synthesize_poller(&package, Path::new("/tmp"), "td", "kv", DeploymentType::BareMetal)
            .unwrap_err();
        assert!(matches!(err, BootstrapError::FieldMissing("core_address")));
    }

    #[test]
    fn poller_artifact_prefers_datasvc_endpoint_over_default() {
        let mut package = base_package();
        package
            .metadata
            .insert("datasvc_endpoint".into(), json!("kv.tenant:4222"));
        let artifact = synthesize_poller(&package, Path::new("/tmp"), "td", "kv.default:4222", DeploymentType::BareMetal)
            .unwrap();
        assert_eq!(artifact["kv_address"], json!("kv.tenant:4222"));
    }

    #[test]
    fn agent_minimal_excludes_kv_and_monitoring_fields() {
        let mut metadata = Map::new();
        metadata.insert("gateway_addr".into(), json!("gateway.example:9443"));
        let package = Package {
            component_id: "agent-1".into(),
            metadata,
            ..Default::default()
        };
        let artifact = synthesize_agent_minimal(&package, Path::new("/tmp"), DeploymentType::Kubernetes).unwrap();
        assert!(artifact.get("kv_address").is_none());
        assert_eq!(artifact["gateway_addr"], json!("gateway.example:9443"));
    }

    #[test]
    fn checker_artifact_defaults_agent_address() {
        let package = Package {
            component_id: "checker-1".into(),
            checker_kind: "snmp".into(),
            ..Default::default()
        };
        let artifact = synthesize_checker(&package, DeploymentType::BareMetal).unwrap();
        assert_eq!(artifact["agent_address"], json!("localhost:50051"));
        assert_eq!(artifact["checker_kind"], json!("snmp"));
    }
}
