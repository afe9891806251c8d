//! SPIRE / Identity Orchestrator (spec §4.8): writes the trust bundle, branches on
//! component type to emit nested-server vs. workload-socket artifacts, and optionally
//! launches a co-located identity agent.

use crate::artifacts::ArtifactMap;
use crate::error::BootstrapError;
use crate::package::ComponentType;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument, warn};

#[cfg(unix)]
fn write_file_mode(path: &Path, bytes: &[u8], mode: u32) -> Result<(), BootstrapError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, bytes)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_file_mode(path: &Path, bytes: &[u8], _mode: u32) -> Result<(), BootstrapError> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Strip `spiffe://` and take everything up to (not including) the next `/`, defaulting
/// to `"unknown"` on empty input.
pub fn extract_trust_domain(spiffe_id: &str) -> String {
    let stripped = spiffe_id.strip_prefix("spiffe://").unwrap_or(spiffe_id);
    if stripped.is_empty() {
        return "unknown".to_string();
    }
    match stripped.find('/') {
        Some(idx) => stripped[..idx].to_string(),
        None => stripped.to_string(),
    }
}

fn env_or_metadata<'a>(
    env_name: &str,
    metadata_key: &str,
    metadata: &'a serde_json::Map<String, serde_json::Value>,
) -> Option<String> {
    std::env::var(env_name).ok().or_else(|| {
        metadata
            .get(metadata_key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

pub struct SpireOutcome {
    pub trust_domain: String,
    pub spire_dir: PathBuf,
}

/// Run the SPIRE orchestration step. Always writes the trust bundle; branches on
/// `component_type` for the rest.
#[instrument(skip(bundle_pem, join_token, metadata, artifacts))]
pub fn orchestrate(
    storage_path: &Path,
    component_id: &str,
    component_type: ComponentType,
    downstream_spiffe_id: &str,
    bundle_pem: &[u8],
    join_token: &str,
    metadata: &serde_json::Map<String, serde_json::Value>,
    artifacts: &ArtifactMap,
) -> Result<SpireOutcome, BootstrapError> {
    let spire_dir = storage_path.join("spire");
    std::fs::create_dir_all(&spire_dir)?;

    let bundle_path = spire_dir.join("upstream-bundle.pem");
    write_file_mode(&bundle_path, bundle_pem, 0o644)?;
    artifacts.insert("spire/upstream-bundle.pem", bundle_pem.to_vec());

    let trust_domain = extract_trust_domain(downstream_spiffe_id);

    match component_type {
        ComponentType::Poller => {
            let token_path = spire_dir.join("upstream-join-token");
            write_file_mode(&token_path, join_token.as_bytes(), 0o600)?;
            artifacts.insert("spire/upstream-join-token", join_token.as_bytes().to_vec());

            let upstream_address =
                env_or_metadata("SPIRE_UPSTREAM_ADDRESS", "spire_upstream_address", metadata)
                    .unwrap_or_default();
            let upstream_port =
                env_or_metadata("SPIRE_UPSTREAM_PORT", "spire_upstream_port", metadata)
                    .unwrap_or_default();

            let local_socket = spire_dir.join("nested").join("api.sock");
            let server_conf = render_nested_server_conf(
                component_id,
                downstream_spiffe_id,
                &trust_domain,
                storage_path,
                &local_socket,
                &upstream_address,
                &upstream_port,
            );
            artifacts.insert("spire-server.conf", server_conf.into_bytes());

            let agent_conf = render_colocated_agent_conf(&local_socket, &trust_domain, &spire_dir);
            artifacts.insert("spire-agent.conf", agent_conf.into_bytes());
        }
        ComponentType::Agent => {
            let socket = spire_dir.join("nested").join("workload").join("agent.sock");
            artifacts.insert(
                "spire-workload-api-socket",
                socket.to_string_lossy().into_owned().into_bytes(),
            );
        }
        ComponentType::Checker => {
            let socket = spire_dir.join("workload").join("agent.sock");
            artifacts.insert(
                "spire-workload-api-socket",
                socket.to_string_lossy().into_owned().into_bytes(),
            );
        }
        ComponentType::None => {
            warn!("component_type is 'none'; no SPIRE artifacts emitted beyond the trust bundle");
        }
    }

    info!(trust_domain = %trust_domain, "SPIRE orchestration complete");
    Ok(SpireOutcome {
        trust_domain,
        spire_dir,
    })
}

fn render_nested_server_conf(
    component_id: &str,
    downstream_spiffe_id: &str,
    trust_domain: &str,
    data_dir: &Path,
    local_socket: &Path,
    upstream_address: &str,
    upstream_port: &str,
) -> String {
    format!(
        "server {{\n  trust_domain = \"{trust_domain}\"\n  data_dir = \"{}\"\n  socket_path = \"{}\"\n  component_id = \"{component_id}\"\n  downstream_spiffe_id = \"{downstream_spiffe_id}\"\n  upstream_address = \"{upstream_address}\"\n  upstream_port = \"{upstream_port}\"\n}}\n",
        data_dir.display(),
        local_socket.display(),
    )
}

fn render_colocated_agent_conf(local_socket: &Path, trust_domain: &str, spire_dir: &Path) -> String {
    format!(
        "agent {{\n  trust_domain = \"{trust_domain}\"\n  server_address = \"{}\"\n  data_dir = \"{}\"\n}}\n",
        local_socket.display(),
        spire_dir.display(),
    )
}

/// Optional embedded agent launch: a locally-shipped identity daemon started with the
/// join token inline. Runs for poller/checker only.
#[instrument(skip(join_token))]
pub async fn launch_embedded_agent(
    spire_dir: &Path,
    trust_domain: &str,
    join_token: &str,
    upstream_address: &str,
    upstream_port: &str,
    workload_socket: &Path,
) -> Result<(), BootstrapError> {
    let binary = resolve_agent_binary()?;

    let conf_path = spire_dir.join("agent.conf");
    let conf = format!(
        "agent {{\n  trust_domain = \"{trust_domain}\"\n  server_address = \"{upstream_address}\"\n  server_port = \"{upstream_port}\"\n  join_token = \"{join_token}\"\n  data_dir = \"{}\"\n}}\n",
        spire_dir.display(),
    );
    std::fs::write(&conf_path, conf)?;

    let log_path = spire_dir.join("agent.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let log_file_err = log_file.try_clone()?;

    let mut child = Command::new(&binary)
        .arg("run")
        .arg("-config")
        .arg(&conf_path)
        .stdout(std::process::Stdio::from(log_file))
        .stderr(std::process::Stdio::from(log_file_err))
        .spawn()?;

    wait_for_socket(workload_socket, 60, Duration::from_secs(1)).await?;

    info!(binary = %binary.display(), "embedded SPIRE agent is up");

    let pid = child.id();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!(?pid, %status, "embedded SPIRE agent exited"),
            Err(e) => warn!(?pid, error = %e, "failed to reap embedded SPIRE agent"),
        }
    });

    // Caller observes the agent only through the workload socket from here on; the
    // reaper task above owns the child handle.
    Ok(())
}

fn resolve_agent_binary() -> Result<PathBuf, BootstrapError> {
    if let Ok(path) = std::env::var("SPIRE_AGENT_PATH") {
        return Ok(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("EMBEDDED_SPIRE_AGENT_PATH") {
        return Ok(PathBuf::from(path));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("spire-agent");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    for candidate in ["/usr/local/bin/spire-agent", "/usr/bin/spire-agent"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(BootstrapError::InvalidToken(
        "could not resolve an embedded spire-agent binary".to_string(),
    ))
}

async fn wait_for_socket(path: &Path, attempts: u32, interval: Duration) -> Result<(), BootstrapError> {
    for _ in 0..attempts {
        if path.exists() {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
    Err(BootstrapError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("workload socket {} never appeared", path.display()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trust_domain_up_to_next_slash() {
        assert_eq!(
            extract_trust_domain("spiffe://example.org/ns/default/sa/poller"),
            "example.org"
        );
    }

    #[test]
    fn extracts_whole_remainder_when_no_further_slash() {
        assert_eq!(extract_trust_domain("spiffe://example.org"), "example.org");
    }

    #[test]
    fn empty_input_defaults_to_unknown() {
        assert_eq!(extract_trust_domain(""), "unknown");
        assert_eq!(extract_trust_domain("spiffe://"), "unknown");
    }

    #[test]
    fn poller_orchestration_writes_bundle_and_token_with_expected_modes() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactMap::new();
        let outcome = orchestrate(
            tmp.path(),
            "poller-1",
            ComponentType::Poller,
            "spiffe://example.org/poller-1",
            b"BUNDLE",
            "jointoken",
            &serde_json::Map::new(),
            &artifacts,
        )
        .unwrap();

        assert_eq!(outcome.trust_domain, "example.org");
        let bundle = std::fs::read(tmp.path().join("spire/upstream-bundle.pem")).unwrap();
        assert_eq!(bundle, b"BUNDLE");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let token_perms = std::fs::metadata(tmp.path().join("spire/upstream-join-token"))
                .unwrap()
                .permissions();
            assert_eq!(token_perms.mode() & 0o777, 0o600);
            let bundle_perms = std::fs::metadata(tmp.path().join("spire/upstream-bundle.pem"))
                .unwrap()
                .permissions();
            assert_eq!(bundle_perms.mode() & 0o777, 0o644);
        }

        assert!(artifacts.get_config("spire-server.conf").is_some());
        assert!(artifacts.get_config("spire-agent.conf").is_some());
    }

    #[test]
    fn agent_orchestration_records_workload_socket_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactMap::new();
        orchestrate(
            tmp.path(),
            "agent-1",
            ComponentType::Agent,
            "spiffe://example.org/agent-1",
            b"BUNDLE",
            "jointoken",
            &serde_json::Map::new(),
            &artifacts,
        )
        .unwrap();

        let socket = artifacts.get_config("spire-workload-api-socket").unwrap();
        let socket = String::from_utf8(socket).unwrap();
        assert!(socket.ends_with("spire/nested/workload/agent.sock"));
    }
}
