//! Deployment type detection (spec §3, §8): explicit config wins, then Kubernetes
//! markers, then Docker markers, else bare-metal.

use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentType {
    Docker,
    Kubernetes,
    BareMetal,
}

impl DeploymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentType::Docker => "docker",
            DeploymentType::Kubernetes => "kubernetes",
            DeploymentType::BareMetal => "bare-metal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "docker" => Some(DeploymentType::Docker),
            "kubernetes" => Some(DeploymentType::Kubernetes),
            "bare-metal" => Some(DeploymentType::BareMetal),
            _ => None,
        }
    }
}

/// Detect the deployment type: explicit `DEPLOYMENT_TYPE` env, then Kubernetes
/// service-account markers, then Docker markers, else bare-metal.
pub fn detect() -> DeploymentType {
    detect_with(
        std::env::var("DEPLOYMENT_TYPE").ok().as_deref(),
        std::env::var("KUBERNETES_SERVICE_HOST").is_ok(),
        Path::new("/var/run/secrets/kubernetes.io/serviceaccount/token").exists(),
        Path::new("/.dockerenv").exists(),
        std::env::var("container").is_ok(),
    )
}

fn detect_with(
    explicit: Option<&str>,
    kube_service_host: bool,
    kube_sa_token: bool,
    dockerenv: bool,
    container_env: bool,
) -> DeploymentType {
    if let Some(explicit) = explicit {
        if let Some(parsed) = DeploymentType::parse(explicit) {
            debug!(deployment_type = explicit, "using explicit deployment type");
            return parsed;
        }
    }
    if kube_service_host || kube_sa_token {
        debug!("detected kubernetes deployment via service-account markers");
        return DeploymentType::Kubernetes;
    }
    if dockerenv || container_env {
        debug!("detected docker deployment via cgroup/.dockerenv markers");
        return DeploymentType::Docker;
    }
    debug!("no container markers found; assuming bare-metal deployment");
    DeploymentType::BareMetal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubernetes_service_host_alone_yields_kubernetes() {
        let detected = detect_with(None, true, false, false, false);
        assert_eq!(detected, DeploymentType::Kubernetes);
    }

    #[test]
    fn dockerenv_alone_yields_docker() {
        let detected = detect_with(None, false, false, true, false);
        assert_eq!(detected, DeploymentType::Docker);
    }

    #[test]
    fn no_markers_yields_bare_metal() {
        let detected = detect_with(None, false, false, false, false);
        assert_eq!(detected, DeploymentType::BareMetal);
    }

    #[test]
    fn explicit_config_wins_over_markers() {
        let detected = detect_with(Some("bare-metal"), true, true, true, true);
        assert_eq!(detected, DeploymentType::BareMetal);
    }
}
