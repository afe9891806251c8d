//! Edge Onboarding Package: the record describing what identity material and config an
//! edge component needs, plus acquisition (offline archive / online HTTP) and validation
//! (spec §3, §4.7 steps 2–3).

use crate::error::BootstrapError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Poller,
    Agent,
    Checker,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Issued,
    Delivered,
    Activated,
    Revoked,
    Expired,
    Deleted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    pub package_id: String,
    #[serde(default)]
    pub label: String,
    pub component_id: String,
    pub component_type: Option<ComponentType>,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub parent_type: Option<ComponentType>,
    #[serde(default)]
    pub site: String,
    pub status: Option<PackageStatus>,
    #[serde(default)]
    pub downstream_spiffe_id: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub checker_kind: String,
    #[serde(default)]
    pub checker_config: serde_json::Map<String, serde_json::Value>,
}

impl Package {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// A package plus the identity material delivered alongside it.
#[derive(Debug, Clone)]
pub struct AcquiredPackage {
    pub package: Package,
    pub join_token: String,
    pub bundle_pem: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    download_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(flatten)]
    package: Package,
    join_token: String,
    bundle_pem: String,
}

/// Unpack an offline archive: `metadata.json` (the package record), `spire/upstream-join-token`,
/// `spire/upstream-bundle.pem`.
#[instrument(skip_all)]
pub fn acquire_offline(archive_path: &Path) -> Result<AcquiredPackage, BootstrapError> {
    let file = std::fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    let mut metadata_json = None;
    let mut join_token = None;
    let mut bundle_pem = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        match path.as_str() {
            "metadata.json" => metadata_json = Some(buf),
            "spire/upstream-join-token" => {
                join_token = Some(String::from_utf8_lossy(&buf).trim().to_string())
            }
            "spire/upstream-bundle.pem" => bundle_pem = Some(buf),
            _ => {}
        }
    }

    let metadata_json = metadata_json.ok_or_else(|| {
        BootstrapError::ArchiveMissingFiles("metadata.json".to_string())
    })?;
    let join_token = join_token.ok_or_else(|| {
        BootstrapError::ArchiveMissingFiles("spire/upstream-join-token".to_string())
    })?;
    let bundle_pem = bundle_pem.ok_or_else(|| {
        BootstrapError::ArchiveMissingFiles("spire/upstream-bundle.pem".to_string())
    })?;

    let package: Package = serde_json::from_slice(&metadata_json)?;
    Ok(AcquiredPackage {
        package,
        join_token,
        bundle_pem,
    })
}

/// Resolve the Core API base URL: explicit config wins, then the token's embedded `api`,
/// then `CORE_API_URL`.
pub fn resolve_core_url(config_url: Option<&str>, token_url: Option<&str>) -> Option<String> {
    config_url
        .map(str::to_string)
        .or_else(|| token_url.map(str::to_string))
        .or_else(|| std::env::var("CORE_API_URL").ok())
}

/// POST the download token to Core and decode the delivered package + identity material.
#[instrument(skip(download_token))]
pub async fn acquire_online(
    core_url: &str,
    package_id: &str,
    download_token: &str,
) -> Result<AcquiredPackage, BootstrapError> {
    let url = format!(
        "{}/api/admin/edge-packages/{package_id}/download?format=json",
        core_url.trim_end_matches('/')
    );
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| BootstrapError::Http(e.to_string()))?;

    let response = client
        .post(&url)
        .json(&DownloadRequest {
            download_token,
        })
        .send()
        .await
        .map_err(|e| BootstrapError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let truncated: String = body.chars().take(4096).collect();
        return Err(BootstrapError::CoreError {
            status: status.as_u16(),
            body: truncated,
        });
    }

    let decoded: DownloadResponse = response
        .json()
        .await
        .map_err(|e| BootstrapError::Http(format!("decoding download response: {e}")))?;

    info!(package_id, "downloaded edge onboarding package");
    Ok(AcquiredPackage {
        package: decoded.package,
        join_token: decoded.join_token,
        bundle_pem: decoded.bundle_pem.into_bytes(),
    })
}

/// Validate the acquired package per spec §4.7 step 3.
pub fn validate(acquired: &AcquiredPackage) -> Result<(), BootstrapError> {
    let pkg = &acquired.package;
    if pkg.package_id.is_empty() {
        return Err(BootstrapError::FieldMissing("package_id"));
    }
    if pkg.component_id.is_empty() {
        return Err(BootstrapError::FieldMissing("component_id"));
    }
    match pkg.component_type {
        None | Some(ComponentType::None) => {
            return Err(BootstrapError::FieldMissing("component_type"))
        }
        _ => {}
    }
    if pkg.downstream_spiffe_id.is_empty() {
        return Err(BootstrapError::FieldMissing("downstream_spiffe_id"));
    }
    if acquired.join_token.is_empty() {
        return Err(BootstrapError::FieldMissing("join_token"));
    }
    if acquired.bundle_pem.is_empty() {
        return Err(BootstrapError::FieldMissing("bundle_pem"));
    }

    match pkg.status {
        Some(PackageStatus::Delivered) | Some(PackageStatus::Activated) => {}
        Some(PackageStatus::Issued) => return Err(BootstrapError::PackageNotDelivered),
        Some(PackageStatus::Revoked) => return Err(BootstrapError::PackageRevoked),
        Some(PackageStatus::Expired) => return Err(BootstrapError::PackageExpired),
        Some(PackageStatus::Deleted) => return Err(BootstrapError::PackageDeleted),
        None => {
            warn!("package carries no status; accepting with a warning");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_package() -> Package {
        Package {
            package_id: "pkg-1".into(),
            component_id: "poller-1".into(),
            component_type: Some(ComponentType::Poller),
            downstream_spiffe_id: "spiffe://example.org/poller-1".into(),
            status: Some(PackageStatus::Delivered),
            ..Default::default()
        }
    }

    fn valid_acquired() -> AcquiredPackage {
        AcquiredPackage {
            package: valid_package(),
            join_token: "jt".into(),
            bundle_pem: b"-----BEGIN CERTIFICATE-----".to_vec(),
        }
    }

    #[test]
    fn validate_accepts_delivered_and_activated() {
        assert!(validate(&valid_acquired()).is_ok());
        let mut acquired = valid_acquired();
        acquired.package.status = Some(PackageStatus::Activated);
        assert!(validate(&acquired).is_ok());
    }

    #[test]
    fn validate_rejects_issued_as_not_delivered() {
        let mut acquired = valid_acquired();
        acquired.package.status = Some(PackageStatus::Issued);
        assert!(matches!(
            validate(&acquired),
            Err(BootstrapError::PackageNotDelivered)
        ));
    }

    #[test]
    fn validate_rejects_revoked_expired_deleted() {
        for (status, matcher) in [
            (PackageStatus::Revoked, "revoked"),
            (PackageStatus::Expired, "expired"),
            (PackageStatus::Deleted, "deleted"),
        ] {
            let mut acquired = valid_acquired();
            acquired.package.status = Some(status);
            let err = validate(&acquired).unwrap_err();
            assert!(err.to_string().contains(matcher));
        }
    }

    #[test]
    fn validate_accepts_missing_status_with_warning() {
        let mut acquired = valid_acquired();
        acquired.package.status = None;
        assert!(validate(&acquired).is_ok());
    }

    #[test]
    fn validate_rejects_empty_downstream_spiffe_id() {
        let mut acquired = valid_acquired();
        acquired.package.downstream_spiffe_id = String::new();
        assert!(validate(&acquired).is_err());
    }

    #[test]
    fn resolve_core_url_prefers_config_over_token_over_env() {
        assert_eq!(
            resolve_core_url(Some("https://config"), Some("https://token")),
            Some("https://config".to_string())
        );
        assert_eq!(
            resolve_core_url(None, Some("https://token")),
            Some("https://token".to_string())
        );
    }
}
