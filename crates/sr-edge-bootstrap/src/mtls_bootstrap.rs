//! mTLS Alt-Bootstrap (spec §4.10): install an mTLS bundle directly, independent of the
//! SPIRE path, from a pre-fetched bundle or a delivered `edgepkg-v1:` token.

use crate::error::BootstrapError;
use crate::package::resolve_core_url;
use crate::token;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub struct MtlsBundle {
    pub ca_pem: Vec<u8>,
    pub client_pem: Vec<u8>,
    pub client_key_pem: Vec<u8>,
}

pub enum BundleSource<'a> {
    Json(&'a [u8]),
    Archive(&'a Path),
    Directory(&'a Path),
}

#[derive(Debug, Deserialize)]
struct JsonBundle {
    ca_pem: String,
    client_pem: String,
    client_key_pem: String,
}

/// Load a bundle from any of the three supported pre-fetched forms.
pub fn load_bundle(source: BundleSource) -> Result<MtlsBundle, BootstrapError> {
    match source {
        BundleSource::Json(bytes) => {
            let parsed: JsonBundle = serde_json::from_slice(bytes)?;
            Ok(MtlsBundle {
                ca_pem: parsed.ca_pem.into_bytes(),
                client_pem: parsed.client_pem.into_bytes(),
                client_key_pem: parsed.client_key_pem.into_bytes(),
            })
        }
        BundleSource::Archive(path) => load_from_archive(path),
        BundleSource::Directory(path) => load_from_directory(path),
    }
}

fn load_from_archive(path: &Path) -> Result<MtlsBundle, BootstrapError> {
    let file = std::fs::File::open(path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    let mut ca_pem = None;
    let mut client_pem = None;
    let mut client_key_pem = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_string_lossy().to_string();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        match entry_path.as_str() {
            "mtls/ca.pem" => ca_pem = Some(buf),
            "mtls/client.pem" => client_pem = Some(buf),
            "mtls/client-key.pem" => client_key_pem = Some(buf),
            _ => {}
        }
    }

    let mut missing = Vec::new();
    if ca_pem.is_none() {
        missing.push("mtls/ca.pem");
    }
    if client_pem.is_none() {
        missing.push("mtls/client.pem");
    }
    if client_key_pem.is_none() {
        missing.push("mtls/client-key.pem");
    }
    if !missing.is_empty() {
        return Err(BootstrapError::ArchiveMissingFiles(missing.join(", ")));
    }

    Ok(MtlsBundle {
        ca_pem: ca_pem.unwrap(),
        client_pem: client_pem.unwrap(),
        client_key_pem: client_key_pem.unwrap(),
    })
}

fn load_from_directory(dir: &Path) -> Result<MtlsBundle, BootstrapError> {
    let read = |name: &str| -> Result<Vec<u8>, BootstrapError> {
        let path = dir.join(name);
        std::fs::read(&path).map_err(|_| BootstrapError::BundleMissing(path.display().to_string()))
    };
    Ok(MtlsBundle {
        ca_pem: read("ca.pem")?,
        client_pem: read("client.pem")?,
        client_key_pem: read("client-key.pem")?,
    })
}

#[derive(Debug, serde::Serialize)]
struct DeliverRequest<'a> {
    download_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeliverResponse {
    mtls_bundle: JsonBundle,
}

/// Resolve a bundle from an `edgepkg-v1:` (or legacy) token plus an optional Core host
/// override: parse the token, POST the deliver endpoint, decode `mtls_bundle`.
#[instrument(skip(onboarding_token))]
pub async fn fetch_via_token(
    onboarding_token: &str,
    core_url_override: Option<&str>,
) -> Result<MtlsBundle, BootstrapError> {
    let parsed = token::parse(onboarding_token)?;
    let core_url = resolve_core_url(core_url_override, parsed.core_url.as_deref())
        .ok_or_else(|| BootstrapError::InvalidToken("no Core API URL available".to_string()))?;

    let url = format!(
        "{}/api/admin/edge-packages/{}/download?format=json",
        core_url.trim_end_matches('/'),
        parsed.package_id
    );
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| BootstrapError::Http(e.to_string()))?;
    let response = client
        .post(&url)
        .json(&DeliverRequest {
            download_token: &parsed.download_token,
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

    let decoded: DeliverResponse = response
        .json()
        .await
        .map_err(|e| BootstrapError::Http(format!("decoding deliver response: {e}")))?;

    Ok(MtlsBundle {
        ca_pem: decoded.mtls_bundle.ca_pem.into_bytes(),
        client_pem: decoded.mtls_bundle.client_pem.into_bytes(),
        client_key_pem: decoded.mtls_bundle.client_key_pem.into_bytes(),
    })
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub mode: &'static str,
    pub cert_dir: PathBuf,
    pub server_name: String,
    pub role: String,
    pub ca_file: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub client_ca_file: PathBuf,
}

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

/// Write the three bundle files into `cert_dir` with the modes spec'd in §4.10 and return
/// the resulting security config.
pub fn install(
    bundle: &MtlsBundle,
    cert_dir: &Path,
    service: &str,
    server_name: &str,
    role: &str,
) -> Result<SecurityConfig, BootstrapError> {
    std::fs::create_dir_all(cert_dir)?;

    let ca_file = cert_dir.join("root.pem");
    let cert_file = cert_dir.join(format!("{service}.pem"));
    let key_file = cert_dir.join(format!("{service}-key.pem"));

    write_file_mode(&ca_file, &bundle.ca_pem, 0o644)?;
    write_file_mode(&cert_file, &bundle.client_pem, 0o644)?;
    write_file_mode(&key_file, &bundle.client_key_pem, 0o600)?;

    Ok(SecurityConfig {
        mode: "mTLS",
        cert_dir: cert_dir.to_path_buf(),
        server_name: server_name.to_string(),
        role: role.to_string(),
        ca_file: ca_file.clone(),
        cert_file,
        key_file,
        client_ca_file: ca_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_bundle_from_json() {
        let json = br#"{"ca_pem":"CA","client_pem":"CERT","client_key_pem":"KEY"}"#;
        let bundle = load_bundle(BundleSource::Json(json)).unwrap();
        assert_eq!(bundle.ca_pem, b"CA");
        assert_eq!(bundle.client_key_pem, b"KEY");
    }

    #[test]
    fn loads_bundle_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ca.pem"), b"CA").unwrap();
        std::fs::write(tmp.path().join("client.pem"), b"CERT").unwrap();
        std::fs::write(tmp.path().join("client-key.pem"), b"KEY").unwrap();

        let bundle = load_bundle(BundleSource::Directory(tmp.path())).unwrap();
        assert_eq!(bundle.client_pem, b"CERT");
    }

    #[test]
    fn directory_missing_a_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ca.pem"), b"CA").unwrap();
        assert!(load_bundle(BundleSource::Directory(tmp.path())).is_err());
    }

    #[test]
    fn install_writes_expected_files_and_modes() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = MtlsBundle {
            ca_pem: b"CA".to_vec(),
            client_pem: b"CERT".to_vec(),
            client_key_pem: b"KEY".to_vec(),
        };
        let config = install(&bundle, tmp.path(), "poller", "poller.example.org", "poller").unwrap();
        assert_eq!(config.mode, "mTLS");
        assert!(config.cert_file.ends_with("poller.pem"));
        assert!(config.key_file.ends_with("poller-key.pem"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let key_perms = std::fs::metadata(&config.key_file).unwrap().permissions();
            assert_eq!(key_perms.mode() & 0o777, 0o600);
        }
    }
}
