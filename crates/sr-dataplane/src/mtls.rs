//! mTLS configuration for the Data RPC Facade's peers.
//!
//! Adapted from the teacher's `pagi-federation::mtls` (server/client `rustls` config
//! builders); generalized here to serve any Data Service client rather than a fixed
//! Master/Satellite pair.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, std::io::Error> {
    let f = File::open(path)?;
    let mut reader = BufReader::new(f);
    let certs = rustls_pemfile::certs(&mut reader)
        .filter_map(|r| r.ok())
        .map(|c| c.into_owned())
        .collect::<Vec<_>>();
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, std::io::Error> {
    let f = File::open(path)?;
    let mut reader = BufReader::new(f);
    let key = rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no private key"))?;
    Ok(key)
}

/// Build server TLS config: present the service's own cert, require client certs signed
/// by `client_ca_path` (mTLS).
pub fn server_tls_config(
    server_cert_path: &Path,
    server_key_path: &Path,
    client_ca_path: &Path,
) -> Result<Arc<ServerConfig>, String> {
    let certs = load_certs(server_cert_path).map_err(|e| e.to_string())?;
    let key = load_private_key(server_key_path).map_err(|e| e.to_string())?;
    let client_ca_certs = load_certs(client_ca_path).map_err(|e| e.to_string())?;

    let mut client_ca_store = RootCertStore::empty();
    for cert in client_ca_certs {
        client_ca_store.add(cert).map_err(|e| e.to_string())?;
    }
    let verifier = WebPkiClientVerifier::builder(Arc::new(client_ca_store))
        .build()
        .map_err(|e| e.to_string())?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| e.to_string())?;

    Ok(Arc::new(config))
}

/// Build client TLS config: present a client cert, trust the server via `ca_path`.
pub fn client_tls_config(
    client_cert_path: &Path,
    client_key_path: &Path,
    ca_path: &Path,
) -> Result<Arc<ClientConfig>, String> {
    let certs = load_certs(client_cert_path).map_err(|e| e.to_string())?;
    let key = load_private_key(client_key_path).map_err(|e| e.to_string())?;
    let ca_certs = load_certs(ca_path).map_err(|e| e.to_string())?;

    let mut root_store = RootCertStore::empty();
    for cert in ca_certs {
        root_store.add(cert).map_err(|e| e.to_string())?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(certs, key)
        .map_err(|e| e.to_string())?;

    Ok(Arc::new(config))
}

/// Load a cert/key pair as a tonic-native `Identity` for services that terminate TLS via
/// `tonic::transport::Server::tls_config` rather than a raw `rustls::ServerConfig` — this
/// is the path that keeps `Request::peer_certs()` populated for peer-identity extraction.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<tonic::transport::Identity, String> {
    let cert = std::fs::read(cert_path).map_err(|e| e.to_string())?;
    let key = std::fs::read(key_path).map_err(|e| e.to_string())?;
    Ok(tonic::transport::Identity::from_pem(cert, key))
}

/// Load a CA bundle as a tonic-native `Certificate`, used to verify client certs when
/// serving via `tonic::transport::ServerTlsConfig::client_ca_root`.
pub fn load_ca_certificate(path: &Path) -> Result<tonic::transport::Certificate, String> {
    let pem = std::fs::read(path).map_err(|e| e.to_string())?;
    Ok(tonic::transport::Certificate::from_pem(pem))
}
