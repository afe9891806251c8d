//! mTLS Peer Authorizer: extracts a caller's identity from its peer certificate and
//! enforces an allowlist before any Account Authority RPC runs (spec §4.6).

use crate::error::AuthzError;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

/// Extract the caller's identity string from a peer certificate: the SPIFFE URI SAN if
/// present, else a canonicalized `CN=...,O=...` subject string.
pub fn identity_from_cert_der(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::certificate::X509Certificate::from_der(der).ok()?;

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::URI(uri) = name {
                if uri.starts_with("spiffe://") {
                    return Some(uri.to_string());
                }
            }
        }
    }

    let subject = cert.subject();
    let cn = subject
        .iter_common_name()
        .next()
        .and_then(|a| a.as_str().ok())
        .unwrap_or("");
    let org = subject
        .iter_organization()
        .next()
        .and_then(|a| a.as_str().ok())
        .unwrap_or("");
    Some(format!("CN={cn},O={org}"))
}

/// Peer-identity allowlist, checked on every incoming RPC (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct PeerAuthorizer {
    allowed_identities: Vec<String>,
}

impl PeerAuthorizer {
    pub fn new(allowed_identities: Vec<String>) -> Self {
        Self { allowed_identities }
    }

    pub fn authorize(&self, identity: &str) -> Result<(), AuthzError> {
        if self.allowed_identities.is_empty() {
            return Err(AuthzError::NoAllowedIdentities);
        }
        if self.allowed_identities.iter().any(|a| a == identity) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(identity.to_string()))
        }
    }
}

impl Interceptor for PeerAuthorizer {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let certs = request
            .peer_certs()
            .ok_or(AuthzError::Unauthenticated)?;

        let identity = certs
            .iter()
            .find_map(|c| identity_from_cert_der(c.as_ref()))
            .ok_or_else(|| {
                warn!("peer certificate carried no extractable identity");
                AuthzError::Unauthenticated
            })?;

        self.authorize(&identity)?;
        debug!(%identity, "peer authorized");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_denies_everything() {
        let authz = PeerAuthorizer::new(Vec::new());
        let err = authz.authorize("spiffe://example.org/ns/default/sa/edge").unwrap_err();
        assert!(matches!(err, AuthzError::NoAllowedIdentities));
    }

    #[test]
    fn exact_match_is_required() {
        let authz = PeerAuthorizer::new(vec!["spiffe://example.org/ns/default/sa/edge".to_string()]);
        assert!(authz.authorize("spiffe://example.org/ns/default/sa/edge").is_ok());
        assert!(authz.authorize("spiffe://example.org/ns/default/sa/other").is_err());
    }

    #[test]
    fn identity_from_malformed_der_is_none() {
        assert!(identity_from_cert_der(b"not a certificate").is_none());
    }
}
