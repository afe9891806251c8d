//! NATS account/operator/user JWT claims and compact-JWT encode/decode.
//!
//! The wire format follows the NATS JWT v2 convention: a three-segment
//! `base64url(header).base64url(payload).base64url(signature)` string, signed with the
//! issuer's Ed25519 nkey rather than RSA/HMAC. `jti` is the base64url-encoded sha256 of
//! the payload with `jti` blanked, computed in two passes.

use crate::error::IdentityError;
use crate::keys::{Role, RoledKeyPair};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const JWT_ALG: &str = "ed25519-nkey";

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

impl Default for JwtHeader {
    fn default() -> Self {
        Self { typ: "JWT", alg: JWT_ALG }
    }
}

/// Generic envelope every NATS JWT claims type is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsEnvelope<T> {
    pub jti: String,
    pub iat: i64,
    pub iss: String,
    pub name: String,
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub nats: T,
}

/// Sign `data` (an envelope with `jti` left blank) with `signer`, filling in `jti` and
/// returning the compact JWT string.
pub fn encode<T: Serialize>(
    mut envelope: ClaimsEnvelope<T>,
    signer: &RoledKeyPair,
) -> Result<String, IdentityError> {
    envelope.jti.clear();
    let unhashed = serde_json::to_vec(&envelope)?;
    let digest = Sha256::digest(&unhashed);
    envelope.jti = URL_SAFE_NO_PAD.encode(digest);

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&JwtHeader::default())?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope)?);
    let signing_input = format!("{header}.{payload}");
    let sig = signer.sign(signing_input.as_bytes())?;
    let sig_b64 = URL_SAFE_NO_PAD.encode(sig);
    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Decode a compact JWT and verify its signature against `issuer_role`'s public key
/// (recovered from the envelope's `iss` field), returning the parsed claims.
pub fn decode<T: DeserializeOwned>(
    jwt: &str,
    issuer_role: Role,
) -> Result<ClaimsEnvelope<T>, IdentityError> {
    let mut parts = jwt.splitn(3, '.');
    let header_b64 = parts.next().ok_or_else(|| IdentityError::MalformedJwt("missing header".into()))?;
    let payload_b64 = parts.next().ok_or_else(|| IdentityError::MalformedJwt("missing payload".into()))?;
    let sig_b64 = parts.next().ok_or_else(|| IdentityError::MalformedJwt("missing signature".into()))?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|e| IdentityError::MalformedJwt(e.to_string()))?;
    let envelope: ClaimsEnvelope<T> = serde_json::from_slice(&payload_bytes)?;

    let verifier = RoledKeyPair::from_public_key(issuer_role, &envelope.iss)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|e| IdentityError::MalformedJwt(e.to_string()))?;
    verifier.verify(signing_input.as_bytes(), &sig)?;

    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Claims bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorClaimsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_account: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NatsLimits {
    pub subs: i64,
    pub conn: i64,
    pub leaf: i64,
    pub imports: i64,
    pub exports: i64,
    pub data: i64,
    pub payload: i64,
    pub wildcard_exports: bool,
}

impl NatsLimits {
    /// All-fields-unlimited sentinel (`-1`), used when the caller supplies no explicit limits.
    pub fn unlimited() -> Self {
        Self {
            subs: -1,
            conn: -1,
            leaf: -1,
            imports: -1,
            exports: -1,
            data: -1,
            payload: -1,
            wildcard_exports: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JetStreamLimits {
    pub mem_storage: i64,
    pub disk_storage: i64,
    pub streams: i64,
    pub consumer: i64,
    pub max_ack_pending: i64,
    pub mem_max_stream_bytes: i64,
    pub disk_max_stream_bytes: i64,
    pub max_bytes_required: bool,
    pub max_streams: i64,
}

impl JetStreamLimits {
    pub fn unlimited() -> Self {
        Self {
            mem_storage: -1,
            disk_storage: -1,
            streams: -1,
            consumer: -1,
            max_ack_pending: -1,
            mem_max_stream_bytes: -1,
            disk_max_stream_bytes: -1,
            max_bytes_required: false,
            max_streams: -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectMapping {
    pub from: String,
    pub to: String,
}

/// Default collector-facing subject mappings (spec §3), before `{{tenant}}` substitution.
pub fn default_subject_mappings() -> Vec<SubjectMapping> {
    [
        "events.>",
        "logs.syslog.>",
        "logs.snmp.>",
        "netflow.>",
        "otel.>",
        "logs.>",
        "telemetry.>",
    ]
    .into_iter()
    .map(|from| SubjectMapping {
        from: from.to_string(),
        to: format!("{{{{tenant}}}}.{from}"),
    })
    .collect()
}

/// Substitute the literal `{{tenant}}` token in a mapping target with `tenant`.
pub fn apply_tenant_template(mappings: &[SubjectMapping], tenant: &str) -> Vec<SubjectMapping> {
    mappings
        .iter()
        .map(|m| SubjectMapping {
            from: m.from.clone(),
            to: m.to.replace("{{tenant}}", tenant),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    Stream,
    Service,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Export {
    pub subject: String,
    pub kind: ExportKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub subject: String,
    pub account: String,
    pub kind: ExportKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountClaimsData {
    pub limits: NatsLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jetstream: Option<JetStreamLimits>,
    pub mappings: Vec<SubjectMapping>,
    pub exports: Vec<Export>,
    pub imports: Vec<Import>,
    /// Revoked user public key -> unix-seconds revocation timestamp.
    pub revocations: HashMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permission {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePermission {
    pub max_msgs: i64,
    pub expires_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserClaimsData {
    pub issuer_account: String,
    #[serde(rename = "pub")]
    pub publish: Permission,
    #[serde(rename = "sub")]
    pub subscribe: Permission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp: Option<ResponsePermission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Role;

    #[test]
    fn account_jwt_roundtrips_and_verifies() {
        let operator = RoledKeyPair::generate(Role::Operator);
        let account = RoledKeyPair::generate(Role::Account);

        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: 0,
            iss: operator.public_key(),
            name: "acme-corp".to_string(),
            sub: account.public_key(),
            exp: None,
            nats: AccountClaimsData {
                limits: NatsLimits::unlimited(),
                jetstream: Some(JetStreamLimits::unlimited()),
                mappings: apply_tenant_template(&default_subject_mappings(), "acme-corp"),
                exports: vec![],
                imports: vec![],
                revocations: HashMap::new(),
            },
        };

        let jwt = encode(envelope, &operator).unwrap();
        let decoded: ClaimsEnvelope<AccountClaimsData> = decode(&jwt, Role::Operator).unwrap();
        assert_eq!(decoded.iss, operator.public_key());
        assert_eq!(decoded.name, "acme-corp");
        assert!(decoded
            .nats
            .mappings
            .iter()
            .any(|m| m.from == "events.>" && m.to == "acme-corp.events.>"));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let operator = RoledKeyPair::generate(Role::Operator);
        let account = RoledKeyPair::generate(Role::Account);
        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: 0,
            iss: operator.public_key(),
            name: "acme".into(),
            sub: account.public_key(),
            exp: None,
            nats: AccountClaimsData::default(),
        };
        let mut jwt = encode(envelope, &operator).unwrap();
        jwt.push('x');
        let result: Result<ClaimsEnvelope<AccountClaimsData>, _> = decode(&jwt, Role::Operator);
        assert!(result.is_err());
    }
}
