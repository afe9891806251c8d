//! Bootstrap Token parsing (spec §3, §9 "token format versioning").
//!
//! Wire form `edgepkg-v1:<base64url(json)>` where the JSON is `{pkg, dl, api?}`. A legacy
//! `[apiURL@]pkg{:|/|||,}dl` form is kept parseable for out-of-band migrations.

use crate::error::BootstrapError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

const TOKEN_PREFIX: &str = "edgepkg-v1:";
const LEGACY_SEPARATORS: [char; 4] = [':', '/', '|', ','];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub package_id: String,
    pub download_token: String,
    pub core_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    pkg: String,
    dl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api: Option<String>,
}

/// Parse either the structured `edgepkg-v1:` form or the legacy separator-delimited form.
pub fn parse(token: &str) -> Result<ParsedToken, BootstrapError> {
    if let Some(encoded) = token.strip_prefix(TOKEN_PREFIX) {
        return parse_structured(encoded);
    }
    parse_legacy(token)
}

fn parse_structured(encoded: &str) -> Result<ParsedToken, BootstrapError> {
    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| BootstrapError::InvalidToken(format!("base64url decode failed: {e}")))?;
    let payload: TokenPayload = serde_json::from_slice(&raw)
        .map_err(|e| BootstrapError::InvalidToken(format!("json decode failed: {e}")))?;
    if payload.pkg.is_empty() {
        return Err(BootstrapError::FieldMissing("pkg"));
    }
    if payload.dl.is_empty() {
        return Err(BootstrapError::FieldMissing("dl"));
    }
    Ok(ParsedToken {
        package_id: payload.pkg,
        download_token: payload.dl,
        core_url: payload.api,
    })
}

fn parse_legacy(token: &str) -> Result<ParsedToken, BootstrapError> {
    let (core_url, rest) = match token.split_once('@') {
        Some((api, rest)) => (Some(api.to_string()), rest),
        None => (None, token),
    };

    let sep_pos = rest.find(LEGACY_SEPARATORS).ok_or_else(|| {
        BootstrapError::InvalidToken("legacy token missing pkg/dl separator".to_string())
    })?;
    let (pkg, rest) = rest.split_at(sep_pos);
    let dl = &rest[1..];

    if pkg.is_empty() {
        return Err(BootstrapError::FieldMissing("pkg"));
    }
    if dl.is_empty() {
        return Err(BootstrapError::FieldMissing("dl"));
    }

    Ok(ParsedToken {
        package_id: pkg.to_string(),
        download_token: dl.to_string(),
        core_url,
    })
}

/// Render the structured `edgepkg-v1:` form, mainly for tests and tooling that mint tokens.
pub fn encode(package_id: &str, download_token: &str, core_url: Option<&str>) -> String {
    let payload = TokenPayload {
        pkg: package_id.to_string(),
        dl: download_token.to_string(),
        api: core_url.map(str::to_string),
    };
    let raw = serde_json::to_vec(&payload).expect("token payload is always serializable");
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_round_trips() {
        let token = encode("pkg-1", "dl-token", Some("https://core.example"));
        let parsed = parse(&token).unwrap();
        assert_eq!(parsed.package_id, "pkg-1");
        assert_eq!(parsed.download_token, "dl-token");
        assert_eq!(parsed.core_url.as_deref(), Some("https://core.example"));
    }

    #[test]
    fn structured_round_trips_without_api() {
        let token = encode("pkg-2", "dl-2", None);
        let parsed = parse(&token).unwrap();
        assert_eq!(parsed.core_url, None);
    }

    #[test]
    fn empty_pkg_or_dl_is_rejected() {
        let token = encode("", "dl", None);
        assert!(parse(&token).is_err());
        let token = encode("pkg", "", None);
        assert!(parse(&token).is_err());
    }

    #[test]
    fn legacy_form_with_colon_separator_parses() {
        let parsed = parse("pkg-123:dltoken").unwrap();
        assert_eq!(parsed.package_id, "pkg-123");
        assert_eq!(parsed.download_token, "dltoken");
        assert_eq!(parsed.core_url, None);
    }

    #[test]
    fn legacy_form_with_api_prefix_parses() {
        let parsed = parse("https://core.example@pkg-123/dltoken").unwrap();
        assert_eq!(parsed.package_id, "pkg-123");
        assert_eq!(parsed.download_token, "dltoken");
        assert_eq!(parsed.core_url.as_deref(), Some("https://core.example"));
    }

    #[test]
    fn legacy_form_without_separator_is_rejected() {
        assert!(parse("nopekgsep").is_err());
    }
}
