//! Operator resolver config file (spec §6) — written for the message bus's account resolver.

/// Fields needed to render the operator resolver config. Empty strings are omitted from
/// the emitted text, per spec ("Emitted only for fields that are non-empty").
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigFields {
    pub operator_jwt: String,
    pub system_account_pubkey: String,
    pub resolver_dir: String,
}

/// Render the HCL-ish operator resolver config text.
pub fn render_resolver_config(fields: &ResolverConfigFields) -> String {
    let mut out = String::new();
    if !fields.operator_jwt.is_empty() {
        out.push_str(&format!("operator: {}\n", fields.operator_jwt));
    }
    if !fields.system_account_pubkey.is_empty() {
        out.push_str(&format!("system_account: {}\n", fields.system_account_pubkey));
    }
    if !fields.resolver_dir.is_empty() {
        out.push_str(&format!(
            "resolver: {{ type: full, dir: \"{}\", allow_delete: true, interval: \"2m\" }}\n",
            fields.resolver_dir
        ));
    }
    out
}

/// File name for the system account JWT in the resolver directory.
pub fn system_account_jwt_filename(sys_account_pubkey: &str) -> String {
    format!("{sys_account_pubkey}.jwt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_empty_fields() {
        let fields = ResolverConfigFields {
            operator_jwt: "OPJWT".into(),
            system_account_pubkey: String::new(),
            resolver_dir: "/var/resolver".into(),
        };
        let rendered = render_resolver_config(&fields);
        assert!(rendered.contains("operator: OPJWT"));
        assert!(!rendered.contains("system_account"));
        assert!(rendered.contains("dir: \"/var/resolver\""));
    }
}
