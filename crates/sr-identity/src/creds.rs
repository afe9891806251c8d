//! Byte-exact credentials file framing (spec §6) used by every NATS client.

/// Render a user JWT + seed pair into the standard `.creds` textual framing.
pub fn render_credentials_file(jwt: &str, seed: &str) -> String {
    format!(
        "-----BEGIN NATS USER JWT-----\n\
         {jwt}\n\
         ------END NATS USER JWT------\n\n\
         ************************* IMPORTANT *************************\n\
         NKEY Seed printed below can be used to sign and prove identity.\n\
         NKEYs are sensitive and should be treated as secrets.\n\n\
         -----BEGIN USER NKEY SEED-----\n\
         {seed}\n\
         ------END USER NKEY SEED------\n\n\
         *************************************************************\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_jwt_and_seed_between_markers() {
        let out = render_credentials_file("JWT.HERE", "SUABCDEF");
        assert!(out.contains("-----BEGIN NATS USER JWT-----\nJWT.HERE\n"));
        assert!(out.contains("-----BEGIN USER NKEY SEED-----\nSUABCDEF\n"));
        assert!(out.starts_with("-----BEGIN NATS USER JWT-----"));
    }
}
