//! Resolver Client: the dedicated NATS connection authenticated as a `$SYS`-capable
//! principal, used to push account JWTs to the JetStream resolver (spec §4.5).
//!
//! Reconnect is lazy and serialized through a single `tokio::sync::Mutex`, mirroring
//! `NatsLink::ensure_connected` in `sr-dataplane::link`.

use crate::config::ResolverConfig;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

const CLAIMS_UPDATE_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct PushOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ClaimsUpdateReply {
    data: Option<ClaimsUpdateData>,
    error: Option<ClaimsUpdateError>,
}

#[derive(Debug, Deserialize)]
struct ClaimsUpdateData {
    #[allow(dead_code)]
    account: Option<String>,
    #[allow(dead_code)]
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimsUpdateError {
    #[allow(dead_code)]
    account: Option<String>,
    #[allow(dead_code)]
    code: Option<i64>,
    description: Option<String>,
}

/// Maintains exactly one NATS connection to the resolver, authenticated via the
/// credentials file configured in [`ResolverConfig`].
pub struct ResolverClient {
    config: ResolverConfig,
    conn: Mutex<Option<async_nats::Client>>,
}

impl ResolverClient {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    #[instrument(skip(self, account_jwt))]
    pub async fn push_account_jwt(&self, account_pub_key: &str, account_jwt: &str) -> PushOutcome {
        if !self.config.is_configured() {
            return PushOutcome {
                success: false,
                message: "resolver is not configured".to_string(),
            };
        }

        let client = match self.ensure_connected().await {
            Ok(c) => c,
            Err(e) => {
                return PushOutcome {
                    success: false,
                    message: format!("failed to connect to resolver: {e}"),
                }
            }
        };

        let subject = format!("$SYS.REQ.ACCOUNT.{account_pub_key}.CLAIMS.UPDATE");
        let request = client.request(subject, account_jwt.as_bytes().to_vec().into());
        let reply = match tokio::time::timeout(CLAIMS_UPDATE_TIMEOUT, request).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => {
                return PushOutcome {
                    success: false,
                    message: format!("resolver request failed: {e}"),
                }
            }
            Err(_) => {
                return PushOutcome {
                    success: false,
                    message: "resolver request timed out after 5s".to_string(),
                }
            }
        };

        if reply.payload.is_empty() {
            return PushOutcome {
                success: false,
                message: "resolver returned an empty reply".to_string(),
            };
        }

        let parsed: Result<ClaimsUpdateReply, _> = serde_json::from_slice(&reply.payload);
        match parsed {
            Ok(ClaimsUpdateReply { error: Some(err), .. }) => PushOutcome {
                success: false,
                message: err
                    .description
                    .unwrap_or_else(|| "resolver reported an error".to_string()),
            },
            Ok(ClaimsUpdateReply { data, error: None }) => PushOutcome {
                success: true,
                message: data
                    .and_then(|d| d.message)
                    .unwrap_or_else(|| "JWT pushed to resolver successfully".to_string()),
            },
            Err(e) => PushOutcome {
                success: false,
                message: format!("malformed resolver reply: {e}"),
            },
        }
    }

    async fn ensure_connected(&self) -> Result<async_nats::Client, async_nats::ConnectError> {
        let mut guard = self.conn.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        info!(url = %self.config.resolver_url, "connecting to resolver");
        let client = async_nats::ConnectOptions::new()
            .credentials_file(&self.config.creds_path)
            .await?
            .connect(&self.config.resolver_url)
            .await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    pub async fn close(&self) {
        let client = {
            let mut guard = self.conn.lock().await;
            guard.take()
        };
        let Some(client) = client else { return };
        match tokio::time::timeout(CLOSE_TIMEOUT, client.drain()).await {
            Ok(Ok(())) => info!("resolver connection drained"),
            Ok(Err(e)) => warn!(error = %e, "error draining resolver connection"),
            Err(_) => warn!("resolver drain exceeded {:?}; closing hard", CLOSE_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_resolver_fails_fast_without_connecting() {
        let client = ResolverClient::new(ResolverConfig::default());
        let outcome = client.push_account_jwt("ACCTPUBKEY", "jwt-bytes").await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "resolver is not configured");
    }

    #[test]
    fn claims_update_reply_parses_success_with_default_message() {
        let raw = r#"{"data":{"account":"A1","code":200}}"#;
        let parsed: ClaimsUpdateReply = serde_json::from_str(raw).unwrap();
        assert!(parsed.error.is_none());
        assert!(parsed.data.unwrap().message.is_none());
    }

    #[test]
    fn claims_update_reply_parses_error() {
        let raw = r#"{"error":{"account":"A1","code":500,"description":"nope"}}"#;
        let parsed: ClaimsUpdateReply = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.unwrap().description.unwrap(), "nope");
    }
}
