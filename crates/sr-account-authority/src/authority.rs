//! Account Authority state machine and operations (spec §4.4).
//!
//! State mutation follows the same discipline as `MasterState` in the teacher's
//! `federation.rs`: locks are acquired, the minimum necessary work happens under them, and
//! no lock is ever held across an `.await`.

use crate::error::AuthorityError;
use sr_identity::{
    apply_tenant_template, default_subject_mappings, encode, render_credentials_file,
    AccountClaimsData, ClaimsEnvelope, Export, ExportKind, JetStreamLimits, NatsLimits,
    Permission, ResponsePermission, Role, RoledKeyPair, SubjectMapping, UserClaimsData,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Persists the newly-bootstrapped operator somewhere durable (e.g. the resolver config
/// directory). A no-op writer is used when no persistence backend is configured; a real
/// writer failing here causes `bootstrap_operator` to roll back and report the error
/// without installing any operator state.
pub trait OperatorConfigWriter: Send + Sync {
    fn write(&self, operator_jwt: &str, system_account_pub_key: Option<&str>) -> Result<(), AuthorityError>;
}

pub struct NoopConfigWriter;

impl OperatorConfigWriter for NoopConfigWriter {
    fn write(&self, _operator_jwt: &str, _system_account_pub_key: Option<&str>) -> Result<(), AuthorityError> {
        Ok(())
    }
}

#[derive(Default)]
struct AuthorityInner {
    operator: Option<RoledKeyPair>,
    operator_name: String,
    operator_jwt: String,
    system_account_pub_key: Option<String>,
}

/// Credential flavor requested by `GenerateUserCredentials`, selecting the base
/// publish/subscribe permission set (spec §4.4 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredType {
    Collector,
    Service,
    Admin,
}

impl CredType {
    pub fn parse(s: &str) -> Self {
        match s {
            "service" => CredType::Service,
            "admin" => CredType::Admin,
            _ => CredType::Collector,
        }
    }
}

/// Caller-supplied overrides for `GenerateUserCredentials` permissions (spec §4.4 step 4):
/// when `publish_allow`/`subscribe_allow` are non-empty they entirely replace the
/// `credType` defaults; deny lists and response permission are added on top regardless.
#[derive(Debug, Clone, Default)]
pub struct PermissionOverride {
    pub publish_allow: Vec<String>,
    pub publish_deny: Vec<String>,
    pub subscribe_allow: Vec<String>,
    pub subscribe_deny: Vec<String>,
    pub allow_responses: bool,
    pub max_responses: i64,
}

pub struct BootstrapOutcome {
    pub operator_pub_key: String,
    pub operator_seed: Option<String>,
    pub operator_jwt: String,
    pub system_account_pub_key: Option<String>,
    pub system_account_seed: Option<String>,
    pub system_account_jwt: Option<String>,
}

pub struct OperatorInfo {
    pub initialized: bool,
    pub operator_name: String,
    pub operator_pub_key: String,
    pub system_account_pub_key: Option<String>,
}

pub struct TenantAccountOutcome {
    pub account_pub_key: String,
    pub account_seed: String,
    pub account_jwt: String,
}

pub struct UserCredentialsOutcome {
    pub user_pub_key: String,
    pub credentials_file: String,
    pub expires_at_unix: i64,
}

pub struct SignAccountOutcome {
    pub account_pub_key: String,
    pub account_jwt: String,
}

/// Stateless with respect to tenant state (account seeds live with the caller); holds only
/// the operator key pair once bootstrapped.
pub struct AccountAuthority {
    state: RwLock<AuthorityInner>,
    config_writer: Arc<dyn OperatorConfigWriter>,
}

impl AccountAuthority {
    pub fn new(config_writer: Arc<dyn OperatorConfigWriter>) -> Self {
        Self {
            state: RwLock::new(AuthorityInner::default()),
            config_writer,
        }
    }

    #[instrument(skip(self, existing_seed))]
    pub async fn bootstrap_operator(
        &self,
        name: &str,
        existing_seed: Option<&str>,
        generate_system_account: bool,
    ) -> Result<BootstrapOutcome, AuthorityError> {
        {
            let guard = self.state.read().await;
            if guard.operator.is_some() {
                return Err(AuthorityError::AlreadyExists);
            }
        }

        let (operator, operator_seed) = match existing_seed {
            Some(seed) => {
                let kp = RoledKeyPair::from_seed(Role::Operator, seed)?;
                (kp, None)
            }
            None => {
                let kp = RoledKeyPair::generate(Role::Operator);
                let seed = kp.seed()?;
                (kp, Some(seed))
            }
        };

        let (system_account_pub_key, system_account_seed, system_account_jwt) =
            if generate_system_account {
                let sys_account = RoledKeyPair::generate(Role::Account);
                let sys_seed = sys_account.seed()?;
                let sys_pub = sys_account.public_key();

                let claims = AccountClaimsData {
                    limits: NatsLimits::unlimited(),
                    jetstream: None,
                    mappings: Vec::new(),
                    exports: vec![
                        Export {
                            subject: "$SYS.REQ.ACCOUNT.*.*".to_string(),
                            kind: ExportKind::Service,
                        },
                        Export {
                            subject: "$SYS.ACCOUNT.*.>".to_string(),
                            kind: ExportKind::Stream,
                        },
                    ],
                    imports: Vec::new(),
                    revocations: Default::default(),
                };
                let envelope = ClaimsEnvelope {
                    jti: String::new(),
                    iat: now_unix(),
                    iss: operator.public_key(),
                    name: "SYS".to_string(),
                    sub: sys_pub.clone(),
                    exp: None,
                    nats: claims,
                };
                let jwt = encode(envelope, &operator)?;
                (Some(sys_pub), Some(sys_seed), Some(jwt))
            } else {
                (None, None, None)
            };

        let operator_claims = sr_identity::OperatorClaimsData {
            system_account: system_account_pub_key.clone(),
        };
        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: now_unix(),
            iss: operator.public_key(),
            name: name.to_string(),
            sub: operator.public_key(),
            exp: None,
            nats: operator_claims,
        };
        let operator_jwt = encode(envelope, &operator)?;

        self.config_writer
            .write(&operator_jwt, system_account_pub_key.as_deref())?;

        let mut guard = self.state.write().await;
        if guard.operator.is_some() {
            return Err(AuthorityError::AlreadyExists);
        }
        let operator_pub_key = operator.public_key();
        guard.operator = Some(operator);
        guard.operator_name = name.to_string();
        guard.operator_jwt = operator_jwt.clone();
        guard.system_account_pub_key = system_account_pub_key.clone();
        drop(guard);

        Ok(BootstrapOutcome {
            operator_pub_key,
            operator_seed,
            operator_jwt,
            system_account_pub_key,
            system_account_seed,
            system_account_jwt,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_operator_info(&self) -> OperatorInfo {
        let guard = self.state.read().await;
        OperatorInfo {
            initialized: guard.operator.is_some(),
            operator_name: guard.operator_name.clone(),
            operator_pub_key: guard
                .operator
                .as_ref()
                .map(|o| o.public_key())
                .unwrap_or_default(),
            system_account_pub_key: guard.system_account_pub_key.clone(),
        }
    }

    #[instrument(skip(self, limits, jetstream_limits, custom_mappings))]
    pub async fn create_tenant_account(
        &self,
        slug: &str,
        limits: Option<NatsLimits>,
        jetstream_limits: Option<JetStreamLimits>,
        custom_mappings: Vec<SubjectMapping>,
    ) -> Result<TenantAccountOutcome, AuthorityError> {
        let guard = self.state.read().await;
        let operator = guard
            .operator
            .as_ref()
            .ok_or(AuthorityError::NotInitialized)?;

        let account = RoledKeyPair::generate(Role::Account);
        let account_seed = account.seed()?;
        let account_pub_key = account.public_key();

        let mut mappings = default_subject_mappings();
        mappings.extend(custom_mappings);
        let mappings = apply_tenant_template(&mappings, slug);

        let jetstream = Some(jetstream_limits.unwrap_or_else(JetStreamLimits::unlimited));
        let claims = AccountClaimsData {
            limits: limits.unwrap_or_else(NatsLimits::unlimited),
            jetstream,
            mappings,
            exports: Vec::new(),
            imports: Vec::new(),
            revocations: Default::default(),
        };
        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: now_unix(),
            iss: operator.public_key(),
            name: slug.to_string(),
            sub: account_pub_key.clone(),
            exp: None,
            nats: claims,
        };
        let account_jwt = encode(envelope, operator)?;

        Ok(TenantAccountOutcome {
            account_pub_key,
            account_seed,
            account_jwt,
        })
    }

    #[instrument(skip(self, account_seed, overrides))]
    pub async fn generate_user_credentials(
        &self,
        slug: &str,
        account_seed: &str,
        user_name: &str,
        cred_type: CredType,
        overrides: Option<PermissionOverride>,
        expiration_seconds: i64,
    ) -> Result<UserCredentialsOutcome, AuthorityError> {
        let account = RoledKeyPair::from_seed(Role::Account, account_seed)?;
        let user = RoledKeyPair::generate(Role::User);
        let user_pub_key = user.public_key();
        let user_seed = user.seed()?;

        let (mut publish, mut subscribe, mut resp) = default_permissions(slug, cred_type);

        if let Some(ov) = overrides {
            if !ov.publish_allow.is_empty() {
                publish.allow = ov.publish_allow;
            }
            if !ov.subscribe_allow.is_empty() {
                subscribe.allow = ov.subscribe_allow;
            }
            publish.deny.extend(ov.publish_deny);
            subscribe.deny.extend(ov.subscribe_deny);
            if ov.allow_responses {
                resp = Some(ResponsePermission {
                    max_msgs: if ov.max_responses > 0 { ov.max_responses } else { 1 },
                    expires_ms: 60_000,
                });
            }
        }

        let claims = UserClaimsData {
            issuer_account: account.public_key(),
            publish,
            subscribe,
            resp,
        };

        let now = now_unix();
        let exp = if expiration_seconds > 0 {
            Some(now + expiration_seconds)
        } else {
            None
        };
        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: now,
            iss: account.public_key(),
            name: user_name.to_string(),
            sub: user_pub_key.clone(),
            exp,
            nats: claims,
        };
        let jwt = encode(envelope, &account)?;
        let credentials_file = render_credentials_file(&jwt, &user_seed);

        Ok(UserCredentialsOutcome {
            user_pub_key,
            credentials_file,
            expires_at_unix: exp.unwrap_or(0),
        })
    }

    #[instrument(skip(self, account_seed, limits, jetstream_limits, mappings, revoked_user_keys))]
    pub async fn sign_account_jwt(
        &self,
        slug: &str,
        account_seed: &str,
        limits: Option<NatsLimits>,
        jetstream_limits: Option<JetStreamLimits>,
        mappings: Vec<SubjectMapping>,
        revoked_user_keys: Vec<String>,
    ) -> Result<SignAccountOutcome, AuthorityError> {
        let guard = self.state.read().await;
        let operator = guard
            .operator
            .as_ref()
            .ok_or(AuthorityError::NotInitialized)?;

        let account = RoledKeyPair::from_seed(Role::Account, account_seed)?;
        let account_pub_key = account.public_key();

        let mut all_mappings = default_subject_mappings();
        all_mappings.extend(mappings);
        let all_mappings = apply_tenant_template(&all_mappings, slug);

        let now = now_unix();
        let mut revocations = std::collections::HashMap::new();
        for key in revoked_user_keys {
            revocations.insert(key, now);
        }

        let claims = AccountClaimsData {
            limits: limits.unwrap_or_else(NatsLimits::unlimited),
            jetstream: Some(jetstream_limits.unwrap_or_else(JetStreamLimits::unlimited)),
            mappings: all_mappings,
            exports: Vec::new(),
            imports: Vec::new(),
            revocations,
        };
        let envelope = ClaimsEnvelope {
            jti: String::new(),
            iat: now,
            iss: operator.public_key(),
            name: slug.to_string(),
            sub: account_pub_key.clone(),
            exp: None,
            nats: claims,
        };
        let account_jwt = encode(envelope, operator)?;

        Ok(SignAccountOutcome {
            account_pub_key,
            account_jwt,
        })
    }
}

fn default_permissions(slug: &str, cred_type: CredType) -> (Permission, Permission, Option<ResponsePermission>) {
    match cred_type {
        CredType::Collector => (
            Permission {
                allow: vec![
                    "events.>".to_string(),
                    "snmp.traps".to_string(),
                    "logs.>".to_string(),
                    "telemetry.>".to_string(),
                    "netflow.>".to_string(),
                ],
                deny: Vec::new(),
            },
            Permission {
                allow: vec!["_INBOX.>".to_string()],
                deny: Vec::new(),
            },
            Some(ResponsePermission {
                max_msgs: 1,
                expires_ms: 60_000,
            }),
        ),
        CredType::Service => (
            Permission {
                allow: vec![format!("{slug}.>"), "_INBOX.>".to_string()],
                deny: Vec::new(),
            },
            Permission {
                allow: vec![format!("{slug}.>"), "_INBOX.>".to_string()],
                deny: Vec::new(),
            },
            Some(ResponsePermission {
                max_msgs: 100,
                expires_ms: 300_000,
            }),
        ),
        CredType::Admin => (
            Permission {
                allow: vec![format!("{slug}.admin.>")],
                deny: Vec::new(),
            },
            Permission {
                allow: vec![format!("{slug}.>"), "_INBOX.>".to_string()],
                deny: Vec::new(),
            },
            None,
        ),
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_is_rejected_once_initialized() {
        let authority = AccountAuthority::new(Arc::new(NoopConfigWriter));
        authority.bootstrap_operator("acme", None, false).await.unwrap();
        let err = authority
            .bootstrap_operator("acme", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::AlreadyExists));
    }

    #[tokio::test]
    async fn bootstrap_with_system_account_returns_seed_and_jwt() {
        let authority = AccountAuthority::new(Arc::new(NoopConfigWriter));
        let outcome = authority
            .bootstrap_operator("acme", None, true)
            .await
            .unwrap();
        assert!(outcome.operator_seed.is_some());
        assert!(outcome.system_account_seed.is_some());
        assert!(outcome.system_account_jwt.is_some());
    }

    #[tokio::test]
    async fn create_tenant_account_requires_initialized_operator() {
        let authority = AccountAuthority::new(Arc::new(NoopConfigWriter));
        let err = authority
            .create_tenant_account("acme", None, None, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::NotInitialized));
    }

    #[tokio::test]
    async fn full_tenant_and_user_flow_round_trips() {
        let authority = AccountAuthority::new(Arc::new(NoopConfigWriter));
        authority.bootstrap_operator("acme", None, false).await.unwrap();
        let account = authority
            .create_tenant_account("acme-corp", None, None, Vec::new())
            .await
            .unwrap();
        assert!(account.account_pub_key.starts_with('A'));

        let creds = authority
            .generate_user_credentials(
                "acme-corp",
                &account.account_seed,
                "collector-1",
                CredType::Collector,
                None,
                0,
            )
            .await
            .unwrap();
        assert!(creds.user_pub_key.starts_with('U'));
        assert!(creds.credentials_file.contains("BEGIN NATS USER JWT"));
    }

    #[test]
    fn cred_type_parses_known_and_defaults_to_collector() {
        assert_eq!(CredType::parse("service"), CredType::Service);
        assert_eq!(CredType::parse("admin"), CredType::Admin);
        assert_eq!(CredType::parse("bogus"), CredType::Collector);
    }
}
