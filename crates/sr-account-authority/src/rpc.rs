//! gRPC facade wiring the Account Authority state machine and Resolver Client onto the
//! generated `AccountAuthority` service trait (spec §4.4, §6).

use crate::authority::{AccountAuthority as AuthorityCore, CredType, PermissionOverride};
use crate::proto::account_authority_server::AccountAuthority;
use crate::proto::{
    BootstrapOperatorRequest, BootstrapOperatorResponse, CreateTenantAccountRequest,
    CreateTenantAccountResponse, GenerateUserCredentialsRequest, GenerateUserCredentialsResponse,
    GetOperatorInfoRequest, GetOperatorInfoResponse, JetStreamLimits as ProtoJetStreamLimits,
    NatsLimits as ProtoNatsLimits, PushAccountJwtRequest, PushAccountJwtResponse,
    SignAccountJwtRequest, SignAccountJwtResponse, SubjectMapping as ProtoSubjectMapping,
};
use crate::resolver::ResolverClient;
use sr_identity::{JetStreamLimits, NatsLimits, SubjectMapping};
use tonic::{Request, Response, Status};
use tracing::instrument;

pub struct AccountAuthorityService {
    authority: AuthorityCore,
    resolver: ResolverClient,
}

impl AccountAuthorityService {
    pub fn new(authority: AuthorityCore, resolver: ResolverClient) -> Self {
        Self { authority, resolver }
    }
}

fn from_proto_limits(limits: Option<ProtoNatsLimits>) -> Option<NatsLimits> {
    limits.map(|l| NatsLimits {
        subs: l.subs,
        conn: l.conn,
        leaf: l.leaf,
        imports: l.imports,
        exports: l.exports,
        data: l.data,
        payload: l.payload,
        wildcard_exports: false,
    })
}

fn from_proto_js_limits(limits: Option<ProtoJetStreamLimits>) -> Option<JetStreamLimits> {
    limits.map(|l| JetStreamLimits {
        mem_storage: l.mem_storage,
        disk_storage: l.disk_storage,
        streams: l.streams,
        consumer: l.consumer,
        max_ack_pending: 0,
        mem_max_stream_bytes: 0,
        disk_max_stream_bytes: 0,
        max_bytes_required: false,
        max_streams: 0,
    })
}

fn from_proto_mappings(mappings: Vec<ProtoSubjectMapping>) -> Vec<SubjectMapping> {
    mappings
        .into_iter()
        .map(|m| SubjectMapping { from: m.from, to: m.to })
        .collect()
}

#[tonic::async_trait]
impl AccountAuthority for AccountAuthorityService {
    #[instrument(skip(self, request))]
    async fn bootstrap_operator(
        &self,
        request: Request<BootstrapOperatorRequest>,
    ) -> Result<Response<BootstrapOperatorResponse>, Status> {
        let req = request.into_inner();
        let existing_seed = if req.existing_seed.is_empty() {
            None
        } else {
            Some(req.existing_seed.as_str())
        };
        let outcome = self
            .authority
            .bootstrap_operator(&req.name, existing_seed, req.generate_system_account)
            .await?;

        Ok(Response::new(BootstrapOperatorResponse {
            operator_pub_key: outcome.operator_pub_key,
            operator_seed: outcome.operator_seed.unwrap_or_default(),
            operator_jwt: outcome.operator_jwt,
            system_account_pub_key: outcome.system_account_pub_key.unwrap_or_default(),
            system_account_seed: outcome.system_account_seed.unwrap_or_default(),
            system_account_jwt: outcome.system_account_jwt.unwrap_or_default(),
        }))
    }

    #[instrument(skip(self, _request))]
    async fn get_operator_info(
        &self,
        _request: Request<GetOperatorInfoRequest>,
    ) -> Result<Response<GetOperatorInfoResponse>, Status> {
        let info = self.authority.get_operator_info().await;
        Ok(Response::new(GetOperatorInfoResponse {
            initialized: info.initialized,
            operator_name: info.operator_name,
            operator_pub_key: info.operator_pub_key,
            system_account_pub_key: info.system_account_pub_key.unwrap_or_default(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn create_tenant_account(
        &self,
        request: Request<CreateTenantAccountRequest>,
    ) -> Result<Response<CreateTenantAccountResponse>, Status> {
        let req = request.into_inner();
        let outcome = self
            .authority
            .create_tenant_account(
                &req.tenant_slug,
                from_proto_limits(req.limits),
                from_proto_js_limits(req.jetstream_limits),
                from_proto_mappings(req.mappings),
            )
            .await?;

        Ok(Response::new(CreateTenantAccountResponse {
            account_pub_key: outcome.account_pub_key,
            account_seed: outcome.account_seed,
            account_jwt: outcome.account_jwt,
        }))
    }

    #[instrument(skip(self, request))]
    async fn generate_user_credentials(
        &self,
        request: Request<GenerateUserCredentialsRequest>,
    ) -> Result<Response<GenerateUserCredentialsResponse>, Status> {
        let req = request.into_inner();
        let cred_type = CredType::parse(&req.cred_type);
        let overrides = if req.publish_allow.is_empty()
            && req.publish_deny.is_empty()
            && req.subscribe_allow.is_empty()
            && req.subscribe_deny.is_empty()
            && !req.allow_responses
        {
            None
        } else {
            Some(PermissionOverride {
                publish_allow: req.publish_allow,
                publish_deny: req.publish_deny,
                subscribe_allow: req.subscribe_allow,
                subscribe_deny: req.subscribe_deny,
                allow_responses: req.allow_responses,
                max_responses: req.max_responses,
            })
        };

        let outcome = self
            .authority
            .generate_user_credentials(
                &req.tenant_slug,
                &req.account_seed,
                &req.user_name,
                cred_type,
                overrides,
                req.expiration_seconds,
            )
            .await?;

        Ok(Response::new(GenerateUserCredentialsResponse {
            user_pub_key: outcome.user_pub_key,
            credentials_file: outcome.credentials_file,
            expires_at_unix: outcome.expires_at_unix,
        }))
    }

    #[instrument(skip(self, request))]
    async fn sign_account_jwt(
        &self,
        request: Request<SignAccountJwtRequest>,
    ) -> Result<Response<SignAccountJwtResponse>, Status> {
        let req = request.into_inner();
        let outcome = self
            .authority
            .sign_account_jwt(
                &req.tenant_slug,
                &req.account_seed,
                from_proto_limits(req.limits),
                from_proto_js_limits(req.jetstream_limits),
                from_proto_mappings(req.mappings),
                req.revoked_user_keys,
            )
            .await?;

        Ok(Response::new(SignAccountJwtResponse {
            account_pub_key: outcome.account_pub_key,
            account_jwt: outcome.account_jwt,
        }))
    }

    #[instrument(skip(self, request))]
    async fn push_account_jwt(
        &self,
        request: Request<PushAccountJwtRequest>,
    ) -> Result<Response<PushAccountJwtResponse>, Status> {
        let req = request.into_inner();
        let outcome = self
            .resolver
            .push_account_jwt(&req.account_pub_key, &req.account_jwt)
            .await;

        Ok(Response::new(PushAccountJwtResponse {
            success: outcome.success,
            message: outcome.message,
        }))
    }
}
