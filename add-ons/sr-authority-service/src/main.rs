//! Account Authority binary: bootstraps/serves the NATS Account Authority over mTLS gRPC,
//! enforcing the peer allowlist on every RPC (spec §4.4–§4.6, §13).

mod config_writer;

use config_writer::FileConfigWriter;
use sr_account_authority::proto::account_authority_server::AccountAuthorityServer;
use sr_account_authority::{AccountAuthority, AccountAuthorityService, PeerAuthorizer, ResolverClient, ResolverConfig};
use sr_dataplane::mtls;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tonic::transport::{Server, ServerTlsConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn allowed_identities() -> Vec<String> {
    std::env::var("AUTHORITY_ALLOWED_IDENTITIES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[sr-authority-service] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let listen_addr: SocketAddr = std::env::var("AUTHORITY_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50053".to_string())
        .parse()?;

    let resolver_dir = std::env::var("AUTHORITY_RESOLVER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/serviceradar/resolver"));
    let config_writer = Arc::new(FileConfigWriter::new(resolver_dir));

    let authority = AccountAuthority::new(config_writer);
    let resolver = ResolverClient::new(ResolverConfig::from_env());
    let service = AccountAuthorityService::new(authority, resolver);

    let interceptor = PeerAuthorizer::new(allowed_identities());
    let server = AccountAuthorityServer::with_interceptor(service, interceptor);

    let mut builder = Server::builder();

    let server_cert = env_path("AUTHORITY_SERVER_CERT");
    let server_key = env_path("AUTHORITY_SERVER_KEY");
    let client_ca = env_path("AUTHORITY_CLIENT_CA");

    match (server_cert, server_key, client_ca) {
        (Some(cert), Some(key), Some(ca)) => {
            let identity = mtls::load_identity(&cert, &key)?;
            let ca_cert = mtls::load_ca_certificate(&ca)?;
            builder = builder.tls_config(
                ServerTlsConfig::new().identity(identity).client_ca_root(ca_cert),
            )?;
            tracing::info!(addr = %listen_addr, "Account Authority listening (mTLS)");
        }
        _ => {
            return Err(
                "AUTHORITY_SERVER_CERT/AUTHORITY_SERVER_KEY/AUTHORITY_CLIENT_CA must all be set: \
                 the peer authorizer requires client certificates to identify callers"
                    .into(),
            );
        }
    }

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("CTRL-C received; shutting down Account Authority");
    };

    builder
        .add_service(server)
        .serve_with_shutdown(listen_addr, shutdown)
        .await?;

    Ok(())
}
