//! Data Service binary: serves the Data RPC Facade over mTLS gRPC (spec §4.3, §13).

use sr_dataplane::proto::data_service_server::DataServiceServer;
use sr_dataplane::{DataRpcFacade, KvEngine, NatsLink, NatsLinkConfig, ObjectEngine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tonic::transport::{Server, ServerTlsConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[sr-data-service] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nats_config = NatsLinkConfig::from_env();
    let listen_addr: SocketAddr = std::env::var("DATASVC_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50052".to_string())
        .parse()?;

    let link = Arc::new(NatsLink::new(nats_config.clone()));
    let kv = KvEngine::new(Arc::clone(&link));
    let objects = ObjectEngine::new(Arc::clone(&link));
    let facade = DataRpcFacade::new(kv, objects, nats_config.bucket.clone(), nats_config.object_bucket.clone());

    let mut builder = Server::builder();

    let server_cert = env_path("DATASVC_SERVER_CERT");
    let server_key = env_path("DATASVC_SERVER_KEY");
    let client_ca = env_path("DATASVC_CLIENT_CA");

    match (server_cert, server_key, client_ca) {
        (Some(cert), Some(key), Some(ca)) => {
            let identity = sr_dataplane::mtls::load_identity(&cert, &key)?;
            let ca_cert = sr_dataplane::mtls::load_ca_certificate(&ca)?;
            builder = builder.tls_config(
                ServerTlsConfig::new().identity(identity).client_ca_root(ca_cert),
            )?;
            tracing::info!(addr = %listen_addr, "Data Service listening (mTLS)");
        }
        _ => {
            tracing::warn!(
                "DATASVC_SERVER_CERT/DATASVC_SERVER_KEY/DATASVC_CLIENT_CA not fully set; serving without mTLS"
            );
            tracing::info!(addr = %listen_addr, "Data Service listening (plaintext)");
        }
    }

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("CTRL-C received; shutting down Data Service");
    };

    builder
        .add_service(DataServiceServer::new(facade))
        .serve_with_shutdown(listen_addr, shutdown)
        .await?;

    link.close().await;
    Ok(())
}
