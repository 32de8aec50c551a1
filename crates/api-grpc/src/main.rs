use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alinea_core::config::{database_path_from_env_value, default_user_id_from_env_value};
use alinea_core::constants::DASHBOARD_REQUEST_PURPOSE;
use alinea_core::{CoreConfig, CoreServices, NonEmptyText};
use api_grpc::{pb::alinea_server::AlineaServer, AlineaService, ApiKeyInterceptor};
use api_shared::FILE_DESCRIPTOR_SET;

/// Standalone gRPC server for Alinea.
///
/// # Environment Variables
/// - `ALINEA_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `ALINEA_DB_PATH`: SQLite database file (default: "alinea.db")
/// - `ALINEA_DEFAULT_USER_ID`: user targeted by dashboard commands that omit one (default: 1)
/// - `API_KEY`: required value of the `x-api-key` header
/// - `ALINEA_ENABLE_REFLECTION`: "true" to serve gRPC reflection
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_grpc=info".parse()?)
                .add_directive("alinea_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("ALINEA_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let api_key = std::env::var("API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("API_KEY is not set; every call will be rejected");
    }

    let cfg = Arc::new(CoreConfig::new(
        database_path_from_env_value(std::env::var("ALINEA_DB_PATH").ok()),
        default_user_id_from_env_value(std::env::var("ALINEA_DEFAULT_USER_ID").ok())?,
        NonEmptyText::new(DASHBOARD_REQUEST_PURPOSE)?,
    )?);
    let core = CoreServices::open(cfg)?;

    tracing::info!("-- Starting Alinea gRPC on {}", addr);

    let mut server_builder = Server::builder().add_service(AlineaServer::with_interceptor(
        AlineaService::new(core),
        ApiKeyInterceptor::new(api_key),
    ));

    if std::env::var("ALINEA_ENABLE_REFLECTION").unwrap_or_else(|_| "false".to_string()) == "true"
    {
        let reflection_service = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        server_builder = server_builder.add_service(reflection_service);
        tracing::info!("gRPC server reflection enabled");
    } else {
        tracing::info!("gRPC server reflection disabled");
    }

    server_builder.serve(addr).await?;

    Ok(())
}
