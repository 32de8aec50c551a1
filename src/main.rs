use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alinea_core::config::{database_path_from_env_value, default_user_id_from_env_value};
use alinea_core::constants::DASHBOARD_REQUEST_PURPOSE;
use alinea_core::{CoreConfig, CoreServices, NonEmptyText};
use api_grpc::{AlineaService, ApiKeyInterceptor, pb::alinea_server::AlineaServer};
use api_rest::{AppState, router};
use api_shared::FILE_DESCRIPTOR_SET;

/// Main entry point for the Alinea application
///
/// Starts both gRPC and REST servers concurrently against one shared set of services, so a
/// status change made over gRPC reaches dashboards connected over the REST server's sockets.
///
/// # Environment Variables
/// - `ALINEA_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `ALINEA_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `ALINEA_DB_PATH`: SQLite database file (default: "alinea.db")
/// - `ALINEA_DEFAULT_USER_ID`: user targeted by requests that omit one (default: 1)
/// - `ALINEA_SEED_DEFAULTS`: "true" to create the default clinic and user at startup
/// - `ALINEA_ENABLE_REFLECTION`: "true" to serve gRPC reflection
/// - `API_KEY`: API key for gRPC authentication
///
/// # Returns
/// * `Ok(())` - If servers start and run successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alinea_run=info".parse()?)
                .add_directive("alinea_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("api_grpc=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let grpc_addr: SocketAddr = std::env::var("ALINEA_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let rest_addr = std::env::var("ALINEA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("API_KEY is not set; every gRPC call will be rejected");
    }

    let cfg = Arc::new(CoreConfig::new(
        database_path_from_env_value(std::env::var("ALINEA_DB_PATH").ok()),
        default_user_id_from_env_value(std::env::var("ALINEA_DEFAULT_USER_ID").ok())?,
        NonEmptyText::new(DASHBOARD_REQUEST_PURPOSE)?,
    )?);
    let core = CoreServices::open(cfg)?;

    if std::env::var("ALINEA_SEED_DEFAULTS").is_ok_and(|v| v == "true") {
        let (entity, user) = core.directory.seed_defaults()?;
        tracing::info!("++ Seeded entity {} and user {}", entity.id, user.id);
    }

    tracing::info!("++ Starting Alinea gRPC on {}", grpc_addr);
    tracing::info!("++ Starting Alinea REST on {}", rest_addr);

    let rest_app = router(AppState::new(core.clone()));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = tokio::spawn(async move { axum::serve(listener, rest_app).await });

    let mut grpc_builder = Server::builder().add_service(AlineaServer::with_interceptor(
        AlineaService::new(core),
        ApiKeyInterceptor::new(api_key),
    ));
    if std::env::var("ALINEA_ENABLE_REFLECTION").is_ok_and(|v| v == "true") {
        let reflection_service = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        grpc_builder = grpc_builder.add_service(reflection_service);
    }
    let grpc_server = grpc_builder.serve(grpc_addr);

    // Run both
    let (rest_result, grpc_result) = tokio::join!(rest_server, grpc_server);
    rest_result??;
    grpc_result?;

    Ok(())
}
