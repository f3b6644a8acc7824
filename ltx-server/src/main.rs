use anyhow::Result;
use clap::Parser;
use ltx_core::DeviceMap;
use ltx_server::config::ServiceConfig;
use ltx_server::handlers::router;
use ltx_server::startup::initialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "LTX text-to-video generation server")]
struct Args {
    /// Use CPU instead of GPU
    #[arg(long)]
    cpu: bool,

    /// Override the model configured via HF_MODEL_ID
    #[arg(long)]
    model: Option<String>,

    /// Host address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the server to
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "ltx_server=info,ltx_core=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(model) = args.model {
        config.model_id = model;
    }
    tracing::info!(
        model = %config.model_id,
        bucket = ?config.default_bucket,
        efficient_attention = config.efficient_attention,
        "starting ltx-serve"
    );

    let state = initialize(config, DeviceMap::from_cpu_flag(args.cpu)).await?;
    let app = router(Arc::new(state));

    let bind_address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
