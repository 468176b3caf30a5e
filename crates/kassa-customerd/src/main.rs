//! kassa-customerd — the Customer service daemon.
//!
//! Startup sequence:
//!   1. Open (or initialise) the customer database
//!   2. Open the customer-events topic log and start the publisher worker
//!   3. Build the HTTP router (auth + tracing middleware, CORS, deadline)
//!   4. Serve

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use kassa_auth::TokenAuthority;
use kassa_bus::{EventPublisher, PublisherConfig, TopicLog};
use kassa_core::event::CUSTOMER_EVENTS_TOPIC;
use kassa_customer::{CustomerService, CustomerStore};
use kassa_http::middleware::cors_layer;
use kassa_http::{customer_router, AuthState, CustomerApiState};

#[derive(Parser, Debug)]
#[command(name = "kassa-customerd", version, about = "Kassa customer service")]
struct Args {
    /// Directory for the persistent customer database.
    #[arg(long, env = "KASSA_CUSTOMER_DATA_DIR", default_value = "./data/customer")]
    data_dir: PathBuf,

    /// HTTP listen port.
    #[arg(long, env = "KASSA_CUSTOMER_PORT", default_value_t = 8081)]
    port: u16,

    /// Root directory of the event-bus topic logs.
    #[arg(long, env = "KASSA_BUS_DIR", default_value = "./data/bus")]
    bus_dir: PathBuf,

    /// Partition count applied when a topic is first created.
    #[arg(long, env = "KASSA_BUS_PARTITIONS", default_value_t = 6)]
    bus_partitions: u32,

    /// Shared secret for bearer tokens.
    #[arg(long, env = "KASSA_JWT_SECRET", default_value = "kassa-dev-secret")]
    jwt_secret: String,

    /// Token lifetime in hours.
    #[arg(long, env = "KASSA_JWT_EXPIRY_HOURS", default_value_t = 24)]
    jwt_expiry_hours: i64,

    /// Disable to run without authentication (local development only).
    #[arg(
        long,
        env = "KASSA_SECURITY_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    security_enabled: bool,

    /// Allowed CORS origins; `*` for any.
    #[arg(long = "cors-origin", env = "KASSA_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Server-side soft deadline per request, in seconds.
    #[arg(long, env = "KASSA_REQUEST_DEADLINE_SECS", default_value_t = 30)]
    request_deadline_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kassa=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("kassa customer service starting");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    std::fs::create_dir_all(&args.bus_dir)
        .with_context(|| format!("creating bus dir {}", args.bus_dir.display()))?;

    let store = Arc::new(CustomerStore::open(&args.data_dir).context("opening customer database")?);

    let log = TopicLog::open(&args.bus_dir, CUSTOMER_EVENTS_TOPIC, args.bus_partitions)
        .context("opening customer events topic")?;
    let publisher = EventPublisher::spawn(
        PublisherConfig {
            source: "customer-service".into(),
            ..PublisherConfig::default()
        },
        vec![log],
    );

    let service = Arc::new(CustomerService::new(store, publisher));
    let auth = AuthState {
        authority: Arc::new(TokenAuthority::new(&args.jwt_secret, args.jwt_expiry_hours)),
        enabled: args.security_enabled,
    };

    let router = customer_router(
        CustomerApiState { service, auth },
        cors_layer(&args.cors_origins),
        Duration::from_secs(args.request_deadline_secs),
    );

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "customer service ready");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}
