//! kassa-accountd — the Account service daemon.
//!
//! Startup sequence:
//!   1. Open (or initialise) the account database
//!   2. Open the account/movement topic logs and start the publisher worker
//!   3. Start the customer-events consumer (group offsets live in the store)
//!   4. Build the HTTP router and serve

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use kassa_account::{
    AccountLifecycle, AccountStore, CustomerEventHandler, MovementEngine, StatementEngine,
};
use kassa_auth::TokenAuthority;
use kassa_bus::{ConsumerConfig, EventConsumer, EventPublisher, PublisherConfig, TopicLog};
use kassa_client::{ClientConfig, CustomerClient};
use kassa_core::event::{ACCOUNT_EVENTS_TOPIC, CUSTOMER_EVENTS_TOPIC, MOVEMENT_EVENTS_TOPIC};
use kassa_http::middleware::cors_layer;
use kassa_http::{account_router, AccountApiState, AuthState};

#[derive(Parser, Debug)]
#[command(name = "kassa-accountd", version, about = "Kassa account service")]
struct Args {
    /// Directory for the persistent account database.
    #[arg(long, env = "KASSA_ACCOUNT_DATA_DIR", default_value = "./data/account")]
    data_dir: PathBuf,

    /// HTTP listen port.
    #[arg(long, env = "KASSA_ACCOUNT_PORT", default_value_t = 8082)]
    port: u16,

    /// Root directory of the event-bus topic logs.
    #[arg(long, env = "KASSA_BUS_DIR", default_value = "./data/bus")]
    bus_dir: PathBuf,

    /// Partition count applied when a topic is first created.
    #[arg(long, env = "KASSA_BUS_PARTITIONS", default_value_t = 6)]
    bus_partitions: u32,

    /// Consumer group for the customer-events subscription.
    #[arg(long, env = "KASSA_CONSUMER_GROUP", default_value = "account-service")]
    consumer_group: String,

    /// Customer service base URL for validation calls.
    #[arg(long, env = "KASSA_CUSTOMER_BASE_URL", default_value = "http://localhost:8081")]
    customer_base_url: String,

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

    // ── Peer-client resilience knobs ─────────────────────────────────────────
    /// Attempts per peer call, counting the first.
    #[arg(long, env = "KASSA_RETRY_MAX_ATTEMPTS", default_value_t = 2)]
    retry_max_attempts: u32,

    /// Wait between peer-call attempts, in milliseconds.
    #[arg(long, env = "KASSA_RETRY_WAIT_MS", default_value_t = 500)]
    retry_wait_ms: u64,

    /// Breaker sliding-window size.
    #[arg(long, env = "KASSA_BREAKER_WINDOW", default_value_t = 20)]
    breaker_window: usize,

    /// Minimum calls before the breaker evaluates the failure rate.
    #[arg(long, env = "KASSA_BREAKER_MIN_CALLS", default_value_t = 5)]
    breaker_min_calls: usize,

    /// Failure fraction that opens the breaker (0.0–1.0).
    #[arg(long, env = "KASSA_BREAKER_FAILURE_RATE", default_value_t = 0.5)]
    breaker_failure_rate: f64,

    /// Open-state wait before half-open probing, in seconds.
    #[arg(long, env = "KASSA_BREAKER_OPEN_WAIT_SECS", default_value_t = 20)]
    breaker_open_wait_secs: u64,

    /// Probe calls admitted while half-open.
    #[arg(long, env = "KASSA_BREAKER_HALF_OPEN_PROBES", default_value_t = 3)]
    breaker_half_open_probes: u32,

    /// Absolute deadline around one peer call, in seconds.
    #[arg(long, env = "KASSA_PEER_DEADLINE_SECS", default_value_t = 5)]
    peer_deadline_secs: u64,
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
    info!("kassa account service starting");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    std::fs::create_dir_all(&args.bus_dir)
        .with_context(|| format!("creating bus dir {}", args.bus_dir.display()))?;

    let store = Arc::new(AccountStore::open(&args.data_dir).context("opening account database")?);

    // ── Event fabric ──────────────────────────────────────────────────────────
    let account_log = TopicLog::open(&args.bus_dir, ACCOUNT_EVENTS_TOPIC, args.bus_partitions)
        .context("opening account events topic")?;
    let movement_log = TopicLog::open(&args.bus_dir, MOVEMENT_EVENTS_TOPIC, args.bus_partitions)
        .context("opening movement events topic")?;
    let publisher = EventPublisher::spawn(
        PublisherConfig {
            source: "account-service".into(),
            ..PublisherConfig::default()
        },
        vec![account_log, movement_log],
    );

    // ── Resilient peer client ─────────────────────────────────────────────────
    let customers = Arc::new(
        CustomerClient::new(ClientConfig {
            base_url: args.customer_base_url.clone(),
            max_attempts: args.retry_max_attempts,
            retry_wait: Duration::from_millis(args.retry_wait_ms),
            window: args.breaker_window,
            min_calls: args.breaker_min_calls,
            failure_rate: args.breaker_failure_rate,
            open_wait: Duration::from_secs(args.breaker_open_wait_secs),
            half_open_probes: args.breaker_half_open_probes,
            deadline: Duration::from_secs(args.peer_deadline_secs),
        })
        .context("building customer client")?,
    );

    // ── Domain services ───────────────────────────────────────────────────────
    let lifecycle = Arc::new(AccountLifecycle::new(
        Arc::clone(&store),
        publisher.clone(),
        customers.clone(),
    ));
    let movements = Arc::new(MovementEngine::new(Arc::clone(&store), publisher.clone()));
    let statements = Arc::new(StatementEngine::new(Arc::clone(&store), customers.clone()));

    // ── Customer-events consumer ──────────────────────────────────────────────
    let customer_log = TopicLog::open(&args.bus_dir, CUSTOMER_EVENTS_TOPIC, args.bus_partitions)
        .context("opening customer events topic")?;
    let consumer = EventConsumer::new(
        customer_log,
        Arc::clone(&store),
        ConsumerConfig {
            group: args.consumer_group.clone(),
            ..ConsumerConfig::default()
        },
    );
    let handler = Arc::new(CustomerEventHandler::new(Arc::clone(&lifecycle)));
    tokio::spawn(async move {
        consumer
            .run(move |event| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(event).await }
            })
            .await;
    });

    // ── HTTP ──────────────────────────────────────────────────────────────────
    let auth = AuthState {
        authority: Arc::new(TokenAuthority::new(&args.jwt_secret, args.jwt_expiry_hours)),
        enabled: args.security_enabled,
    };
    let router = account_router(
        AccountApiState {
            lifecycle,
            movements,
            statements,
            auth,
        },
        cors_layer(&args.cors_origins),
        Duration::from_secs(args.request_deadline_secs),
    );

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "account service ready");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}
