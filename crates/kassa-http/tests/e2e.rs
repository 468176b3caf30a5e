//! End-to-end tests for the two services.
//!
//! Each test boots both HTTP routers in-process on loopback ports, shares a
//! bus directory between them, and drives the Account service's
//! customer-events consumer by hand so cascades are deterministic.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use kassa_account::{
    AccountLifecycle, AccountStore, CustomerEventHandler, MovementEngine, StatementEngine,
};
use kassa_auth::TokenAuthority;
use kassa_bus::{ConsumerConfig, EventConsumer, EventPublisher, PublisherConfig, TopicLog};
use kassa_client::{ClientConfig, CustomerClient};
use kassa_core::event::{ACCOUNT_EVENTS_TOPIC, CUSTOMER_EVENTS_TOPIC, MOVEMENT_EVENTS_TOPIC};
use kassa_customer::{CustomerService, CustomerStore};
use kassa_http::middleware::cors_layer;
use kassa_http::{account_router, customer_router, AccountApiState, AuthState, CustomerApiState};

const SECRET: &str = "kassa-e2e-secret";

struct Stack {
    customer_base: String,
    account_base: String,
    customer_publisher: EventPublisher,
    account_publisher: EventPublisher,
    account_store: Arc<AccountStore>,
    consumer: EventConsumer<Arc<AccountStore>>,
    handler: Arc<CustomerEventHandler>,
    account_log: TopicLog,
    http: reqwest::Client,
    token: String,
    _bus_dir: tempfile::TempDir,
}

impl Stack {
    /// Drain the customer-service publisher and run one consumer poll, so
    /// every published customer event has been handled when this returns.
    async fn settle_events(&self) {
        self.customer_publisher.drain().await;
        let handler = Arc::clone(&self.handler);
        self.consumer
            .poll_once(&move |event| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(event).await }
            })
            .await
            .expect("consumer poll");
    }

    fn mutating_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("x-request-id", Uuid::new_v4().to_string()),
            ("x-correlation-id", Uuid::new_v4().to_string()),
        ]
    }

    async fn post(&self, url: &str, body: Value, with_auth: bool) -> reqwest::Response {
        let mut req = self.http.post(url).json(&body);
        for (name, value) in self.mutating_headers() {
            req = req.header(name, value);
        }
        if with_auth {
            req = req.bearer_auth(&self.token);
        }
        req.send().await.expect("http post")
    }

    async fn get(&self, url: &str) -> reqwest::Response {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("http get")
    }

    async fn delete(&self, url: &str) -> reqwest::Response {
        let mut req = self.http.delete(url).bearer_auth(&self.token);
        for (name, value) in self.mutating_headers() {
            req = req.header(name, value);
        }
        req.send().await.expect("http delete")
    }

    /// POST /customers is public and returns the created customer.
    async fn create_customer(&self, name: &str, identification: &str) -> Value {
        let response = self
            .post(
                &format!("{}/api/v1/customers", self.customer_base),
                json!({
                    "name": name,
                    "identification": identification,
                    "address": "Amazonas y NNUU",
                    "phone": "098254785",
                    "password": "1234",
                }),
                false,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("customer body")
    }

    async fn create_account(&self, customer_id: &str, account_type: &str, initial: &str) -> Value {
        let response = self
            .post(
                &format!("{}/api/v1/accounts", self.account_base),
                json!({
                    "customerId": customer_id,
                    "accountType": account_type,
                    "initialBalance": initial,
                }),
                true,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "create account");
        response.json().await.expect("account body")
    }
}

async fn start_stack() -> Stack {
    let bus_dir = tempfile::tempdir().expect("bus dir");
    let authority = Arc::new(TokenAuthority::new(SECRET, 1));

    // ── Customer service ─────────────────────────────────────────────────────
    let customer_log =
        TopicLog::open(bus_dir.path(), CUSTOMER_EVENTS_TOPIC, 3).expect("customer topic");
    let customer_publisher = EventPublisher::spawn(
        PublisherConfig {
            source: "customer-service".into(),
            ..PublisherConfig::default()
        },
        vec![customer_log.clone()],
    );
    let customer_service = Arc::new(CustomerService::new(
        Arc::new(CustomerStore::temporary().expect("customer store")),
        customer_publisher.clone(),
    ));
    let customer_app = customer_router(
        CustomerApiState {
            service: customer_service,
            auth: AuthState {
                authority: Arc::clone(&authority),
                enabled: true,
            },
        },
        cors_layer(&["*".to_string()]),
        Duration::from_secs(30),
    );
    let customer_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind customer");
    let customer_base = format!("http://{}", customer_listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(customer_listener, customer_app).await.unwrap();
    });

    // ── Account service ──────────────────────────────────────────────────────
    let account_log =
        TopicLog::open(bus_dir.path(), ACCOUNT_EVENTS_TOPIC, 3).expect("account topic");
    let movement_log =
        TopicLog::open(bus_dir.path(), MOVEMENT_EVENTS_TOPIC, 3).expect("movement topic");
    let account_publisher = EventPublisher::spawn(
        PublisherConfig {
            source: "account-service".into(),
            ..PublisherConfig::default()
        },
        vec![account_log.clone(), movement_log],
    );
    let account_store = Arc::new(AccountStore::temporary().expect("account store"));
    let customers = Arc::new(
        CustomerClient::new(ClientConfig {
            base_url: customer_base.clone(),
            retry_wait: Duration::from_millis(20),
            ..ClientConfig::default()
        })
        .expect("customer client"),
    );
    let lifecycle = Arc::new(AccountLifecycle::new(
        Arc::clone(&account_store),
        account_publisher.clone(),
        customers.clone(),
    ));
    let movements = Arc::new(MovementEngine::new(
        Arc::clone(&account_store),
        account_publisher.clone(),
    ));
    let statements = Arc::new(StatementEngine::new(Arc::clone(&account_store), customers));
    let account_app = account_router(
        AccountApiState {
            lifecycle: Arc::clone(&lifecycle),
            movements,
            statements,
            auth: AuthState {
                authority: Arc::clone(&authority),
                enabled: true,
            },
        },
        cors_layer(&["*".to_string()]),
        Duration::from_secs(30),
    );
    let account_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind account");
    let account_base = format!("http://{}", account_listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(account_listener, account_app).await.unwrap();
    });

    let consumer = EventConsumer::new(
        customer_log,
        Arc::clone(&account_store),
        ConsumerConfig {
            group: "account-service".into(),
            ..ConsumerConfig::default()
        },
    );
    let handler = Arc::new(CustomerEventHandler::new(lifecycle));

    let token = authority
        .issue(&kassa_core::types::CustomerId::new(), "e2e-subject")
        .expect("token");

    Stack {
        customer_base,
        account_base,
        customer_publisher,
        account_publisher,
        account_store,
        consumer,
        handler,
        account_log,
        http: reqwest::Client::new(),
        token,
        _bus_dir: bus_dir,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_deposit_updates_balance_and_ledger() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Jose Lema", "1710034065").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let account = stack.create_account(customer_id, "SAVINGS", "1400.00").await;
    let number = account["accountNumber"].as_u64().unwrap();

    let response = stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": number,
                "movementType": "CREDIT",
                "amount": "600.00",
                "transactionId": "TXN-A",
            }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("location"));
    let movement: Value = response.json().await.unwrap();
    assert_eq!(movement["balanceBefore"], "1400.00");
    assert_eq!(movement["balanceAfter"], "2000.00");

    let balance: Value = stack
        .get(&format!(
            "{}/api/v1/accounts/{number}/balance",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(balance["currentBalance"], "2000.00");
}

#[tokio::test]
async fn overdraft_refused_with_details_and_store_unchanged() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Marianela Montalvo", "1750013108").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let account = stack.create_account(customer_id, "CHECKING", "540.00").await;
    let number = account["accountNumber"].as_u64().unwrap();

    let response = stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": number,
                "movementType": "DEBIT",
                "amount": "10540.01",
                "transactionId": "TXN-OVER",
            }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "INSUFFICIENT_BALANCE");
    assert!(body["message"].as_str().unwrap().contains("540.00"));
    assert!(body["message"].as_str().unwrap().contains("10540.01"));
    assert!(body["message"].as_str().unwrap().contains("-10000"));
    assert!(body["traceId"].is_string());
    assert_eq!(body["path"], "/api/v1/movements");

    let balance: Value = stack
        .get(&format!(
            "{}/api/v1/accounts/{number}/balance",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(balance["currentBalance"], "540.00");
}

#[tokio::test]
async fn idempotent_retry_conflicts_with_original_movement() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Juan Osorio", "098254785").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let account = stack.create_account(customer_id, "SAVINGS", "100.00").await;
    let number = account["accountNumber"].as_u64().unwrap();

    let key = Uuid::new_v4().to_string();
    let body = json!({
        "accountNumber": number,
        "movementType": "CREDIT",
        "amount": "25.00",
        "transactionId": "TXN-K1",
    });

    let first = stack
        .http
        .post(format!("{}/api/v1/movements", stack.account_base))
        .json(&body)
        .bearer_auth(&stack.token)
        .header("x-request-id", Uuid::new_v4().to_string())
        .header("x-correlation-id", Uuid::new_v4().to_string())
        .header("Idempotency-Key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body: Value = first.json().await.unwrap();

    // Retry the identical body: the idempotency key reconciles against the
    // original movement even though the transaction id also clashes.
    let retry = stack
        .http
        .post(format!("{}/api/v1/movements", stack.account_base))
        .json(&body)
        .bearer_auth(&stack.token)
        .header("x-request-id", Uuid::new_v4().to_string())
        .header("x-correlation-id", Uuid::new_v4().to_string())
        .header("Idempotency-Key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::CONFLICT);
    let conflict: Value = retry.json().await.unwrap();
    assert_eq!(conflict["error"], "DUPLICATE_IDEMPOTENCY_KEY");
    assert!(conflict["message"]
        .as_str()
        .unwrap()
        .contains(first_body["movementId"].as_str().unwrap()));

    // Exactly one ledger row.
    let list: Value = stack
        .get(&format!(
            "{}/api/v1/movements?accountNumber={number}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn reversal_endpoint_round_trips_and_rejects_a_second_pass() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Reversa", "225487").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let account = stack.create_account(customer_id, "SAVINGS", "100.00").await;
    let number = account["accountNumber"].as_u64().unwrap();

    let movement: Value = stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": number,
                "movementType": "CREDIT",
                "amount": "100.00",
                "transactionId": "TXN-B",
            }),
            true,
        )
        .await
        .json()
        .await
        .unwrap();
    let movement_id = movement["movementId"].as_str().unwrap();
    assert_eq!(movement["balanceAfter"], "200.00");

    let reversal = stack
        .post(
            &format!(
                "{}/api/v1/movements/{movement_id}/reverse",
                stack.account_base
            ),
            json!({}),
            true,
        )
        .await;
    assert_eq!(reversal.status(), StatusCode::CREATED);
    let reversal: Value = reversal.json().await.unwrap();
    assert_eq!(reversal["movementType"], "REVERSAL");
    assert_eq!(reversal["amount"], "100.00");
    assert_eq!(reversal["balanceAfter"], "100.00");

    // The original is now flagged.
    let original: Value = stack
        .get(&format!(
            "{}/api/v1/movements/{movement_id}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(original["reversed"], true);

    let second = stack
        .post(
            &format!(
                "{}/api/v1/movements/{movement_id}/reverse",
                stack.account_base
            ),
            json!({}),
            true,
        )
        .await;
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_REVERSAL");
}

#[tokio::test]
async fn customer_created_event_provisions_default_savings_once() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Evento Nuevo", "1102334455").await;
    let customer_id = customer["customerId"].as_str().unwrap();

    stack.settle_events().await;
    // Redelivery of the same batch must not create a second account.
    stack.settle_events().await;

    let accounts: Value = stack
        .get(&format!(
            "{}/api/v1/accounts?customerId={customer_id}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(accounts["total"], 1);
    assert_eq!(accounts["items"][0]["accountType"], "SAVINGS");
    assert_eq!(accounts["items"][0]["currentBalance"], "0");
    assert_eq!(accounts["items"][0]["active"], true);

    // An account.created event went out for it.
    stack.account_publisher.drain().await;
    let account_number = accounts["items"][0]["accountNumber"].as_u64().unwrap();
    let partition = stack.account_log.partition_for(&account_number.to_string());
    let records = stack.account_log.read_from(partition, 0, 100).unwrap();
    assert!(records
        .iter()
        .any(|(_, r)| r.headers.event_type == "account.created"));
}

#[tokio::test]
async fn customer_deleted_event_cascades_accounts_and_movements() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Corta Vida", "0400112233").await;
    let customer_id = customer["customerId"].as_str().unwrap();

    // Default savings via the event path plus a funded checking account.
    stack.settle_events().await;
    let checking = stack.create_account(customer_id, "CHECKING", "75.00").await;
    let checking_number = checking["accountNumber"].as_u64().unwrap();
    stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": checking_number,
                "movementType": "CREDIT",
                "amount": "10.00",
                "transactionId": "TXN-CASCADE",
            }),
            true,
        )
        .await;

    let deleted = stack
        .delete(&format!(
            "{}/api/v1/customers/{customer_id}",
            stack.customer_base
        ))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    stack.settle_events().await;
    // Redelivery is silent.
    stack.settle_events().await;

    let accounts: Value = stack
        .get(&format!(
            "{}/api/v1/accounts?customerId={customer_id}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(accounts["total"], 0);

    let parsed: kassa_core::types::CustomerId = customer_id.parse().unwrap();
    assert!(stack
        .account_store
        .accounts_for_customer(parsed)
        .unwrap()
        .is_empty());

    // Two account.deleted events, keyed by account number.
    stack.account_publisher.drain().await;
    let mut deleted_events = 0;
    for partition in 0..stack.account_log.partitions() {
        deleted_events += stack
            .account_log
            .read_from(partition, 0, 100)
            .unwrap()
            .iter()
            .filter(|(_, r)| r.headers.event_type == "account.deleted")
            .count();
    }
    assert_eq!(deleted_events, 2);
}

// ── Edge behaviors ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mutating_requests_require_tracing_headers() {
    let stack = start_stack().await;
    let response = stack
        .http
        .post(format!("{}/api/v1/customers", stack.customer_base))
        .json(&json!({
            "name": "No Headers",
            "identification": "123",
            "password": "pw",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("x-request-id"));
}

#[tokio::test]
async fn protected_paths_reject_missing_and_bad_tokens() {
    let stack = start_stack().await;

    let no_token = stack
        .http
        .get(format!("{}/api/v1/accounts?page=0", stack.account_base))
        .send()
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);
    let body: Value = no_token.json().await.unwrap();
    assert_eq!(body["status"], 401);

    let bad_token = stack
        .http
        .get(format!("{}/api/v1/accounts?page=0", stack.account_base))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_token.status(), StatusCode::UNAUTHORIZED);

    // Health stays public.
    let health = stack
        .http
        .get(format!("{}/health", stack.account_base))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn validation_failures_list_field_errors() {
    let stack = start_stack().await;
    let response = stack
        .post(
            &format!("{}/api/v1/customers", stack.customer_base),
            json!({
                "name": "  ",
                "identification": "",
                "password": "",
            }),
            false,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "identification", "password"]);
}

#[tokio::test]
async fn statement_report_aggregates_across_accounts() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Reporte Total", "1309876543").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let savings = stack.create_account(customer_id, "SAVINGS", "1000.00").await;
    let number = savings["accountNumber"].as_u64().unwrap();

    stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": number,
                "movementType": "CREDIT",
                "amount": "600.00",
                "transactionId": "TXN-R1",
            }),
            true,
        )
        .await;
    stack
        .post(
            &format!("{}/api/v1/movements", stack.account_base),
            json!({
                "accountNumber": number,
                "movementType": "DEBIT",
                "amount": "100.00",
                "transactionId": "TXN-R2",
            }),
            true,
        )
        .await;

    let today = chrono::Utc::now().date_naive();
    let statement: Value = stack
        .get(&format!(
            "{}/api/v1/reports/account-statement/{customer_id}?startDate={today}&endDate={today}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(statement["totals"]["totalCredits"], "600.00");
    assert_eq!(statement["totals"]["totalDebits"], "100.00");
    assert_eq!(statement["totals"]["totalMovements"], 2);
    let account_statement = &statement["accounts"][0];
    assert_eq!(account_statement["initialBalanceForPeriod"], "1000.00");
    assert_eq!(account_statement["finalBalanceForPeriod"], "1500.00");

    let summary: Value = stack
        .get(&format!(
            "{}/api/v1/reports/movements-summary?accountNumber={number}",
            stack.account_base
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(summary["totalMovements"], 2);
    assert_eq!(summary["totalCredits"], "600.00");
    assert_eq!(summary["totalDebits"], "100.00");

    // The summary endpoint refuses an unfiltered query.
    let unfiltered = stack
        .get(&format!(
            "{}/api/v1/reports/movements-summary",
            stack.account_base
        ))
        .await;
    assert_eq!(unfiltered.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn account_create_rejects_unknown_and_inactive_customers() {
    let stack = start_stack().await;

    // Unknown customer: the peer call comes back 404.
    let unknown = stack
        .post(
            &format!("{}/api/v1/accounts", stack.account_base),
            json!({
                "customerId": Uuid::new_v4().to_string(),
                "accountType": "SAVINGS",
                "initialBalance": "0",
            }),
            true,
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["error"], "CUSTOMER_NOT_FOUND");

    // Inactive customer: the validate endpoint answers 400.
    let customer = stack.create_customer("Dormida", "0911223344").await;
    let customer_id = customer["customerId"].as_str().unwrap();
    let deactivate = stack
        .http
        .patch(format!(
            "{}/api/v1/customers/{customer_id}/state",
            stack.customer_base
        ))
        .json(&json!({ "active": false }))
        .bearer_auth(&stack.token)
        .header("x-request-id", Uuid::new_v4().to_string())
        .header("x-correlation-id", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(deactivate.status(), StatusCode::OK);

    let inactive = stack
        .post(
            &format!("{}/api/v1/accounts", stack.account_base),
            json!({
                "customerId": customer_id,
                "accountType": "SAVINGS",
                "initialBalance": "0",
            }),
            true,
        )
        .await;
    assert_eq!(inactive.status(), StatusCode::BAD_REQUEST);
    let body: Value = inactive.json().await.unwrap();
    assert_eq!(body["error"], "CUSTOMER_NOT_ACTIVE");
}

#[tokio::test]
async fn movement_listing_answers_400_for_unusable_filters() {
    let stack = start_stack().await;

    // No filter at all.
    let unfiltered = stack
        .get(&format!("{}/api/v1/movements", stack.account_base))
        .await;
    assert_eq!(unfiltered.status(), StatusCode::BAD_REQUEST);

    // A filter naming an account that does not exist.
    let unknown = stack
        .get(&format!(
            "{}/api/v1/movements?accountNumber=999999",
            stack.account_base
        ))
        .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("999999"));
}

#[tokio::test]
async fn version_conflicts_surface_as_409() {
    let stack = start_stack().await;
    let customer = stack.create_customer("Versionada", "1234509876").await;
    let customer_id = customer["customerId"].as_str().unwrap();

    let stale = stack
        .http
        .put(format!(
            "{}/api/v1/customers/{customer_id}",
            stack.customer_base
        ))
        .json(&json!({ "address": "Nueva Calle", "version": 42 }))
        .bearer_auth(&stack.token)
        .header("x-request-id", Uuid::new_v4().to_string())
        .header("x-correlation-id", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::CONFLICT);
    let body: Value = stale.json().await.unwrap();
    assert_eq!(body["error"], "VERSION_CONFLICT");
}
