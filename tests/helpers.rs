use classbank_backend::config::AppConfig;
use classbank_backend::http::build_router;
use classbank_backend::models::*;
use classbank_backend::store::MemoryStore;
use classbank_backend::websocket::WebSocketServer;
use classbank_backend::AppState;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Test application wired over a fresh in-memory store
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: Arc<AppState>,
}

impl TestApp {
    /// Create a new test application with default configuration
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create a test application with a specific configuration
    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store.clone(), config));
        Self { store, state }
    }

    /// Clean up all test data
    pub async fn cleanup(&self) {
        self.store.clear().await;
    }
}

/// Test data fixtures: one teacher's class with two students
pub struct TestFixtures {
    pub student1: StudentProfile,
    pub student2: StudentProfile,
}

impl TestFixtures {
    /// Create test fixtures with sample data
    pub async fn create(app: &TestApp) -> Self {
        let student1 = create_test_profile(app, "amy", "Ms. Rivera", 3).await;
        let student2 = create_test_profile(app, "ben", "Ms. Rivera", 3).await;

        Self { student1, student2 }
    }
}

/// Helper function to create a test profile
pub async fn create_test_profile(
    app: &TestApp,
    member_name: &str,
    teacher: &str,
    class_period: i32,
) -> StudentProfile {
    let profile = StudentProfile::new(member_name, teacher, class_period);
    app.state
        .profiles
        .create(&profile)
        .await
        .expect("Failed to create test profile");
    profile
}

/// Helper function to deposit into an account
pub async fn deposit_funds(
    app: &TestApp,
    member_name: &str,
    account_type: AccountType,
    amount: Decimal,
) -> Decimal {
    app.state
        .ledger
        .deposit(member_name, account_type, amount)
        .await
        .expect("Failed to deposit")
}

/// Helper function to attach a recurring bill to an account
pub async fn add_test_bill(
    app: &TestApp,
    member_name: &str,
    account_type: AccountType,
    amount: Decimal,
    interval: RecurrenceKind,
    name: &str,
) -> StudentProfile {
    app.state
        .ledger
        .add_obligation(
            member_name,
            account_type,
            ObligationKind::Bill,
            amount,
            interval,
            name,
            "Test",
            None,
        )
        .await
        .expect("Failed to add bill")
}

/// Helper function to attach a recurring payment to an account
pub async fn add_test_payment(
    app: &TestApp,
    member_name: &str,
    account_type: AccountType,
    amount: Decimal,
    interval: RecurrenceKind,
    name: &str,
) -> StudentProfile {
    app.state
        .ledger
        .add_obligation(
            member_name,
            account_type,
            ObligationKind::Payment,
            amount,
            interval,
            name,
            "Test",
            None,
        )
        .await
        .expect("Failed to add payment")
}

/// Spawn the HTTP API on an ephemeral port
pub async fn spawn_http(app: &TestApp) -> SocketAddr {
    let router = build_router(app.state.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind HTTP listener");
    let addr = listener
        .local_addr()
        .expect("Failed to read HTTP listener address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    addr
}

/// Spawn the WebSocket server on an ephemeral port
pub async fn spawn_ws(app: &TestApp) -> SocketAddr {
    let server = Arc::new(WebSocketServer::new(
        app.state.presence.clone(),
        app.state.messaging.clone(),
    ));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind WebSocket listener");
    let addr = listener
        .local_addr()
        .expect("Failed to read WebSocket listener address");

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let server = server.clone();
            tokio::spawn(async move {
                server.handle_connection(stream).await.ok();
            });
        }
    });

    addr
}

/// Assert that two profiles refer to the same member
pub fn assert_profiles_equal(profile1: &StudentProfile, profile2: &StudentProfile) {
    assert_eq!(profile1.member_name, profile2.member_name);
    assert_eq!(profile1.teacher, profile2.teacher);
    assert_eq!(profile1.class_period, profile2.class_period);
}
