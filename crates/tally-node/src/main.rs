//! # Tally Node
//!
//! Main Tally binary: ingests orders and reactions over HTTP and streams
//! outbound notifications over WebSocket.

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tally_core::DebtConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod state;

use state::AppState;

/// Default listen address.
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Run the Tally node server until Ctrl-C.
pub async fn run_server(addr: SocketAddr, config: DebtConfig) -> anyhow::Result<()> {
    info!(
        reminder_interval_secs = config.reminder_interval_secs,
        max_duration_secs = config.max_duration_secs,
        "Tally node starting"
    );

    let state = AppState::new(config)?;
    let app = create_router(state.clone());

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.service.shutdown().await;
    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        // Ingestion
        .route("/api/v1/users", post(api::users::upsert_user))
        .route(
            "/api/v1/orders",
            post(api::orders::track_order).get(api::orders::list_orders),
        )
        .route("/api/v1/orders/:id/debts", get(api::orders::get_debts))
        .route("/api/v1/reactions", post(api::reactions::handle_reaction))
        // Outbound stream
        .route("/ws/notifications", get(api::ws::notification_stream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DebtConfig::from_env()?;
    let addr: SocketAddr = std::env::var("TALLY_BIND_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
        .parse()?;

    run_server(addr, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tally_core::{Debt, Notification, User};
    use tally_engine::{ReactionOutcome, TrackingSummary};
    use tally_state::{BroadcastNotifier, NotificationFilter, Notifier};
    use tokio_stream::StreamExt;

    use api::ws::{notification_messages, NotificationStreamMessage};

    fn test_config() -> DebtConfig {
        DebtConfig {
            reminder_interval_secs: 3600,
            max_duration_secs: 7200,
            self_id: "UBOT".to_string(),
            ..DebtConfig::default()
        }
    }

    async fn server_with_users() -> (TestServer, AppState) {
        let state = AppState::new(test_config()).unwrap();
        let server = TestServer::new(create_router(state.clone())).unwrap();

        for user in [
            User::new("lender", "Lena Host", "TL"),
            User::new("b1", "Bo One", "TB1"),
            User::new("b2", "Bea Two", "TB2"),
        ] {
            server
                .post("/api/v1/users")
                .json(&user)
                .await
                .assert_status(StatusCode::CREATED);
        }
        (server, state)
    }

    fn reaction(from: &str, reaction: &str) -> serde_json::Value {
        json!({
            "reaction": reaction,
            "from_user_id": from,
            "message_user_id": "UBOT",
            "message_text": "Rates for order ID ABC123. Pay up",
            "channel": "C1"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let state = AppState::new(test_config()).unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: api::health::HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.active_workers, 0);
    }

    #[tokio::test]
    async fn test_order_lifecycle_over_http() {
        let (server, state) = server_with_users().await;

        let response = server
            .post("/api/v1/orders")
            .json(&json!({
                "order_id": "ABC123",
                "initiated_transport": "C1",
                "message_id": "m1",
                "lender_id": "lender",
                "shares": [
                    { "user_id": "b1", "amount": 10.0 },
                    { "user_id": "b2", "amount": 15.0 }
                ]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let summary: TrackingSummary = response.json();
        assert_eq!(summary.debts.len(), 2);
        assert!(summary.worker_started);

        let debts: Vec<Debt> = server.get("/api/v1/orders/ABC123/debts").await.json();
        assert_eq!(debts.len(), 2);
        assert_eq!(debts[0].amount, dec!(10));

        let outcome: ReactionOutcome = server
            .post("/api/v1/reactions")
            .json(&reaction("TB1", "money_with_wings"))
            .await
            .json();
        assert!(matches!(outcome, ReactionOutcome::MarkedPaid { .. }));

        let outcome: ReactionOutcome = server
            .post("/api/v1/reactions")
            .json(&reaction("TB2", "x"))
            .await
            .json();
        assert!(matches!(outcome, ReactionOutcome::PermissionDenied { .. }));

        let orders: Vec<api::orders::OrderResponse> = server.get("/api/v1/orders").await.json();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].debts, 1);
        assert!(orders[0].worker_running);

        let outcome: ReactionOutcome = server
            .post("/api/v1/reactions")
            .json(&reaction("TL", "x"))
            .await
            .json();
        assert_eq!(
            outcome,
            ReactionOutcome::Cancelled {
                order_id: "ABC123".into(),
                removed: 1
            }
        );

        let debts: Vec<Debt> = server.get("/api/v1/orders/ABC123/debts").await.json();
        assert!(debts.is_empty());

        state.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_reactions_always_succeed() {
        let state = AppState::new(test_config()).unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/v1/reactions")
            .json(&json!({
                "reaction": "x",
                "from_user_id": "TL",
                "message_user_id": "UBOT",
                "message_text": "no order here",
                "channel": "C1"
            }))
            .await;
        response.assert_status_ok();
        let outcome: ReactionOutcome = response.json();
        assert!(matches!(outcome, ReactionOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_rejects_empty_order() {
        let (server, _state) = server_with_users().await;

        server
            .post("/api/v1/orders")
            .json(&json!({
                "order_id": "ABC123",
                "initiated_transport": "C1",
                "message_id": "m1",
                "lender_id": "lender",
                "shares": []
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upsert_existing_user() {
        let (server, _state) = server_with_users().await;

        server
            .post("/api/v1/users")
            .json(&User::new("b1", "Bo One", "TB1").with_timezone("Europe/Paris"))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_notification_stream_filters_by_recipient() {
        let notifier = BroadcastNotifier::new(16);
        let messages =
            notification_messages(notifier.subscribe(), NotificationFilter::recipient("TB1"));
        tokio::pin!(messages);

        match messages.next().await {
            Some(NotificationStreamMessage::Connected { filter }) => {
                assert_eq!(filter.transport_id.as_deref(), Some("TB1"));
            }
            other => panic!("expected greeting, got {other:?}"),
        }

        notifier.send(Notification::new("TB2", "not yours")).await;
        notifier.send(Notification::new("TB1", "yours")).await;

        match messages.next().await {
            Some(NotificationStreamMessage::Notification(sent)) => {
                assert_eq!(sent.notification.transport_id, "TB1");
                assert_eq!(sent.notification.text, "yours");
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notification_stream_reports_lag() {
        let notifier = BroadcastNotifier::new(2);
        let messages = notification_messages(notifier.subscribe(), NotificationFilter::default());
        tokio::pin!(messages);

        for n in 0..5 {
            notifier.send(Notification::new("TB1", format!("n{n}"))).await;
        }

        assert!(matches!(
            messages.next().await,
            Some(NotificationStreamMessage::Connected { .. })
        ));
        assert!(matches!(
            messages.next().await,
            Some(NotificationStreamMessage::Lagged { skipped: 3 })
        ));
        let texts: Vec<String> = messages
            .take(2)
            .filter_map(|msg| match msg {
                NotificationStreamMessage::Notification(sent) => Some(sent.notification.text),
                _ => None,
            })
            .collect()
            .await;
        assert_eq!(texts, vec!["n3".to_string(), "n4".to_string()]);
    }

    #[tokio::test]
    async fn test_notification_stream_sees_reaction_replies() {
        let (server, state) = server_with_users().await;
        let messages = notification_messages(
            state.notifier.subscribe(),
            NotificationFilter::recipient("TB2"),
        );
        tokio::pin!(messages);

        server
            .post("/api/v1/orders")
            .json(&json!({
                "order_id": "ABC123",
                "initiated_transport": "C1",
                "message_id": "m1",
                "lender_id": "lender",
                "shares": [{ "user_id": "b1", "amount": 10.0 }]
            }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/v1/reactions")
            .json(&reaction("TB2", "x"))
            .await
            .assert_status_ok();

        assert!(matches!(
            messages.next().await,
            Some(NotificationStreamMessage::Connected { .. })
        ));
        match messages.next().await {
            Some(NotificationStreamMessage::Notification(sent)) => {
                assert!(sent.notification.text.contains("<@TL>"));
            }
            other => panic!("expected denial, got {other:?}"),
        }

        state.service.shutdown().await;
    }
}
