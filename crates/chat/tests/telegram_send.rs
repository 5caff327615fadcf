use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use riego_chat::{ChatTransport, OutboundMessage, ReplyMarkup, TelegramTransport, TransportError};
use riego_core::config::{ChatConfig, ChatTransportKind};
use serde_json::{json, Value};

const TOKEN: &str = "123456:AAE-test-token";

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Captured {
    fn bodies(&self) -> Vec<Value> {
        match self.bodies.lock() {
            Ok(bodies) => bodies.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Behaves like the Bot API for unbalanced Markdown: formatted text with an
/// odd number of unescaped underscores is refused.
async fn send_message(
    State(captured): State<Captured>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let markdown = body.get("parse_mode").is_some();
    let underscores = body
        .get("text")
        .and_then(Value::as_str)
        .map_or(0, |text| text.replace("\\_", "").matches('_').count());
    if let Ok(mut bodies) = captured.bodies.lock() {
        bodies.push(body);
    }

    if markdown && underscores % 2 == 1 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: Can't find end of the entity"
            })),
        );
    }
    (StatusCode::OK, Json(json!({"ok": true, "result": {"message_id": 1}})))
}

async fn chat_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
    )
}

async fn spawn_stub(captured: Captured) -> SocketAddr {
    let app = Router::new()
        .route("/{bot}/sendMessage", post(send_message))
        .with_state(captured);
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) => panic!("could not bind stub listener: {error}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(error) => panic!("stub listener has no address: {error}"),
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn transport_for(addr: SocketAddr) -> TelegramTransport {
    let config = ChatConfig {
        transport: ChatTransportKind::Telegram,
        bot_token: TOKEN.to_owned().into(),
        poll_timeout_secs: 1,
        session_idle_secs: 60,
    };
    match TelegramTransport::with_api_base(&config, &format!("http://{addr}")) {
        Ok(transport) => transport,
        Err(error) => panic!("transport should build: {error}"),
    }
}

fn message(text: &str, markdown: bool) -> OutboundMessage {
    OutboundMessage {
        chat_id: 5512,
        text: text.to_owned(),
        markdown,
        markup: ReplyMarkup::Unchanged,
    }
}

#[tokio::test]
async fn refused_markdown_is_resent_as_plain_text() {
    let captured = Captured::default();
    let transport = transport_for(spawn_stub(captured.clone()).await);
    let text = "Mean flow: *121.0*\nDetail: p_final";

    let sent = transport.send(&message(text, true)).await;
    assert!(sent.is_ok(), "{sent:?}");

    let bodies = captured.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["parse_mode"], json!("Markdown"));
    assert_eq!(bodies[1].get("parse_mode"), None);
    assert_eq!(bodies[1]["text"], json!(text));
    assert_eq!(bodies[1]["chat_id"], json!(5512));
}

#[tokio::test]
async fn well_formed_markdown_is_sent_once() {
    let captured = Captured::default();
    let transport = transport_for(spawn_stub(captured.clone()).await);

    let sent = transport.send(&message("Detail: p\\_final", true)).await;
    assert!(sent.is_ok(), "{sent:?}");
    assert_eq!(captured.bodies().len(), 1);
}

#[tokio::test]
async fn other_rejections_are_not_retried() {
    let app = Router::new().route("/{bot}/sendMessage", post(chat_not_found));
    let transport = transport_for(serve(app).await);

    match transport.send(&message("*hello*", true)).await {
        Err(TransportError::Send(detail)) => {
            assert!(detail.contains("chat not found"), "{detail}");
            assert!(!detail.contains(TOKEN), "{detail}");
        }
        other => panic!("expected send error, got {other:?}"),
    }
}
