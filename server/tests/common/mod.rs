#![allow(dead_code)]

use axum_test::TestServer;
use futures_util::{SinkExt, StreamExt};
use huddle_server::core::{AppState, encode_jwt};
use huddle_server::dtos::ServerEvent;
use huddle_server::entities::User;
use huddle_server::ws::{ConnectionContext, ConnectionHandle, InternalSignal};
use serde_json::Value;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub const JWT_SECRET: &str = "ilmiobellissimosegretochevaassolutamentecambiato";

/// Attesa massima per un evento atteso
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Crea un AppState per i test
pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState::new(pool, JWT_SECRET.to_string()))
}

pub fn create_test_state_with_typing(pool: SqlitePool, typing_timeout: Duration) -> Arc<AppState> {
    Arc::new(AppState::with_typing_timeout(
        pool,
        JWT_SECRET.to_string(),
        typing_timeout,
    ))
}

/// Crea un TestServer per i test delle route HTTP
pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = huddle_server::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Genera un JWT token valido 24 ore
pub fn create_test_jwt(user_id: i32, username: &str) -> String {
    encode_jwt(username.to_string(), user_id, JWT_SECRET).expect("Failed to create JWT token")
}

/// Token firmato correttamente ma già scaduto
pub fn create_expired_jwt(user_id: i32, username: &str) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Claims {
        id: i32,
        username: String,
        exp: usize,
        iat: usize,
    }

    let issued = Utc::now() - Duration::hours(48);
    let claims = Claims {
        id: user_id,
        username: username.to_string(),
        exp: (issued + Duration::hours(24)).timestamp() as usize,
        iat: issued.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to create JWT token")
}

pub async fn load_user(state: &AppState, user_id: i32) -> User {
    use huddle_server::repositories::Read;
    state
        .user
        .read(&user_id)
        .await
        .expect("query failed")
        .expect("user exists in fixtures")
}

// ************************* CONNESSIONI IN-PROCESS ************************* //

/// Connessione simulata: registra la presenza come farebbe l'handshake
/// ma senza socket, gli eventi in uscita si leggono dal receiver.
pub async fn connect_in_process(
    state: &AppState,
    user_id: i32,
) -> (ConnectionContext, UnboundedReceiver<InternalSignal>) {
    let user = load_user(state, user_id).await;
    let (tx, rx) = unbounded_channel();
    let ctx = ConnectionContext {
        user,
        handle: ConnectionHandle::new(tx),
    };
    state.presence.register(&ctx.user, ctx.handle.clone());
    (ctx, rx)
}

/// Tutti gli eventi già accodati sulla connessione
pub fn drain(rx: &mut UnboundedReceiver<InternalSignal>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        if let InternalSignal::Event(event) = signal {
            events.push((*event).clone());
        }
    }
    events
}

/// Eventi accodati, esclusi gli snapshot di presenza
pub fn drain_non_presence(rx: &mut UnboundedReceiver<InternalSignal>) -> Vec<ServerEvent> {
    drain(rx)
        .into_iter()
        .filter(|e| !matches!(e, ServerEvent::UserOnline(_) | ServerEvent::UserOffline(_)))
        .collect()
}

// ************************* CONNESSIONI WEBSOCKET REALI ************************* //

/// Avvia il server su una porta libera e restituisce l'indirizzo
pub async fn spawn_app(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    let app = huddle_server::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });
    addr
}

pub async fn connect_ws(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{}/ws?token={}", addr, token);
    let (ws, _response) = connect_async(url).await.expect("WebSocket handshake failed");
    ws
}

pub async fn send_event(ws: &mut WsClient, event: Value) {
    ws.send(Message::Text(event.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Prossimo frame di testo decodificato come JSON
pub async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let frame = tokio::time::timeout(EVENT_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream closed")
            .expect("WebSocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("server sent invalid JSON");
        }
    }
}

/// Scarta gli eventi fino al primo del tipo richiesto
pub async fn wait_for(ws: &mut WsClient, event_type: &str) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["type"] == event_type {
            return event;
        }
    }
}

/// Barriera: gli eventi di una connessione sono processati in ordine, quindi
/// quando arriva l'errore per il frame non valido tutti i precedenti sono stati gestiti.
/// Restituisce gli eventi ricevuti nel frattempo.
pub async fn sync(ws: &mut WsClient) -> Vec<Value> {
    ws.send(Message::Text("barrier".to_string()))
        .await
        .expect("Failed to send frame");

    let mut seen = Vec::new();
    loop {
        let event = next_event(ws).await;
        if event["type"] == "error" && event["data"]["message"] == "Invalid event payload" {
            return seen;
        }
        seen.push(event);
    }
}

/// Verifica che non arrivino eventi (diversi dalla presenza) entro la finestra
pub async fn assert_no_event(ws: &mut WsClient, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => {
                let event: Value = serde_json::from_str(&text).expect("server sent invalid JSON");
                let kind = event["type"].as_str().unwrap_or_default();
                assert!(
                    kind == "userOnline" || kind == "userOffline",
                    "unexpected event {event}"
                );
            }
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("connection ended: {other:?}"),
        }
    }
}
