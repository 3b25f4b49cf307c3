//! End-to-end tests over real sockets with a WebSocket client.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parley_core::{Envelope, EnvelopeKind, UserId};
use parley_server::websocket::KeepalivePolicy;
use parley_server::{ParleyServer, ServerConfig, TrustedHeaderResolver};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a server on an ephemeral port.
async fn boot_server(config: ServerConfig) -> (ParleyServer, SocketAddr, JoinHandle<()>) {
    let server = ParleyServer::new(config, TrustedHeaderResolver::default(), None);
    let (addr, task) = server.listen().await.unwrap();
    (server, addr, task)
}

async fn boot_default() -> (ParleyServer, SocketAddr, JoinHandle<()>) {
    boot_server(ServerConfig::default()).await
}

async fn try_connect(addr: SocketAddr, user: Option<&str>) -> Result<WsStream, WsError> {
    let mut request = format!("ws://{addr}/api/v1/ws/chat")
        .into_client_request()
        .unwrap();
    if let Some(user) = user {
        let headers = request.headers_mut();
        let _ = headers.insert("x-user-id", HeaderValue::from_str(user).unwrap());
        let _ = headers.insert(
            "x-username",
            HeaderValue::from_str(&format!("{user}-name")).unwrap(),
        );
    }
    timeout(TIMEOUT, connect_async(request))
        .await
        .expect("connect timed out")
        .map(|(ws, _)| ws)
}

/// Connect and consume the welcome envelope.
async fn connect(addr: SocketAddr, user: &str) -> WsStream {
    let mut ws = try_connect(addr, Some(user)).await.unwrap();
    let welcome = recv_envelope(&mut ws).await;
    assert_eq!(welcome.kind, EnvelopeKind::System);
    ws
}

async fn recv_envelope(ws: &mut WsStream) -> Envelope {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return Envelope::decode(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn send_json(ws: &mut WsStream, json: &str) {
    ws.send(Message::text(json)).await.unwrap();
}

/// Wait until the socket is closed by the server.
async fn expect_closed(ws: &mut WsStream) {
    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "server did not close the socket");
}

async fn wait_for_connections(server: &ParleyServer, expected: usize) {
    let reached = timeout(TIMEOUT, async {
        while server.hub().total_connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "connection count never reached {expected}");
}

#[tokio::test]
async fn welcome_is_first_frame() {
    let (_server, addr, _task) = boot_default().await;
    let mut ws = try_connect(addr, Some("u1")).await.unwrap();
    let welcome = recv_envelope(&mut ws).await;
    assert_eq!(welcome.kind, EnvelopeKind::System);
    assert_eq!(welcome.content, "Welcome to the chat assistant!");
}

#[tokio::test]
async fn send_to_user_reaches_every_session() {
    let (server, addr, _task) = boot_default().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "alice").await;
    let mut other = connect(addr, "bob").await;

    let delivery = server
        .hub()
        .send_to_user(&UserId::from("alice"), Envelope::system("for alice"))
        .await
        .unwrap();
    assert_eq!(delivery.delivered, 2);

    assert_eq!(recv_envelope(&mut a).await.content, "for alice");
    assert_eq!(recv_envelope(&mut b).await.content, "for alice");

    // bob only sees his own reply
    send_json(&mut other, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_envelope(&mut other).await.kind, EnvelopeKind::Pong);
}

#[tokio::test]
async fn offline_user_is_not_an_error() {
    let (server, _addr, _task) = boot_default().await;
    let delivery = server
        .hub()
        .send_to_user(&UserId::from("ghost"), Envelope::system("anyone?"))
        .await
        .unwrap();
    assert_eq!(delivery.delivered, 0);
}

#[tokio::test]
async fn broadcast_reaches_all_users() {
    let (server, addr, _task) = boot_default().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "bob").await;

    let delivery = server
        .hub()
        .broadcast(Envelope::system("maintenance"))
        .await
        .unwrap();
    assert_eq!(delivery.delivered, 2);
    assert_eq!(recv_envelope(&mut a).await.content, "maintenance");
    assert_eq!(recv_envelope(&mut b).await.content, "maintenance");
}

#[tokio::test]
async fn ping_envelope_gets_pong() {
    let (_server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    send_json(&mut ws, r#"{"type":"ping","content":"ping"}"#).await;
    let pong = recv_envelope(&mut ws).await;
    assert_eq!(pong.kind, EnvelopeKind::Pong);
    assert_eq!(pong.content, "pong");
}

#[tokio::test]
async fn dispatch_order_preserved() {
    let (server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    let user = UserId::from("u1");
    for i in 0..20 {
        let _ = server
            .hub()
            .send_to_user(&user, Envelope::system(format!("m{i}")))
            .await
            .unwrap();
    }
    for i in 0..20 {
        assert_eq!(recv_envelope(&mut ws).await.content, format!("m{i}"));
    }
}

#[tokio::test]
async fn chat_response_carries_turns() {
    let (server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    let _ = server
        .hub()
        .send_to_user(
            &UserId::from("u1"),
            Envelope::chat_response(
                "answer",
                json!({"role": "user", "content": "question"}),
                json!({"role": "assistant", "content": "answer"}),
            ),
        )
        .await
        .unwrap();
    let env = recv_envelope(&mut ws).await;
    assert_eq!(env.kind, EnvelopeKind::ChatResponse);
    let data = env.data.unwrap();
    assert_eq!(env.content, "answer");
    assert_eq!(data["user_message"]["content"], "question");
    assert_eq!(data["assistant_message"]["role"], "assistant");
}

#[tokio::test]
async fn missing_identity_is_401() {
    let (server, addr, _task) = boot_default().await;
    match try_connect(addr, None).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status().as_u16(), 401),
        Err(other) => panic!("expected http error, got {other}"),
        Ok(_) => panic!("upgrade unexpectedly accepted"),
    }
    assert_eq!(server.hub().total_connection_count().await, 0);
}

#[tokio::test]
async fn connection_limit_is_503() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let (_server, addr, _task) = boot_server(config).await;
    let _first = connect(addr, "u1").await;
    match try_connect(addr, Some("u2")).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status().as_u16(), 503),
        Err(other) => panic!("expected http error, got {other}"),
        Ok(_) => panic!("upgrade unexpectedly accepted"),
    }
}

#[tokio::test]
async fn stats_and_health_over_http() {
    let (_server, addr, _task) = boot_default().await;
    let _a = connect(addr, "alice").await;
    let _b = connect(addr, "alice").await;
    let _c = connect(addr, "bob").await;

    let stats: Value = reqwest::get(format!("http://{addr}/api/v1/ws/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["connected_users"], 2);
    assert_eq!(stats["total_connections"], 3);

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connections"], 3);
}

#[tokio::test]
async fn client_close_unregisters() {
    let (server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    wait_for_connections(&server, 1).await;

    ws.close(None).await.unwrap();
    wait_for_connections(&server, 0).await;
    assert_eq!(server.hub().connected_user_count().await, 0);
}

#[tokio::test]
async fn malformed_frame_closes_session() {
    let (server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    send_json(&mut ws, "this is not json").await;
    expect_closed(&mut ws).await;
    wait_for_connections(&server, 0).await;
}

#[tokio::test]
async fn unsupported_type_keeps_session_open() {
    let (_server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    send_json(&mut ws, r#"{"type":"data","content":"x"}"#).await;
    send_json(&mut ws, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_envelope(&mut ws).await.kind, EnvelopeKind::Pong);
}

#[tokio::test]
async fn oversized_frame_closes_session() {
    let (server, addr, _task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;
    let big = format!(r#"{{"type":"chat","content":"{}"}}"#, "x".repeat(4096));
    send_json(&mut ws, &big).await;
    expect_closed(&mut ws).await;
    wait_for_connections(&server, 0).await;
}

#[tokio::test]
async fn shutdown_closes_sockets() {
    let (server, addr, task) = boot_default().await;
    let mut ws = connect(addr, "u1").await;

    let stopper = tokio::spawn(server.stop(task, Some(TIMEOUT)));
    expect_closed(&mut ws).await;
    assert!(stopper.await.unwrap());
}

#[tokio::test]
async fn listening_client_outlives_read_deadline_under_traffic() {
    let config = ServerConfig {
        keepalive: KeepalivePolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_millis(300),
            512,
        ),
        ..ServerConfig::default()
    };
    let (server, addr, _task) = boot_server(config).await;
    let mut ws = connect(addr, "u1").await;
    let user = UserId::from("u1");

    // pushes arrive faster than the ping interval; the client only ever
    // sends the pongs its library answers pings with
    for i in 0..12 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let delivery = server
            .hub()
            .send_to_user(&user, Envelope::system(format!("tick {i}")))
            .await
            .unwrap();
        assert_eq!(delivery.delivered, 1, "session dropped at tick {i}");
        assert_eq!(recv_envelope(&mut ws).await.content, format!("tick {i}"));
    }
    assert_eq!(server.hub().total_connection_count().await, 1);
}

