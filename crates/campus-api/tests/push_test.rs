#![allow(clippy::unwrap_used)]
// End-to-end test of the push channel against a local Socket.IO-speaking
// WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use campus_api::{LinkState, PushEvent, PushHandle, ReconnectConfig};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handshake_ping_and_event_delivery() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(
            r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.into(),
        ))
        .await
        .unwrap();

        let connect = ws.next().await.unwrap().unwrap();
        assert_eq!(connect.to_text().unwrap(), "40");
        ws.send(Message::Text(r#"40{"sid":"n1"}"#.into()))
            .await
            .unwrap();

        ws.send(Message::Text("2".into())).await.unwrap();
        let pong = ws.next().await.unwrap().unwrap();
        assert_eq!(pong.to_text().unwrap(), "3");

        ws.send(Message::Text(
            r#"42["attack_detected",{"type":"critical","category":"Port Scan","message":"Port scan detected","time":"12:00:00","severity":"MEDIUM","source":"10.9.9.9"}]"#.into(),
        ))
        .await
        .unwrap();

        // Keep the socket open until the client hangs up.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let url = Url::parse(&format!(
        "ws://{addr}/socket.io/?EIO=4&transport=websocket"
    ))
    .unwrap();
    let cancel = CancellationToken::new();
    let handle = PushHandle::connect(url, ReconnectConfig::default(), cancel.clone());
    let mut events = handle.subscribe();
    let mut link = handle.link();

    tokio::time::timeout(WAIT, link.wait_for(|s| s.state == LinkState::Connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.borrow().generation, 1);

    let event = tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap();
    match &*event {
        PushEvent::AttackDetected(record) => {
            assert_eq!(record.category, "Port Scan");
            assert_eq!(record.source.as_deref(), Some("10.9.9.9"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    handle.shutdown();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

/// Engine.IO open plus namespace connect, as the backend sends them.
async fn handshake<S>(ws: &mut tokio_tungstenite::WebSocketStream<S>, sid: &str)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    ws.send(Message::Text(
        format!(r#"0{{"sid":"{sid}","upgrades":[],"pingInterval":25000,"pingTimeout":20000}}"#)
            .into(),
    ))
    .await
    .unwrap();
    let connect = ws.next().await.unwrap().unwrap();
    assert_eq!(connect.to_text().unwrap(), "40");
    ws.send(Message::Text(format!(r#"40{{"sid":"{sid}-ns"}}"#).into()))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connected_session_resets_retry_count() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // Fails before the handshake.
        let (stream, _) = listener.accept().await.unwrap();
        drop(tokio_tungstenite::accept_async(stream).await.unwrap());

        // Connects, then drops without a close frame.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handshake(&mut ws, "s1").await;
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handshake(&mut ws, "s2").await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let url = Url::parse(&format!(
        "ws://{addr}/socket.io/?EIO=4&transport=websocket"
    ))
    .unwrap();
    let reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        max_retries: Some(1),
    };
    let handle = PushHandle::connect(url, reconnect, CancellationToken::new());
    let mut link = handle.link();

    tokio::time::timeout(
        WAIT,
        link.wait_for(|s| s.state == LinkState::Connected && s.generation == 2),
    )
    .await
    .unwrap()
    .unwrap();
    let status = *link.borrow();
    assert_eq!(status.attempt, 0);

    handle.shutdown();
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}
