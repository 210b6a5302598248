//! Integration tests for the streaming session connector.
//!
//! Each test runs a scripted WebSocket server on a loopback port and drives
//! one session against it.

use std::future::Future;
use std::time::Duration;

use chat_stream::stream::{ReadyState, SessionState};
use chat_stream::{Connector, ConnectorError, Fragment, StreamEvent, StreamRequest};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerSocket = WebSocketStream<TcpStream>;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start a one-shot server that hands the accepted socket to `script`.
async fn serve_once<F, Fut>(script: F) -> String
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        script(ws).await;
    });
    format!("ws://{addr}/api/v1/ws/messages")
}

/// Read the client's request frame.
async fn read_request(ws: &mut ServerSocket) -> serde_json::Value {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected request frame, got {other:?}"),
    }
}

/// Read until the client closes; returns the close code the client sent.
async fn read_until_close(ws: &mut ServerSocket) -> Option<u16> {
    let mut code = None;
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Close(frame) = message {
            code = frame.map(|f| u16::from(f.code));
        }
    }
    code
}

/// Collect events until `Closed`.
async fn collect(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(TEST_TIMEOUT, rx.recv())
            .await
            .expect("listener went quiet")
            .expect("listener dropped before Closed");
        let closed = event == StreamEvent::Closed;
        events.push(event);
        if closed {
            return events;
        }
    }
}

fn text(s: &str) -> StreamEvent {
    StreamEvent::Fragment(Fragment::Text(s.to_string()))
}

fn connector(url: String) -> Connector {
    Connector::new(Some(url)).with_connect_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_full_exchange_with_completion_sentinel() {
    let (seen_tx, seen_rx) = oneshot::channel();
    let url = serve_once(|mut ws| async move {
        let request = read_request(&mut ws).await;
        ws.send(Message::Text(r#"{"current_session_id":"abc"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text("Hel".into())).await.unwrap();
        ws.send(Message::Text("lo!".into())).await.unwrap();
        ws.send(Message::Text("[complete]".into())).await.unwrap();
        let close_code = read_until_close(&mut ws).await;
        let _ = seen_tx.send((request, close_code));
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let request = StreamRequest::new("hi", "").with_token(Some("tok".to_string()));
    let stream = connector(url).open(&request, tx).await.unwrap();

    let events = collect(&mut rx).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment(Fragment::SessionNotice("abc".to_string())),
            text("Hel"),
            text("lo!"),
            StreamEvent::Closed,
        ]
    );

    stream.wait().await;
    let (request, close_code) = seen_rx.await.unwrap();
    assert_eq!(
        request,
        serde_json::json!({"token":"tok","message":"hi","attachmentIds":[],"chatId":""})
    );
    assert_eq!(close_code, Some(1000));
}

#[tokio::test]
async fn test_json_and_binary_frames_are_visible_text() {
    let url = serve_once(|mut ws| async move {
        read_request(&mut ws).await;
        ws.send(Message::Text(r#"{ "type": "delta",  "n": 1 }"#.into()))
            .await
            .unwrap();
        ws.send(Message::Binary(b"bin".to_vec())).await.unwrap();
        ws.send(Message::Text(r#"{"current_session_id":""}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text("[complete]".into())).await.unwrap();
        read_until_close(&mut ws).await;
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connector(url)
        .open(&StreamRequest::new("hi", "abc"), tx)
        .await
        .unwrap();

    assert_eq!(
        collect(&mut rx).await,
        vec![
            text(r#"{"type":"delta","n":1}"#),
            text("bin"),
            text(r#"{"current_session_id":""}"#),
            StreamEvent::Closed,
        ]
    );
}

#[tokio::test]
async fn test_error_frame_reports_once_and_closes_with_error_code() {
    let (code_tx, code_rx) = oneshot::channel();
    let url = serve_once(|mut ws| async move {
        read_request(&mut ws).await;
        ws.send(Message::Text("partial".into())).await.unwrap();
        ws.send(Message::Text("[error] upstream failed".into()))
            .await
            .unwrap();
        let _ = code_tx.send(read_until_close(&mut ws).await);
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connector(url)
        .open(&StreamRequest::new("hi", ""), tx)
        .await
        .unwrap();

    assert_eq!(
        collect(&mut rx).await,
        vec![
            text("partial"),
            StreamEvent::Error(ConnectorError::ServerReported(
                "[error] upstream failed".to_string()
            )),
            StreamEvent::Closed,
        ]
    );
    assert_eq!(code_rx.await.unwrap(), Some(1011));
}

#[tokio::test]
async fn test_server_close_with_error_code_is_abnormal() {
    let url = serve_once(|mut ws| async move {
        read_request(&mut ws).await;
        ws.send(Message::Text("Hel".into())).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::from(4000),
            reason: "model crashed".into(),
        }))
        .await
        .unwrap();
        read_until_close(&mut ws).await;
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connector(url)
        .open(&StreamRequest::new("hi", ""), tx)
        .await
        .unwrap();

    assert_eq!(
        collect(&mut rx).await,
        vec![
            text("Hel"),
            StreamEvent::Error(ConnectorError::AbnormalClose {
                code: 4000,
                reason: "model crashed".to_string()
            }),
            StreamEvent::Closed,
        ]
    );
}

#[tokio::test]
async fn test_server_vanishing_mid_stream_is_abnormal_close() {
    let url = serve_once(|mut ws| async move {
        read_request(&mut ws).await;
        ws.send(Message::Text("Hel".into())).await.unwrap();
        // Drop the TCP connection without a close frame
        drop(ws);
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connector(url)
        .open(&StreamRequest::new("hi", ""), tx)
        .await
        .unwrap();

    let events = collect(&mut rx).await;
    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(events[0], text("Hel"));
    assert!(
        matches!(
            &events[1],
            StreamEvent::Error(ConnectorError::AbnormalClose { code: 1006, .. })
                | StreamEvent::Error(ConnectorError::Transport {
                    state: ReadyState::Open,
                    ..
                })
        ),
        "{events:?}"
    );
    assert_eq!(events[2], StreamEvent::Closed);
}

#[tokio::test]
async fn test_connect_timeout_rejects_once_without_error_callback() {
    // Accepts TCP but never answers the WebSocket handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio::time::sleep(TEST_TIMEOUT).await;
        drop(tcp);
    });

    let window = Duration::from_millis(200);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = Connector::new(Some(format!("ws://{addr}/api/v1/ws/messages")))
        .with_connect_timeout(window)
        .open(&StreamRequest::new("hi", ""), tx)
        .await;

    assert_eq!(result.unwrap_err(), ConnectorError::Timeout(window));
    assert_eq!(collect(&mut rx).await, vec![StreamEvent::Closed]);
    hold.abort();
}

#[tokio::test]
async fn test_client_close_ends_stream_cleanly() {
    let url = serve_once(|mut ws| async move {
        read_request(&mut ws).await;
        ws.send(Message::Text("thinking".into())).await.unwrap();
        read_until_close(&mut ws).await;
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stream = connector(url)
        .open(&StreamRequest::new("hi", ""), tx)
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some(text("thinking")));
    assert!(stream.close());
    assert_eq!(rx.recv().await, Some(StreamEvent::Closed));
    stream.wait().await;
    assert!(rx.recv().await.is_none());
}

#[test]
fn test_session_state_terminality() {
    assert!(SessionState::Closed.is_terminal());
    assert!(SessionState::Failed.is_terminal());
    assert!(!SessionState::Streaming.is_terminal());
}
