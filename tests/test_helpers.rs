use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use signal_relay::broadcast::SignalPayload;
use signal_relay::config::{Config, RelayConfig};
use signal_relay::server::{Connection, ConnectionId, SignalRelay};
use signal_relay::websocket::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

#[allow(dead_code)]
pub type ClientSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
#[allow(dead_code)]
pub type ClientStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Configuration tuned for tests: loopback only, small queues, short timeouts.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
        relay: RelayConfig {
            outbound_queue_capacity: 64,
            send_timeout_ms: 1_000,
            ..RelayConfig::default()
        },
        ..Config::default()
    }
}

/// Open an in-process connection and return its id plus the receiving end of its queue.
#[allow(dead_code)]
pub fn open_connection(relay: &SignalRelay) -> (ConnectionId, mpsc::Receiver<SignalPayload>) {
    let (tx, rx) = relay.outbound_channel();
    let id = relay
        .on_open(Connection::new(tx, None))
        .expect("connection should register");
    (id, rx)
}

/// Drain everything currently queued for one connection.
#[allow(dead_code)]
pub fn drain(rx: &mut mpsc::Receiver<SignalPayload>) -> Vec<SignalPayload> {
    let mut received = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        received.push(payload);
    }
    received
}

/// Bind a relay on an ephemeral loopback port and serve it in the background.
#[allow(dead_code)]
pub async fn start_test_relay(config: Config) -> (SocketAddr, Arc<SignalRelay>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let relay = SignalRelay::new(config.relay.clone());
    let app = build_app(relay.clone(), &config);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("relay server stopped");
    });

    (addr, relay)
}

/// Connect a WebSocket client to `path` on the test relay.
#[allow(dead_code)]
pub async fn connect_client(addr: SocketAddr, path: &str) -> (ClientSink, ClientStream) {
    let url = format!("ws://{addr}{path}");
    let (ws_stream, _) = timeout(Duration::from_secs(10), connect_async(&url))
        .await
        .expect("WebSocket connection timed out after 10 seconds")
        .expect("Failed to connect");
    ws_stream.split()
}

/// Registration happens in the upgrade callback, after the client handshake
/// completes, so tests wait for the registry to catch up before sending.
#[allow(dead_code)]
pub async fn wait_for_connections(relay: &SignalRelay, expected: usize) {
    let result = timeout(Duration::from_secs(5), async {
        while relay.connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "expected {expected} registered connections, found {}",
        relay.connection_count()
    );
}

/// Next data frame, skipping pings/pongs. `None` on timeout or close.
#[allow(dead_code)]
pub async fn next_data_frame(stream: &mut ClientStream, wait: Duration) -> Option<Message> {
    loop {
        let frame = match timeout(wait, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(_)) | None) | Err(_) => return None,
        };
        match frame {
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return None,
            message => return Some(message),
        }
    }
}

/// Next text frame; panics if none arrives in time.
#[allow(dead_code)]
pub async fn expect_text(stream: &mut ClientStream) -> String {
    match next_data_frame(stream, Duration::from_secs(5)).await {
        Some(Message::Text(text)) => text.as_str().to_owned(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Assert nothing arrives within a short grace period.
#[allow(dead_code)]
pub async fn expect_silence(stream: &mut ClientStream) {
    if let Some(message) = next_data_frame(stream, Duration::from_millis(300)).await {
        panic!("expected no frame, got {message:?}");
    }
}
