mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeHost, FakeLibrary};
use skinhelper_daemon::socket::{accept_loop, ServerContext};
use skinhelper_proto::media::{MediaRecord, MediaType};
use skinhelper_proto::properties::PropertyStore;
use skinhelper_proto::protocol::{Broadcast, Command, Message, MAX_FRAME_LEN, PROTOCOL_VERSION};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Client {
    async fn send(&mut self, cmd: Command) {
        let encoded = Message::Command(cmd).encode().unwrap();
        self.stream.write_all(&encoded).await.unwrap();
    }

    async fn recv(&mut self) -> Broadcast {
        let mut tmp = [0u8; 4096];
        loop {
            if let Ok((msg, consumed)) = Message::decode(&self.buf) {
                self.buf.drain(..consumed);
                match msg {
                    Message::Broadcast(b) => return b,
                    Message::Command(c) => panic!("server sent a command: {:?}", c),
                }
            }
            let n = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut tmp))
                .await
                .expect("timed out waiting for the server")
                .unwrap();
            assert!(n > 0, "server closed the connection");
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    /// Skip messages until one matches.
    async fn recv_until(&mut self, pred: impl Fn(&Broadcast) -> bool) -> Broadcast {
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
    }
}

async fn start() -> (Arc<ServerContext>, Client) {
    let library = FakeLibrary::default();
    library.add(MediaRecord::new(2, MediaType::Movie, "The Abyss"));

    let (log_tx, _) = broadcast::channel(16);
    let ctx = Arc::new(ServerContext {
        store: Arc::new(PropertyStore::new()),
        host: Arc::new(FakeHost::default()),
        library: Arc::new(library),
        search_poll: Duration::from_millis(20),
        abort: CancellationToken::new(),
        log_tx,
        clients: RwLock::new(Vec::new()),
    });
    ctx.store.set("SkinHelper.Player.studio", "A24").await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(accept_loop(listener, ctx.clone()));

    let stream = TcpStream::connect(addr).await.unwrap();
    (
        ctx,
        Client {
            stream,
            buf: Vec::new(),
        },
    )
}

#[tokio::test]
async fn test_hello_then_property_changes() {
    let (ctx, mut client) = start().await;

    match client.recv().await {
        Broadcast::Hello {
            protocol_version,
            rev,
            properties,
        } => {
            assert_eq!(protocol_version, PROTOCOL_VERSION);
            assert_eq!(rev, 1);
            assert_eq!(
                properties.get("SkinHelper.Player.studio").map(String::as_str),
                Some("A24")
            );
        }
        other => panic!("expected Hello, got {:?}", other),
    }

    ctx.store.set("widgetreload", "20240101120000").await;
    match client.recv().await {
        Broadcast::PropertySet { key, value } => {
            assert_eq!(key, "widgetreload");
            assert_eq!(value, "20240101120000");
        }
        other => panic!("expected PropertySet, got {:?}", other),
    }

    ctx.store.clear("SkinHelper.Player.studio").await;
    match client.recv().await {
        Broadcast::PropertyCleared { key } => assert_eq!(key, "SkinHelper.Player.studio"),
        other => panic!("expected PropertyCleared, got {:?}", other),
    }

    client.send(Command::GetProperties).await;
    match client.recv().await {
        Broadcast::Properties { rev, properties } => {
            assert_eq!(rev, 3);
            assert_eq!(properties.len(), 1);
        }
        other => panic!("expected Properties, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_session_over_socket() {
    let (_ctx, mut client) = start().await;
    client.recv().await; // Hello

    client.send(Command::SearchClick { control_id: 3020 }).await;
    assert!(matches!(client.recv().await, Broadcast::Error { .. }));

    client.send(Command::OpenSearch).await;
    client.send(Command::SearchClick { control_id: 3020 }).await;
    assert!(matches!(
        client.recv().await,
        Broadcast::SearchFocus { control_id: 3020 }
    ));
    match client.recv().await {
        Broadcast::SearchLabel { text } => assert_eq!(text, "A"),
        other => panic!("expected SearchLabel, got {:?}", other),
    }

    let results = client
        .recv_until(|m| matches!(m, Broadcast::SearchResults { results } if !results.is_empty()))
        .await;
    match results {
        Broadcast::SearchResults { results } => {
            assert_eq!(results.query, "A");
            assert_eq!(results.movies.len(), 1);
            assert_eq!(results.movies[0].label, "The Abyss");
        }
        _ => unreachable!(),
    }

    client.send(Command::CloseSearch).await;
    client
        .recv_until(|m| matches!(m, Broadcast::SearchClosed))
        .await;

    client
        .send(Command::SearchAction {
            action_id: 92,
            button_code: 0,
        })
        .await;
    client
        .recv_until(|m| matches!(m, Broadcast::Error { .. }))
        .await;
}

#[tokio::test]
async fn test_disconnect_unregisters_client() {
    let (ctx, mut client) = start().await;
    client.recv().await;
    assert_eq!(ctx.clients.read().await.len(), 1);

    drop(client);
    for _ in 0..100 {
        if ctx.clients.read().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client was never unregistered");
}

#[tokio::test]
async fn test_undecodable_frame_is_skipped() {
    let (_ctx, mut client) = start().await;
    client.recv().await; // Hello

    let payload = br#"{"cmd":"Bogus"}"#;
    let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&Message::Command(Command::GetProperties).encode().unwrap());
    client.stream.write_all(&frame).await.unwrap();

    assert!(matches!(client.recv().await, Broadcast::Error { .. }));
    match client.recv().await {
        Broadcast::Properties { properties, .. } => assert_eq!(properties.len(), 1),
        other => panic!("expected Properties, got {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let (ctx, mut client) = start().await;
    client.recv().await; // Hello

    let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
    client.stream.write_all(&header).await.unwrap();

    let mut tmp = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(5), client.stream.read(&mut tmp))
        .await
        .expect("connection was left open")
        .unwrap_or(0);
    assert_eq!(n, 0);

    for _ in 0..100 {
        if ctx.clients.read().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client was never unregistered");
}
