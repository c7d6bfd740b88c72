use crate::host::{check, Host, HostCommand, LibraryAccessor};
use crate::input::{SearchInputController, SearchView};
use crate::search::SearchEngine;
use skinhelper_proto::properties::{PropertyChange, PropertyStore};
use skinhelper_proto::protocol::{Broadcast, Command, FrameError, Message, PROTOCOL_VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct ClientHandle {
    pub id: usize,
}

/// Everything a client connection needs.
pub struct ServerContext {
    pub store: Arc<PropertyStore>,
    pub host: Arc<dyn Host>,
    pub library: Arc<dyn LibraryAccessor>,
    pub search_poll: Duration,
    pub abort: CancellationToken,
    /// Formatted WARN/ERROR log lines forwarded to clients.
    pub log_tx: broadcast::Sender<String>,
    pub clients: RwLock<Vec<ClientHandle>>,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    ctx: Arc<ServerContext>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind TCP socket {}: {}", addr, e);
                return;
            }
        };

        info!("TCP server listening at {}", addr);
        accept_loop(listener, ctx).await;
    })
}

/// Accept clients on an already bound listener until the abort token fires.
pub async fn accept_loop(listener: TcpListener, ctx: Arc<ServerContext>) {
    let mut client_id = 0usize;

    loop {
        let accepted = tokio::select! {
            _ = ctx.abort.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                client_id += 1;
                let id = client_id;

                let client_count = {
                    let mut guard = ctx.clients.write().await;
                    guard.push(ClientHandle { id });
                    guard.len()
                };
                info!("Client {} connected from {} ({} connected)", id, peer, client_count);

                let ctx = ctx.clone();
                tokio::spawn(async move {
                    handle_client(stream, &ctx, id).await;

                    let client_count = {
                        let mut guard = ctx.clients.write().await;
                        guard.retain(|c| c.id != id);
                        guard.len()
                    };
                    info!("Client {} disconnected ({} connected)", id, client_count);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: TcpStream, ctx: &ServerContext, client_id: usize) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut tmp = [0u8; 4096];
    let mut read_buf: Vec<u8> = Vec::new();

    // Subscribe before the snapshot so no change falls between the two
    let mut changes_rx = ctx.store.subscribe();
    let mut log_rx = ctx.log_tx.subscribe();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Broadcast>();
    let mut session: Option<SearchInputController<RemoteSearchView>> = None;

    // Send Hello with the current property snapshot on connect
    if let Ok(encoded) = encode_hello(&ctx.store).await {
        if write_half.write_all(&encoded).await.is_err() {
            return;
        }
    }

    'conn: loop {
        let outgoing = tokio::select! {
            _ = ctx.abort.cancelled() => break,

            result = read_half.read(&mut tmp) => {
                match result {
                    Ok(0) => {
                        info!("Client {} closed connection", client_id);
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&tmp[..n]);

                        loop {
                            match Message::decode(&read_buf) {
                                Ok((Message::Command(cmd), consumed)) => {
                                    read_buf.drain(..consumed);
                                    debug!("Client {} sent command: {:?}", client_id, cmd);
                                    handle_command(cmd, ctx, &mut session, &out_tx).await;
                                }
                                Ok((_, consumed)) => {
                                    read_buf.drain(..consumed);
                                }
                                Err(FrameError::Incomplete) => break,
                                Err(FrameError::Invalid { len, source }) => {
                                    read_buf.drain(..len);
                                    warn!(
                                        "Client {} sent an undecodable frame: {}",
                                        client_id, source
                                    );
                                    let _ = out_tx.send(Broadcast::Error {
                                        message: format!("undecodable command: {}", source),
                                    });
                                }
                                Err(e @ FrameError::TooLarge(_)) => {
                                    warn!("Client {}: {}, closing connection", client_id, e);
                                    break 'conn;
                                }
                            }
                        }
                        continue;
                    }
                    Err(e) => {
                        error!("Read error from client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            change = changes_rx.recv() => {
                match change {
                    Ok(PropertyChange::Set { key, value }) => Broadcast::PropertySet { key, value },
                    Ok(PropertyChange::Cleared { key }) => Broadcast::PropertyCleared { key },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} missed {} property changes", client_id, n);
                        Broadcast::Properties {
                            rev: ctx.store.rev(),
                            properties: ctx.store.snapshot().await,
                        }
                    }
                    Err(_) => break,
                }
            }

            line = log_rx.recv() => {
                match line {
                    Ok(message) => Broadcast::Log { message },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }

            Some(msg) = out_rx.recv() => msg,
        };

        match Message::Broadcast(outgoing).encode() {
            Ok(encoded) => {
                if write_half.write_all(&encoded).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Client {}: failed to encode message: {}", client_id, e),
        }
    }

    // Dropping the controller stops its search worker
    drop(session);
}

async fn handle_command(
    cmd: Command,
    ctx: &ServerContext,
    session: &mut Option<SearchInputController<RemoteSearchView>>,
    out_tx: &mpsc::UnboundedSender<Broadcast>,
) {
    match cmd {
        Command::GetProperties => {
            let _ = out_tx.send(Broadcast::Properties {
                rev: ctx.store.rev(),
                properties: ctx.store.snapshot().await,
            });
            return;
        }
        Command::OpenSearch => {
            if let Some(mut old) = session.take() {
                old.close();
            }
            *session = Some(open_search(ctx, out_tx.clone()));
            return;
        }
        _ => {}
    }

    let Some(controller) = session.as_mut() else {
        let _ = out_tx.send(Broadcast::Error {
            message: "no search session open".to_string(),
        });
        return;
    };
    match cmd {
        Command::SearchAction {
            action_id,
            button_code,
        } => controller.on_action(action_id, button_code),
        Command::SearchClick { control_id } => controller.on_click(control_id),
        Command::SearchText { text } => controller.set_text(&text),
        Command::CloseSearch => controller.close(),
        Command::GetProperties | Command::OpenSearch => {}
    }
    if controller.is_closed() {
        *session = None;
    }
}

fn open_search(
    ctx: &ServerContext,
    out_tx: mpsc::UnboundedSender<Broadcast>,
) -> SearchInputController<RemoteSearchView> {
    let (engine, _worker) = SearchEngine::spawn(ctx.library.clone(), ctx.search_poll, &ctx.abort);

    // Forward result sets until the worker goes away
    let mut results = engine.results();
    let results_tx = out_tx.clone();
    tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let latest = results.borrow_and_update().clone();
            if results_tx.send(Broadcast::SearchResults { results: latest }).is_err() {
                break;
            }
        }
    });

    let view = RemoteSearchView {
        out: out_tx,
        host: ctx.host.clone(),
    };
    SearchInputController::new(view, engine)
}

/// Search view living on the other end of a client connection.
pub struct RemoteSearchView {
    out: mpsc::UnboundedSender<Broadcast>,
    host: Arc<dyn Host>,
}

impl RemoteSearchView {
    fn send(&self, msg: Broadcast) {
        let _ = self.out.send(msg);
    }
}

impl SearchView for RemoteSearchView {
    fn set_query_label(&self, text: &str) {
        self.send(Broadcast::SearchLabel {
            text: text.to_string(),
        });
    }

    fn set_focus(&self, control_id: i32) {
        self.send(Broadcast::SearchFocus { control_id });
    }

    fn request_text(&self) {
        self.send(Broadcast::PromptText);
    }

    fn show_item_info(&self, control_id: i32) {
        self.send(Broadcast::ShowInfo { control_id });
    }

    fn dismiss_shutdown_dialog(&self) {
        let host = self.host.clone();
        tokio::spawn(async move {
            if check(host.as_ref(), "Window.IsVisible(10111)").await {
                if let Err(e) = host.execute(HostCommand::CloseDialog).await {
                    debug!("host: closing shutdown dialog failed: {:#}", e);
                }
            }
        });
    }

    fn close(&self) {
        self.send(Broadcast::SearchClosed);
    }
}

async fn encode_hello(store: &PropertyStore) -> anyhow::Result<Vec<u8>> {
    Message::Broadcast(Broadcast::Hello {
        protocol_version: PROTOCOL_VERSION,
        rev: store.rev(),
        properties: store.snapshot().await,
    })
    .encode()
}
