use std::sync::Arc;

use skinhelper_daemon::monitor::PlaybackMonitor;
use skinhelper_daemon::rpc::{self, LibraryMetadata, RpcHost, RpcLibrary};
use skinhelper_daemon::socket::{self, ServerContext};
use skinhelper_proto::config::Config;
use skinhelper_proto::media::HostNotification;
use skinhelper_proto::properties::PropertyStore;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A tracing layer that forwards WARN and ERROR lines to socket clients
struct BroadcastLayer {
    sender: broadcast::Sender<String>,
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // no receivers is fine
        let _ = self.sender.send(message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let (log_tx, _) = broadcast::channel::<String>(100);

    // Setup file logging + broadcast layer
    let log_path = config.logging.file.clone();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer {
            sender: log_tx.clone(),
        })
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .init();

    info!("Log file: {:?}", log_path);
    info!("Config loaded from: {:?}", Config::config_path());

    let abort = CancellationToken::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                abort.cancel();
            }
        });
    }

    // Host notifications funnel into the monitor
    let (notify_tx, notify_rx) = tokio::sync::mpsc::channel::<HostNotification>(256);
    let rpc = rpc::connect(
        &config.host.address,
        config.host.request_timeout(),
        notify_tx,
    )
    .await?;

    let host = Arc::new(RpcHost::new(rpc.clone()));
    let library = Arc::new(RpcLibrary::new(rpc.clone()));
    let metadata = Arc::new(LibraryMetadata::new(rpc));
    let store = Arc::new(PropertyStore::new());

    if config.server.enabled {
        let ctx = Arc::new(ServerContext {
            store: store.clone(),
            host: host.clone(),
            library: library.clone(),
            search_poll: config.search.poll_interval(),
            abort: abort.clone(),
            log_tx,
            clients: RwLock::new(Vec::new()),
        });
        let _socket_handle =
            socket::start_server(config.server.bind_address.clone(), config.server.port, ctx);
    }

    let monitor = PlaybackMonitor::new(
        host,
        metadata,
        library,
        store,
        config.monitor.clone(),
        abort.clone(),
    );

    info!("Daemon initialised, running notification loop");
    monitor.run(notify_rx).await;
    abort.cancel();

    Ok(())
}
