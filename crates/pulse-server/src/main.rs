use anyhow::Result;
use clap::Parser;
use pulse_bridge::{MessageBridge, PassthroughRelay, WindowedAggregator};
use pulse_core::session::Session;
use pulse_server::config::{AppConfig, BridgeMode};
use pulse_shutdown::SignalHandler;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Windowed pub/sub bridge", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// The key expression to publish onto
    #[arg(short = 'k', long = "key")]
    pub_key: Option<String>,

    /// Key expression to subscribe to
    #[arg(short = 's', long)]
    sub_key: Option<String>,

    /// Window interval in seconds
    #[arg(short, long)]
    interval: Option<f64>,

    /// Bridge mode
    #[arg(long, value_enum)]
    mode: Option<BridgeMode>,

    /// Add matching listener
    #[arg(long)]
    add_matching_listener: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    init_tracing(&config.logging.level);
    info!(config_path = %args.config, "Starting pulse bridge");

    if config.metrics.enabled {
        pulse_server::metrics::init_metrics(config.metrics.listen.parse()?)?;
    }

    let session = Session::open(config.bus.capacity);

    info!(topic = %config.bridge.pub_key, "Declaring publisher");
    let publisher = session.declare_publisher(config.bridge.pub_key.as_str());

    if config.bridge.matching_listener {
        let mut listener = publisher.matching_listener();
        tokio::spawn(async move {
            while listener.changed().await.is_ok() {
                if *listener.borrow() {
                    info!("Publisher has matching subscribers");
                } else {
                    info!("Publisher has no more matching subscribers");
                }
            }
        });
    }

    info!(topic = %config.bridge.sub_key, "Declaring subscriber");
    let subscriber = session.declare_subscriber(config.bridge.sub_key.as_str());

    let handler = SignalHandler::new();

    let bridge: Arc<dyn MessageBridge> = match config.bridge.mode {
        BridgeMode::Average => {
            let aggregator = Arc::new(WindowedAggregator::new(publisher));
            let runner = aggregator.clone();
            let shutdown_rx = handler.subscribe();
            let period = Duration::from_secs_f64(config.bridge.interval_secs);
            tokio::spawn(async move {
                runner.run(period, shutdown_rx).await;
            });
            aggregator
        }
        BridgeMode::Relay => Arc::new(PassthroughRelay::new(
            publisher,
            config.bridge.relay_prefix.clone(),
        )),
    };

    let forward_task = tokio::spawn(pulse_server::forward(
        subscriber,
        bridge,
        handler.subscribe(),
    ));

    info!("Bridge is running. Press CTRL-C to quit");
    let signal = handler.listen().await;
    info!(signal = ?signal, "Shutting down");

    session.close();
    let _ = forward_task.await;

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(key) = &args.pub_key {
        config.bridge.pub_key = key.clone();
    }
    if let Some(key) = &args.sub_key {
        config.bridge.sub_key = key.clone();
    }
    if let Some(interval) = args.interval {
        config.bridge.interval_secs = interval;
    }
    if let Some(mode) = args.mode {
        config.bridge.mode = mode;
    }
    if args.add_matching_listener {
        config.bridge.matching_listener = true;
    }
}

fn init_tracing(level: &str) {
    // RUST_LOG 优先，其次用配置里的级别
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
