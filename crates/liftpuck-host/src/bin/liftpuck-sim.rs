use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use liftpuck_core::{Device, Inbox, Parts, TransportId};
use liftpuck_host::{links, load_config, FsStorage, HostPlatform, SimSensor};
use tracing_subscriber::EnvFilter;

static INBOX: Inbox = Inbox::new();

#[derive(Parser)]
#[command(author, version, about = "Run the lift-tracking puck against simulated hardware")]
struct Args {
    /// Directory standing in for the SD card
    #[arg(short, long, default_value = "./puck-data")]
    data_dir: PathBuf,

    /// Address the phone connects to
    #[arg(long, default_value = "127.0.0.1:7400")]
    wireless: SocketAddr,

    /// Address the file stream receiver connects to
    #[arg(long, default_value = "127.0.0.1:7401")]
    secondary: SocketAddr,

    /// Control cycle period in milliseconds
    #[arg(long, default_value_t = 20)]
    period_ms: u64,

    /// Time the simulated IMU takes to calibrate, in milliseconds
    #[arg(long, default_value_t = 3_000)]
    warmup_ms: u64,

    /// JSON config overriding the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())
        .with_context(|| format!("reading config {:?}", args.config))?;
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating {}", args.data_dir.display()))?;

    let parts = Parts::<HostPlatform> {
        storage: FsStorage::new(&args.data_dir),
        sensor: SimSensor::new(Duration::from_millis(args.warmup_ms)),
        wireless: links::spawn_tcp(args.wireless, TransportId::Wireless, &INBOX).await?,
        wired: links::spawn_stdio(&INBOX).await,
        secondary: links::spawn_tcp(args.secondary, TransportId::Secondary, &INBOX).await?,
    };

    let started = Instant::now();
    let mut device = Device::new(config, parts, &INBOX, 0);
    let mut ticker = tokio::time::interval(Duration::from_millis(args.period_ms.max(1)));
    let mut tared = false;
    let mut last_screen = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        let now_ms = started.elapsed().as_millis() as u64;
        let screen = device.poll(now_ms);

        if !tared && device.context().state.is_ready() {
            if let Some(offsets) = device.tare() {
                tracing::info!(?offsets, "tared");
                tared = true;
            }
        }
        if last_screen.as_ref().map(std::mem::discriminant) != Some(std::mem::discriminant(&screen)) {
            tracing::debug!(?screen, "screen");
            last_screen = Some(screen);
        }
    }

    let dropped = INBOX.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, "inbound events dropped");
    }
    let now_ms = started.elapsed().as_millis() as u64;
    let ctx = device.context_mut();
    if ctx.store.is_active() {
        let wall_ms = ctx.wall_ms(now_ms);
        match ctx.store.end_session(wall_ms) {
            Ok(entry) => tracing::info!(name = %entry.name, "open session closed on exit"),
            Err(e) => tracing::error!("closing session on exit: {e}"),
        }
    }
    Ok(())
}
