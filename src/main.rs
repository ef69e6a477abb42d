//! Ringway demo - a three stage trade pipeline
//!
//! Journalling and risk checks run in parallel on every trade; settlement
//! waits for both before it books the trade.

use anyhow::Context;
use clap::Parser;
use ringway::disruptor::{
    DefaultEventFactory, Disruptor, DisruptorConfig, EventHandler, Result, TokioExecutor,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ringway")]
#[command(about = "Runs a diamond-shaped Disruptor pipeline and reports its throughput")]
#[command(version)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trades to publish
    #[arg(short, long, default_value = "1000000")]
    events: u64,

    /// Run processors on a tokio blocking pool instead of dedicated threads
    #[arg(long)]
    tokio: bool,

    /// Seconds to wait for the pipeline to drain
    #[arg(long, default_value = "30")]
    drain_timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default)]
struct Trade {
    id: u64,
    price: i64,
    quantity: i64,
}

#[derive(Debug, Default)]
struct Totals {
    journalled: AtomicU64,
    rejected: AtomicU64,
    settled: AtomicU64,
    notional: AtomicI64,
}

struct JournalHandler {
    totals: Arc<Totals>,
    pending: u64,
    last_trade_id: Option<u64>,
}

impl EventHandler<Trade> for JournalHandler {
    fn on_event(&mut self, trade: &Trade, _sequence: i64, end_of_batch: bool) -> Result<()> {
        self.pending += 1;
        self.last_trade_id = Some(trade.id);
        if end_of_batch {
            self.totals.journalled.fetch_add(self.pending, Ordering::Relaxed);
            self.pending = 0;
        }
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<()> {
        info!(last_trade_id = ?self.last_trade_id, "journal closed");
        Ok(())
    }
}

struct RiskHandler {
    totals: Arc<Totals>,
}

impl EventHandler<Trade> for RiskHandler {
    fn on_event(&mut self, trade: &Trade, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        if trade.quantity <= 0 {
            self.totals.rejected.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

struct SettlementHandler {
    totals: Arc<Totals>,
}

impl EventHandler<Trade> for SettlementHandler {
    fn on_event(&mut self, trade: &Trade, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        if trade.quantity > 0 {
            self.totals
                .notional
                .fetch_add(trade.price * trade.quantity, Ordering::Relaxed);
            self.totals.settled.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<()> {
        info!(settled = self.totals.settled.load(Ordering::Relaxed), "settlement stopped");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => DisruptorConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => DisruptorConfig::default(),
    };
    info!(?config, events = args.events, tokio = args.tokio, "starting ringway demo");

    // Declared before the disruptor so processors are halted before the
    // runtime waits for its blocking pool.
    let runtime = if args.tokio {
        Some(
            tokio::runtime::Builder::new_multi_thread()
                .thread_name("ringway-tokio")
                .build()?,
        )
    } else {
        None
    };

    let mut disruptor = match &runtime {
        Some(runtime) => {
            let mut disruptor = Disruptor::new(
                DefaultEventFactory::<Trade>::new(),
                config.buffer_size,
                config.producer_type,
                config.build_wait_strategy(),
                Arc::new(TokioExecutor::new(runtime.handle().clone())),
            )?;
            if let Some(timeout) = config.processor_timeout() {
                disruptor.set_processor_timeout(timeout);
            }
            disruptor
        }
        None => Disruptor::from_config(&config, DefaultEventFactory::<Trade>::new())?,
    };

    let totals = Arc::new(Totals::default());
    let journal = disruptor
        .handle_events_with(JournalHandler {
            totals: Arc::clone(&totals),
            pending: 0,
            last_trade_id: None,
        })?
        .handler_ids()
        .to_vec();
    let risk = disruptor
        .handle_events_with(RiskHandler {
            totals: Arc::clone(&totals),
        })?
        .handler_ids()
        .to_vec();
    disruptor
        .after(&journal)?
        .and(&risk)?
        .handle_events_with(SettlementHandler {
            totals: Arc::clone(&totals),
        })?;

    let ring_buffer = disruptor.start()?;
    let started = Instant::now();
    for id in 0..args.events {
        ring_buffer.publish_with(|trade, _sequence| {
            trade.id = id;
            trade.price = 100 + (id % 7) as i64;
            trade.quantity = (id % 10) as i64;
        })?;
    }
    disruptor.shutdown(Duration::from_secs(args.drain_timeout))?;
    let elapsed = started.elapsed();

    let per_second = args.events as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        events = args.events,
        elapsed_ms = elapsed.as_millis() as u64,
        per_second = per_second as u64,
        journalled = totals.journalled.load(Ordering::Relaxed),
        rejected = totals.rejected.load(Ordering::Relaxed),
        settled = totals.settled.load(Ordering::Relaxed),
        notional = totals.notional.load(Ordering::Relaxed),
        "pipeline drained"
    );

    Ok(())
}

/// Initialize logging based on the specified level
fn init_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}
