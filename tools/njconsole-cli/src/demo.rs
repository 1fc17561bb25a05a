//! Demo command - concurrent writers against one log history
//!
//! Spawns writer threads that log through their own channels while a
//! counting handler watches, then prints history stats and the exported
//! tail. With `--pin` the history is pinned for the whole run, so every
//! evicted entry lands in the backlog.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{Result, bail};
use clap::Args;
use tracing_subscriber::layer::SubscriberExt;

use njconsole_core::{
    Color, ExternalLogLayer, LogChannel, LogEntry, LogHandler, Logger, TaggedValue,
    config, export_as_text, nj_debug, nj_info, nj_warn,
};

/// Arguments for the demo command
#[derive(Args)]
pub struct DemoArgs {
    /// Number of writer threads
    #[arg(short, long, default_value_t = 4)]
    pub threads: usize,

    /// Messages logged by each thread
    #[arg(short = 'n', long, default_value_t = 250)]
    pub per_thread: usize,

    /// History capacity (overrides the config file)
    #[arg(short, long)]
    pub capacity: Option<usize>,

    /// Keep evicted entries in the backlog for the whole run
    #[arg(long)]
    pub pin: bool,

    /// Also capture a few `tracing` events as external entries
    #[arg(long)]
    pub capture_tracing: bool,

    /// Number of newest entries to print
    #[arg(long, default_value_t = 20)]
    pub tail: usize,

    /// Config file to use instead of the platform config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Counts what the logger dispatches
#[derive(Default)]
struct CountingHandler {
    entries: AtomicUsize,
    exceptions: AtomicUsize,
}

impl LogHandler for CountingHandler {
    fn on_log(&self, _index: usize, _entry: &LogEntry) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_exception(&self, _error: &(dyn Error + Send + Sync + 'static), _entry: &LogEntry) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct ChecksumMismatch {
    frame: usize,
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checksum mismatch at frame {}", self.frame)
    }
}

impl Error for ChecksumMismatch {}

/// Execute the demo command
pub fn execute(args: DemoArgs) -> Result<()> {
    if args.threads == 0 {
        bail!("--threads must be at least 1");
    }

    let mut log_config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    if let Some(capacity) = args.capacity {
        log_config.history_capacity = capacity;
    }
    log_config.validate()?;

    let logger = Arc::new(Logger::new(&log_config));
    let counter = Arc::new(CountingHandler::default());
    logger.add_handler(counter.clone());

    let pin = args.pin.then(|| logger.history().pin());

    println!(
        "Logging {} messages from {} threads (capacity {}, pinned: {})",
        args.threads * args.per_thread,
        args.threads,
        logger.history().capacity(),
        args.pin
    );

    thread::scope(|scope| {
        for t in 0..args.threads {
            let logger = &logger;
            let per_thread = args.per_thread;
            scope.spawn(move || write_messages(logger, t, per_thread));
        }
    });

    if args.capture_tracing {
        let subscriber =
            tracing_subscriber::registry().with(ExternalLogLayer::new(Arc::clone(&logger)));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "demo::host", writers = args.threads, "writers finished");
            tracing::warn!(target: "demo::host", "host warning captured as external entry");
        });
    }

    let stats = logger.history().stats();
    println!();
    println!("History");
    println!("  capacity:       {}", stats.capacity);
    println!("  head:           {}", stats.head);
    println!("  first visible:  {}", stats.first_visible_index);
    println!("  visible:        {}", stats.visible_count);
    println!("  backlog:        {} ({} locks)", stats.backlog_len, stats.backlog_locks);
    println!("Handler");
    println!("  entries:        {}", counter.entries.load(Ordering::Relaxed));
    println!("  exceptions:     {}", counter.exceptions.load(Ordering::Relaxed));
    println!();
    println!("Newest {} entries:", args.tail);
    print!("{}", export_as_text(logger.history(), Some(args.tail)));

    drop(pin);
    Ok(())
}

fn write_messages(logger: &Logger, thread: usize, count: usize) {
    let channel = LogChannel::with_logger(format!("worker-{thread}"), logger);
    for n in 0..count {
        nj_debug!(channel, "tick", n);
        if n % 100 == 99 {
            channel.exception(
                Arc::new(ChecksumMismatch { frame: n }),
                [TaggedValue::from("rollback failed")],
            );
        } else if n % 25 == 24 {
            nj_warn!(channel, Color::YELLOW, "slow frame", n, 17.8f32);
        } else {
            nj_info!(channel, "frame", TaggedValue::from(n * 1000).grouped(), "ok");
        }
    }
}
