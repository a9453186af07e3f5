mod cli;
mod clock;
mod config;
mod display;
mod events;
mod record;
mod registry;
mod seed;
mod terminal;
mod ticker;
mod timespec;

use anyhow::{anyhow, Result};
use clap::Parser;
use clock::Clock;
use std::cell::RefCell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "countboard",
    about = "Live countdown board for time-windowed sessions"
)]
pub struct Args {
    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Records file (TOML) to load at startup")]
    pub records: Option<PathBuf>,

    #[arg(long, help = "Start with the built-in demo records")]
    pub demo: bool,

    #[arg(long, help = "Print the table once and exit")]
    pub once: bool,

    #[arg(short, long, help = "Open the live view instead of the REPL")]
    pub watch: bool,

    #[arg(
        long,
        value_name = "N",
        help = "Leave the live view after N ticks (the first draw counts)"
    )]
    pub ticks: Option<u64>,

    #[arg(
        long,
        env = "COUNTBOARD_INTERVAL_MS",
        value_name = "MS",
        help = "Tick interval in milliseconds (default: 1000)"
    )]
    pub interval_ms: Option<u64>,

    #[arg(
        long,
        value_name = "TIME",
        help = "Freeze the clock at this time (e.g. '2024-01-01 12:00')"
    )]
    pub at: Option<String>,

    #[arg(long, help = "Disable state colors")]
    pub no_color: bool,

    #[arg(long, help = "Write a JSONL event log to this directory")]
    pub events_dir: Option<PathBuf>,

    #[arg(long, help = "Enable tracing of record and state changes")]
    pub trace: bool,

    #[arg(long, help = "Debug output (print resolved settings)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI overrides
    if args.interval_ms.is_some() {
        cfg.tick.interval_ms = args.interval_ms;
    }
    if args.no_color {
        cfg.display.color = Some(false);
    }
    if let Some(dir) = &args.events_dir {
        cfg.events.enabled = Some(true);
        cfg.events.dir = Some(dir.clone());
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error {}", error);
        }
        return Err(anyhow!("Invalid configuration ({} errors)", errors.len()));
    }

    if args.debug {
        eprintln!("[DEBUG] Tick interval: {:?}", cfg.tick_interval());
        eprintln!("[DEBUG] Color: {}", cfg.color_enabled());
        eprintln!("[DEBUG] Table style: {:?}", cfg.table_style());
        eprintln!(
            "[DEBUG] Records file: {:?}",
            args.records.as_ref().or(cfg.records_file.as_ref())
        );
        if cfg.events_enabled() {
            eprintln!("[DEBUG] Events dir: {:?}", cfg.events_dir());
        }
    }

    let clock: Box<dyn clock::Clock> = match &args.at {
        Some(at) => {
            let now = clock::SystemClock.now();
            let frozen = timespec::parse(at, now)?
                .ok_or_else(|| anyhow!("--at needs a time, got '{}'", at))?;
            Box::new(clock::FixedClock::new(frozen))
        }
        None => Box::new(clock::SystemClock),
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut events = if cfg.events_enabled() {
        Some(events::EventLog::in_dir(&cfg.events_dir(), &session_id)?)
    } else {
        None
    };

    if let Some(log) = events.as_mut() {
        log.session_start(cfg.tick_interval())?;
    }

    let records_file = args.records.clone().or_else(|| cfg.records_file.clone());
    let trace = args.trace;
    let ctx = cli::Context {
        args,
        config: cfg,
        session_id,
        clock,
        registry: RefCell::new(registry::Registry::new()),
        events: RefCell::new(events),
        tracing: RefCell::new(trace),
    };

    if let Some(path) = records_file {
        cli::add_records(&ctx, seed::load_records(&path, ctx.clock.now())?);
    }
    if ctx.args.demo {
        cli::add_records(&ctx, seed::demo_records(ctx.clock.now()));
    }
    cli::refresh(&ctx);

    if ctx.args.once {
        cli::run_once(&ctx)
    } else if ctx.args.watch {
        cli::run_watch(&ctx)
    } else {
        cli::run_repl(&ctx)
    }
}
