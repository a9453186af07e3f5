use crate::{
    clock::Clock,
    config::Config,
    display::{render_plain, Screen},
    events::EventLog,
    record::Record,
    registry::{RecordId, Registry},
    seed,
    terminal::LiveViewGuard,
    ticker::Ticker,
    timespec, Args,
};
use anyhow::{anyhow, bail, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub session_id: String,
    pub clock: Box<dyn Clock>,
    pub registry: RefCell<Registry>,
    pub events: RefCell<Option<EventLog>>,
    pub tracing: RefCell<bool>,
}

fn trace(ctx: &Context, label: &str, content: &str) {
    if *ctx.tracing.borrow() {
        eprintln!("[TRACE:{}] {}", label, content);
    }
}

/// Write to the event log if one is open. Failures only warn.
fn log_event(ctx: &Context, f: impl FnOnce(&mut EventLog) -> Result<()>) {
    if let Some(log) = ctx.events.borrow_mut().as_mut() {
        if let Err(e) = f(log) {
            eprintln!("Warning: failed to write event log: {}", e);
        }
    }
}

/// Re-evaluate every record against the clock and log transitions
pub fn refresh(ctx: &Context) {
    let now = ctx.clock.now();
    let changes = ctx.registry.borrow_mut().refresh_all(now);
    for change in &changes {
        trace(
            ctx,
            "STATE",
            &format!(
                "{} {}: {} -> {}",
                change.id, change.code, change.from, change.to
            ),
        );
        log_event(ctx, |log| log.state_changed(change, now));
    }
}

/// Add records to the registry, logging each one
pub fn add_records(ctx: &Context, records: Vec<Record>) {
    for record in records {
        let id = ctx.registry.borrow_mut().add(record.clone());
        trace(ctx, "ADD", &format!("{} {}", id, record.code));
        log_event(ctx, |log| log.record_added(id, &record));
    }
}

pub fn run_once(ctx: &Context) -> Result<()> {
    refresh(ctx);
    let now = ctx.clock.now();
    print!(
        "{}",
        render_plain(&ctx.registry.borrow(), now, &ctx.config.table_style())
    );
    io::stdout().flush()?;
    Ok(())
}

pub fn run_repl(ctx: &Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("countboard - type /help for commands, /exit to quit");

    loop {
        match rl.readline("countboard> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_command(ctx, line) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Resolve a 1-based row number to a record id
fn parse_row(ctx: &Context, s: &str) -> Result<RecordId> {
    let row: usize = s
        .parse()
        .map_err(|_| anyhow!("Invalid row '{}': expected a number", s))?;
    let registry = ctx.registry.borrow();
    row.checked_sub(1)
        .and_then(|i| registry.id_at(i))
        .ok_or_else(|| anyhow!("No row {} (have {})", row, registry.len()))
}

/// Run one REPL command. Returns true when the REPL should exit.
pub fn handle_command(ctx: &Context, line: &str) -> Result<bool> {
    let words = shell_words::split(line)?;
    let Some((cmd, rest)) = words.split_first() else {
        return Ok(false);
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    match (cmd.as_str(), rest.as_slice()) {
        ("/exit" | "/quit", _) => return Ok(true),
        ("/help", _) => print_help(),
        ("/list", _) => run_once(ctx)?,
        ("/add", [code, times @ ..]) if times.len() <= 2 => {
            let now = ctx.clock.now();
            let input = match times.first() {
                Some(t) => timespec::parse(t, now)?,
                None => None,
            };
            let output = match times.get(1) {
                Some(t) => timespec::parse(t, now)?,
                None => None,
            };
            add_records(ctx, vec![Record::with_window(*code, input, output)]);
            refresh(ctx);
            println!("Added row {}", ctx.registry.borrow().len());
        }
        ("/add", _) => bail!("Usage: /add <code> [input] [output]"),
        ("/remove", [row]) => {
            let id = parse_row(ctx, row)?;
            let removed = ctx.registry.borrow_mut().remove(id);
            if let Some(record) = removed {
                trace(ctx, "REMOVE", &format!("{} {}", id, record.code));
                log_event(ctx, |log| log.record_removed(id, &record));
                println!("Removed {}", record.code);
            }
        }
        ("/remove", _) => bail!("Usage: /remove <row>"),
        ("/set", [row, field, value]) => {
            let id = parse_row(ctx, row)?;
            set_field(ctx, id, field, value)?;
            refresh(ctx);
        }
        ("/set", _) => bail!("Usage: /set <row> code|input|output <value>"),
        ("/demo", _) => {
            add_records(ctx, seed::demo_records(ctx.clock.now()));
            refresh(ctx);
            println!("Added demo records");
        }
        ("/load", [path]) => {
            let records = seed::load_records(Path::new(path), ctx.clock.now())?;
            let count = records.len();
            add_records(ctx, records);
            refresh(ctx);
            println!("Loaded {} records", count);
        }
        ("/load", _) => bail!("Usage: /load <file>"),
        ("/clear", _) => {
            let mut registry = ctx.registry.borrow_mut();
            if registry.is_empty() {
                println!("Nothing to clear");
                return Ok(false);
            }
            for (id, record) in registry.iter() {
                trace(ctx, "REMOVE", &format!("{} {}", id, record.code));
                log_event(ctx, |log| log.record_removed(id, record));
            }
            let count = registry.len();
            registry.clear();
            println!("Cleared {} records", count);
        }
        ("/watch", _) => run_watch(ctx)?,
        ("/trace", _) => {
            let mut t = ctx.tracing.borrow_mut();
            *t = !*t;
            println!("Tracing: {}", if *t { "on" } else { "off" });
        }
        ("/session", _) => {
            println!("Session: {}", ctx.session_id);
            println!("Records: {}", ctx.registry.borrow().len());
            println!("Tick interval: {:?}", ctx.config.tick_interval());
            match ctx.events.borrow().as_ref() {
                Some(log) => println!("Event log: {:?}", log.path),
                None => println!("Event log: off"),
            }
        }
        _ => println!("Unknown command: {} (try /help)", cmd),
    }
    Ok(false)
}

fn set_field(ctx: &Context, id: RecordId, field: &str, value: &str) -> Result<()> {
    let now = ctx.clock.now();
    let mut registry = ctx.registry.borrow_mut();
    let record = registry
        .get_mut(id)
        .ok_or_else(|| anyhow!("Record {} no longer exists", id))?;
    match field {
        "code" => record.set_code(value),
        "input" => record.set_input_time(timespec::parse(value, now)?),
        "output" => record.set_output_time(timespec::parse(value, now)?),
        _ => bail!("Unknown field '{}': use code, input or output", field),
    }
    let updated = registry.get(id).cloned();
    drop(registry);
    if let Some(record) = updated {
        log_event(ctx, |log| log.record_updated(id, &record));
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /exit                          - quit");
    println!("  /help                          - show commands");
    println!("  /list                          - print the table once");
    println!("  /watch                         - live view, one refresh per tick (q to leave)");
    println!("  /session                       - show session info");
    println!("  /trace                         - toggle tracing");
    println!("Records:");
    println!("  /add <code> [input] [output]   - append a record");
    println!("  /remove <row>                  - remove a record");
    println!("  /set <row> code|input|output <value>");
    println!("  /demo                          - append the demo records");
    println!("  /load <file>                   - append records from a TOML file");
    println!("  /clear                         - remove all records");
    println!("Times: 'YYYY-MM-DD HH:MM', 'DD/MM/YYYY HH:MM', 'HH:MM'");
    println!("       now, +10m, -1h, none");
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Refresh every record, redraw, and surface any draw error
fn tick<W: Write>(ctx: &Context, screen: &mut Screen<W>) -> Result<()> {
    let now = ctx.clock.now();
    let changes = ctx.registry.borrow_mut().on_tick(now, screen);
    if let Some(e) = screen.take_error() {
        return Err(e.into());
    }
    for change in &changes {
        trace(
            ctx,
            "STATE",
            &format!(
                "{} {}: {} -> {}",
                change.id, change.code, change.from, change.to
            ),
        );
        log_event(ctx, |log| log.state_changed(change, now));
    }
    Ok(())
}

/// Full-screen view refreshed once per tick until q, Esc or Ctrl-C.
///
/// Single threaded: key polling is bounded by the time to the next tick, so
/// a refresh never overlaps a mutation.
pub fn run_watch(ctx: &Context) -> Result<()> {
    let interval = ctx.config.tick_interval();
    let mut screen = Screen::new(
        io::stdout(),
        ctx.config.table_style(),
        ctx.config.palette(),
    );
    let mut ticker = Ticker::new(interval);

    log_event(ctx, |log| log.watch_start(interval));

    let ticks = {
        let _guard = LiveViewGuard::enter()?;
        watch_loop(ctx, &mut screen, &mut ticker, |wait| {
            if event::poll(wait)? {
                Ok(Some(event::read()?))
            } else {
                Ok(None)
            }
        })?
    };

    let states: Vec<_> = ctx
        .registry
        .borrow()
        .iter()
        .map(|(_, r)| r.state())
        .collect();
    log_event(ctx, |log| log.watch_stop(ticks, &states));
    trace(ctx, "WATCH", &format!("stopped after {} ticks", ticks));
    Ok(())
}

/// Draw once, then tick until a quit key or `--ticks` draws. Returns the
/// number of ticks drawn, the first one included.
///
/// `next_event` waits at most the given time for input. The ticker is polled
/// after every wait, so a steady stream of input cannot hold ticks back.
fn watch_loop<W: Write>(
    ctx: &Context,
    screen: &mut Screen<W>,
    ticker: &mut Ticker,
    mut next_event: impl FnMut(Duration) -> Result<Option<Event>>,
) -> Result<u64> {
    ticker.start(Instant::now());
    trace(
        ctx,
        "WATCH",
        &format!("{:?} every {:?}", ticker.state(), ticker.interval()),
    );
    tick(ctx, screen)?;
    let mut ticks: u64 = 1;

    loop {
        if ctx.args.ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        let wait = ticker.time_until_next(Instant::now());
        match next_event(wait)? {
            Some(Event::Key(key)) if is_quit(&key) => break,
            Some(Event::Resize(_, _)) => {
                screen.draw(&ctx.registry.borrow(), ctx.clock.now())?;
            }
            _ => {}
        }
        if ticker.poll(Instant::now()) {
            tick(ctx, screen)?;
            ticks += 1;
        }
    }

    Ok(ticks)
}
