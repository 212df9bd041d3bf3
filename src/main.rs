//! Adaptive Scanner - Main Entry Point
//!
//! Runs budgeted scan passes against a rate-limited market-data API, or
//! inspects persisted scanner state.

use adaptive_scanner::budget::{BudgetLedger, ScanBudget, UsageMonitor};
use adaptive_scanner::cache::TtlCache;
use adaptive_scanner::config::{Config, EngineKind};
use adaptive_scanner::persistence::PersistenceManager;
use adaptive_scanner::provider::{
    FieldSignalEngine, HttpProvider, MarketDataProvider, MockProvider, MockSignalEngine,
    SignalEngine,
};
use adaptive_scanner::scan::ScanRunner;
use adaptive_scanner::schedule::{Clock, SystemClock};
use adaptive_scanner::universe::{load_universe, DuiHandle};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Adaptive Scanner CLI
#[derive(Parser)]
#[command(name = "adaptive-scanner")]
#[command(version, about = "Budgeted market scanning with dynamic universe promotion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan loop (default)
    Run {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,

        /// Use the offline mock provider and mock signal engine
        #[arg(long)]
        mock: bool,
    },

    /// Show today's budget usage from persisted state
    Status {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/scanner_state.db")]
        db: String,
    },

    /// List active dynamic universe promotions
    Promotions {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/scanner_state.db")]
        db: String,
    },

    /// Print the window schedule and the current window
    Windows,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Run { once, mock }) => run(once, mock).await,
        Some(Commands::Status { db }) => show_status(&db),
        Some(Commands::Promotions { db }) => show_promotions(&db),
        Some(Commands::Windows) => show_windows(),
        None => run(false, false).await,
    }
}

async fn run(once: bool, mock: bool) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║            Adaptive Scanner v{}                          ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;
    log_config(&config);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calendar = config.calendar.trading_calendar()?;
    let schedule = config.window_schedule()?;

    // The ledger snapshot and the actor each hold their own connection
    let persistence = PersistenceManager::new(&config.persistence.db_path)?;
    let dui_store = PersistenceManager::new(&config.persistence.db_path)?;

    let ledger = BudgetLedger::new(
        config.budget.clone(),
        schedule,
        calendar.clone(),
        clock.clone(),
    );
    let budget = Arc::new(ScanBudget::new(
        ledger,
        UsageMonitor::new(config.budget.warn_ratio(), config.budget.critical_ratio()),
        clock.clone(),
    ));

    match persistence.load_ledger_snapshot()? {
        Some(snapshot) => {
            let date = snapshot.date;
            if budget.restore(snapshot).await? {
                info!(%date, "📂 [PERSISTENCE] Restored today's budget ledger");
            } else {
                info!(%date, "📂 [PERSISTENCE] Ignoring ledger snapshot from a previous day");
            }
        }
        None => info!("📂 [PERSISTENCE] No ledger snapshot found, starting fresh"),
    }

    let (universe, universe_task) = DuiHandle::spawn(
        config.dui.clone(),
        calendar.clone(),
        Some(dui_store),
        clock.clone(),
    )?;

    let (provider, engine): (Arc<dyn MarketDataProvider>, Arc<dyn SignalEngine>) = if mock {
        info!("📝 MOCK MODE - synthetic market data");
        (
            Arc::new(MockProvider::with_clock(clock.clone())),
            Arc::new(MockSignalEngine::new(clock.clone())),
        )
    } else {
        if config.provider.api_key.is_empty() {
            warn!("⚠️  No API key configured, requests will be unauthenticated");
        }
        let engine: Arc<dyn SignalEngine> = match config.engine.kind {
            EngineKind::Field => {
                info!(bindings = config.engine.fields.len(), "Scoring live payloads by field");
                Arc::new(FieldSignalEngine::new(config.engine.fields.clone(), clock.clone()))
            }
            EngineKind::Mock => {
                warn!(
                    "⚠️  Live data scored by the mock engine: payloads without a `score` \
                     field yield no signals, promotions or confirmations"
                );
                Arc::new(MockSignalEngine::new(clock.clone()))
            }
        };
        (Arc::new(HttpProvider::new(&config.provider)?), engine)
    };

    let cache = Arc::new(TtlCache::new(config.cache.clone(), clock.clone()));
    let runner = ScanRunner::new(
        config.scan.clone(),
        &config.priority,
        &config.dui,
        provider,
        engine,
        budget.clone(),
        cache.clone(),
        universe.clone(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting scan loop...");

    let mut pass_count: u64 = 0;
    let mut ledger_date = calendar.local_date(clock.now());

    while !shutdown.load(Ordering::SeqCst) {
        let today = calendar.local_date(clock.now());
        if today != ledger_date {
            budget.reset(today).await;
            ledger_date = today;
        }

        let discovery = config.scan.discovery_every_passes > 0
            && pass_count % config.scan.discovery_every_passes == 0;
        pass_count += 1;

        match runner.run_pass(discovery).await {
            Ok(report) => {
                if !report.promoted.is_empty() || !report.confirmed.is_empty() {
                    info!(
                        promoted = ?report.promoted,
                        confirmed = ?report.confirmed,
                        expired = ?report.expired,
                        "🧭 [DUI] Universe changed"
                    );
                }
            }
            Err(e) => error!("❌ [SCAN] Pass #{} failed: {:#}", pass_count, e),
        }

        if let Err(e) = persistence.save_ledger_snapshot(&budget.snapshot().await) {
            error!("❌ [PERSISTENCE] Failed to save ledger snapshot: {:#}", e);
        }

        let purged = cache.purge_expired();
        if purged > 0 {
            info!(purged, remaining = cache.len(), "Purged expired cache entries");
        }

        if once {
            break;
        }

        // Sleep in short steps so shutdown stays responsive
        for _ in 0..config.scan.pass_interval_secs {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    info!("💾 Saving state before exit...");
    persistence.save_ledger_snapshot(&budget.snapshot().await)?;
    universe.shutdown().await?;
    universe_task.await.context("Dynamic universe actor panicked")?;

    let status = budget.status().await;
    info!(
        daily_used = status.daily_used,
        daily_limit = status.daily_limit,
        passes = pass_count,
        "👋 Adaptive scanner stopped"
    );

    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "adaptive-scanner.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("adaptive_scanner=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Daily Limit: {} calls", config.budget.daily_limit);
    info!(
        "   Cooldowns: P1 {}s / P2 {}s / P3 {}s",
        config.budget.cooldown_secs.p1,
        config.budget.cooldown_secs.p2,
        config.budget.cooldown_secs.p3
    );
    info!(
        "   Ticker Caps: P1 {} / P2 {} / P3 {} (force {})",
        config.budget.max_calls_per_ticker.p1,
        config.budget.max_calls_per_ticker.p2,
        config.budget.max_calls_per_ticker.p3,
        config.budget.force_scan_max_calls_per_ticker
    );
    info!(
        "   Tier Thresholds: P1 >= {} / P2 >= {}",
        config.priority.p1_score_threshold, config.priority.p2_score_threshold
    );
    info!(
        "   Promotion: score >= {}, TTL {} trading days, max {}",
        config.dui.min_score_for_promotion, config.dui.ttl_trading_days, config.dui.max_set_size
    );
    info!(
        "   Universe: {} static, {} discovery, concurrency {}",
        config.scan.universe.len(),
        config.scan.discovery_universe.len(),
        config.scan.concurrency
    );
    info!(
        "   Confirmation: {} with score >= {}",
        config.dui.confirmation_engine, config.dui.confirmation_min_score
    );
    info!(
        "   Calendar: {} ({} holidays)",
        config.calendar.timezone,
        if config.calendar.exchange_holidays { "exchange" } else { "configured" }
    );
}

/// Show today's budget usage from the persisted ledger snapshot.
fn show_status(db_path: &str) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              SCAN BUDGET STATUS                            ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The scanner has not been started yet, or the database path is incorrect.");
        return Ok(());
    }

    let config = Config::load()?;
    let persistence = PersistenceManager::new(db_path)?;

    let Some(snapshot) = persistence.load_ledger_snapshot()? else {
        println!("\n❌ No ledger snapshot found in database.");
        return Ok(());
    };

    let calendar = config.calendar.trading_calendar()?;
    let today = calendar.local_date(Utc::now());
    let limit = config.budget.daily_limit;
    let pct = if limit > 0 {
        snapshot.calls_today as f64 / limit as f64 * 100.0
    } else {
        0.0
    };

    println!("\n📊 Daily Budget ({})", snapshot.date);
    if snapshot.date != today {
        println!("   ⚠️  Snapshot is from a previous day; today's ledger starts empty");
    }
    println!("   ├─ Used:       {} / {} ({:.1}%)", snapshot.calls_today, limit, pct);
    println!("   ├─ Remaining:  {}", limit.saturating_sub(snapshot.calls_today));
    println!("   └─ Tickers:    {}", snapshot.call_count_today.len());

    let schedule = config.window_schedule()?;
    println!("\n🕐 Window Usage");
    for (window, used) in &snapshot.calls_by_window {
        println!(
            "   ├─ {:<14} {:>6} / {}",
            window.as_str(),
            used,
            schedule.budget(*window).total
        );
    }

    let mut tickers: Vec<(&String, &u32)> = snapshot.call_count_today.iter().collect();
    tickers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !tickers.is_empty() {
        println!("\n🔥 Most Scanned");
        for (symbol, calls) in tickers.into_iter().take(10) {
            println!("   ├─ {:<8} {}", symbol, calls);
        }
    }

    Ok(())
}

/// List the persisted dynamic universe.
fn show_promotions(db_path: &str) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              DYNAMIC UNIVERSE                              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        return Ok(());
    }

    let config = Config::load()?;
    let calendar = config.calendar.trading_calendar()?;
    let persistence = PersistenceManager::new(db_path)?;
    let (universe, expired) =
        load_universe(config.dui, calendar, Some(&persistence), Utc::now())?;
    let entries = universe.active();

    if !expired.is_empty() {
        println!("\n   ⌛ Past TTL, dropped at next start: {}", expired.join(", "));
    }

    if entries.is_empty() {
        println!("\n   No active promotions.");
        return Ok(());
    }

    println!();
    for entry in &entries {
        println!(
            "   {} {:<8} {:<22} score {:<6} since {} (ttl {} trading days)",
            if entry.confirmed { "✅" } else { "⏳" },
            entry.symbol,
            entry.source_engine,
            entry.score,
            entry.inserted_at.format("%Y-%m-%d %H:%M UTC"),
            entry.ttl_trading_days
        );
    }
    println!("\n   {} active", entries.len());

    Ok(())
}

/// Print the window table with the current window marked.
fn show_windows() -> Result<()> {
    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;
    let calendar = config.calendar.trading_calendar()?;
    let schedule = config.window_schedule()?;

    let now = Utc::now();
    let current = schedule.window_at(calendar.local_time(now));

    println!(
        "Window schedule ({}, now {})",
        calendar.timezone(),
        calendar.local_time(now).format("%H:%M")
    );
    println!(
        "  {:<14} {:>6} {:>6} {:>6} {:>6} {:>6}",
        "window", "start", "total", "p1", "p2", "p3"
    );
    for slot in schedule.slots() {
        let marker = if slot.window == current { "▶" } else { " " };
        println!(
            "{} {:<14} {:>6} {:>6} {:>6} {:>6} {:>6}",
            marker,
            slot.window.as_str(),
            slot.start.format("%H:%M").to_string(),
            slot.total,
            slot.p1,
            slot.p2,
            slot.p3
        );
    }

    Ok(())
}
