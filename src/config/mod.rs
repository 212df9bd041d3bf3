//! Configuration management for the adaptive scanner.
//!
//! Loads settings from environment variables and config files.

use crate::budget::TickerPriority;
use crate::cache::SourceTier;
use crate::provider::DataKind;
use crate::schedule::{nyse_holidays, TradingCalendar, WindowSchedule, WindowSlot};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Daily quota, cooldowns and the window table
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Tier thresholds
    #[serde(default)]
    pub priority: PriorityConfig,
    /// Response cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,
    /// Dynamic universe promotion rules
    #[serde(default)]
    pub dui: DuiConfig,
    /// Exchange timezone and holidays
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Scan loop settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Market-data API endpoint
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Signal engine that scores fetched payloads
    #[serde(default)]
    pub engine: EngineConfig,
    /// SQLite location
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// One value per ticker priority.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierSettings<T> {
    pub p1: T,
    pub p2: T,
    pub p3: T,
}

impl<T: Copy> TierSettings<T> {
    pub fn get(&self, priority: TickerPriority) -> T {
        match priority {
            TickerPriority::P1 => self.p1,
            TickerPriority::P2 => self.p2,
            TickerPriority::P3 => self.p3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hard daily call limit of the API plan
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Grace period in which repeat calls for one symbol skip the cooldown
    /// (several data kinds fetched in one logical pass)
    #[serde(default = "default_scan_window_seconds")]
    pub scan_window_seconds: u64,
    /// Minimum seconds between scans of the same symbol, per tier
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: TierSettings<u64>,
    /// Maximum calls per symbol per day, per tier
    #[serde(default = "default_max_calls_per_ticker")]
    pub max_calls_per_ticker: TierSettings<u32>,
    /// Relaxed per-symbol cap for discovery scans
    #[serde(default = "default_force_scan_max_calls")]
    pub force_scan_max_calls_per_ticker: u32,
    /// Daily usage ratio that raises a warning alert (0.0-1.0)
    #[serde(default = "default_warn_usage_ratio")]
    pub warn_usage_ratio: Decimal,
    /// Daily usage ratio that raises a critical alert (0.0-1.0)
    #[serde(default = "default_critical_usage_ratio")]
    pub critical_usage_ratio: Decimal,
    /// Trading-day window table, sorted by start time
    #[serde(default = "WindowSchedule::default_slots")]
    pub windows: Vec<WindowSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Index ETFs that are always P1
    #[serde(default = "default_index_symbols")]
    pub index_symbols: Vec<String>,
    /// Score at or above which a symbol is a strong signal (P1)
    #[serde(default = "default_p1_score_threshold")]
    pub p1_score_threshold: Decimal,
    /// Score at or above which a symbol is being watched (P2)
    #[serde(default = "default_p2_score_threshold")]
    pub p2_score_threshold: Decimal,
    /// Minimum score move that invalidates a cached tier
    #[serde(default = "default_score_change_materiality")]
    pub score_change_materiality: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for realtime sources (quotes, flow)
    #[serde(default = "default_realtime_ttl")]
    pub realtime_ttl_minutes: i64,
    /// TTL for intraday aggregates
    #[serde(default = "default_intraday_ttl")]
    pub intraday_ttl_minutes: i64,
    /// TTL for end-of-day / reference data
    #[serde(default = "default_daily_ttl")]
    pub daily_ttl_minutes: i64,
}

impl CacheConfig {
    pub fn ttl_minutes(&self, tier: SourceTier) -> i64 {
        match tier {
            SourceTier::Realtime => self.realtime_ttl_minutes,
            SourceTier::Intraday => self.intraday_ttl_minutes,
            SourceTier::Daily => self.daily_ttl_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuiConfig {
    /// Minimum proposal score for promotion
    #[serde(default = "default_dui_min_score")]
    pub min_score_for_promotion: Decimal,
    /// Trading days an unconfirmed promotion survives
    #[serde(default = "default_dui_ttl_trading_days")]
    pub ttl_trading_days: u32,
    /// Hard cap on the active set (confirmed + unconfirmed)
    #[serde(default = "default_dui_max_set_size")]
    pub max_set_size: usize,
    /// Structural engines allowed to propose promotions
    #[serde(default = "default_allowed_engines")]
    pub allowed_engines: Vec<String>,
    /// Pure momentum engines, never allowed to promote
    #[serde(default = "default_momentum_engines")]
    pub momentum_engines: Vec<String>,
    /// Engine whose agreement confirms a promotion
    #[serde(default = "default_confirmation_engine")]
    pub confirmation_engine: String,
    /// Minimum confirmation-engine score that counts as agreement
    #[serde(default = "default_confirmation_min_score")]
    pub confirmation_min_score: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA timezone of the exchange
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Load NYSE holidays in addition to `holidays`
    #[serde(default = "default_exchange_holidays")]
    pub exchange_holidays: bool,
    /// Extra market closures (YYYY-MM-DD)
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl CalendarConfig {
    pub fn trading_calendar(&self) -> Result<TradingCalendar> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {:?}: {}", self.timezone, e))?;
        let calendar = TradingCalendar::new(tz, self.holidays.iter().copied());
        if !self.exchange_holidays {
            return Ok(calendar);
        }
        Ok(calendar.with_holidays(nyse_holidays()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Static scan universe
    #[serde(default = "default_universe")]
    pub universe: Vec<String>,
    /// Extra symbols scanned only during discovery passes
    #[serde(default = "default_discovery_universe")]
    pub discovery_universe: Vec<String>,
    /// Maximum in-flight symbol scans
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seconds between scan passes
    #[serde(default = "default_pass_interval")]
    pub pass_interval_secs: u64,
    /// Data kinds fetched for every scanned symbol
    #[serde(default = "default_data_kinds")]
    pub data_kinds: Vec<DataKind>,
    /// Upper bound on symbols planned per pass (0 = unlimited)
    #[serde(default = "default_max_symbols_per_pass")]
    pub max_symbols_per_pass: usize,
    /// Run a full-universe discovery pass every N passes (0 = never)
    #[serde(default = "default_discovery_every_passes")]
    pub discovery_every_passes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the market-data API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which signal engine scores live payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Normalize configured payload fields into scores
    #[default]
    Field,
    /// Read the synthetic `score` field written by the mock provider
    Mock,
}

/// Maps one payload field of one data kind to an engine score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub data_kind: DataKind,
    pub engine: String,
    pub field: String,
    /// Absolute field value that maps to a score of 1.0
    pub full_scale: Decimal,
}

impl FieldBinding {
    fn new(data_kind: DataKind, engine: &str, field: &str, full_scale: Decimal) -> Self {
        Self {
            data_kind,
            engine: engine.to_string(),
            field: field.to_string(),
            full_scale,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    #[serde(default = "default_field_bindings")]
    pub fields: Vec<FieldBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

// Default value functions
fn default_daily_limit() -> u32 {
    15_000
}

fn default_scan_window_seconds() -> u64 {
    60
}

fn default_cooldown_secs() -> TierSettings<u64> {
    TierSettings {
        p1: 300,  // 5 minutes
        p2: 900,  // 15 minutes
        p3: 1800, // 30 minutes
    }
}

fn default_max_calls_per_ticker() -> TierSettings<u32> {
    TierSettings {
        p1: 40,
        p2: 15,
        p3: 6,
    }
}

fn default_force_scan_max_calls() -> u32 {
    60
}

fn default_warn_usage_ratio() -> Decimal {
    Decimal::new(80, 2) // 0.80
}

fn default_critical_usage_ratio() -> Decimal {
    Decimal::new(95, 2) // 0.95
}

fn default_index_symbols() -> Vec<String> {
    ["SPY", "QQQ", "IWM", "DIA"].iter().map(|s| s.to_string()).collect()
}

fn default_p1_score_threshold() -> Decimal {
    Decimal::new(60, 2) // 0.60
}

fn default_p2_score_threshold() -> Decimal {
    Decimal::new(35, 2) // 0.35
}

fn default_score_change_materiality() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_realtime_ttl() -> i64 {
    2
}

fn default_intraday_ttl() -> i64 {
    15
}

fn default_daily_ttl() -> i64 {
    240
}

fn default_dui_min_score() -> Decimal {
    Decimal::new(30, 2) // 0.30
}

fn default_dui_ttl_trading_days() -> u32 {
    3
}

fn default_dui_max_set_size() -> usize {
    25
}

fn default_allowed_engines() -> Vec<String> {
    [
        "distribution_engine",
        "dark_pool_engine",
        "gamma_engine",
        "options_flow_engine",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_momentum_engines() -> Vec<String> {
    ["momentum_engine", "top_movers_engine", "gap_engine"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_confirmation_engine() -> String {
    "acceleration_engine".to_string()
}

fn default_confirmation_min_score() -> Decimal {
    Decimal::new(50, 2) // 0.50
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_exchange_holidays() -> bool {
    true
}

fn default_universe() -> Vec<String> {
    [
        "SPY", "QQQ", "IWM", "DIA", "AAPL", "MSFT", "NVDA", "AMZN", "META", "GOOGL", "TSLA",
        "AMD", "NFLX", "AVGO", "JPM", "BAC", "XOM", "UNH", "COIN", "PLTR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_discovery_universe() -> Vec<String> {
    ["SOFI", "HOOD", "RIVN", "MARA", "RIOT", "SNAP", "UPST", "AFRM"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_concurrency() -> usize {
    15
}

fn default_pass_interval() -> u64 {
    120
}

fn default_data_kinds() -> Vec<DataKind> {
    vec![DataKind::Quote, DataKind::OptionsFlow, DataKind::DarkPool]
}

fn default_max_symbols_per_pass() -> usize {
    0
}

fn default_discovery_every_passes() -> u64 {
    30
}

fn default_base_url() -> String {
    "https://api.marketdata.example.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_field_bindings() -> Vec<FieldBinding> {
    vec![
        FieldBinding::new(
            DataKind::Quote,
            "momentum_engine",
            "change_percent",
            Decimal::new(10, 0),
        ),
        FieldBinding::new(
            DataKind::OptionsFlow,
            "options_flow_engine",
            "total_premium",
            Decimal::new(5_000_000, 0),
        ),
        FieldBinding::new(
            DataKind::DarkPool,
            "dark_pool_engine",
            "premium",
            Decimal::new(50_000_000, 0),
        ),
        FieldBinding::new(
            DataKind::GreekExposure,
            "gamma_engine",
            "gamma_exposure",
            Decimal::new(500_000_000, 0),
        ),
        FieldBinding::new(
            DataKind::NetPremium,
            "acceleration_engine",
            "net_premium",
            Decimal::new(10_000_000, 0),
        ),
        FieldBinding::new(
            DataKind::Fundamentals,
            "distribution_engine",
            "short_interest_pct",
            Decimal::new(30, 0),
        ),
    ]
}

fn default_db_path() -> String {
    "data/scanner_state.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ADSCAN"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.budget.daily_limit > 0, "daily_limit must be positive");

        WindowSchedule::new(self.budget.windows.clone()).context("Invalid window table")?;

        anyhow::ensure!(
            self.budget.warn_usage_ratio > Decimal::ZERO
                && self.budget.warn_usage_ratio <= self.budget.critical_usage_ratio
                && self.budget.critical_usage_ratio <= Decimal::ONE,
            "usage ratios must satisfy 0 < warn <= critical <= 1"
        );

        anyhow::ensure!(
            self.priority.p2_score_threshold <= self.priority.p1_score_threshold,
            "p2_score_threshold must not exceed p1_score_threshold"
        );

        anyhow::ensure!(
            self.dui.max_set_size > 0,
            "dui.max_set_size must be positive"
        );

        anyhow::ensure!(
            self.dui.confirmation_min_score > Decimal::ZERO
                && self.dui.confirmation_min_score <= Decimal::ONE,
            "dui.confirmation_min_score must be in (0, 1]"
        );

        for engine in &self.dui.allowed_engines {
            anyhow::ensure!(
                !self.dui.momentum_engines.contains(engine),
                "engine {} cannot be both allowed and momentum-only",
                engine
            );
        }

        anyhow::ensure!(self.scan.concurrency > 0, "scan.concurrency must be positive");

        for binding in &self.engine.fields {
            anyhow::ensure!(
                binding.full_scale > Decimal::ZERO,
                "engine field {} of {} must have a positive full_scale",
                binding.field,
                binding.data_kind
            );
        }

        self.calendar.trading_calendar()?;

        Ok(())
    }

    /// Parsed window table. Call after `validate`.
    pub fn window_schedule(&self) -> Result<WindowSchedule> {
        WindowSchedule::new(self.budget.windows.clone()).context("Invalid window table")
    }
}

impl BudgetConfig {
    pub fn warn_ratio(&self) -> f64 {
        self.warn_usage_ratio.to_f64().unwrap_or(0.8)
    }

    pub fn critical_ratio(&self) -> f64 {
        self.critical_usage_ratio.to_f64().unwrap_or(0.95)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget: BudgetConfig::default(),
            priority: PriorityConfig::default(),
            cache: CacheConfig::default(),
            dui: DuiConfig::default(),
            calendar: CalendarConfig::default(),
            scan: ScanConfig::default(),
            provider: ProviderConfig::default(),
            engine: EngineConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            scan_window_seconds: default_scan_window_seconds(),
            cooldown_secs: default_cooldown_secs(),
            max_calls_per_ticker: default_max_calls_per_ticker(),
            force_scan_max_calls_per_ticker: default_force_scan_max_calls(),
            warn_usage_ratio: default_warn_usage_ratio(),
            critical_usage_ratio: default_critical_usage_ratio(),
            windows: WindowSchedule::default_slots(),
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            index_symbols: default_index_symbols(),
            p1_score_threshold: default_p1_score_threshold(),
            p2_score_threshold: default_p2_score_threshold(),
            score_change_materiality: default_score_change_materiality(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            realtime_ttl_minutes: default_realtime_ttl(),
            intraday_ttl_minutes: default_intraday_ttl(),
            daily_ttl_minutes: default_daily_ttl(),
        }
    }
}

impl Default for DuiConfig {
    fn default() -> Self {
        Self {
            min_score_for_promotion: default_dui_min_score(),
            ttl_trading_days: default_dui_ttl_trading_days(),
            max_set_size: default_dui_max_set_size(),
            allowed_engines: default_allowed_engines(),
            momentum_engines: default_momentum_engines(),
            confirmation_engine: default_confirmation_engine(),
            confirmation_min_score: default_confirmation_min_score(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            exchange_holidays: default_exchange_holidays(),
            holidays: Vec::new(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            discovery_universe: default_discovery_universe(),
            concurrency: default_concurrency(),
            pass_interval_secs: default_pass_interval(),
            data_kinds: default_data_kinds(),
            max_symbols_per_pass: default_max_symbols_per_pass(),
            discovery_every_passes: default_discovery_every_passes(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            fields: default_field_bindings(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeWindow;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_momentum_engine_in_allow_list() {
        let mut config = Config::default();
        config.dui.allowed_engines.push("momentum_engine".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.priority.p2_score_threshold = dec!(0.9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_window_table_with_gap_at_midnight() {
        let mut config = Config::default();
        config.budget.windows.remove(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.calendar.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_calendar_skips_exchange_holidays() {
        let calendar = Config::default().calendar.trading_calendar().unwrap();
        let date = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        assert!(!calendar.is_trading_day(date(11, 27)));
        assert_eq!(calendar.trading_days_between(date(11, 26), date(11, 28)), 1);

        let mut config = Config::default();
        config.calendar.exchange_holidays = false;
        let weekends_only = config.calendar.trading_calendar().unwrap();
        assert!(weekends_only.is_trading_day(date(11, 27)));
    }

    #[test]
    fn test_tier_settings_lookup() {
        let budget = BudgetConfig::default();
        assert_eq!(budget.cooldown_secs.get(TickerPriority::P1), 300);
        assert_eq!(budget.max_calls_per_ticker.get(TickerPriority::P3), 6);
    }

    #[test]
    fn test_window_table_from_toml() {
        let toml = r#"
            [budget]
            daily_limit = 500

            [[budget.windows]]
            window = "overnight"
            start = "00:00:00"
            total = 10
            p1 = 0.5
            p2 = 0.5
            p3 = 0.0

            [[budget.windows]]
            window = "opening_range"
            start = "09:30:00"
            total = 200
            p1 = 0.6
            p2 = 0.3
            p3 = 0.1
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.budget.daily_limit, 500);
        let schedule = config.window_schedule().unwrap();
        assert_eq!(
            schedule.window_at(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            TimeWindow::OpeningRange
        );
        assert_eq!(schedule.budget(TimeWindow::OpeningRange).total, 200);
        assert!(config.validate().is_ok());
    }
}
