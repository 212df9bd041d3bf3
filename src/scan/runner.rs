//! Scan pass execution.
//!
//! A pass plans the candidate universe, fetches each planned symbol with
//! bounded concurrency, and feeds the resulting engine signals back into the
//! score book and the dynamic universe.

use super::planner::{PlannedScan, ScanPlanner};
use crate::budget::{Admission, ScanBudget, TickerPriority};
use crate::cache::{CacheKey, TtlCache};
use crate::config::{DuiConfig, PriorityConfig, ScanConfig};
use crate::provider::{EngineSignal, MarketDataProvider, SignalEngine};
use crate::universe::{DuiHandle, PromotionOutcome};
use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub discovery: bool,
    pub planned: usize,
    pub fetched: usize,
    pub cache_hits: usize,
    pub denied: usize,
    pub failed: usize,
    pub promoted: Vec<String>,
    pub confirmed: Vec<String>,
    pub expired: Vec<String>,
}

/// Outcome of scanning one symbol.
#[derive(Debug, Default)]
struct SymbolScan {
    fetched: usize,
    cache_hits: usize,
    denied: usize,
    failed: usize,
    signals: Vec<EngineSignal>,
}

/// Drives scan passes against the shared budget, cache and universe.
pub struct ScanRunner {
    config: ScanConfig,
    confirmation_engine: String,
    confirmation_min_score: Decimal,
    provider: Arc<dyn MarketDataProvider>,
    engine: Arc<dyn SignalEngine>,
    budget: Arc<ScanBudget>,
    cache: Arc<TtlCache>,
    universe: DuiHandle,
    planner: Mutex<ScanPlanner>,
}

impl ScanRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ScanConfig,
        priority: &PriorityConfig,
        dui: &DuiConfig,
        provider: Arc<dyn MarketDataProvider>,
        engine: Arc<dyn SignalEngine>,
        budget: Arc<ScanBudget>,
        cache: Arc<TtlCache>,
        universe: DuiHandle,
    ) -> Self {
        let planner = ScanPlanner::new(priority, config.max_symbols_per_pass);
        Self {
            config,
            confirmation_engine: dui.confirmation_engine.clone(),
            confirmation_min_score: dui.confirmation_min_score,
            provider,
            engine,
            budget,
            cache,
            universe,
            planner: Mutex::new(planner),
        }
    }

    /// Run one pass. Discovery passes add the discovery universe and scan
    /// with `force_scan`.
    #[instrument(skip(self))]
    pub async fn run_pass(&self, discovery: bool) -> Result<PassReport> {
        let mut report = PassReport {
            discovery,
            ..Default::default()
        };

        report.expired = self.universe.sweep_expired().await?;
        let active = self.universe.active_promotions().await?;
        let promoted: HashSet<String> = active.iter().map(|e| e.symbol.clone()).collect();

        let mut candidates = self.config.universe.clone();
        candidates.extend(active.into_iter().map(|e| e.symbol));
        if discovery {
            candidates.extend(self.config.discovery_universe.iter().cloned());
        }

        let plan = {
            let mut planner = self.planner.lock().await;
            for symbol in &report.expired {
                planner.invalidate(symbol);
            }
            planner
                .plan(&candidates, &promoted, &self.budget, discovery)
                .await
        };
        report.planned = plan.len();

        let scans: Vec<SymbolScan> = stream::iter(plan)
            .map(|planned| self.scan_symbol(planned, discovery))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut signals = Vec::new();
        for scan in scans {
            report.fetched += scan.fetched;
            report.cache_hits += scan.cache_hits;
            report.denied += scan.denied;
            report.failed += scan.failed;
            signals.extend(scan.signals);
        }

        self.apply_signals(signals, &mut report).await?;

        let status = self.budget.status().await;
        info!(
            discovery,
            planned = report.planned,
            fetched = report.fetched,
            cache_hits = report.cache_hits,
            denied = report.denied,
            failed = report.failed,
            promoted = report.promoted.len(),
            confirmed = report.confirmed.len(),
            expired = report.expired.len(),
            daily_used = status.daily_used,
            daily_limit = status.daily_limit,
            window = %status.current_window,
            "Scan pass complete"
        );

        Ok(report)
    }

    /// Admission check for collaborators outside the pass loop.
    ///
    /// Without a `priority` the symbol is classified from `score` (or its last
    /// known score) and its current promotion state.
    pub async fn can_scan(
        &self,
        symbol: &str,
        priority: Option<TickerPriority>,
        score: Option<Decimal>,
        force_scan: bool,
    ) -> Result<bool> {
        let promoted = match priority {
            Some(_) => false,
            None => self.universe.is_promoted(symbol).await?,
        };
        let mut planner = self.planner.lock().await;
        Ok(planner
            .can_scan(&self.budget, symbol, priority, score, promoted, force_scan)
            .await)
    }

    /// Fetch every configured data kind for one symbol.
    async fn scan_symbol(&self, planned: PlannedScan, force_scan: bool) -> SymbolScan {
        let mut scan = SymbolScan::default();
        let symbol = planned.symbol.as_str();

        for &kind in &self.config.data_kinds {
            let key = CacheKey::new(symbol, kind);
            if self.cache.get(&key).is_some() {
                scan.cache_hits += 1;
                continue;
            }

            match self
                .budget
                .try_acquire(symbol, planned.priority, force_scan)
                .await
            {
                Ok(Admission::Granted) => {}
                Ok(Admission::Denied(denial)) => {
                    debug!(symbol = %symbol, %kind, %denial, "Skipping remaining data kinds");
                    scan.denied += 1;
                    break;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Budget refused to record call");
                    scan.failed += 1;
                    break;
                }
            }

            match self.provider.fetch(symbol, kind).await {
                Ok(payload) => {
                    scan.fetched += 1;
                    scan.signals
                        .extend(self.engine.evaluate(symbol, kind, &payload));
                    self.cache.put_for(key, payload);
                }
                Err(e) => {
                    // The call is spent regardless
                    warn!(symbol = %symbol, %kind, error = %e, "Fetch failed");
                    scan.failed += 1;
                }
            }
        }

        scan
    }

    /// Proposals are applied before confirmations, so a confirmation fetched
    /// ahead of the proposing data kind still lands on the new entry.
    async fn apply_signals(
        &self,
        signals: Vec<EngineSignal>,
        report: &mut PassReport,
    ) -> Result<()> {
        let mut best: HashMap<String, Decimal> = HashMap::new();
        for signal in &signals {
            best.entry(signal.symbol.clone())
                .and_modify(|s| *s = (*s).max(signal.score))
                .or_insert(signal.score);
        }

        let (confirmations, proposals): (Vec<EngineSignal>, Vec<EngineSignal>) = signals
            .into_iter()
            .partition(|s| s.engine == self.confirmation_engine);

        let mut to_invalidate = Vec::new();
        for signal in proposals {
            if self.config.universe.contains(&signal.symbol) {
                continue;
            }

            match self
                .universe
                .propose_promotion(&signal.symbol, &signal.engine, signal.score)
                .await?
            {
                Ok(PromotionOutcome::Inserted { evicted }) => {
                    to_invalidate.push(signal.symbol.clone());
                    if let Some(evicted) = evicted {
                        to_invalidate.push(evicted);
                    }
                    report.promoted.push(signal.symbol);
                }
                Ok(PromotionOutcome::Refreshed) => {}
                Err(rejection) => {
                    debug!(
                        symbol = %signal.symbol,
                        engine = %signal.engine,
                        %rejection,
                        "Promotion rejected"
                    );
                }
            }
        }

        for signal in confirmations {
            if signal.score < self.confirmation_min_score {
                debug!(
                    symbol = %signal.symbol,
                    score = %signal.score,
                    threshold = %self.confirmation_min_score,
                    "Confirmation signal too weak"
                );
                continue;
            }
            if self.universe.confirm_promotion(&signal.symbol).await? {
                report.confirmed.push(signal.symbol);
            }
        }

        let mut planner = self.planner.lock().await;
        for (symbol, score) in best {
            planner.update_score(&symbol, score);
        }
        for symbol in to_invalidate {
            planner.invalidate(&symbol);
        }

        report.promoted.sort();
        report.confirmed.sort();
        report.confirmed.dedup();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetLedger, UsageMonitor};
    use crate::config::Config;
    use crate::provider::{DataKind, MockMarketDataProvider, MockProvider, MockSignalEngine};
    use crate::schedule::{Clock, ManualClock, TradingCalendar};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    struct Harness {
        runner: ScanRunner,
        provider: Arc<MockProvider>,
        clock: Arc<ManualClock>,
        universe: DuiHandle,
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.scan.universe = vec!["SPY".to_string(), "AAPL".to_string()];
        config.scan.discovery_universe = vec!["SOFI".to_string()];
        config.scan.data_kinds = vec![DataKind::Quote, DataKind::DarkPool];
        config
    }

    fn harness_with(
        config: Config,
        provider: Arc<dyn MarketDataProvider>,
    ) -> (ScanRunner, Arc<ManualClock>, DuiHandle) {
        // Monday 2025-03-10, 10:00 in New York
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
        ));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let calendar = TradingCalendar::new_york();
        let schedule = config.window_schedule().unwrap();
        let ledger = BudgetLedger::new(
            config.budget.clone(),
            schedule,
            calendar.clone(),
            dyn_clock.clone(),
        );
        let budget = Arc::new(ScanBudget::new(
            ledger,
            UsageMonitor::new(config.budget.warn_ratio(), config.budget.critical_ratio()),
            dyn_clock.clone(),
        ));
        let cache = Arc::new(TtlCache::new(config.cache.clone(), dyn_clock.clone()));
        let (universe, _task) =
            DuiHandle::spawn(config.dui.clone(), calendar, None, dyn_clock.clone()).unwrap();

        let runner = ScanRunner::new(
            config.scan.clone(),
            &config.priority,
            &config.dui,
            provider,
            Arc::new(MockSignalEngine::new(dyn_clock.clone())),
            budget,
            cache,
            universe.clone(),
        );
        (runner, clock, universe)
    }

    fn harness() -> Harness {
        let provider = Arc::new(MockProvider::new());
        let (runner, clock, universe) = harness_with(config(), provider.clone());
        Harness {
            runner,
            provider,
            clock,
            universe,
        }
    }

    #[tokio::test]
    async fn test_pass_fetches_then_reuses_cache() {
        let h = harness();

        let first = h.runner.run_pass(false).await.unwrap();
        assert_eq!(first.planned, 2);
        assert_eq!(first.fetched, 4);
        assert_eq!(first.cache_hits, 0);
        assert_eq!(h.provider.call_count(), 4);

        // Within the scan window and the realtime TTL
        h.clock.advance(Duration::seconds(30));
        let second = h.runner.run_pass(false).await.unwrap();
        assert_eq!(second.fetched, 0);
        assert_eq!(second.cache_hits, 4);
        assert_eq!(h.provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_cooldown_keeps_symbols_out_of_plan() {
        let h = harness();
        h.runner.run_pass(false).await.unwrap();

        // Past the scan window, inside every cooldown
        h.clock.advance(Duration::seconds(120));
        let report = h.runner.run_pass(false).await.unwrap();
        assert_eq!(report.planned, 0);
        assert_eq!(h.provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_discovery_pass_promotes_structural_signal() {
        let h = harness();
        h.provider.set_score("SOFI", DataKind::DarkPool, 0.55);
        h.provider.set_score("SOFI", DataKind::Quote, 0.95);

        let report = h.runner.run_pass(true).await.unwrap();
        assert_eq!(report.promoted, vec!["SOFI".to_string()]);
        assert!(h.universe.is_promoted("SOFI").await.unwrap());

        let active = h.universe.active_promotions().await.unwrap();
        assert_eq!(active[0].source_engine, "dark_pool_engine");
    }

    #[tokio::test]
    async fn test_weak_signal_does_not_promote() {
        let h = harness();
        h.provider.set_score("SOFI", DataKind::DarkPool, 0.29);
        h.provider.set_score("SOFI", DataKind::Quote, 0.99);

        let report = h.runner.run_pass(true).await.unwrap();
        assert!(report.promoted.is_empty());
        assert!(!h.universe.is_promoted("SOFI").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirmed_promotion_outlives_ttl() {
        let mut config = config();
        config.scan.data_kinds = vec![DataKind::DarkPool, DataKind::NetPremium];
        let provider = Arc::new(MockProvider::new());
        provider.set_score("SOFI", DataKind::DarkPool, 0.55);
        provider.set_score("SOFI", DataKind::NetPremium, 0.70);
        let (runner, clock, universe) = harness_with(config, provider.clone());

        // Dark pool proposes, then acceleration confirms within the same scan
        let report = runner.run_pass(true).await.unwrap();
        assert_eq!(report.promoted, vec!["SOFI".to_string()]);
        assert_eq!(report.confirmed, vec!["SOFI".to_string()]);

        // Five trading days later
        clock.advance(Duration::days(7));
        let report = runner.run_pass(false).await.unwrap();
        assert!(report.expired.is_empty());

        let active = universe.active_promotions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].confirmed);
    }

    #[tokio::test]
    async fn test_weak_confirmation_is_not_agreement() {
        let mut config = config();
        config.scan.data_kinds = vec![DataKind::DarkPool, DataKind::NetPremium];
        let provider = Arc::new(MockProvider::new());
        provider.set_score("SOFI", DataKind::DarkPool, 0.55);
        provider.set_score("SOFI", DataKind::NetPremium, 0.0);
        let (runner, _clock, universe) = harness_with(config, provider.clone());

        let report = runner.run_pass(true).await.unwrap();
        assert_eq!(report.promoted, vec!["SOFI".to_string()]);
        assert!(report.confirmed.is_empty());

        let active = universe.active_promotions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(!active[0].confirmed);
    }

    #[tokio::test]
    async fn test_confirmation_fetched_first_still_confirms() {
        let mut config = config();
        config.scan.data_kinds = vec![DataKind::NetPremium, DataKind::DarkPool];
        let provider = Arc::new(MockProvider::new());
        provider.set_score("SOFI", DataKind::NetPremium, 0.9);
        provider.set_score("SOFI", DataKind::DarkPool, 0.55);
        let (runner, _clock, universe) = harness_with(config, provider.clone());

        let report = runner.run_pass(true).await.unwrap();
        assert_eq!(report.promoted, vec!["SOFI".to_string()]);
        assert_eq!(report.confirmed, vec!["SOFI".to_string()]);
        assert!(universe.active_promotions().await.unwrap()[0].confirmed);
    }

    #[tokio::test]
    async fn test_expiry_outside_sweep_still_demotes() {
        let h = harness();
        h.provider.set_score("SOFI", DataKind::DarkPool, 0.40);
        h.provider.set_score("SOFI", DataKind::Quote, 0.40);

        // Monday: discovery promotes SOFI
        let report = h.runner.run_pass(true).await.unwrap();
        assert_eq!(report.promoted, vec!["SOFI".to_string()]);

        // Tuesday: scanned as a promoted P1 symbol, without refreshing the promotion
        h.provider.set_score("SOFI", DataKind::DarkPool, 0.10);
        h.clock.advance(Duration::days(1));
        h.runner.run_pass(false).await.unwrap();
        // The cached tier outlives the promotion until invalidated
        assert_eq!(
            h.runner.planner.lock().await.priority("SOFI", false),
            TickerPriority::P1
        );

        // Thursday is T+3; a read evicts the entry before the next pass
        h.clock.advance(Duration::days(2));
        assert!(!h.universe.is_promoted("SOFI").await.unwrap());

        let report = h.runner.run_pass(false).await.unwrap();
        assert_eq!(report.expired, vec!["SOFI".to_string()]);
        let mut planner = h.runner.planner.lock().await;
        assert_eq!(planner.score("SOFI"), Some(dec!(0.4)));
        assert_eq!(planner.priority("SOFI", false), TickerPriority::P2);
    }

    #[tokio::test]
    async fn test_can_scan_resolves_promotion_for_missing_priority() {
        let mut config = config();
        config.budget.max_calls_per_ticker.p3 = 0;
        let provider = Arc::new(MockProvider::new());
        let (runner, _clock, universe) = harness_with(config, provider);

        assert!(!runner.can_scan("HOOD", None, None, false).await.unwrap());

        universe
            .propose_promotion("SOFI", "gamma_engine", dec!(0.5))
            .await
            .unwrap()
            .unwrap();
        assert!(runner.can_scan("SOFI", None, None, false).await.unwrap());
        assert!(
            !runner
                .can_scan("SOFI", Some(TickerPriority::P3), None, false)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_still_spends_budget() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fetch()
            .returning(|_, _| Err(anyhow::anyhow!("upstream 503")));

        let mut config = config();
        config.scan.universe = vec!["SPY".to_string()];
        config.scan.data_kinds = vec![DataKind::Quote];
        let (runner, _clock, _universe) = harness_with(config, Arc::new(provider));

        let report = runner.run_pass(false).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.fetched, 0);
        assert_eq!(runner.budget.remaining_daily().await, 14_999);
    }

    #[tokio::test]
    async fn test_ticker_cap_stops_remaining_kinds() {
        let mut config = config();
        config.scan.universe = vec!["F".to_string()];
        config.scan.data_kinds =
            vec![DataKind::Quote, DataKind::DarkPool, DataKind::OptionsFlow];
        config.budget.max_calls_per_ticker.p3 = 2;
        config.priority.p2_score_threshold = Decimal::ONE;
        config.priority.p1_score_threshold = Decimal::ONE;
        let provider = Arc::new(MockProvider::new());
        let (runner, _clock, _universe) = harness_with(config, provider.clone());

        let report = runner.run_pass(false).await.unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.denied, 1);
        assert_eq!(provider.call_count(), 2);
    }
}
