//! Tick scheduler and batch evaluation loop.
//!
//! One coordinating loop drives discrete polling ticks. Within a tick,
//! every configured event is evaluated against quotes frozen at a single
//! logical snapshot time; independent events run as concurrently
//! scheduled tasks bounded by a small worker pool. Evaluation itself is
//! pure — the only shared state is the read-only cost model.
//!
//! The reconciler runs as its own periodic task on a slower cadence and
//! never blocks the evaluation loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::QuoteSource;
use crate::config::{BotConfig, EventConfig, GeneralConfig, TradeThresholds};
use crate::costs::CostParameters;
use crate::quotes::{normalize_option_quote, normalize_pm_book, walk_book, QuoteError};
use crate::session::reconcile::{Reconciler, SnapshotWriter};
use crate::strategy::evaluate::{evaluate, EvalError, EventSnapshot, ResultRecord};
use crate::strategy::recorder::RecordSink;

/// Per-tick batch report: one entry per configured event, either a record
/// or a tagged skip. This is the explicit replacement for fire-and-continue
/// exception handling on batch loops.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Records emitted this tick (actionable and no-trade alike).
    pub records: Vec<ResultRecord>,
    /// Events skipped this tick, with the reason.
    pub skipped: Vec<(String, EvalError)>,
    /// Events abandoned because the tick deadline elapsed.
    pub abandoned: usize,
}

impl TickReport {
    pub fn evaluated(&self) -> usize {
        self.records.len()
    }
}

/// The arbitrage signal engine.
pub struct Engine {
    general: GeneralConfig,
    thresholds: TradeThresholds,
    costs: Arc<CostParameters>,
    events: Vec<EventConfig>,
    source: Arc<dyn QuoteSource>,
    sink: Arc<dyn RecordSink>,
    snapshot_writer: Option<Arc<SnapshotWriter>>,
    reconciler: Arc<Mutex<Reconciler>>,
    /// Latest prediction-market mid per market title, shared with the
    /// reconciler task for mark-to-market.
    marks: Arc<DashMap<String, Decimal>>,
    /// Actionable suggestions emitted today (UTC).
    trades_today: u32,
    budget_day: NaiveDate,
}

impl Engine {
    pub fn new(
        config: BotConfig,
        source: Arc<dyn QuoteSource>,
        sink: Arc<dyn RecordSink>,
        snapshot_writer: Option<SnapshotWriter>,
    ) -> Self {
        let reconciler = Reconciler::new(config.reconcile.clone());
        Self {
            general: config.general,
            thresholds: config.thresholds,
            costs: Arc::new(config.costs),
            events: config.events,
            source,
            sink,
            snapshot_writer: snapshot_writer.map(Arc::new),
            reconciler: Arc::new(Mutex::new(reconciler)),
            marks: Arc::new(DashMap::new()),
            trades_today: 0,
            budget_day: Utc::now().date_naive(),
        }
    }

    /// Shared handle to the reconciler (for the periodic task and tests).
    pub fn reconciler(&self) -> Arc<Mutex<Reconciler>> {
        self.reconciler.clone()
    }

    /// Fetch, normalize, and evaluate a single event.
    ///
    /// The only suspension points are the two quote-source calls; once the
    /// snapshot is frozen, evaluation is pure. Record construction is
    /// all-or-nothing: a failure at any step yields a tagged error and no
    /// partial record.
    async fn evaluate_event(
        source: &dyn QuoteSource,
        event: &EventConfig,
        costs: &CostParameters,
        thresholds: &TradeThresholds,
        captured_at: chrono::DateTime<Utc>,
    ) -> Result<ResultRecord, EvalError> {
        let instrument = event.instrument_name();

        let ticker = source
            .option_ticker(&instrument)
            .await
            .map_err(|e| EvalError::from_quote(&event.title, e))?;
        let book = source
            .pm_book(&event.pm_token_id)
            .await
            .map_err(|e| EvalError::from_quote(&event.title, e))?;

        let option = normalize_option_quote(
            &ticker,
            event.k1_strike,
            event.k2_strike,
            event.time_to_expiry_years(captured_at),
            costs.risk_free_rate,
            captured_at,
        )
        .map_err(|e| EvalError::from_quote(&event.title, e))?;
        let pm = normalize_pm_book(&book, captured_at)
            .map_err(|e| EvalError::from_quote(&event.title, e))?;

        let snapshot = EventSnapshot {
            title: event.title.clone(),
            asset: event.asset,
            instrument,
            pm_token_id: event.pm_token_id.clone(),
            strike: event.k1_strike,
            expiration: event.expiration,
            option,
            pm,
            captured_at,
        };

        let mut record = evaluate(&snapshot, costs, thresholds)?;

        // Can the book actually absorb the chosen size? Insufficient
        // liquidity downgrades the suggestion; the record still ships.
        if record.is_actionable() {
            match record.winner.strategy {
                edge_common::StrategyId::LongYes => match walk_book(&book.asks, record.investment) {
                    Ok(estimate) => {
                        debug!(
                            market = %record.market_title,
                            avg_price = %estimate.avg_price,
                            slippage_pct = %estimate.slippage_pct,
                            "book walk for target size"
                        );
                    }
                    Err(e @ QuoteError::InsufficientLiquidity { .. }) => {
                        warn!(market = %record.market_title, "{}", e);
                        record.veto_suggestion("insufficient book liquidity for target size");
                    }
                    Err(e) => {
                        warn!(market = %record.market_title, "book walk failed: {}", e);
                    }
                },
                edge_common::StrategyId::ShortYes => {
                    // Selling hits the bid side; depth is the binding check.
                    let bid_depth = book.bid_depth_usd();
                    if bid_depth < record.investment {
                        warn!(
                            market = %record.market_title,
                            %bid_depth,
                            target = %record.investment,
                            "insufficient bid depth for target size"
                        );
                        record.veto_suggestion("insufficient book liquidity for target size");
                    }
                }
            }
        }

        Ok(record)
    }

    /// Apply the daily budget, persist the record, and feed the shadow
    /// ledger. Returns the sealed record.
    async fn seal_record(&mut self, mut record: ResultRecord) -> ResultRecord {
        let today = Utc::now().date_naive();
        if today != self.budget_day {
            self.budget_day = today;
            self.trades_today = 0;
        }

        if record.is_actionable() {
            if self.trades_today >= self.general.daily_trades {
                record.veto_suggestion("daily trade budget exhausted");
            } else {
                self.trades_today += 1;
                let mode = if self.general.dry_trade { "dry" } else { "live" };
                info!(
                    market = %record.market_title,
                    strategy = %record.winner.strategy,
                    ev = %record.ev,
                    mode,
                    "trade suggestion: {}",
                    record.suggest1
                );
                if record.ev >= self.thresholds.notify_net_ev_min {
                    info!(
                        market = %record.market_title,
                        ev = %record.ev,
                        "signal clears notification threshold"
                    );
                }
            }
        }

        self.marks
            .insert(record.market_title.clone(), record.poly_yes_price);

        if let Err(e) = self.sink.append(&record) {
            error!(market = %record.market_title, "failed to record result: {}", e);
        }

        self.reconciler.lock().await.record_recommendation(&record);

        record
    }

    /// Run one evaluation tick over all configured events.
    ///
    /// Quotes are captured against a single logical snapshot time. The
    /// tick may be abandoned when its deadline elapses: records already
    /// emitted remain valid, unfinished events are counted as abandoned.
    pub async fn tick(&mut self) -> TickReport {
        let captured_at = Utc::now();
        let deadline = Instant::now() + Duration::from_secs(self.general.tick_deadline_secs);
        let total = self.events.len();

        let events = self.events.clone();
        let source = self.source.clone();
        let costs = self.costs.clone();
        let thresholds = self.thresholds.clone();

        let mut evaluations = stream::iter(events.into_iter().map(|event| {
            let source = source.clone();
            let costs = costs.clone();
            let thresholds = thresholds.clone();
            async move {
                let outcome =
                    Self::evaluate_event(source.as_ref(), &event, &costs, &thresholds, captured_at)
                        .await;
                (event.title, outcome)
            }
        }))
        .buffer_unordered(self.general.max_concurrent_evals.max(1));

        let mut report = TickReport::default();
        loop {
            match timeout_at(deadline, evaluations.next()).await {
                Ok(Some((_, Ok(record)))) => {
                    let sealed = self.seal_record(record).await;
                    report.records.push(sealed);
                }
                Ok(Some((title, Err(err)))) => {
                    warn!(market = %title, "event skipped: {}", err);
                    report.skipped.push((title, err));
                }
                Ok(None) => break,
                Err(_) => {
                    let done = report.records.len() + report.skipped.len();
                    report.abandoned = total.saturating_sub(done);
                    warn!(
                        abandoned = report.abandoned,
                        "tick deadline elapsed; abandoning remaining events"
                    );
                    break;
                }
            }
        }

        info!(
            evaluated = report.evaluated(),
            skipped = report.skipped.len(),
            abandoned = report.abandoned,
            "tick complete"
        );
        report
    }

    /// Run the engine: the evaluation loop plus an independent periodic
    /// reconciliation task. Runs until the surrounding task is cancelled.
    pub async fn run(mut self) {
        // Reconciliation runs in its own task so a slow snapshot can never
        // stall the evaluation loop.
        let reconciler = self.reconciler.clone();
        let marks = self.marks.clone();
        let writer = self.snapshot_writer.clone();
        let reconcile_secs = {
            let guard = reconciler.lock().await;
            guard.interval_secs()
        };
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(reconcile_secs.max(1)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Consume the immediate first tick; an empty startup snapshot
            // carries no information.
            timer.tick().await;
            loop {
                timer.tick().await;
                let mark_map: HashMap<String, Decimal> = marks
                    .iter()
                    .map(|entry| (entry.key().clone(), *entry.value()))
                    .collect();
                let snapshot = reconciler.lock().await.snapshot(&mark_map, Utc::now());
                info!(
                    shadow_pnl = %snapshot.shadow_pnl_usd,
                    real_pnl = %snapshot.real_pnl_usd,
                    diff = %snapshot.diff_usd,
                    open = snapshot.open_positions,
                    "reconciliation snapshot"
                );
                if let Some(writer) = &writer {
                    if let Err(e) = writer.append(&snapshot) {
                        error!("failed to persist P&L snapshot: {}", e);
                    }
                }
            }
        });

        let mut timer = interval(Duration::from_secs(self.general.check_interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            self.tick().await;
        }
    }
}
