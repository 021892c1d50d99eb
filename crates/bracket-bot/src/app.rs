//! Main application orchestration.
//!
//! One run places at most one bracket:
//! connect -> resolve -> optional price gate -> submit -> settle -> stop.
//! The session is stopped on every path, and no order is sent unless the
//! contract resolved.

use crate::config::AppConfig;
use crate::error::AppResult;
use bracket_core::{
    BracketOrder, BracketRequest, ContractDetails, OrderIdSource, OrderRole, Price, PriceTrigger,
    SequentialOrderIds,
};
use bracket_executor::{
    BracketSubmitter, ContractResolver, DynVenueSender, PriceWatcher, SessionSender,
    SubmittedBracket,
};
use bracket_persistence::FileOrderIdAllocator;
use bracket_ws::{ConnectionManager, OrderRejection};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Client ids are drawn from `[0, CLIENT_ID_SPACE)`.
const CLIENT_ID_SPACE: u64 = 100_000_000;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    /// Exchange-local symbol, e.g. `MESM0`.
    pub symbol: String,
    pub request: BracketRequest,
    /// Submit only once the last trade is at or above this price.
    pub above: Option<Price>,
    /// Submit only once the last trade is at or below this price.
    pub below: Option<Price>,
}

impl OrderIntent {
    /// `None` when no gate was requested.
    pub fn trigger(&self) -> Option<PriceTrigger> {
        PriceTrigger::optional(self.above, self.below)
    }
}

/// Session id for one run.
///
/// Random per run and mixed with the order parameters, so concurrent runs
/// against the same gateway do not collide.
pub fn derive_client_id(intent: &OrderIntent) -> u32 {
    let mut hasher = DefaultHasher::new();
    intent.symbol.hash(&mut hasher);
    intent.request.action.hash(&mut hasher);
    intent.request.order_type.hash(&mut hasher);
    intent.request.quantity.hash(&mut hasher);
    intent.request.price.hash(&mut hasher);
    intent.request.stop_price.hash(&mut hasher);
    intent.above.hash(&mut hasher);
    intent.below.hash(&mut hasher);

    let random = Uuid::new_v4().as_u128() as u64;
    (random.wrapping_add(hasher.finish()) % CLIENT_ID_SPACE) as u32
}

/// How the bracket left the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Live(SubmittedBracket),
    /// Built and logged, never sent.
    DryRun(BracketOrder),
}

impl Submission {
    pub fn bracket(&self) -> &BracketOrder {
        match self {
            Self::Live(submitted) => &submitted.bracket,
            Self::DryRun(bracket) => bracket,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun(_))
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub contract: ContractDetails,
    /// Last trade that satisfied the price gate, if one was set.
    pub trigger_price: Option<Price>,
    pub submission: Submission,
    /// Venue errors received for either leg before disconnecting.
    pub rejections: Vec<OrderRejection>,
}

impl RunOutcome {
    /// Rejections of the protective stop. Non-empty means the entry may be
    /// working without protection.
    pub fn stop_rejections(&self) -> Vec<&OrderRejection> {
        self.rejections
            .iter()
            .filter(|r| r.role == OrderRole::ProtectiveStop)
            .collect()
    }

    pub fn log_summary(&self) {
        let bracket = self.submission.bracket();
        let stop_id = match &self.submission {
            Submission::Live(submitted) => Some(submitted.stop_id),
            Submission::DryRun(_) => None,
        };
        info!(
            contract = %self.contract.contract,
            con_id = ?self.contract.contract.con_id,
            trigger_price = ?self.trigger_price,
            entry_id = bracket.entry_id,
            stop_id = ?stop_id,
            bracket_ref = %bracket.bracket_ref,
            dry_run = self.submission.is_dry_run(),
            rejections = self.rejections.len(),
            "Run complete"
        );
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    allocator: FileOrderIdAllocator,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let allocator = config.order_id_allocator();
        Ok(Self { config, allocator })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute one placement.
    ///
    /// The request is validated before connecting, so a malformed order never
    /// opens a session.
    pub fn run(&self, intent: &OrderIntent, client_id: u32) -> AppResult<RunOutcome> {
        intent.request.validate()?;

        let order_ids: Arc<dyn OrderIdSource> = if self.config.is_dry_run() {
            let last = self.allocator.peek()?;
            info!(last, "Dry run: simulating order ids, counter file untouched");
            Arc::new(SequentialOrderIds::starting_after(last))
        } else {
            Arc::new(self.allocator.clone())
        };

        info!(
            symbol = %intent.symbol,
            action = %intent.request.action,
            order_type = %intent.request.order_type,
            quantity = intent.request.quantity,
            price = %intent.request.price,
            stop = %intent.request.stop_price,
            client_id,
            mode = ?self.config.mode,
            "Starting bracket placement"
        );

        let mut manager = ConnectionManager::connect(
            self.config.connection_config(client_id),
            Arc::clone(&order_ids),
        )
        .map_err(Box::new)?;

        let placed = self.place(&manager, order_ids, intent);

        if let Ok((_, _, Submission::Live(_))) = &placed {
            let settle = self.config.settle_time();
            if !settle.is_zero() {
                debug!(settle_ms = settle.as_millis() as u64, "Waiting for venue acknowledgements");
                thread::sleep(settle);
            }
        }

        manager.stop();
        let rejections = manager.order_rejections();
        let (contract, trigger_price, submission) = placed?;

        let outcome = RunOutcome {
            contract,
            trigger_price,
            submission,
            rejections,
        };
        for rejection in outcome.stop_rejections() {
            error!(
                order_id = rejection.order_id,
                code = rejection.code,
                message = %rejection.message,
                "Protective stop was rejected; check the entry order manually"
            );
        }
        Ok(outcome)
    }

    fn place(
        &self,
        manager: &ConnectionManager,
        order_ids: Arc<dyn OrderIdSource>,
        intent: &OrderIntent,
    ) -> AppResult<(ContractDetails, Option<Price>, Submission)> {
        let sender: DynVenueSender = Arc::new(SessionSender::new(manager.handle()));

        let resolver = ContractResolver::new(
            Arc::clone(&sender),
            manager.contracts(),
            self.config.contract.clone(),
        );
        let details = resolver.resolve(&intent.symbol, &self.config.waits.resolve_limit())?;
        warn_off_tick(&details, &intent.request);

        let trigger_price = match intent.trigger() {
            Some(trigger) => {
                let watcher = PriceWatcher::new(Arc::clone(&sender), manager.prices());
                Some(watcher.await_threshold(
                    &details.contract,
                    trigger,
                    &self.config.waits.price_limit(),
                )?)
            }
            None => None,
        };

        let submitter = BracketSubmitter::new(sender, order_ids);
        let submission = if self.config.is_dry_run() {
            let bracket = submitter.prepare(&intent.request)?;
            info!(
                entry_id = bracket.entry_id,
                entry = ?bracket.entry,
                stop = ?bracket.stop,
                "Dry run: bracket built but not sent"
            );
            Submission::DryRun(bracket)
        } else {
            Submission::Live(submitter.submit(&details.contract, &intent.request)?)
        };

        Ok((details, trigger_price, submission))
    }
}

/// Venues reject prices off the contract's tick grid.
fn warn_off_tick(details: &ContractDetails, request: &BracketRequest) {
    let tick = details.min_tick;
    let priced_entry = request.order_type.has_limit() || request.order_type.has_stop();
    if priced_entry && !request.price.is_on_tick(tick) {
        warn!(price = %request.price, min_tick = %tick, "Entry price is off the tick grid");
    }
    if !request.stop_price.is_on_tick(tick) {
        warn!(stop = %request.stop_price, min_tick = %tick, "Stop price is off the tick grid");
    }
}
