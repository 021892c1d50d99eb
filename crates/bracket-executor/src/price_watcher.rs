//! Price gate on last-trade ticks.

use crate::error::{ExecutorError, ExecutorResult};
use crate::venue_sender::DynVenueSender;
use bracket_core::{Contract, Price, PriceTrigger};
use bracket_ws::{PendingRequestRegistry, VenueRequest, WaitLimit};
use std::sync::Arc;
use tracing::{info, warn};

/// Blocks until the market trades through a threshold.
pub struct PriceWatcher {
    sender: DynVenueSender,
    registry: Arc<PendingRequestRegistry<Price>>,
}

impl PriceWatcher {
    pub fn new(sender: DynVenueSender, registry: Arc<PendingRequestRegistry<Price>>) -> Self {
        Self { sender, registry }
    }

    /// Same as [`await_threshold`](Self::await_threshold) with raw bounds.
    pub fn await_bounds(
        &self,
        contract: &Contract,
        above: Option<Price>,
        below: Option<Price>,
        limit: &WaitLimit,
    ) -> ExecutorResult<Price> {
        let trigger = PriceTrigger::new(above, below)?;
        self.await_threshold(contract, trigger, limit)
    }

    /// Subscribe to `contract` and return the first last-trade price that
    /// satisfies `trigger`.
    ///
    /// The subscription is cancelled on every exit path.
    pub fn await_threshold(
        &self,
        contract: &Contract,
        trigger: PriceTrigger,
        limit: &WaitLimit,
    ) -> ExecutorResult<Price> {
        let slot = self
            .registry
            .create_with_trigger(move |price: &Price| trigger.is_satisfied(*price));
        let req_id = slot.id();
        info!(req_id, %contract, %trigger, "Waiting for price trigger");

        if let Err(e) = self
            .sender
            .send(VenueRequest::market_data(req_id, contract.clone()))
        {
            self.registry.remove(req_id);
            return Err(e.into());
        }

        let outcome = slot.wait(limit);

        self.registry.remove(req_id);
        if let Err(e) = self.sender.send(VenueRequest::CancelMktData { req_id }) {
            warn!(req_id, %e, "Failed to cancel market data subscription");
        }

        match outcome {
            Ok(Some(price)) => {
                info!(req_id, %price, ticks = slot.updates(), "Price trigger satisfied");
                Ok(price)
            }
            Ok(None) => Err(ExecutorError::MarketDataEnded { req_id }),
            Err(source) => {
                warn!(req_id, %source, ticks = slot.updates(), "Price wait abandoned");
                Err(ExecutorError::Wait {
                    what: "price trigger",
                    source,
                })
            }
        }
    }
}
