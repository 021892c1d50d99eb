//! Bracket order submission.
//!
//! Entry first, untransmitted; then the protective stop with its own fresh
//! id, transmitted. The stop's transmit flag releases both legs at the
//! venue, so an entry whose stop never arrives stays held.

use crate::error::{ExecutorError, ExecutorResult};
use crate::venue_sender::DynVenueSender;
use bracket_core::{
    BracketOrder, BracketRef, BracketRequest, Contract, OrderIdSource, OrderRole,
};
use bracket_ws::VenueRequest;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Ids the venue assigned to a submitted bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedBracket {
    pub bracket: BracketOrder,
    pub stop_id: u64,
}

impl SubmittedBracket {
    pub fn entry_id(&self) -> u64 {
        self.bracket.entry_id
    }
}

/// Places linked entry + stop pairs.
pub struct BracketSubmitter {
    sender: DynVenueSender,
    order_ids: Arc<dyn OrderIdSource>,
}

impl BracketSubmitter {
    pub fn new(sender: DynVenueSender, order_ids: Arc<dyn OrderIdSource>) -> Self {
        Self { sender, order_ids }
    }

    /// Validate `request` and build both legs under a freshly allocated
    /// entry id. Nothing is sent.
    pub fn prepare(&self, request: &BracketRequest) -> ExecutorResult<BracketOrder> {
        request.validate()?;
        let entry_id = self.order_ids.next_id(None)?;
        let bracket = BracketOrder::new(entry_id, request, BracketRef::new())?;
        debug!(
            entry_id,
            bracket_ref = %bracket.bracket_ref,
            "Bracket prepared"
        );
        Ok(bracket)
    }

    /// Place the bracket for `contract`.
    ///
    /// # Errors
    ///
    /// Validation, id allocation and send failures before the entry is
    /// queued abort with nothing placed. Any failure after that is returned
    /// as `ExecutorError::PartialBracket`.
    pub fn submit(
        &self,
        contract: &Contract,
        request: &BracketRequest,
    ) -> ExecutorResult<SubmittedBracket> {
        let bracket = self.prepare(request)?;
        let entry_id = bracket.entry_id;

        self.sender.watch_order(entry_id, OrderRole::Entry);
        self.sender.send(VenueRequest::PlaceOrder {
            order_id: entry_id,
            contract: contract.clone(),
            order: bracket.entry.clone(),
        })?;
        info!(
            order_id = entry_id,
            action = %bracket.entry.action,
            order_type = %bracket.entry.order_type,
            quantity = bracket.entry.total_quantity,
            lmt_price = ?bracket.entry.lmt_price,
            aux_price = ?bracket.entry.aux_price,
            %contract,
            "Entry order placed (held)"
        );

        let stop_id = match self.order_ids.next_id(None) {
            Ok(id) => id,
            Err(e) => return Err(partial(entry_id, e.to_string())),
        };

        self.sender.watch_order(stop_id, OrderRole::ProtectiveStop);
        if let Err(e) = self.sender.send(VenueRequest::PlaceOrder {
            order_id: stop_id,
            contract: contract.clone(),
            order: bracket.stop.clone(),
        }) {
            return Err(partial(entry_id, e.to_string()));
        }
        info!(
            order_id = stop_id,
            parent_id = entry_id,
            action = %bracket.stop.action,
            aux_price = ?bracket.stop.aux_price,
            bracket_ref = %bracket.bracket_ref,
            "Protective stop placed"
        );

        Ok(SubmittedBracket { bracket, stop_id })
    }
}

fn partial(entry_id: u64, reason: String) -> ExecutorError {
    error!(entry_id, %reason, "Entry queued without protective stop");
    ExecutorError::PartialBracket { entry_id, reason }
}
