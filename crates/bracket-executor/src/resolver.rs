//! Blocking contract lookup.

use crate::error::{ExecutorError, ExecutorResult};
use crate::venue_sender::DynVenueSender;
use bracket_core::{ContractDetails, ContractTemplate};
use bracket_ws::{PendingRequestRegistry, VenueRequest, WaitLimit};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves exchange-local symbols into venue contracts.
pub struct ContractResolver {
    sender: DynVenueSender,
    registry: Arc<PendingRequestRegistry<ContractDetails>>,
    template: ContractTemplate,
}

impl ContractResolver {
    pub fn new(
        sender: DynVenueSender,
        registry: Arc<PendingRequestRegistry<ContractDetails>>,
        template: ContractTemplate,
    ) -> Self {
        Self {
            sender,
            registry,
            template,
        }
    }

    /// Look up `symbol` and block until the venue ends the result list.
    ///
    /// With several matches the last one wins. Without an end marker this
    /// blocks for as long as `limit` allows.
    pub fn resolve(&self, symbol: &str, limit: &WaitLimit) -> ExecutorResult<ContractDetails> {
        let lookup = self.template.lookup(symbol);
        let slot = self.registry.create();
        let req_id = slot.id();
        debug!(req_id, contract = %lookup, "Requesting contract details");

        if let Err(e) = self.sender.send(VenueRequest::ReqContractDetails {
            req_id,
            contract: lookup,
        }) {
            self.registry.remove(req_id);
            return Err(e.into());
        }

        let details = slot.wait(limit).map_err(|source| {
            self.registry.remove(req_id);
            warn!(req_id, symbol, %source, "Contract lookup abandoned");
            ExecutorError::Wait {
                what: "contract details",
                source,
            }
        })?;

        let Some(details) = details else {
            warn!(req_id, symbol, "No contract matches symbol");
            return Err(ExecutorError::UnresolvedSymbol(symbol.to_string()));
        };

        let matches = slot.updates();
        if matches > 1 {
            warn!(req_id, symbol, matches, "Symbol is ambiguous, using last match");
        }

        info!(
            req_id,
            symbol,
            contract = %details.contract,
            con_id = ?details.contract.con_id,
            long_name = %details.long_name,
            "Contract resolved"
        );
        Ok(details)
    }
}
