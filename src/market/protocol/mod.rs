mod collection_bid;
mod error;
mod listing;
mod pool;
mod protocol_manager;
mod resolve_manager;

pub use self::{
  error::Error,
  protocol_manager::{FirstSeen, ProtocolManager},
  resolve_manager::resolve_events,
};

use crate::{
  chain::{CashOutput, ChainSource, Utxo},
  market::{codec::Event, datastore::FoldReport},
  Result,
};
use bitcoin::{Script, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum Family {
  #[display(fmt = "listings")]
  Listings,
  #[display(fmt = "collection bids")]
  CollectionBids,
  #[display(fmt = "pools")]
  Pools,
}

/// Where an event was found.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
  pub txid: Txid,
  pub height: i64,
  pub time: u64,
  pub outputs: &'a [CashOutput],
  pub indexes: &'a [ScriptBuf],
}

impl<'a> EventContext<'a> {
  /// Outputs that may hold a covenant: neither null-data nor the dust paid
  /// to an index script.
  pub fn contract_outputs(&self) -> impl Iterator<Item = (u32, &'a CashOutput)> + '_ {
    self
      .outputs
      .iter()
      .enumerate()
      .filter(|(_, output)| {
        !output.is_null_data() && !self.indexes.contains(&output.script_pubkey)
      })
      .filter_map(|(vout, output)| Some((u32::try_from(vout).ok()?, output)))
  }

  pub fn find_output(
    &self,
    predicate: impl Fn(&CashOutput) -> bool,
  ) -> Option<(u32, &'a CashOutput)> {
    self
      .contract_outputs()
      .find(|(_, output)| predicate(output))
  }
}

/// A family's state, rebuilt by folding its event log and then checked
/// against live unspent outputs.
pub trait StateTable: Default + Clone + Send + Sync + 'static {
  const FAMILY: Family;

  /// Returns `Ok(false)` for events that belong to another family.
  fn apply(&mut self, context: &EventContext, event: &Event) -> Result<bool, Error>;

  /// Only records still active after the full fold are inspected. Inferred
  /// statuses keep the timestamps of the last event.
  fn reconcile(&mut self, unspent: &mut UnspentLookup);

  fn report(&self) -> &FoldReport;

  fn report_mut(&mut self) -> &mut FoldReport;
}

/// Memoizes unspent queries per contract for one reconciliation pass.
pub struct UnspentLookup<'a> {
  chain: &'a dyn ChainSource,
  utxos: HashMap<ScriptBuf, Vec<Utxo>>,
}

impl<'a> UnspentLookup<'a> {
  pub fn new(chain: &'a dyn ChainSource) -> Self {
    Self {
      chain,
      utxos: HashMap::new(),
    }
  }

  pub fn get(&mut self, script: &Script) -> Result<&[Utxo]> {
    if !self.utxos.contains_key(script) {
      let utxos = self.chain.unspent_outputs(script)?;
      self.utxos.insert(script.to_owned(), utxos);
    }
    Ok(self.utxos.get(script).map(Vec::as_slice).unwrap_or_default())
  }
}
