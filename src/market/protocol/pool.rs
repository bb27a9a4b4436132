use super::{Error, EventContext, Family, StateTable, UnspentLookup};
use crate::{
  chain::CashOutput,
  market::{
    codec::{
      CollectionBidEvent, CollectionBidStatusCode, CollectionBidStatusEvent, Event, EventKind,
    },
    datastore::{FoldReport, Pool, PoolStatus, PoolTable},
  },
};

impl StateTable for PoolTable {
  const FAMILY: Family = Family::Pools;

  fn apply(&mut self, context: &EventContext, event: &Event) -> Result<bool, Error> {
    let result = match event {
      Event::CollectionBid(deploy) => process_deploy(self, context, deploy),
      Event::CollectionBidStatus(status) => process_status(self, context, status),
      Event::Listing(_) | Event::Bid(_) | Event::Status(_) => return Ok(false),
    };
    result.map(|()| true)
  }

  /// The contract balance is the authority for pools, so every open pool is
  /// resynchronized, depleted ones included.
  fn reconcile(&mut self, unspent: &mut UnspentLookup) {
    let (mut inferred, mut failures) = (0, 0);

    for pool in self
      .values_mut()
      .filter(|pool| pool.status != PoolStatus::Closed)
    {
      let Some(contract) = &pool.contract else {
        continue;
      };

      let balance = match unspent.get(contract) {
        Ok(utxos) => utxos
          .iter()
          .map(|utxo| utxo.value)
          .fold(0u64, u64::saturating_add),
        Err(err) => {
          log::warn!("failed to reconcile pool {}: {err}", pool.txid);
          failures += 1;
          continue;
        }
      };

      pool.available_sats = balance;

      let status = if balance < pool.price {
        PoolStatus::Depleted
      } else {
        PoolStatus::Active
      };

      if status != pool.status {
        log::warn!(
          "pool {} balance {} against price {}, now {}",
          pool.txid,
          balance,
          pool.price,
          status
        );
        pool.status = status;
        pool.status_inferred = status == PoolStatus::Depleted;
        inferred += 1;
      }
    }

    self.report.inferred += inferred;
    self.report.reconcile_failures += failures;
  }

  fn report(&self) -> &FoldReport {
    &self.report
  }

  fn report_mut(&mut self) -> &mut FoldReport {
    &mut self.report
  }
}

fn process_deploy(
  table: &mut PoolTable,
  context: &EventContext,
  event: &CollectionBidEvent,
) -> Result<(), Error> {
  if table.contains(&context.txid) {
    return Err(Error::Duplicate {
      kind: EventKind::CollectionBid,
      txid: context.txid,
    });
  }

  // largest tokenless output; the first one wins a tie
  let contract = context
    .contract_outputs()
    .filter(|(_, output)| output.token.is_none())
    .fold(None, |best: Option<(u32, &CashOutput)>, candidate| match best {
      Some((_, output)) if output.value >= candidate.1.value => best,
      _ => Some(candidate),
    })
    .map(|(_, output)| output.script_pubkey.clone());

  table.insert(
    context.txid,
    Pool {
      txid: context.txid,
      owner_pkh: event.bidder_pkh,
      creator_pkh: event.creator_pkh,
      royalty_bps: event.royalty_bps,
      price: event.price,
      token_category: event.token_category,
      bid_salt: event.bid_salt,
      contract,
      available_sats: 0,
      fills: 0,
      status: PoolStatus::Active,
      status_inferred: false,
      created_at: context.time,
      updated_at: context.time,
      created_height: context.height,
      updated_height: context.height,
    },
  );

  Ok(())
}

fn process_status(
  table: &mut PoolTable,
  context: &EventContext,
  event: &CollectionBidStatusEvent,
) -> Result<(), Error> {
  let pool = table
    .get_mut(&event.bid_txid)
    .ok_or(Error::UnknownReference {
      kind: EventKind::CollectionBidStatus,
      txid: event.bid_txid,
    })?;

  match event.status {
    CollectionBidStatusCode::Filled => pool.fills += 1,
    CollectionBidStatusCode::Cancelled => {
      pool.status = PoolStatus::Closed;
      pool.status_inferred = false;
    }
  }
  pool.updated_at = context.time;
  pool.updated_height = context.height;

  Ok(())
}
