use super::{Error, EventContext, Family, StateTable, UnspentLookup};
use crate::market::{
  codec::{CollectionBidEvent, CollectionBidStatusEvent, Event, EventKind},
  datastore::{CollectionBid, CollectionBidStatus, CollectionBidTable, FoldReport},
};
use bitcoin::OutPoint;

impl StateTable for CollectionBidTable {
  const FAMILY: Family = Family::CollectionBids;

  fn apply(&mut self, context: &EventContext, event: &Event) -> Result<bool, Error> {
    let result = match event {
      Event::CollectionBid(bid) => process_collection_bid(self, context, bid),
      Event::CollectionBidStatus(status) => process_collection_bid_status(self, context, status),
      Event::Listing(_) | Event::Bid(_) | Event::Status(_) => return Ok(false),
    };
    result.map(|()| true)
  }

  fn reconcile(&mut self, unspent: &mut UnspentLookup) {
    let (mut inferred, mut failures) = (0, 0);

    for bid in self
      .values_mut()
      .filter(|bid| bid.status == CollectionBidStatus::Active)
    {
      let (Some(contract), Some(outpoint)) = (&bid.contract, bid.outpoint) else {
        continue;
      };

      match unspent.get(contract) {
        Ok(utxos) if utxos.iter().any(|utxo| utxo.outpoint == outpoint) => {}
        Ok(_) => {
          bid.status = CollectionBidStatus::Filled;
          bid.status_inferred = true;
          inferred += 1;
          log::warn!(
            "collection bid {} funding {} is spent, inferred filled",
            bid.txid,
            outpoint
          );
        }
        Err(err) => {
          log::warn!("failed to reconcile collection bid {}: {err}", bid.txid);
          failures += 1;
        }
      }
    }

    self.report_mut().inferred += inferred;
    self.report_mut().reconcile_failures += failures;
  }

  fn report(&self) -> &FoldReport {
    CollectionBidTable::report(self)
  }

  fn report_mut(&mut self) -> &mut FoldReport {
    CollectionBidTable::report_mut(self)
  }
}

fn process_collection_bid(
  table: &mut CollectionBidTable,
  context: &EventContext,
  event: &CollectionBidEvent,
) -> Result<(), Error> {
  let duplicate = table.get(&context.txid).is_some()
    || table
      .find_by_salt(&event.token_category, &event.bid_salt)
      .is_some();
  if duplicate {
    return Err(Error::Duplicate {
      kind: EventKind::CollectionBid,
      txid: context.txid,
    });
  }

  let funding = context.find_output(|output| output.value > 0 && output.token.is_none());

  table.insert(CollectionBid {
    txid: context.txid,
    bidder_pkh: event.bidder_pkh,
    creator_pkh: event.creator_pkh,
    royalty_bps: event.royalty_bps,
    price: event.price,
    token_category: event.token_category,
    bid_salt: event.bid_salt,
    contract: funding.map(|(_, output)| output.script_pubkey.clone()),
    outpoint: funding.map(|(vout, _)| OutPoint::new(context.txid, vout)),
    status: CollectionBidStatus::Active,
    status_inferred: false,
    conflicted: false,
    created_at: context.time,
    updated_at: context.time,
    created_height: context.height,
    updated_height: context.height,
  });

  Ok(())
}

fn process_collection_bid_status(
  table: &mut CollectionBidTable,
  context: &EventContext,
  event: &CollectionBidStatusEvent,
) -> Result<(), Error> {
  let bid = table
    .get_mut(&event.bid_txid)
    .ok_or(Error::UnknownReference {
      kind: EventKind::CollectionBidStatus,
      txid: event.bid_txid,
    })?;

  let status = CollectionBidStatus::from(event.status);
  let conflict = bid.status != CollectionBidStatus::Active && bid.status != status;
  if conflict {
    log::warn!(
      "collection bid {} status conflict: {} then {}",
      bid.txid,
      bid.status,
      status
    );
    bid.conflicted = true;
  }

  bid.status = status;
  bid.status_inferred = false;
  bid.updated_at = context.time;
  bid.updated_height = context.height;

  if conflict {
    table.report_mut().conflicts += 1;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    chain::{
      memory::{event_output, plain_output, utxo},
      CashOutput, MemoryChain,
    },
    market::{
      codec::{BidSalt, CollectionBidStatusCode, Pkh, TokenCategory},
      protocol::{tests::script, ProtocolManager},
    },
  };
  use bitcoin::{Script, Txid};
  use pretty_assertions::assert_eq;

  const CONTRACT: u8 = 0xc0;

  fn collection_bid(salt: u8) -> CollectionBidEvent {
    CollectionBidEvent {
      royalty_bps: 300,
      price: 25_000,
      bidder_pkh: Pkh([0xb1; 20]),
      creator_pkh: Pkh([0x22; 20]),
      token_category: TokenCategory([0x33; 32]),
      bid_salt: BidSalt([salt; 32]),
    }
  }

  fn create(chain: &MemoryChain, index: &Script, salt: u8) -> Txid {
    chain.confirm(
      index,
      vec![
        event_output(&Event::CollectionBid(collection_bid(salt))),
        plain_output(index, 546),
        plain_output(&script(CONTRACT), 25_000),
      ],
      10,
      6000,
    )
  }

  fn status(bid_txid: Txid, status: CollectionBidStatusCode) -> Vec<CashOutput> {
    vec![event_output(&Event::CollectionBidStatus(
      CollectionBidStatusEvent {
        status,
        bid_txid,
        actor_pkh: Pkh([0x44; 20]),
      },
    ))]
  }

  fn fold(chain: &MemoryChain, index: &Script) -> CollectionBidTable {
    let indexes = [index.to_owned()];
    ProtocolManager::new(chain, &indexes).fold(9000).unwrap()
  }

  #[test]
  fn test_funding_output_is_first_tokenless_value() {
    let chain = MemoryChain::new();
    let index = script(0x02);
    let txid = create(&chain, &index, 1);
    chain.set_unspent(&script(CONTRACT), vec![utxo(txid, 2, 25_000, None)]);

    let table = fold(&chain, &index);
    let bid = table.get(&txid).unwrap();

    assert_eq!(bid.contract, Some(script(CONTRACT)));
    assert_eq!(bid.outpoint, Some(OutPoint::new(txid, 2)));
    assert_eq!(bid.status, CollectionBidStatus::Active);
  }

  #[test]
  fn test_salt_reuse_is_duplicate() {
    let chain = MemoryChain::new();
    let index = script(0x02);
    let first = create(&chain, &index, 7);
    let second = create(&chain, &index, 7);

    let table = fold(&chain, &index);

    assert!(table.get(&first).is_some());
    assert!(table.get(&second).is_none());
    assert_eq!(table.report().duplicates, 1);
  }

  #[test]
  fn test_status_last_writer_wins() {
    let chain = MemoryChain::new();
    let index = script(0x02);
    let txid = create(&chain, &index, 1);
    chain.confirm(&index, status(txid, CollectionBidStatusCode::Cancelled), 11, 6600);
    chain.confirm(&index, status(txid, CollectionBidStatusCode::Filled), 12, 7200);

    let table = fold(&chain, &index);
    let bid = table.get(&txid).unwrap();

    assert_eq!(bid.status, CollectionBidStatus::Filled);
    assert!(bid.conflicted);
    assert_eq!(bid.updated_at, 7200);
    assert_eq!(table.report().conflicts, 1);
  }

  #[test]
  fn test_spent_funding_infers_filled() {
    let chain = MemoryChain::new();
    let index = script(0x02);
    let spent = create(&chain, &index, 1);
    let unspent = create(&chain, &index, 2);
    chain.set_unspent(&script(CONTRACT), vec![utxo(unspent, 2, 25_000, None)]);

    let table = fold(&chain, &index);

    let spent = table.get(&spent).unwrap();
    assert_eq!(spent.status, CollectionBidStatus::Filled);
    assert!(spent.status_inferred);
    assert_eq!(spent.updated_at, 6000);
    assert_eq!(
      table.get(&unspent).unwrap().status,
      CollectionBidStatus::Active
    );
    assert_eq!(table.report().inferred, 1);
  }
}
