use super::{Error, EventContext, Family, StateTable, UnspentLookup};
use crate::market::{
  codec::{BidEvent, Event, EventKind, ListingEvent, StatusEvent, TokenCategory},
  datastore::{BidRecord, FoldReport, Listing, ListingStatus, ListingTable, ListingTerms},
};

impl StateTable for ListingTable {
  const FAMILY: Family = Family::Listings;

  fn apply(&mut self, context: &EventContext, event: &Event) -> Result<bool, Error> {
    let result = match event {
      Event::Listing(listing) => process_listing(self, context, listing),
      Event::Bid(bid) => process_bid(self, context, bid),
      Event::Status(status) => process_status(self, context, status),
      Event::CollectionBid(_) | Event::CollectionBidStatus(_) => return Ok(false),
    };
    result.map(|()| true)
  }

  fn reconcile(&mut self, unspent: &mut UnspentLookup) {
    let (mut inferred, mut failures) = (0, 0);

    for listing in self
      .values_mut()
      .filter(|listing| listing.status == ListingStatus::Active)
    {
      let Some(contract) = &listing.contract else {
        continue;
      };

      let live = match unspent.get(contract) {
        Ok(utxos) => utxos.iter().any(|utxo| {
          utxo
            .token
            .as_ref()
            .map(|token| listing.holds(&token.category))
            .unwrap_or_default()
        }),
        Err(err) => {
          log::warn!("failed to reconcile listing {}: {err}", listing.txid);
          failures += 1;
          continue;
        }
      };

      if live {
        continue;
      }

      listing.status = match listing.terms {
        ListingTerms::Fixed { .. } => ListingStatus::Sold,
        ListingTerms::Auction { .. } if listing.has_bid() => ListingStatus::Claimed,
        ListingTerms::Auction { .. } => ListingStatus::Cancelled,
      };
      listing.status_inferred = true;
      inferred += 1;

      log::warn!(
        "listing {} escrow is gone, inferred {}",
        listing.txid,
        listing.status
      );
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

fn process_listing(
  table: &mut ListingTable,
  context: &EventContext,
  event: &ListingEvent,
) -> Result<(), Error> {
  if table.contains(&context.txid) {
    return Err(Error::Duplicate {
      kind: EventKind::Listing,
      txid: context.txid,
    });
  }

  // the escrow holds the listed token itself, or the tracking token for v2
  let holds = |category: TokenCategory| {
    context.find_output(|output| {
      output
        .token
        .as_ref()
        .map(|token| token.category == category)
        .unwrap_or_default()
    })
  };
  let escrow = holds(event.token_category)
    .or_else(|| event.tracking_category.and_then(holds))
    .map(|(_, output)| output);

  table.insert(
    context.txid,
    Listing {
      txid: context.txid,
      terms: ListingTerms::from(event),
      seller_pkh: event.seller_pkh,
      creator_pkh: event.creator_pkh,
      royalty_bps: event.royalty_bps,
      token_category: event.token_category,
      tracking_category: event.tracking_category,
      contract: escrow.map(|output| output.script_pubkey.clone()),
      commitment: escrow
        .and_then(|output| output.token.as_ref())
        .and_then(|token| token.commitment())
        .cloned(),
      bid_history: Vec::new(),
      status: ListingStatus::Active,
      status_inferred: false,
      conflicted: false,
      created_at: context.time,
      updated_at: context.time,
      created_height: context.height,
      updated_height: context.height,
      metadata: None,
    },
  );

  Ok(())
}

fn process_bid(
  table: &mut ListingTable,
  context: &EventContext,
  event: &BidEvent,
) -> Result<(), Error> {
  let listing = table
    .get_mut(&event.listing_txid)
    .ok_or(Error::UnknownReference {
      kind: EventKind::Bid,
      txid: event.listing_txid,
    })?;

  let active = listing.status == ListingStatus::Active;
  let promoted = match &mut listing.terms {
    ListingTerms::Auction {
      current_bid,
      current_bidder,
      ..
    } if active && event.bid_amount > *current_bid => {
      *current_bid = event.bid_amount;
      *current_bidder = Some(event.bidder_pkh);
      true
    }
    _ => false,
  };

  listing.bid_history.push(BidRecord {
    txid: context.txid,
    bidder_pkh: event.bidder_pkh,
    amount: event.bid_amount,
    height: context.height,
    time: context.time,
    promoted,
  });
  listing.updated_at = context.time;
  listing.updated_height = context.height;

  Ok(())
}

fn process_status(
  table: &mut ListingTable,
  context: &EventContext,
  event: &StatusEvent,
) -> Result<(), Error> {
  let listing = table
    .get_mut(&event.listing_txid)
    .ok_or(Error::UnknownReference {
      kind: EventKind::Status,
      txid: event.listing_txid,
    })?;

  let status = ListingStatus::from(event.status);
  let conflict = listing.status.is_terminal() && listing.status != status;
  if conflict {
    log::warn!(
      "listing {} status conflict: {} then {}",
      listing.txid,
      listing.status,
      status
    );
    listing.conflicted = true;
  }

  listing.status = status;
  listing.status_inferred = false;
  listing.updated_at = context.time;
  listing.updated_height = context.height;

  if conflict {
    table.report.conflicts += 1;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    chain::{
      memory::{event_output, plain_output, token_output, utxo},
      Capability, CashOutput, Commitment, MemoryChain, Nft, TokenData,
    },
    market::{
      codec::{ListingType, Pkh, StatusCode, TokenCategory},
      protocol::{
        tests::{fixed_listing, script},
        ProtocolManager,
      },
    },
  };
  use bitcoin::Txid;
  use pretty_assertions::assert_eq;

  const ESCROW: u8 = 0xe0;

  fn nft(category: u8) -> TokenData {
    TokenData {
      category: TokenCategory([category; 32]),
      amount: 0,
      nft: Some(Nft {
        capability: Capability::None,
        commitment: Commitment::default(),
      }),
    }
  }

  fn auction(category: u8) -> ListingEvent {
    ListingEvent {
      listing_type: ListingType::Auction,
      min_bid: 1000,
      end_time: 1_700_000_000,
      min_bid_increment: 100,
      ..fixed_listing(0, category)
    }
  }

  fn create(chain: &MemoryChain, index: &bitcoin::Script, event: ListingEvent, height: i64) -> Txid {
    let category = event.token_category.0[0];
    chain.confirm(
      index,
      vec![
        event_output(&Event::Listing(event)),
        token_output(&script(ESCROW), 1000, nft(category)),
        plain_output(index, 546),
      ],
      height,
      u32::try_from(height * 600).unwrap(),
    )
  }

  fn bid(listing_txid: Txid, bidder: u8, amount: u64) -> Vec<CashOutput> {
    vec![event_output(&Event::Bid(BidEvent {
      listing_txid,
      bidder_pkh: Pkh([bidder; 20]),
      bid_amount: amount,
    }))]
  }

  fn status(listing_txid: Txid, status: StatusCode) -> Vec<CashOutput> {
    vec![event_output(&Event::Status(StatusEvent {
      status,
      listing_txid,
      actor_pkh: Pkh([0x11; 20]),
    }))]
  }

  fn fold(chain: &MemoryChain, index: &bitcoin::Script) -> ListingTable {
    let indexes = [index.to_owned()];
    ProtocolManager::new(chain, &indexes).fold(1_000_000).unwrap()
  }

  #[test]
  fn test_fixed_listing_end_to_end_sold() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, fixed_listing(100_000, 7), 10);
    chain.confirm(&index, status(listing, StatusCode::Sold), 11, 6610);

    let table = fold(&chain, &index);
    let record = table.get(&listing).unwrap();

    assert_eq!(record.status, ListingStatus::Sold);
    assert_eq!(record.terms, ListingTerms::Fixed { price: 100_000 });
    assert!(record.updated_at > record.created_at);
    assert!(!record.status_inferred);
    assert_eq!(record.contract, Some(script(ESCROW)));
  }

  #[test]
  fn test_bids_promote_only_when_higher() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, auction(8), 10);
    chain.set_unspent(&script(ESCROW), vec![utxo(listing, 1, 1000, Some(nft(8)))]);
    for (height, bidder, amount) in [(11, 0xb1, 5000), (12, 0xb2, 3000), (13, 0xb3, 9000)] {
      chain.confirm(&index, bid(listing, bidder, amount), height, 7000);
    }

    let table = fold(&chain, &index);
    let record = table.get(&listing).unwrap();

    match record.terms {
      ListingTerms::Auction {
        current_bid,
        current_bidder,
        ..
      } => {
        assert_eq!(current_bid, 9000);
        assert_eq!(current_bidder, Some(Pkh([0xb3; 20])));
      }
      ListingTerms::Fixed { .. } => panic!("expected auction"),
    }
    assert_eq!(
      record
        .bid_history
        .iter()
        .map(|bid| (bid.amount, bid.promoted))
        .collect::<Vec<_>>(),
      vec![(5000, true), (3000, false), (9000, true)]
    );
    assert_eq!(record.status, ListingStatus::Active);
  }

  #[test]
  fn test_bid_after_terminal_status_keeps_status() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, auction(9), 10);
    chain.confirm(&index, status(listing, StatusCode::Sold), 11, 7000);
    chain.confirm(&index, bid(listing, 0xb1, 50_000), 12, 7600);

    let table = fold(&chain, &index);
    let record = table.get(&listing).unwrap();

    assert_eq!(record.status, ListingStatus::Sold);
    assert_eq!(record.bid_history.len(), 1);
    assert!(!record.bid_history[0].promoted);
    assert!(!record.has_bid());
    assert_eq!(record.updated_at, 7600);
  }

  #[test]
  fn test_duplicate_create_keeps_first() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let first = fixed_listing(100, 3);
    let second = fixed_listing(999, 3);
    let txid = chain.confirm(
      &index,
      vec![
        event_output(&Event::Listing(first)),
        event_output(&Event::Listing(second)),
      ],
      5,
      3000,
    );

    let table = fold(&chain, &index);
    assert_eq!(table.len(), 1);
    assert_eq!(table.report.duplicates, 1);
    assert_eq!(
      table.get(&txid).unwrap().terms,
      ListingTerms::Fixed { price: 100 }
    );
  }

  #[test]
  fn test_conflicting_terminals_last_wins() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, fixed_listing(100, 4), 10);
    chain.confirm(&index, status(listing, StatusCode::Sold), 11, 7000);
    chain.confirm(&index, status(listing, StatusCode::Cancelled), 12, 7600);

    let table = fold(&chain, &index);
    let record = table.get(&listing).unwrap();

    assert_eq!(record.status, ListingStatus::Cancelled);
    assert!(record.conflicted);
    assert_eq!(table.report.conflicts, 1);
  }

  #[test]
  fn test_missing_escrow_infers_terminal() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let fixed = create(&chain, &index, fixed_listing(100, 1), 10);
    let unbid = create(&chain, &index, auction(2), 10);
    let bid_on = create(&chain, &index, auction(3), 10);
    let live = create(&chain, &index, fixed_listing(100, 4), 10);
    chain.confirm(&index, bid(bid_on, 0xb1, 2000), 11, 7000);
    chain.set_unspent(&script(ESCROW), vec![utxo(live, 1, 1000, Some(nft(4)))]);

    let table = fold(&chain, &index);
    let status_of = |txid: &Txid| {
      let record = table.get(txid).unwrap();
      (record.status, record.status_inferred)
    };

    assert_eq!(status_of(&fixed), (ListingStatus::Sold, true));
    assert_eq!(status_of(&unbid), (ListingStatus::Cancelled, true));
    assert_eq!(status_of(&bid_on), (ListingStatus::Claimed, true));
    assert_eq!(status_of(&live), (ListingStatus::Active, false));
    assert_eq!(table.report.inferred, 3);
    assert_eq!(table.get(&fixed).unwrap().updated_at, 6000);
  }

  #[test]
  fn test_explicit_status_beats_inference() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, auction(5), 10);
    chain.confirm(&index, bid(listing, 0xb1, 2000), 11, 7000);

    let inferred = fold(&chain, &index);
    assert_eq!(
      inferred.get(&listing).map(|record| (record.status, record.status_inferred)),
      Some((ListingStatus::Claimed, true))
    );

    chain.confirm(&index, status(listing, StatusCode::Cancelled), 12, 7600);

    let explicit = fold(&chain, &index);
    let record = explicit.get(&listing).unwrap();
    assert_eq!(record.status, ListingStatus::Cancelled);
    assert!(!record.status_inferred);
    assert!(!record.conflicted);
    assert_eq!(explicit.report.inferred, 0);
  }

  #[test]
  fn test_failed_unspent_query_degrades() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, fixed_listing(100, 6), 10);
    chain.set_unspent_offline(true);

    let table = fold(&chain, &index);

    assert_eq!(table.get(&listing).unwrap().status, ListingStatus::Active);
    assert!(table.report.degraded());
  }

  #[test]
  fn test_tracking_category_escrow() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let event = ListingEvent {
      tracking_category: Some(TokenCategory([0x77; 32])),
      ..fixed_listing(100, 6)
    };
    let listing = chain.confirm(
      &index,
      vec![
        event_output(&Event::Listing(event)),
        token_output(&script(ESCROW), 1000, nft(0x77)),
      ],
      10,
      6000,
    );
    chain.set_unspent(&script(ESCROW), vec![utxo(listing, 1, 1000, Some(nft(0x77)))]);

    let table = fold(&chain, &index);
    let record = table.get(&listing).unwrap();

    assert_eq!(record.contract, Some(script(ESCROW)));
    assert_eq!(record.status, ListingStatus::Active);
  }

  #[test]
  fn test_fold_is_idempotent() {
    let chain = MemoryChain::new();
    let index = script(0x01);
    let listing = create(&chain, &index, auction(5), 10);
    chain.confirm(&index, bid(listing, 0xb1, 2000), 11, 7000);
    chain.confirm(&index, bid(listing, 0xb2, 1500), 11, 7000);
    chain.mempool(&index, status(listing, StatusCode::Claimed));

    assert_eq!(fold(&chain, &index), fold(&chain, &index));
  }
}
