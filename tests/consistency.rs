use {
  super::*,
  std::{
    sync::{mpsc, Mutex},
    thread,
  },
};

/// Hands out the history as it was when the first caller arrived, and holds
/// that caller until released.
struct GatedChain {
  inner: Arc<MemoryChain>,
  gate: Mutex<Option<mpsc::Receiver<()>>>,
  entered: Mutex<mpsc::Sender<()>>,
}

impl ChainSource for GatedChain {
  fn history(&self, script: &Script) -> anyhow::Result<Vec<HistoryEntry>> {
    let history = self.inner.history(script)?;
    let gate = self.gate.lock().unwrap().take();
    if let Some(gate) = gate {
      self.entered.lock().unwrap().send(()).unwrap();
      gate.recv().unwrap();
    }
    Ok(history)
  }

  fn raw_transaction(&self, txid: &Txid) -> anyhow::Result<Vec<u8>> {
    self.inner.raw_transaction(txid)
  }

  fn unspent_outputs(&self, script: &Script) -> anyhow::Result<Vec<Utxo>> {
    self.inner.unspent_outputs(script)
  }
}

fn fixed(token: u8) -> Event {
  Event::Listing(ListingEvent {
    listing_type: ListingType::Fixed,
    royalty_bps: 0,
    price: 1_000,
    min_bid: 0,
    end_time: 0,
    min_bid_increment: 0,
    seller_pkh: pkh(0x11),
    creator_pkh: pkh(0x11),
    token_category: category(token),
    tracking_category: None,
  })
}

#[test]
fn slow_stale_refresh_does_not_clobber_fresh_one() {
  let chain = Arc::new(MemoryChain::new());
  let index_script = script(LISTING_INDEX);
  let first = chain.confirm(
    &index_script,
    vec![event_output(&fixed(1)), plain_output(&index_script, 546)],
    1,
    GENESIS_TIME,
  );

  let (release, gate) = mpsc::channel();
  let (entered, arrived) = mpsc::channel();
  let index = Arc::new(Index::new(
    Arc::new(GatedChain {
      inner: chain.clone(),
      gate: Mutex::new(Some(gate)),
      entered: Mutex::new(entered),
    }),
    Arc::new(FixedClock::new(NOW)),
    IndexSettings {
      listing_index: vec![index_script.clone()],
      ..Default::default()
    },
  ));

  let slow = thread::spawn({
    let index = index.clone();
    move || index.refresh_listings().unwrap()
  });
  arrived.recv().unwrap();

  let second = chain.confirm(
    &index_script,
    vec![event_output(&fixed(2)), plain_output(&index_script, 546)],
    2,
    GENESIS_TIME + 600,
  );
  let fresh = index.refresh_listings().unwrap();
  assert_eq!(fresh.version, 2);
  assert!(fresh.table.contains(&second));

  release.send(()).unwrap();
  let seen_by_slow = slow.join().unwrap();

  assert_eq!(seen_by_slow.version, 2);
  let published = index.listings().unwrap();
  assert_eq!(published.version, 2);
  assert!(published.table.contains(&first));
  assert!(published.table.contains(&second));
}

#[test]
fn late_explicit_status_replaces_inference() {
  let mut market = Market::new();
  let txid = market.confirm(
    LISTING_INDEX,
    fixed(3),
    vec![token_output(&script(0x55), 1_000, nft(3))],
  );

  let inferred = market.index.listings().unwrap();
  let record = inferred.table.get(&txid).unwrap();
  assert_eq!(record.status, ListingStatus::Sold);
  assert!(record.status_inferred);

  market.confirm(
    LISTING_INDEX,
    Event::Status(StatusEvent {
      status: StatusCode::Cancelled,
      listing_txid: txid,
      actor_pkh: pkh(0x11),
    }),
    Vec::new(),
  );
  market.index.invalidate_all();

  let explicit = market.index.listings().unwrap();
  let record = explicit.table.get(&txid).unwrap();
  assert_eq!(record.status, ListingStatus::Cancelled);
  assert!(!record.status_inferred);
  assert!(!record.conflicted);
}

#[test]
fn outage_serves_last_table_flagged() {
  let mut market = Market::new();
  let txid = market.confirm(LISTING_INDEX, fixed(4), Vec::new());
  let good = market.index.listings().unwrap();

  market.chain.set_offline(true);
  market.clock.advance(3_600);

  let snapshot = market.index.listings().unwrap();
  assert!(snapshot.degraded);
  assert_eq!(snapshot.version, good.version);
  assert!(snapshot.table.contains(&txid));
  assert!(snapshot
    .error
    .as_deref()
    .unwrap()
    .contains("chain source offline"));

  let status = market.index.status();
  assert!(status.listings.degraded);
  assert!(!status.listings.fresh);
}

#[test]
fn outage_without_cache_is_unavailable() {
  let market = Market::new();
  market.chain.set_offline(true);

  match market.index.collection_bids() {
    Err(IndexError::Unavailable { family, message }) => {
      assert_eq!(family, Family::CollectionBids);
      assert!(message.contains("chain source offline"));
    }
    Ok(_) => panic!("served a table while the chain source is offline"),
  }
}
