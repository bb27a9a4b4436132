use super::*;

const POOL_CONTRACT: u8 = 0x90;

fn deploy(market: &mut Market, price: u64, deposit: u64) -> Txid {
  market.confirm(
    POOL_INDEX,
    Event::CollectionBid(CollectionBidEvent {
      royalty_bps: 100,
      price,
      bidder_pkh: pkh(0xc1),
      creator_pkh: pkh(0x22),
      token_category: category(0x81),
      bid_salt: BidSalt([0x5a; 32]),
    }),
    vec![
      plain_output(&script(0xee), 2_000),
      plain_output(&script(POOL_CONTRACT), deposit),
    ],
  )
}

fn fill(market: &mut Market, pool: Txid, status: CollectionBidStatusCode) {
  market.confirm(
    POOL_INDEX,
    Event::CollectionBidStatus(CollectionBidStatusEvent {
      status,
      bid_txid: pool,
      actor_pkh: pkh(0xc2),
    }),
    Vec::new(),
  );
}

#[test]
fn pool_balance_tracks_contract() {
  let mut market = Market::new();
  let pool = deploy(&mut market, 10_000, 50_000);
  fill(&mut market, pool, CollectionBidStatusCode::Filled);
  market.chain.set_unspent(
    &script(POOL_CONTRACT),
    vec![utxo(pool, 3, 40_000, None)],
  );

  let snapshot = market.index.pools().unwrap();
  let record = snapshot.table.get(&pool).unwrap();

  assert_eq!(record.contract, Some(script(POOL_CONTRACT)));
  assert_eq!(record.available_sats, 40_000);
  assert_eq!(record.fills, 1);
  assert_eq!(record.status, PoolStatus::Active);

  let json = serde_json::to_value(record).unwrap();
  assert_eq!(json["availableSats"], "40000");
}

#[test]
fn drained_pool_is_depleted_until_topped_up() {
  let mut market = Market::new();
  let pool = deploy(&mut market, 10_000, 50_000);
  market
    .chain
    .set_unspent(&script(POOL_CONTRACT), vec![utxo(pool, 3, 9_000, None)]);

  let record = market.index.pools().unwrap().table.get(&pool).cloned().unwrap();
  assert_eq!(record.status, PoolStatus::Depleted);
  assert!(record.status_inferred);

  market.chain.set_unspent(
    &script(POOL_CONTRACT),
    vec![utxo(pool, 3, 9_000, None), utxo(pool, 4, 1_000, None)],
  );
  let record = market
    .index
    .refresh_pools()
    .unwrap()
    .table
    .get(&pool)
    .cloned()
    .unwrap();
  assert_eq!(record.status, PoolStatus::Active);
  assert_eq!(record.available_sats, 10_000);
}

#[test]
fn closed_pool_is_not_resynchronized() {
  let mut market = Market::new();
  let pool = deploy(&mut market, 10_000, 50_000);
  fill(&mut market, pool, CollectionBidStatusCode::Cancelled);
  market.chain.set_unspent_offline(true);

  let snapshot = market.index.pools().unwrap();

  assert_eq!(snapshot.table.get(&pool).unwrap().status, PoolStatus::Closed);
  assert!(!snapshot.degraded);
}
