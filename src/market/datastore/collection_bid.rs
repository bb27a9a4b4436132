use super::{FoldReport, Table};
use crate::{
  custom_serde::U64StringSerde,
  market::codec::{BidSalt, CollectionBidStatusCode, Pkh, TokenCategory},
};
use bitcoin::{OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum CollectionBidStatus {
  #[display(fmt = "active")]
  Active,
  #[display(fmt = "filled")]
  Filled,
  #[display(fmt = "cancelled")]
  Cancelled,
}

impl From<CollectionBidStatusCode> for CollectionBidStatus {
  fn from(code: CollectionBidStatusCode) -> Self {
    match code {
      CollectionBidStatusCode::Filled => CollectionBidStatus::Filled,
      CollectionBidStatusCode::Cancelled => CollectionBidStatus::Cancelled,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBid {
  pub txid: Txid,
  pub bidder_pkh: Pkh,
  pub creator_pkh: Pkh,
  pub royalty_bps: u16,
  #[serde(with = "U64StringSerde")]
  pub price: u64,
  pub token_category: TokenCategory,
  pub bid_salt: BidSalt,
  pub contract: Option<ScriptBuf>,
  pub outpoint: Option<OutPoint>,
  pub status: CollectionBidStatus,
  pub status_inferred: bool,
  pub conflicted: bool,
  pub created_at: u64,
  pub updated_at: u64,
  pub created_height: i64,
  pub updated_height: i64,
}

/// Collection bids are unique both by txid and by (category, salt).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionBidTable {
  bids: Table<CollectionBid>,
  by_salt: HashMap<(TokenCategory, BidSalt), Txid>,
}

impl CollectionBidTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, txid: &Txid) -> Option<&CollectionBid> {
    self.bids.get(txid)
  }

  pub fn get_mut(&mut self, txid: &Txid) -> Option<&mut CollectionBid> {
    self.bids.get_mut(txid)
  }

  pub fn find_by_salt(&self, category: &TokenCategory, salt: &BidSalt) -> Option<&CollectionBid> {
    self
      .by_salt
      .get(&(*category, *salt))
      .and_then(|txid| self.bids.get(txid))
  }

  pub fn insert(&mut self, bid: CollectionBid) -> bool {
    let key = (bid.token_category, bid.bid_salt);
    if self.by_salt.contains_key(&key) || self.bids.contains(&bid.txid) {
      return false;
    }
    self.by_salt.insert(key, bid.txid);
    self.bids.insert(bid.txid, bid)
  }

  pub fn iter(&self) -> impl Iterator<Item = &CollectionBid> {
    self.bids.iter()
  }

  pub fn values_mut(&mut self) -> impl Iterator<Item = &mut CollectionBid> {
    self.bids.values_mut()
  }

  pub fn len(&self) -> usize {
    self.bids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bids.is_empty()
  }

  pub fn report(&self) -> &FoldReport {
    &self.bids.report
  }

  pub fn report_mut(&mut self) -> &mut FoldReport {
    &mut self.bids.report
  }
}
