pub mod collection_bid;
pub mod listing;
pub mod pool;

pub use self::{
  collection_bid::{CollectionBid, CollectionBidStatus, CollectionBidTable},
  listing::{BidRecord, Listing, ListingStatus, ListingTable, ListingTerms},
  pool::{Pool, PoolStatus, PoolTable},
};
use bitcoin::Txid;
use serde::Serialize;
use std::collections::HashMap;

/// Counters gathered while folding one family's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldReport {
  pub transactions: u64,
  pub events: u64,
  pub malformed: u64,
  pub invalid: u64,
  pub duplicates: u64,
  pub unknown_references: u64,
  pub conflicts: u64,
  pub inferred: u64,
  pub reconcile_failures: u64,
}

impl FoldReport {
  /// A table is degraded when part of it could not be checked against the
  /// live unspent set.
  pub fn degraded(&self) -> bool {
    self.reconcile_failures > 0
  }
}

/// Records keyed by their creating txid, kept in the order they were
/// created.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
  records: HashMap<Txid, R>,
  order: Vec<Txid>,
  pub report: FoldReport,
}

impl<R> Default for Table<R> {
  fn default() -> Self {
    Self {
      records: HashMap::new(),
      order: Vec::new(),
      report: FoldReport::default(),
    }
  }
}

impl<R> Table<R> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, txid: &Txid) -> Option<&R> {
    self.records.get(txid)
  }

  pub fn get_mut(&mut self, txid: &Txid) -> Option<&mut R> {
    self.records.get_mut(txid)
  }

  pub fn contains(&self, txid: &Txid) -> bool {
    self.records.contains_key(txid)
  }

  /// Inserts a new record. An existing key is left untouched and `false`
  /// returned.
  pub fn insert(&mut self, txid: Txid, record: R) -> bool {
    if self.records.contains_key(&txid) {
      return false;
    }
    self.records.insert(txid, record);
    self.order.push(txid);
    true
  }

  pub fn iter(&self) -> impl Iterator<Item = &R> {
    self.order.iter().filter_map(|txid| self.records.get(txid))
  }

  pub fn values_mut(&mut self) -> impl Iterator<Item = &mut R> {
    self.records.values_mut()
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }
}
