use super::Table;
use crate::{
  custom_serde::U64StringSerde,
  market::codec::{BidSalt, Pkh, TokenCategory},
};
use bitcoin::{ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

pub type PoolTable = Table<Pool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum PoolStatus {
  #[display(fmt = "active")]
  Active,
  #[display(fmt = "depleted")]
  Depleted,
  #[display(fmt = "closed")]
  Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
  pub txid: Txid,
  pub owner_pkh: Pkh,
  pub creator_pkh: Pkh,
  pub royalty_bps: u16,
  #[serde(with = "U64StringSerde")]
  pub price: u64,
  pub token_category: TokenCategory,
  pub bid_salt: BidSalt,
  pub contract: Option<ScriptBuf>,
  /// Synchronized from the contract's unspent balance, never from events.
  #[serde(with = "U64StringSerde")]
  pub available_sats: u64,
  pub fills: u64,
  pub status: PoolStatus,
  pub status_inferred: bool,
  pub created_at: u64,
  pub updated_at: u64,
  pub created_height: i64,
  pub updated_height: i64,
}
