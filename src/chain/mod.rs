use crate::{custom_serde::U64StringSerde, market::codec::TokenCategory, Result};
use bitcoin::{
  hashes::{sha256, Hash},
  OutPoint, Script, Txid,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub mod cache;
pub mod electrum;
pub mod memory;
pub mod transaction;

pub use self::{
  cache::CachedChainSource,
  electrum::ElectrumClient,
  memory::MemoryChain,
  transaction::{CashOutput, CashTransaction},
};

/// Supplies chain history and live unspent outputs for tracked locking
/// scripts.
pub trait ChainSource: Send + Sync {
  fn history(&self, script: &Script) -> Result<Vec<HistoryEntry>>;

  fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>>;

  fn unspent_outputs(&self, script: &Script) -> Result<Vec<Utxo>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
  pub txid: Txid,
  /// Zero or negative while unconfirmed.
  pub height: i64,
  pub position: Option<u32>,
  pub time: Option<u32>,
}

impl HistoryEntry {
  pub fn is_confirmed(&self) -> bool {
    self.height > 0
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
  pub outpoint: OutPoint,
  pub value: u64,
  pub height: i64,
  pub token: Option<TokenData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
  pub category: TokenCategory,
  #[serde(with = "U64StringSerde")]
  pub amount: u64,
  pub nft: Option<Nft>,
}

impl TokenData {
  pub fn commitment(&self) -> Option<&Commitment> {
    self.nft.as_ref().map(|nft| &nft.commitment)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
  pub capability: Capability,
  pub commitment: Commitment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
  None,
  Mutable,
  Minting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Commitment(pub Vec<u8>);

impl Serialize for Commitment {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    hex::encode(&self.0).serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Commitment {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    hex::decode(String::deserialize(deserializer)?)
      .map(Commitment)
      .map_err(|e| de::Error::custom(format!("commitment from hex error: {}", e)))
  }
}

/// Electrum servers address scripts by the byte-reversed SHA-256 of the
/// locking bytecode.
pub fn script_hash(script: &Script) -> String {
  let mut hash = sha256::Hash::hash(script.as_bytes()).to_byte_array();
  hash.reverse();
  hex::encode(hash)
}
