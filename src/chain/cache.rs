use super::{ChainSource, HistoryEntry, Utxo};
use crate::Result;
use bitcoin::{Script, Txid};
use redb::{Database, ReadableTable, TableDefinition};
use std::{collections::HashSet, path::Path, sync::Mutex};

const RAW_TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("RAW_TRANSACTIONS");

/// Keeps confirmed raw transactions in a redb file so rescans only fetch what
/// is new. History and unspent queries always pass through.
pub struct CachedChainSource<S> {
  inner: S,
  database: Database,
  confirmed: Mutex<HashSet<Txid>>,
}

impl<S: ChainSource> CachedChainSource<S> {
  pub fn open(inner: S, path: &Path) -> Result<Self> {
    let database = Database::create(path)?;

    let wtx = database.begin_write()?;
    wtx.open_table(RAW_TRANSACTIONS)?;
    wtx.commit()?;

    Ok(Self {
      inner,
      database,
      confirmed: Mutex::new(HashSet::new()),
    })
  }

  fn get(&self, txid: &Txid) -> Result<Option<Vec<u8>>> {
    let rtx = self.database.begin_read()?;
    let table = rtx.open_table(RAW_TRANSACTIONS)?;
    let raw = table
      .get(txid.to_string().as_str())?
      .map(|guard| guard.value().to_vec());
    Ok(raw)
  }

  fn put(&self, txid: &Txid, raw: &[u8]) -> Result {
    let wtx = self.database.begin_write()?;
    wtx
      .open_table(RAW_TRANSACTIONS)?
      .insert(txid.to_string().as_str(), raw)?;
    wtx.commit()?;
    Ok(())
  }
}

impl<S: ChainSource> ChainSource for CachedChainSource<S> {
  fn history(&self, script: &Script) -> Result<Vec<HistoryEntry>> {
    let history = self.inner.history(script)?;
    self.confirmed.lock().unwrap().extend(
      history
        .iter()
        .filter(|entry| entry.is_confirmed())
        .map(|entry| entry.txid),
    );
    Ok(history)
  }

  fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>> {
    if let Some(raw) = self.get(txid)? {
      return Ok(raw);
    }

    let raw = self.inner.raw_transaction(txid)?;

    if self.confirmed.lock().unwrap().contains(txid) {
      if let Err(err) = self.put(txid, &raw) {
        log::warn!("failed to cache transaction {txid}: {err}");
      }
    }

    Ok(raw)
  }

  fn unspent_outputs(&self, script: &Script) -> Result<Vec<Utxo>> {
    self.inner.unspent_outputs(script)
  }
}
