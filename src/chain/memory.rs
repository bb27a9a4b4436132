use super::{
  transaction::null_data_script, CashOutput, CashTransaction, ChainSource, HistoryEntry, TokenData,
  Utxo,
};
use crate::{market::codec::Event, Result};
use anyhow::anyhow;
use bitcoin::{hashes::Hash, OutPoint, Script, ScriptBuf, Sequence, TxIn, Txid, Witness};
use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex,
  },
};

/// A scriptable in-process chain. Transactions land in the history of the
/// index script they are confirmed against; unspent sets are set by hand.
#[derive(Default)]
pub struct MemoryChain {
  state: Mutex<State>,
  nonce: AtomicU64,
  offline: AtomicBool,
  unspent_offline: AtomicBool,
}

#[derive(Default)]
struct State {
  transactions: HashMap<Txid, Vec<u8>>,
  histories: HashMap<ScriptBuf, Vec<HistoryEntry>>,
  unspent: HashMap<ScriptBuf, Vec<Utxo>>,
  /// Transactions placed in each block so far.
  blocks: HashMap<i64, u32>,
}

impl MemoryChain {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a transaction paying `outputs`, records it at `height` in the
  /// history of `index` and returns its txid.
  pub fn confirm(&self, index: &Script, outputs: Vec<CashOutput>, height: i64, time: u32) -> Txid {
    self.confirm_spending(index, Vec::new(), outputs, height, time)
  }

  /// Like `confirm`, with inputs spending `spent`.
  pub fn confirm_spending(
    &self,
    index: &Script,
    spent: Vec<OutPoint>,
    outputs: Vec<CashOutput>,
    height: i64,
    time: u32,
  ) -> Txid {
    let transaction = self.transaction(spent, outputs);
    self.push_raw(index, transaction.to_bytes(), height, Some(time))
  }

  pub fn mempool(&self, index: &Script, outputs: Vec<CashOutput>) -> Txid {
    let transaction = self.transaction(Vec::new(), outputs);
    self.push_raw(index, transaction.to_bytes(), 0, None)
  }

  /// Records arbitrary bytes as a transaction, keyed by their double SHA-256.
  pub fn push_raw(&self, index: &Script, raw: Vec<u8>, height: i64, time: Option<u32>) -> Txid {
    let txid = Txid::hash(&raw);
    let mut state = self.state.lock().unwrap();
    let position = (height > 0).then(|| {
      let placed = state.blocks.entry(height).or_default();
      *placed += 1;
      *placed - 1
    });
    state
      .histories
      .entry(index.to_owned())
      .or_default()
      .push(HistoryEntry {
        txid,
        height,
        position,
        time,
      });
    state.transactions.insert(txid, raw);
    txid
  }

  /// Adds an existing transaction to another index script's history.
  pub fn also_index(&self, index: &Script, txid: Txid, height: i64) {
    let mut state = self.state.lock().unwrap();
    let entry = state
      .histories
      .values()
      .flatten()
      .find(|entry| entry.txid == txid)
      .cloned()
      .unwrap_or(HistoryEntry {
        txid,
        height,
        position: None,
        time: None,
      });
    state
      .histories
      .entry(index.to_owned())
      .or_default()
      .push(entry);
  }

  pub fn forget_transaction(&self, txid: &Txid) {
    self.state.lock().unwrap().transactions.remove(txid);
  }

  pub fn set_unspent(&self, script: &Script, utxos: Vec<Utxo>) {
    self
      .state
      .lock()
      .unwrap()
      .unspent
      .insert(script.to_owned(), utxos);
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn set_unspent_offline(&self, offline: bool) {
    self.unspent_offline.store(offline, Ordering::SeqCst);
  }

  /// Spends `spent`, or a fresh funding outpoint when it is empty.
  fn transaction(&self, mut spent: Vec<OutPoint>, output: Vec<CashOutput>) -> CashTransaction {
    let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
    if spent.is_empty() {
      let mut funding = [0u8; 32];
      funding[..8].copy_from_slice(&nonce.to_be_bytes());
      spent.push(OutPoint::new(Txid::from_byte_array(funding), 0));
    }

    CashTransaction {
      version: 2,
      input: spent
        .into_iter()
        .map(|previous_output| TxIn {
          previous_output,
          script_sig: ScriptBuf::new(),
          // keeps otherwise identical spends distinct
          sequence: Sequence(u32::try_from(nonce).unwrap_or(u32::MAX)),
          witness: Witness::new(),
        })
        .collect(),
      output,
      lock_time: 0,
    }
  }

  fn check_online(&self) -> Result {
    if self.offline.load(Ordering::SeqCst) {
      return Err(anyhow!("chain source offline"));
    }
    Ok(())
  }
}

impl ChainSource for MemoryChain {
  fn history(&self, script: &Script) -> Result<Vec<HistoryEntry>> {
    self.check_online()?;
    let state = self.state.lock().unwrap();
    Ok(state.histories.get(script).cloned().unwrap_or_default())
  }

  fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>> {
    self.check_online()?;
    let state = self.state.lock().unwrap();
    state
      .transactions
      .get(txid)
      .cloned()
      .ok_or_else(|| anyhow!("transaction {txid} not found"))
  }

  fn unspent_outputs(&self, script: &Script) -> Result<Vec<Utxo>> {
    self.check_online()?;
    if self.unspent_offline.load(Ordering::SeqCst) {
      return Err(anyhow!("unspent query failed"));
    }
    let state = self.state.lock().unwrap();
    Ok(state.unspent.get(script).cloned().unwrap_or_default())
  }
}

/// A zero-value OP_RETURN output carrying one encoded event.
pub fn event_output(event: &Event) -> CashOutput {
  CashOutput {
    value: 0,
    script_pubkey: null_data_script(&event.encode()).unwrap_or_default(),
    token: None,
  }
}

pub fn plain_output(script: &Script, value: u64) -> CashOutput {
  CashOutput {
    value,
    script_pubkey: script.to_owned(),
    token: None,
  }
}

pub fn token_output(script: &Script, value: u64, token: TokenData) -> CashOutput {
  CashOutput {
    value,
    script_pubkey: script.to_owned(),
    token: Some(token),
  }
}

pub fn utxo(txid: Txid, vout: u32, value: u64, token: Option<TokenData>) -> Utxo {
  Utxo {
    outpoint: OutPoint::new(txid, vout),
    value,
    height: 1,
    token,
  }
}
