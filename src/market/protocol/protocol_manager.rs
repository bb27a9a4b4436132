use super::{resolve_events, Error, EventContext, StateTable, UnspentLookup};
use crate::{
  chain::{CashTransaction, ChainSource, HistoryEntry},
  Result,
};
use anyhow::Context;
use bitcoin::{consensus::encode, ScriptBuf, Txid};
use std::{
  collections::HashMap,
  sync::Mutex,
  time::Instant,
};

/// When each unconfirmed transaction was first scanned, so mempool events keep
/// one timestamp across refreshes until they confirm.
#[derive(Debug, Default)]
pub struct FirstSeen(Mutex<HashMap<Txid, u64>>);

impl FirstSeen {
  fn time(&self, txid: Txid, now: u64) -> u64 {
    *self.0.lock().unwrap().entry(txid).or_insert(now)
  }

  fn forget(&self, txid: &Txid) {
    self.0.lock().unwrap().remove(txid);
  }
}

struct Scanned {
  entry: HistoryEntry,
  transaction: Result<CashTransaction, encode::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Visit {
  Pending,
  Active,
  Done,
}

pub struct ProtocolManager<'a> {
  chain: &'a dyn ChainSource,
  indexes: &'a [ScriptBuf],
  first_seen: Option<&'a FirstSeen>,
}

impl<'a> ProtocolManager<'a> {
  pub fn new(chain: &'a dyn ChainSource, indexes: &'a [ScriptBuf]) -> Self {
    Self {
      chain,
      indexes,
      first_seen: None,
    }
  }

  pub fn with_first_seen(mut self, first_seen: &'a FirstSeen) -> Self {
    self.first_seen = Some(first_seen);
    self
  }

  /// Merged history of every index script, by height and block position
  /// where known, mempool last.
  pub fn history(&self) -> Result<Vec<HistoryEntry>> {
    let mut entries: Vec<HistoryEntry> = Vec::new();
    let mut seen: HashMap<_, usize> = HashMap::new();

    for index in self.indexes {
      let history = self
        .chain
        .history(index)
        .with_context(|| format!("failed to fetch history of {}", hex::encode(index.as_bytes())))?;

      for entry in history {
        match seen.get(&entry.txid) {
          Some(&at) => {
            if !entries[at].is_confirmed() && entry.is_confirmed() {
              entries[at] = entry;
            }
          }
          None => {
            seen.insert(entry.txid, entries.len());
            entries.push(entry);
          }
        }
      }
    }

    entries.sort_by_key(|entry| {
      if entry.is_confirmed() {
        (false, entry.height, entry.position)
      } else {
        (true, 0, None)
      }
    });

    Ok(entries)
  }

  /// Fetches every transaction of the merged history in chain order.
  fn scan(&self) -> Result<Vec<Scanned>> {
    let mut scanned = Vec::new();
    for entry in self.history()? {
      let raw = self
        .chain
        .raw_transaction(&entry.txid)
        .with_context(|| format!("failed to fetch transaction {}", entry.txid))?;

      scanned.push(Scanned {
        transaction: CashTransaction::from_bytes(&raw),
        entry,
      });
    }

    let mut ordered = Vec::with_capacity(scanned.len());
    let mut scanned = scanned.into_iter().peekable();
    while let Some(first) = scanned.next() {
      let mut block = vec![first];
      while let Some(next) = scanned.next_if(|next| same_block(&block[0].entry, &next.entry)) {
        block.push(next);
      }
      ordered.extend(order_by_spends(block));
    }

    Ok(ordered)
  }

  fn time(&self, entry: &HistoryEntry, now: u64) -> u64 {
    match entry.time {
      Some(time) => {
        if let Some(first_seen) = self.first_seen {
          first_seen.forget(&entry.txid);
        }
        u64::from(time)
      }
      None => self
        .first_seen
        .map(|first_seen| first_seen.time(entry.txid, now))
        .unwrap_or(now),
    }
  }

  /// Rebuilds a family's table from scratch. Undecodable payloads and
  /// transactions are skipped; an upstream failure aborts the fold.
  pub fn fold<T: StateTable>(&self, now: u64) -> Result<T> {
    let start = Instant::now();
    let mut table = T::default();

    for Scanned { entry, transaction } in self.scan()? {
      table.report_mut().transactions += 1;

      let tx = match transaction {
        Ok(tx) => tx,
        Err(err) => {
          log::debug!("skipping undecodable transaction {}: {err}", entry.txid);
          table.report_mut().malformed += 1;
          continue;
        }
      };

      let context = EventContext {
        txid: entry.txid,
        height: entry.height.max(0),
        time: self.time(&entry, now),
        outputs: &tx.output,
        indexes: self.indexes,
      };

      for resolved in resolve_events(&tx) {
        let result = resolved.and_then(|event| {
          log::debug!("{} {} event in {}: {:?}", T::FAMILY, event.kind(), entry.txid, event);
          table.apply(&context, &event)
        });

        let report = table.report_mut();
        match result {
          Ok(true) => report.events += 1,
          Ok(false) => {}
          Err(Error::Malformed(err)) => {
            log::debug!("malformed payload in {}: {err}", entry.txid);
            report.malformed += 1;
          }
          Err(Error::Invalid(err)) => {
            log::debug!("invalid event in {}: {err}", entry.txid);
            report.invalid += 1;
          }
          Err(err @ Error::Duplicate { .. }) => {
            log::warn!("{}: {err} (in {})", T::FAMILY, entry.txid);
            report.duplicates += 1;
          }
          Err(err @ Error::UnknownReference { .. }) => {
            log::warn!("{}: {err} (in {})", T::FAMILY, entry.txid);
            report.unknown_references += 1;
          }
        }
      }
    }

    table.reconcile(&mut UnspentLookup::new(self.chain));

    let report = table.report();
    log::info!(
      "Protocol Manager folded {} with {} transactions, {} events, {} inferred, {} failed reconciliations in {} ms",
      T::FAMILY,
      report.transactions,
      report.events,
      report.inferred,
      report.reconcile_failures,
      (Instant::now() - start).as_millis(),
    );

    Ok(table)
  }
}

fn same_block(a: &HistoryEntry, b: &HistoryEntry) -> bool {
  match (a.is_confirmed(), b.is_confirmed()) {
    (true, true) => a.height == b.height,
    (false, false) => true,
    _ => false,
  }
}

/// Moves every transaction after the members of its block that it spends,
/// keeping the given order otherwise. Blocks whose positions are all known are
/// already in order.
fn order_by_spends(block: Vec<Scanned>) -> Vec<Scanned> {
  if block.len() < 2 || block.iter().all(|scanned| scanned.entry.position.is_some()) {
    return block;
  }

  let at = block
    .iter()
    .enumerate()
    .map(|(i, scanned)| (scanned.entry.txid, i))
    .collect::<HashMap<Txid, usize>>();

  let parents = block
    .iter()
    .enumerate()
    .map(|(i, scanned)| match &scanned.transaction {
      Ok(tx) => tx
        .input
        .iter()
        .filter_map(|input| at.get(&input.previous_output.txid).copied())
        .filter(|&parent| parent != i)
        .collect(),
      Err(_) => Vec::new(),
    })
    .collect::<Vec<Vec<usize>>>();

  let mut visits = vec![Visit::Pending; block.len()];
  let mut order = Vec::with_capacity(block.len());
  for i in 0..block.len() {
    visit(i, &parents, &mut visits, &mut order);
  }

  let mut block = block.into_iter().map(Some).collect::<Vec<Option<Scanned>>>();
  order
    .into_iter()
    .filter_map(|i| block[i].take())
    .collect()
}

fn visit(i: usize, parents: &[Vec<usize>], visits: &mut [Visit], order: &mut Vec<usize>) {
  if visits[i] != Visit::Pending {
    return;
  }

  visits[i] = Visit::Active;
  for &parent in &parents[i] {
    visit(parent, parents, visits, order);
  }
  visits[i] = Visit::Done;
  order.push(i);
}
