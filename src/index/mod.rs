use self::slot::Slot;
use crate::{
  chain::{CachedChainSource, ChainSource, ElectrumClient},
  clock::{Clock, SystemClock},
  market::{
    datastore::{CollectionBidTable, FoldReport, ListingTable, PoolTable},
    protocol::{Family, FirstSeen, ProtocolManager, StateTable},
  },
  metadata::{ContentId, IpfsGateway, MetadataCache, MetadataResolver},
  options::Options,
  Result,
};
use anyhow::{anyhow, Context};
use bitcoin::ScriptBuf;
use serde::Serialize;
use std::{fs, sync::Arc, time::Duration};

mod slot;

pub const DEFAULT_CACHE_TTL: u64 = 300;
pub const DEFAULT_REFRESH_INTERVAL: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("{family} unavailable: {message}")]
  Unavailable { family: Family, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
  pub listing_index: Vec<ScriptBuf>,
  pub collection_bid_index: Vec<ScriptBuf>,
  pub pool_index: Vec<ScriptBuf>,
  pub cache_ttl: u64,
  pub refresh_interval: u64,
}

impl Default for IndexSettings {
  fn default() -> Self {
    Self {
      listing_index: Vec::new(),
      collection_bid_index: Vec::new(),
      pool_index: Vec::new(),
      cache_ttl: DEFAULT_CACHE_TTL,
      refresh_interval: DEFAULT_REFRESH_INTERVAL,
    }
  }
}

/// A family's published table as seen by one reader.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
  pub table: Arc<T>,
  pub version: u64,
  pub refreshed_at: u64,
  /// Either the last refresh failed and this is the previous table, or some
  /// records could not be reconciled.
  pub degraded: bool,
  pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyStatus {
  pub family: Family,
  pub version: Option<u64>,
  pub refreshed_at: Option<u64>,
  pub fresh: bool,
  pub degraded: bool,
  pub error: Option<String>,
  pub report: Option<FoldReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
  pub now: u64,
  pub cache_ttl: u64,
  pub metadata_documents: usize,
  pub listings: FamilyStatus,
  pub collection_bids: FamilyStatus,
  pub pools: FamilyStatus,
}

pub struct Index {
  chain: Arc<dyn ChainSource>,
  clock: Arc<dyn Clock>,
  resolver: Option<Arc<dyn MetadataResolver>>,
  metadata: MetadataCache,
  first_seen: FirstSeen,
  settings: IndexSettings,
  listings: Slot<ListingTable>,
  collection_bids: Slot<CollectionBidTable>,
  pools: Slot<PoolTable>,
}

impl Index {
  pub fn new(chain: Arc<dyn ChainSource>, clock: Arc<dyn Clock>, settings: IndexSettings) -> Self {
    Self {
      chain,
      clock,
      resolver: None,
      metadata: MetadataCache::new(),
      first_seen: FirstSeen::default(),
      settings,
      listings: Slot::default(),
      collection_bids: Slot::default(),
      pools: Slot::default(),
    }
  }

  pub fn with_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
    self.resolver = Some(resolver);
    self
  }

  pub fn open(options: &Options) -> Result<Self> {
    let config = options.load_config()?;
    let settings = options.settings(&config)?;

    let chain_url = options
      .chain_url
      .clone()
      .or(config.chain_url)
      .ok_or_else(|| anyhow!("no chain server configured, pass --chain-url or set chain_url"))?;

    let electrum = ElectrumClient::new(&chain_url)?;

    let chain: Arc<dyn ChainSource> = if options.no_tx_cache {
      Arc::new(electrum)
    } else {
      let data_dir = options.data_dir()?;
      fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir `{}`", data_dir.display()))?;
      let path = data_dir.join("transactions.redb");
      log::info!("Caching transactions in {}", path.display());
      Arc::new(CachedChainSource::open(electrum, &path)?)
    };

    let mut index = Self::new(chain, Arc::new(SystemClock), settings);

    if let Some(gateway) = options.ipfs_gateway.clone().or(config.ipfs_gateway) {
      index = index.with_resolver(Arc::new(IpfsGateway::new(&gateway)?));
    }

    log::info!(
      "Index opened on {} with {} listing, {} collection bid and {} pool index scripts",
      chain_url,
      index.settings.listing_index.len(),
      index.settings.collection_bid_index.len(),
      index.settings.pool_index.len(),
    );

    Ok(index)
  }

  pub fn refresh_interval(&self) -> Duration {
    Duration::from_secs(self.settings.refresh_interval.max(1))
  }

  /// Cached listings, refreshed first when the cache has expired.
  pub fn listings(&self) -> Result<Snapshot<ListingTable>, IndexError> {
    if self.listings.is_fresh(self.clock.now(), self.settings.cache_ttl) {
      if let Some(snapshot) = self.cached(&self.listings) {
        return Ok(snapshot);
      }
    }
    self.refresh_listings()
  }

  pub fn collection_bids(&self) -> Result<Snapshot<CollectionBidTable>, IndexError> {
    if self
      .collection_bids
      .is_fresh(self.clock.now(), self.settings.cache_ttl)
    {
      if let Some(snapshot) = self.cached(&self.collection_bids) {
        return Ok(snapshot);
      }
    }
    self.refresh_collection_bids()
  }

  pub fn pools(&self) -> Result<Snapshot<PoolTable>, IndexError> {
    if self.pools.is_fresh(self.clock.now(), self.settings.cache_ttl) {
      if let Some(snapshot) = self.cached(&self.pools) {
        return Ok(snapshot);
      }
    }
    self.refresh_pools()
  }

  pub fn refresh_listings(&self) -> Result<Snapshot<ListingTable>, IndexError> {
    self.refresh(&self.listings, &self.settings.listing_index, |table| {
      self.decorate(table)
    })
  }

  pub fn refresh_collection_bids(&self) -> Result<Snapshot<CollectionBidTable>, IndexError> {
    self.refresh(
      &self.collection_bids,
      &self.settings.collection_bid_index,
      |_| {},
    )
  }

  pub fn refresh_pools(&self) -> Result<Snapshot<PoolTable>, IndexError> {
    self.refresh(&self.pools, &self.settings.pool_index, |_| {})
  }

  /// Refreshes the three families concurrently.
  pub fn refresh_all(&self) {
    let (listings, (collection_bids, pools)) = rayon::join(
      || self.refresh_listings().map(|_| ()),
      || {
        rayon::join(
          || self.refresh_collection_bids().map(|_| ()),
          || self.refresh_pools().map(|_| ()),
        )
      },
    );

    for err in [listings, collection_bids, pools]
      .into_iter()
      .filter_map(std::result::Result::err)
    {
      log::error!("{err}");
    }
  }

  /// Refreshes every family whose cache has expired or was invalidated.
  pub fn refresh_expired(&self) {
    let now = self.clock.now();
    let ttl = self.settings.cache_ttl;

    rayon::join(
      || {
        if !self.listings.is_fresh(now, ttl) {
          self.refresh_listings().ok();
        }
      },
      || {
        rayon::join(
          || {
            if !self.collection_bids.is_fresh(now, ttl) {
              self.refresh_collection_bids().ok();
            }
          },
          || {
            if !self.pools.is_fresh(now, ttl) {
              self.refresh_pools().ok();
            }
          },
        )
      },
    );
  }

  pub fn invalidate_all(&self) {
    log::info!("Invalidating all cached tables");
    self.listings.invalidate();
    self.collection_bids.invalidate();
    self.pools.invalidate();
  }

  pub fn status(&self) -> IndexStatus {
    let now = self.clock.now();
    IndexStatus {
      now,
      cache_ttl: self.settings.cache_ttl,
      metadata_documents: self.metadata.len(),
      listings: self.family_status(Family::Listings, &self.listings, now),
      collection_bids: self.family_status(Family::CollectionBids, &self.collection_bids, now),
      pools: self.family_status(Family::Pools, &self.pools, now),
    }
  }

  fn family_status<T: StateTable>(&self, family: Family, slot: &Slot<T>, now: u64) -> FamilyStatus {
    let published = slot.published();
    let error = slot.last_error();
    FamilyStatus {
      family,
      version: published.as_ref().map(|published| published.version),
      refreshed_at: published.as_ref().map(|published| published.refreshed_at),
      fresh: slot.is_fresh(now, self.settings.cache_ttl),
      degraded: error.is_some()
        || published
          .as_ref()
          .map(|published| published.table.report().degraded())
          .unwrap_or_default(),
      error,
      report: published.map(|published| published.table.report().clone()),
    }
  }

  fn cached<T: StateTable>(&self, slot: &Slot<T>) -> Option<Snapshot<T>> {
    let published = slot.published()?;
    let error = slot.last_error();
    Some(Snapshot {
      degraded: error.is_some() || published.table.report().degraded(),
      table: published.table,
      version: published.version,
      refreshed_at: published.refreshed_at,
      error,
    })
  }

  fn refresh<T: StateTable>(
    &self,
    slot: &Slot<T>,
    indexes: &[ScriptBuf],
    decorate: impl FnOnce(&mut T),
  ) -> Result<Snapshot<T>, IndexError> {
    let version = slot.begin();
    let now = self.clock.now();

    match ProtocolManager::new(self.chain.as_ref(), indexes)
      .with_first_seen(&self.first_seen)
      .fold::<T>(now)
    {
      Ok(mut table) => {
        decorate(&mut table);
        if table.report().degraded() {
          log::warn!(
            "{} refresh {} is degraded: {} records could not be reconciled",
            T::FAMILY,
            version,
            table.report().reconcile_failures
          );
        }
        slot.publish(version, table, now);
      }
      Err(err) => {
        let message = format!("{err:#}");
        slot.fail(version, message.clone());
        if slot.published().is_none() {
          log::error!("{} refresh {} failed with nothing cached: {}", T::FAMILY, version, message);
          return Err(IndexError::Unavailable {
            family: T::FAMILY,
            message,
          });
        }
        log::warn!(
          "{} refresh {} failed, serving the previous table: {}",
          T::FAMILY,
          version,
          message
        );
      }
    }

    self.cached(slot).ok_or_else(|| IndexError::Unavailable {
      family: T::FAMILY,
      message: "no table published".into(),
    })
  }

  fn decorate(&self, table: &mut ListingTable) {
    let Some(resolver) = &self.resolver else {
      return;
    };

    for listing in table.values_mut() {
      let Some(content_id) = listing.commitment.as_ref().and_then(ContentId::from_commitment) else {
        continue;
      };
      listing.metadata = self
        .metadata
        .get_or_resolve(&content_id, resolver.as_ref())
        .map(|document| (*document).clone());
    }
  }
}
