use super::*;
use crate::{
  index::IndexStatus,
  market::datastore::{CollectionBid, Listing, Pool},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
  pub listings: Vec<Listing>,
  pub collection_bids: Vec<CollectionBid>,
  pub pools: Vec<Pool>,
  pub status: IndexStatus,
}

#[derive(Debug, Parser)]
pub(crate) struct IndexSubcommand {
  #[arg(long, help = "Only print the refresh status, not the tables.")]
  status_only: bool,
}

impl IndexSubcommand {
  pub(crate) fn run(self, options: Options) -> SubcommandResult {
    let index = Index::open(&options)?;
    index.refresh_all();

    let status = index.status();
    if self.status_only {
      return Ok(Some(Box::new(status)));
    }

    Ok(Some(Box::new(Output {
      listings: index.listings()?.table.iter().cloned().collect(),
      collection_bids: index.collection_bids()?.table.iter().cloned().collect(),
      pools: index.pools()?.table.iter().cloned().collect(),
      status,
    })))
  }
}
