use super::*;
use crate::market::datastore::{Listing, ListingStatus};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListingQuery {
  pub status: Option<ListingStatus>,
  #[serde(default)]
  pub offset: usize,
  pub limit: Option<usize>,
}

// listings?status=
pub(crate) async fn listings(
  Extension(index): Extension<Arc<Index>>,
  query: Result<Query<ListingQuery>, QueryRejection>,
) -> ApiResult<Page<Listing>> {
  let Query(query) = query.map_err(rejected)?;
  log::debug!("rpc: get listings: {:?}", query);

  let snapshot = blocking(move || index.listings()).await??;

  Ok(Json(ApiResponse::ok(Page::new(
    &snapshot,
    snapshot
      .table
      .iter()
      .filter(|listing| query.status.map_or(true, |status| listing.status == status)),
    PageQuery {
      offset: query.offset,
      limit: query.limit,
    },
  ))))
}

// listing/:txid
pub(crate) async fn listing(
  Extension(index): Extension<Arc<Index>>,
  Path(txid): Path<String>,
) -> ApiResult<Listing> {
  log::debug!("rpc: get listing: {}", txid);
  let txid = parse_txid(&txid)?;

  let snapshot = blocking(move || index.listings()).await??;

  let listing = snapshot
    .table
    .get(&txid)
    .cloned()
    .ok_or_api_not_found(format!("listing {txid} not found"))?;

  Ok(Json(ApiResponse::ok(listing)))
}
