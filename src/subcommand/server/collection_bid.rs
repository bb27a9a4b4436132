use super::*;
use crate::market::datastore::{CollectionBid, CollectionBidStatus};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionBidQuery {
  pub status: Option<CollectionBidStatus>,
  #[serde(default)]
  pub offset: usize,
  pub limit: Option<usize>,
}

// collection-bids?status=
pub(crate) async fn collection_bids(
  Extension(index): Extension<Arc<Index>>,
  query: Result<Query<CollectionBidQuery>, QueryRejection>,
) -> ApiResult<Page<CollectionBid>> {
  let Query(query) = query.map_err(rejected)?;
  log::debug!("rpc: get collection_bids: {:?}", query);

  let snapshot = blocking(move || index.collection_bids()).await??;

  Ok(Json(ApiResponse::ok(Page::new(
    &snapshot,
    snapshot
      .table
      .iter()
      .filter(|bid| query.status.map_or(true, |status| bid.status == status)),
    PageQuery {
      offset: query.offset,
      limit: query.limit,
    },
  ))))
}

// collection-bid/:txid
pub(crate) async fn collection_bid(
  Extension(index): Extension<Arc<Index>>,
  Path(txid): Path<String>,
) -> ApiResult<CollectionBid> {
  log::debug!("rpc: get collection_bid: {}", txid);
  let txid = parse_txid(&txid)?;

  let snapshot = blocking(move || index.collection_bids()).await??;

  let bid = snapshot
    .table
    .get(&txid)
    .cloned()
    .ok_or_api_not_found(format!("collection bid {txid} not found"))?;

  Ok(Json(ApiResponse::ok(bid)))
}
