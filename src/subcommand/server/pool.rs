use super::*;
use crate::market::datastore::{Pool, PoolStatus};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PoolQuery {
  pub status: Option<PoolStatus>,
  #[serde(default)]
  pub offset: usize,
  pub limit: Option<usize>,
}

// pools?status=
pub(crate) async fn pools(
  Extension(index): Extension<Arc<Index>>,
  query: Result<Query<PoolQuery>, QueryRejection>,
) -> ApiResult<Page<Pool>> {
  let Query(query) = query.map_err(rejected)?;
  log::debug!("rpc: get pools: {:?}", query);

  let snapshot = blocking(move || index.pools()).await??;

  Ok(Json(ApiResponse::ok(Page::new(
    &snapshot,
    snapshot
      .table
      .iter()
      .filter(|pool| query.status.map_or(true, |status| pool.status == status)),
    PageQuery {
      offset: query.offset,
      limit: query.limit,
    },
  ))))
}

// pool/:txid
pub(crate) async fn pool(
  Extension(index): Extension<Arc<Index>>,
  Path(txid): Path<String>,
) -> ApiResult<Pool> {
  log::debug!("rpc: get pool: {}", txid);
  let txid = parse_txid(&txid)?;

  let snapshot = blocking(move || index.pools()).await??;

  let pool = snapshot
    .table
    .get(&txid)
    .cloned()
    .ok_or_api_not_found(format!("pool {txid} not found"))?;

  Ok(Json(ApiResponse::ok(pool)))
}
