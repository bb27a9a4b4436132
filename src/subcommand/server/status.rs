use super::*;
use crate::index::IndexStatus;

// status
pub(crate) async fn status(Extension(index): Extension<Arc<Index>>) -> ApiResult<IndexStatus> {
  log::debug!("rpc: get status");
  Ok(Json(ApiResponse::ok(index.status())))
}

// refresh
pub(crate) async fn refresh(Extension(index): Extension<Arc<Index>>) -> ApiResult<IndexStatus> {
  log::info!("rpc: refresh requested");

  let status = blocking(move || {
    index.invalidate_all();
    index.refresh_all();
    index.status()
  })
  .await?;

  Ok(Json(ApiResponse::ok(status)))
}
