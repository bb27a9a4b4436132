use super::*;
use crate::index::Snapshot;

pub(crate) type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, ApiError>;

pub(super) const MAX_PAGE_LIMIT: usize = 500;

pub(super) trait ApiOptionExt<T> {
  fn ok_or_api_not_found<S: Into<String>>(self, s: S) -> Result<T, ApiError>;
}

impl<T> ApiOptionExt<T> for Option<T> {
  fn ok_or_api_not_found<S: Into<String>>(self, s: S) -> Result<T, ApiError> {
    match self {
      Some(value) => Ok(value),
      None => Err(ApiError::not_found(s.into())),
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PageQuery {
  pub offset: usize,
  pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
  pub version: u64,
  pub refreshed_at: u64,
  pub degraded: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub total: usize,
  pub records: Vec<T>,
}

impl<T: Clone> Page<T> {
  /// Pages over `records`, which are already filtered.
  pub(super) fn new<'a, R>(
    snapshot: &Snapshot<R>,
    records: impl Iterator<Item = &'a T>,
    query: PageQuery,
  ) -> Self
  where
    T: 'a,
  {
    let records = records.collect::<Vec<&T>>();
    let limit = query.limit.unwrap_or(MAX_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    Self {
      version: snapshot.version,
      refreshed_at: snapshot.refreshed_at,
      degraded: snapshot.degraded,
      error: snapshot.error.clone(),
      total: records.len(),
      records: records
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .cloned()
        .collect(),
    }
  }
}

/// Index access may block on the chain source.
pub(super) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
  F: FnOnce() -> T + Send + 'static,
  T: Send + 'static,
{
  task::spawn_blocking(f)
    .await
    .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))
}

pub(super) fn parse_txid(txid: &str) -> Result<Txid, ApiError> {
  Txid::from_str(txid).map_err(|_| ApiError::bad_request(format!("invalid txid `{txid}`")))
}

pub(super) fn rejected<E: Display>(rejection: E) -> ApiError {
  ApiError::bad_request(rejection.to_string())
}
