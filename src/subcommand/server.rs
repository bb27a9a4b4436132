use {
  self::{
    api::*,
    error::ApiError,
    response::ApiResponse,
  },
  super::*,
  axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
  },
  axum_server::Handle,
  std::fmt::Display,
  tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
  },
};

mod api;
mod collection_bid;
mod error;
mod listing;
mod pool;
mod response;
mod status;

#[derive(Debug, Parser)]
pub(crate) struct Server {
  #[arg(
    long,
    default_value = "0.0.0.0",
    help = "Listen on <ADDRESS> for incoming requests."
  )]
  address: String,
  #[arg(
    long,
    default_value_t = 8080,
    help = "Listen on <HTTP_PORT> for incoming HTTP requests."
  )]
  http_port: u16,
}

impl Server {
  pub(crate) fn run(self, index: Arc<Index>, handle: Handle) -> SubcommandResult {
    Runtime::new()?.block_on(async {
      let refresher = index.clone();
      let index_thread = thread::spawn(move || {
        let interval = refresher.refresh_interval();
        while !SHUTTING_DOWN.load(atomic::Ordering::Relaxed) {
          refresher.refresh_expired();

          let mut waited = Duration::ZERO;
          while waited < interval && !SHUTTING_DOWN.load(atomic::Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(200));
            waited += Duration::from_millis(200);
          }
        }
      });
      INDEXER.lock().unwrap().replace(index_thread);

      let router = Self::router(index);

      let addr = (self.address.as_str(), self.http_port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow!("failed to get socket addrs"))?;

      log::info!("Listening on http://{addr}");

      axum_server::Server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .with_context(|| format!("failed to serve on {addr}"))?;

      Ok(None)
    })
  }

  fn router(index: Arc<Index>) -> Router {
    let api_v1 = Router::new()
      .route("/listings", get(listing::listings))
      .route("/listing/:txid", get(listing::listing))
      .route("/collection-bids", get(collection_bid::collection_bids))
      .route("/collection-bid/:txid", get(collection_bid::collection_bid))
      .route("/pools", get(pool::pools))
      .route("/pool/:txid", get(pool::pool))
      .route("/status", get(status::status))
      .route("/refresh", post(status::refresh));

    Router::new()
      .nest("/api/v1", api_v1)
      .layer(Extension(index))
      .layer(
        CorsLayer::new()
          .allow_methods([http::Method::GET, http::Method::POST])
          .allow_origin(Any),
      )
      .layer(CompressionLayer::new())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    chain::{
      memory::{event_output, plain_output},
      MemoryChain,
    },
    clock::FixedClock,
    market::{
      codec::Event,
      datastore::{Listing, ListingStatus},
      protocol::tests::{fixed_listing, script},
    },
  };
  use pretty_assertions::assert_eq;

  fn index(chain: Arc<MemoryChain>) -> Arc<Index> {
    Arc::new(Index::new(
      chain,
      Arc::new(FixedClock::new(50_000)),
      IndexSettings {
        listing_index: vec![script(0x01)],
        ..Default::default()
      },
    ))
  }

  fn list(chain: &MemoryChain, category: u8) -> Txid {
    chain.confirm(
      &script(0x01),
      vec![
        event_output(&Event::Listing(fixed_listing(10_000, category))),
        plain_output(&script(0x01), 546),
      ],
      3,
      40_000,
    )
  }

  fn block_on<F: std::future::Future>(future: F) -> F::Output {
    Runtime::new().unwrap().block_on(future)
  }

  fn query(status: Option<ListingStatus>, offset: usize, limit: Option<usize>) -> listing::ListingQuery {
    listing::ListingQuery {
      status,
      offset,
      limit,
    }
  }

  #[test]
  fn test_listings_page() {
    let chain = Arc::new(MemoryChain::new());
    let txids = (1..=3).map(|category| list(&chain, category)).collect::<Vec<Txid>>();
    let index = index(chain);

    let page = block_on(listing::listings(
      Extension(index.clone()),
      Ok(Query(query(None, 1, Some(1)))),
    ))
    .unwrap()
    .0
    .data;

    assert_eq!(page.total, 3);
    assert_eq!(
      page.records.iter().map(|listing| listing.txid).collect::<Vec<Txid>>(),
      vec![txids[1]]
    );
    assert_eq!(page.version, 1);
    assert!(!page.degraded);

    let page = block_on(listing::listings(
      Extension(index),
      Ok(Query(query(Some(ListingStatus::Cancelled), 0, None))),
    ))
    .unwrap()
    .0
    .data;
    assert_eq!(page.total, 0);
  }

  #[test]
  fn test_listing_lookup() {
    let chain = Arc::new(MemoryChain::new());
    let txid = list(&chain, 1);
    let index = index(chain);

    let listing: Listing = block_on(listing::listing(
      Extension(index.clone()),
      Path(txid.to_string()),
    ))
    .unwrap()
    .0
    .data;
    assert_eq!(listing.txid, txid);

    let missing = block_on(listing::listing(
      Extension(index.clone()),
      Path("00".repeat(32)),
    ))
    .unwrap_err();
    assert_eq!(missing.code(), 3);

    let invalid = block_on(listing::listing(Extension(index), Path("nope".into()))).unwrap_err();
    assert_eq!(invalid.code(), 2);
  }

  #[test]
  fn test_unavailable_maps_to_503() {
    let chain = Arc::new(MemoryChain::new());
    chain.set_offline(true);
    let index = index(chain);

    let err = block_on(listing::listings(
      Extension(index),
      Ok(Query(query(None, 0, None))),
    ))
    .unwrap_err();

    assert_eq!(err.code(), 4);
    assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
  }

  #[test]
  fn test_refresh_publishes_new_versions() {
    let chain = Arc::new(MemoryChain::new());
    let index = index(chain.clone());
    block_on(listing::listings(
      Extension(index.clone()),
      Ok(Query(query(None, 0, None))),
    ))
    .unwrap();

    list(&chain, 9);
    let status = block_on(status::refresh(Extension(index))).unwrap().0.data;

    assert_eq!(status.listings.version, Some(2));
    assert_eq!(status.listings.report.unwrap().events, 1);
    assert_eq!(status.pools.version, Some(1));
  }

  #[test]
  fn test_response_shape() {
    let json = serde_json::to_value(ApiResponse::ok(Page::<u8> {
      version: 2,
      refreshed_at: 100,
      degraded: true,
      error: Some("offline".into()),
      total: 0,
      records: Vec::new(),
    }))
    .unwrap();

    assert_eq!(
      json,
      serde_json::json!({
        "code": 0,
        "msg": "ok",
        "data": {
          "version": 2,
          "refreshedAt": 100,
          "degraded": true,
          "error": "offline",
          "total": 0,
          "records": [],
        },
      })
    );
  }
}
