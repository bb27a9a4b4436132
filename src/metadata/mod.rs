mod ipfs;

pub use self::ipfs::IpfsGateway;

use crate::{chain::Commitment, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::{
  collections::HashMap,
  fmt::{self, Display, Formatter},
  sync::{Arc, Mutex},
};

lazy_static! {
  static ref CONTENT_ID: Regex =
    Regex::new(r"^(?:ipfs://)?(Qm[1-9A-HJ-NP-Za-km-z]{44}|b[a-z2-7]{58,})$").unwrap();
}

/// An IPFS content identifier carried in a token commitment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
  pub fn from_commitment(commitment: &Commitment) -> Option<Self> {
    let text = std::str::from_utf8(&commitment.0).ok()?;
    let captures = CONTENT_ID.captures(text.trim_end_matches('\0'))?;
    Some(Self(captures.get(1)?.as_str().to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Display for ContentId {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.write_str(&self.0)
  }
}

pub trait MetadataResolver: Send + Sync {
  /// `Ok(None)` when the document does not exist.
  fn resolve(&self, content_id: &ContentId) -> Result<Option<Value>>;
}

/// Process-wide resolved documents. Absent documents are remembered too,
/// failures are not.
#[derive(Default)]
pub struct MetadataCache {
  documents: Mutex<HashMap<ContentId, Option<Arc<Value>>>>,
}

impl MetadataCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_resolve(
    &self,
    content_id: &ContentId,
    resolver: &dyn MetadataResolver,
  ) -> Option<Arc<Value>> {
    if let Some(document) = self.documents.lock().unwrap().get(content_id) {
      return document.clone();
    }

    // resolved outside the lock; concurrent puts of the same id are identical
    let document = match resolver.resolve(content_id) {
      Ok(document) => document.map(Arc::new),
      Err(err) => {
        log::warn!("failed to resolve metadata {content_id}: {err}");
        return None;
      }
    };

    self
      .documents
      .lock()
      .unwrap()
      .entry(content_id.clone())
      .or_insert(document)
      .clone()
  }

  pub fn len(&self) -> usize {
    self.documents.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
