use crate::market::codec::{DecodeError, EventKind};
use bitcoin::Txid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  #[error("malformed payload: {0}")]
  Malformed(DecodeError),

  #[error("invalid event: {0}")]
  Invalid(DecodeError),

  #[error("{kind} references unknown record {txid}")]
  UnknownReference { kind: EventKind, txid: Txid },

  #[error("{kind} {txid} already exists")]
  Duplicate { kind: EventKind, txid: Txid },
}
