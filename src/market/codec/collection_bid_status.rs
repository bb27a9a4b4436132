use super::{
  fields::{check_header, take, take_txid, take_u8, txid_to_wire},
  DecodeError, EventKind, Pkh,
};
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

pub const V1_LEN: usize = 58;

const KIND: EventKind = EventKind::CollectionBidStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionBidStatusCode {
  Filled,
  Cancelled,
}

impl CollectionBidStatusCode {
  fn from_byte(byte: u8) -> Result<Self, DecodeError> {
    match byte {
      1 => Ok(CollectionBidStatusCode::Filled),
      2 => Ok(CollectionBidStatusCode::Cancelled),
      other => Err(DecodeError::InvalidField {
        kind: KIND,
        field: "statusCode",
        value: other.into(),
      }),
    }
  }

  fn to_byte(self) -> u8 {
    match self {
      CollectionBidStatusCode::Filled => 1,
      CollectionBidStatusCode::Cancelled => 2,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBidStatusEvent {
  pub status: CollectionBidStatusCode,
  pub bid_txid: Txid,
  pub actor_pkh: Pkh,
}

impl CollectionBidStatusEvent {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    check_header(KIND, payload, |version| (version == 1).then_some(V1_LEN))?;

    Ok(Self {
      status: CollectionBidStatusCode::from_byte(take_u8(KIND, payload, 5)?)?,
      bid_txid: take_txid(KIND, payload, 6)?,
      actor_pkh: Pkh(take(KIND, payload, 38)?),
    })
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut payload = Vec::with_capacity(V1_LEN);
    payload.extend_from_slice(KIND.magic());
    payload.push(1);
    payload.push(self.status.to_byte());
    payload.extend_from_slice(&txid_to_wire(&self.bid_txid));
    payload.extend_from_slice(self.actor_pkh.as_bytes());
    payload
  }
}
