use super::{
  fields::{check_header, take, take_txid, take_u8, txid_to_wire},
  DecodeError, EventKind, Pkh,
};
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

pub const V1_LEN: usize = 58;

const KIND: EventKind = EventKind::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusCode {
  Sold,
  Cancelled,
  Claimed,
}

impl StatusCode {
  fn from_byte(byte: u8) -> Result<Self, DecodeError> {
    match byte {
      1 => Ok(StatusCode::Sold),
      2 => Ok(StatusCode::Cancelled),
      3 => Ok(StatusCode::Claimed),
      other => Err(DecodeError::InvalidField {
        kind: KIND,
        field: "statusCode",
        value: other.into(),
      }),
    }
  }

  fn to_byte(self) -> u8 {
    match self {
      StatusCode::Sold => 1,
      StatusCode::Cancelled => 2,
      StatusCode::Claimed => 3,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
  pub status: StatusCode,
  pub listing_txid: Txid,
  pub actor_pkh: Pkh,
}

impl StatusEvent {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    check_header(KIND, payload, |version| (version == 1).then_some(V1_LEN))?;

    Ok(Self {
      status: StatusCode::from_byte(take_u8(KIND, payload, 5)?)?,
      listing_txid: take_txid(KIND, payload, 6)?,
      actor_pkh: Pkh(take(KIND, payload, 38)?),
    })
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut payload = Vec::with_capacity(V1_LEN);
    payload.extend_from_slice(KIND.magic());
    payload.push(1);
    payload.push(self.status.to_byte());
    payload.extend_from_slice(&txid_to_wire(&self.listing_txid));
    payload.extend_from_slice(self.actor_pkh.as_bytes());
    payload
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::market::codec::PKH_LEN;
  use bitcoin::hashes::Hash;

  #[test]
  fn test_status_round_trip_all_codes() {
    for status in [StatusCode::Sold, StatusCode::Cancelled, StatusCode::Claimed] {
      let event = StatusEvent {
        status,
        listing_txid: Txid::from_byte_array([0xff; 32]),
        actor_pkh: Pkh([0; PKH_LEN]),
      };
      let payload = event.encode();
      assert_eq!(payload.len(), V1_LEN);
      assert_eq!(StatusEvent::decode(&payload).unwrap(), event);
    }
  }

  #[test]
  fn test_status_code_out_of_range() {
    let mut payload = StatusEvent {
      status: StatusCode::Sold,
      listing_txid: Txid::all_zeros(),
      actor_pkh: Pkh([0; PKH_LEN]),
    }
    .encode();

    for code in [0u8, 4, 0xff] {
      payload[5] = code;
      assert_eq!(
        StatusEvent::decode(&payload),
        Err(DecodeError::InvalidField {
          kind: EventKind::Status,
          field: "statusCode",
          value: code.into(),
        })
      );
    }
  }
}
