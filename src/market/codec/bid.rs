use super::{
  fields::{check_header, take, take_txid, take_u64, txid_to_wire},
  DecodeError, EventKind, Pkh,
};
use crate::custom_serde::U64StringSerde;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

pub const V1_LEN: usize = 65;

const KIND: EventKind = EventKind::Bid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidEvent {
  pub listing_txid: Txid,
  pub bidder_pkh: Pkh,
  #[serde(with = "U64StringSerde")]
  pub bid_amount: u64,
}

impl BidEvent {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    check_header(KIND, payload, |version| (version == 1).then_some(V1_LEN))?;

    Ok(Self {
      listing_txid: take_txid(KIND, payload, 5)?,
      bidder_pkh: Pkh(take(KIND, payload, 37)?),
      bid_amount: take_u64(KIND, payload, 57)?,
    })
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut payload = Vec::with_capacity(V1_LEN);
    payload.extend_from_slice(KIND.magic());
    payload.push(1);
    payload.extend_from_slice(&txid_to_wire(&self.listing_txid));
    payload.extend_from_slice(self.bidder_pkh.as_bytes());
    payload.extend_from_slice(&self.bid_amount.to_be_bytes());
    payload
  }
}
