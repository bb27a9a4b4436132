use super::{
  fields::{check_header, take, take_u16, take_u64},
  BidSalt, DecodeError, EventKind, Pkh, TokenCategory,
};
use crate::custom_serde::U64StringSerde;
use serde::{Deserialize, Serialize};

pub const V1_LEN: usize = 119;

const KIND: EventKind = EventKind::CollectionBid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBidEvent {
  pub royalty_bps: u16,
  #[serde(with = "U64StringSerde")]
  pub price: u64,
  pub bidder_pkh: Pkh,
  pub creator_pkh: Pkh,
  pub token_category: TokenCategory,
  pub bid_salt: BidSalt,
}

impl CollectionBidEvent {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    check_header(KIND, payload, |version| (version == 1).then_some(V1_LEN))?;

    Ok(Self {
      royalty_bps: take_u16(KIND, payload, 5)?,
      price: take_u64(KIND, payload, 7)?,
      bidder_pkh: Pkh(take(KIND, payload, 15)?),
      creator_pkh: Pkh(take(KIND, payload, 35)?),
      token_category: TokenCategory(take(KIND, payload, 55)?),
      bid_salt: BidSalt(take(KIND, payload, 87)?),
    })
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut payload = Vec::with_capacity(V1_LEN);
    payload.extend_from_slice(KIND.magic());
    payload.push(1);
    payload.extend_from_slice(&self.royalty_bps.to_be_bytes());
    payload.extend_from_slice(&self.price.to_be_bytes());
    payload.extend_from_slice(self.bidder_pkh.as_bytes());
    payload.extend_from_slice(self.creator_pkh.as_bytes());
    payload.extend_from_slice(self.token_category.as_bytes());
    payload.extend_from_slice(self.bid_salt.as_bytes());
    payload
  }
}
