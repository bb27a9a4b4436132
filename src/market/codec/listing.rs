use super::{
  fields::{check_header, take, take_u16, take_u32, take_u64, take_u8},
  DecodeError, EventKind, Pkh, TokenCategory,
};
use crate::custom_serde::{U32StringSerde, U64StringSerde};
use serde::{Deserialize, Serialize};

pub const V1_LEN: usize = 104;
pub const V2_LEN: usize = 136;

const KIND: EventKind = EventKind::Listing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingType {
  Fixed,
  Auction,
}

impl ListingType {
  fn from_byte(byte: u8) -> Result<Self, DecodeError> {
    match byte {
      0 => Ok(ListingType::Fixed),
      1 => Ok(ListingType::Auction),
      other => Err(DecodeError::InvalidField {
        kind: KIND,
        field: "type",
        value: other.into(),
      }),
    }
  }

  fn to_byte(self) -> u8 {
    match self {
      ListingType::Fixed => 0,
      ListingType::Auction => 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEvent {
  pub listing_type: ListingType,
  pub royalty_bps: u16,
  #[serde(with = "U64StringSerde")]
  pub price: u64,
  #[serde(with = "U64StringSerde")]
  pub min_bid: u64,
  pub end_time: u32,
  #[serde(with = "U32StringSerde")]
  pub min_bid_increment: u32,
  pub seller_pkh: Pkh,
  pub creator_pkh: Pkh,
  pub token_category: TokenCategory,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tracking_category: Option<TokenCategory>,
}

impl ListingEvent {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    let version = check_header(KIND, payload, |version| match version {
      1 => Some(V1_LEN),
      2 => Some(V2_LEN),
      _ => None,
    })?;

    let tracking_category = if version == 2 {
      Some(TokenCategory(take(KIND, payload, 104)?))
    } else {
      None
    };

    Ok(Self {
      listing_type: ListingType::from_byte(take_u8(KIND, payload, 5)?)?,
      royalty_bps: take_u16(KIND, payload, 6)?,
      price: take_u64(KIND, payload, 8)?,
      min_bid: take_u64(KIND, payload, 16)?,
      end_time: take_u32(KIND, payload, 24)?,
      min_bid_increment: take_u32(KIND, payload, 28)?,
      seller_pkh: Pkh(take(KIND, payload, 32)?),
      creator_pkh: Pkh(take(KIND, payload, 52)?),
      token_category: TokenCategory(take(KIND, payload, 72)?),
      tracking_category,
    })
  }

  pub fn version(&self) -> u8 {
    if self.tracking_category.is_some() {
      2
    } else {
      1
    }
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut payload = Vec::with_capacity(V2_LEN);
    payload.extend_from_slice(KIND.magic());
    payload.push(self.version());
    payload.push(self.listing_type.to_byte());
    payload.extend_from_slice(&self.royalty_bps.to_be_bytes());
    payload.extend_from_slice(&self.price.to_be_bytes());
    payload.extend_from_slice(&self.min_bid.to_be_bytes());
    payload.extend_from_slice(&self.end_time.to_be_bytes());
    payload.extend_from_slice(&self.min_bid_increment.to_be_bytes());
    payload.extend_from_slice(self.seller_pkh.as_bytes());
    payload.extend_from_slice(self.creator_pkh.as_bytes());
    payload.extend_from_slice(self.token_category.as_bytes());
    if let Some(tracking) = &self.tracking_category {
      payload.extend_from_slice(tracking.as_bytes());
    }
    payload
  }
}
