mod bid;
mod collection_bid;
mod collection_bid_status;
mod fields;
mod listing;
mod status;

use serde::{Deserialize, Serialize};

pub use self::{
  bid::BidEvent,
  collection_bid::CollectionBidEvent,
  collection_bid_status::{CollectionBidStatusCode, CollectionBidStatusEvent},
  fields::{BidSalt, Pkh, TokenCategory, HASH_LEN, PKH_LEN},
  listing::{ListingEvent, ListingType},
  status::{StatusCode, StatusEvent},
};

pub const MAGIC_LEN: usize = 4;
pub const MAX_ROYALTY_BPS: u16 = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
  #[display(fmt = "listing")]
  Listing,
  #[display(fmt = "bid")]
  Bid,
  #[display(fmt = "status")]
  Status,
  #[display(fmt = "collectionBid")]
  CollectionBid,
  #[display(fmt = "collectionBidStatus")]
  CollectionBidStatus,
}

impl EventKind {
  pub const ALL: [EventKind; 5] = [
    EventKind::Listing,
    EventKind::Bid,
    EventKind::Status,
    EventKind::CollectionBid,
    EventKind::CollectionBidStatus,
  ];

  pub fn magic(self) -> &'static [u8; MAGIC_LEN] {
    match self {
      EventKind::Listing => b"BZAR",
      EventKind::Bid => b"BZBD",
      EventKind::Status => b"BZST",
      EventKind::CollectionBid => b"BZCB",
      EventKind::CollectionBidStatus => b"BZCS",
    }
  }

  pub fn from_magic(payload: &[u8]) -> Option<Self> {
    let magic = payload.get(..MAGIC_LEN)?;
    Self::ALL
      .into_iter()
      .find(|kind| kind.magic().as_slice() == magic)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
  #[error("unrecognized magic")]
  BadMagic,

  #[error("{kind} version {version} is not supported")]
  UnsupportedVersion { kind: EventKind, version: u8 },

  #[error("{kind} payload truncated: expected {expected} bytes, got {actual}")]
  Truncated {
    kind: EventKind,
    expected: usize,
    actual: usize,
  },

  #[error("{kind} field {field} has invalid value {value}")]
  InvalidField {
    kind: EventKind,
    field: &'static str,
    value: u64,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Event {
  Listing(ListingEvent),
  Bid(BidEvent),
  Status(StatusEvent),
  CollectionBid(CollectionBidEvent),
  CollectionBidStatus(CollectionBidStatusEvent),
}

impl Event {
  pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
    match EventKind::from_magic(payload).ok_or(DecodeError::BadMagic)? {
      EventKind::Listing => ListingEvent::decode(payload).map(Event::Listing),
      EventKind::Bid => BidEvent::decode(payload).map(Event::Bid),
      EventKind::Status => StatusEvent::decode(payload).map(Event::Status),
      EventKind::CollectionBid => CollectionBidEvent::decode(payload).map(Event::CollectionBid),
      EventKind::CollectionBidStatus => {
        CollectionBidStatusEvent::decode(payload).map(Event::CollectionBidStatus)
      }
    }
  }

  pub fn kind(&self) -> EventKind {
    match self {
      Event::Listing(_) => EventKind::Listing,
      Event::Bid(_) => EventKind::Bid,
      Event::Status(_) => EventKind::Status,
      Event::CollectionBid(_) => EventKind::CollectionBid,
      Event::CollectionBidStatus(_) => EventKind::CollectionBidStatus,
    }
  }

  pub fn encode(&self) -> Vec<u8> {
    match self {
      Event::Listing(event) => event.encode(),
      Event::Bid(event) => event.encode(),
      Event::Status(event) => event.encode(),
      Event::CollectionBid(event) => event.encode(),
      Event::CollectionBidStatus(event) => event.encode(),
    }
  }

  /// Semantic checks that the fixed layout cannot express.
  pub fn validate(&self) -> Result<(), DecodeError> {
    match self {
      Event::Listing(event) => validate_royalty(EventKind::Listing, event.royalty_bps),
      Event::CollectionBid(event) => validate_royalty(EventKind::CollectionBid, event.royalty_bps),
      Event::Bid(_) | Event::Status(_) | Event::CollectionBidStatus(_) => Ok(()),
    }
  }
}

pub fn decode_any(payload: &[u8]) -> Option<Event> {
  Event::decode(payload).ok()
}

fn validate_royalty(kind: EventKind, royalty_bps: u16) -> Result<(), DecodeError> {
  if royalty_bps > MAX_ROYALTY_BPS {
    return Err(DecodeError::InvalidField {
      kind,
      field: "royaltyBps",
      value: royalty_bps.into(),
    });
  }
  Ok(())
}
