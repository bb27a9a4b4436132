use super::Table;
use crate::{
  chain::Commitment,
  custom_serde::{U32StringSerde, U64StringSerde},
  market::codec::{ListingEvent, ListingType, Pkh, StatusCode, TokenCategory},
};
use bitcoin::{ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ListingTable = Table<Listing>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum ListingStatus {
  #[display(fmt = "active")]
  Active,
  #[display(fmt = "sold")]
  Sold,
  #[display(fmt = "cancelled")]
  Cancelled,
  #[display(fmt = "claimed")]
  Claimed,
}

impl ListingStatus {
  pub fn is_terminal(self) -> bool {
    self != ListingStatus::Active
  }
}

impl From<StatusCode> for ListingStatus {
  fn from(code: StatusCode) -> Self {
    match code {
      StatusCode::Sold => ListingStatus::Sold,
      StatusCode::Cancelled => ListingStatus::Cancelled,
      StatusCode::Claimed => ListingStatus::Claimed,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "listingType", rename_all = "camelCase")]
pub enum ListingTerms {
  Fixed {
    #[serde(with = "U64StringSerde")]
    price: u64,
  },
  #[serde(rename_all = "camelCase")]
  Auction {
    #[serde(with = "U64StringSerde")]
    min_bid: u64,
    #[serde(with = "U64StringSerde")]
    current_bid: u64,
    current_bidder: Option<Pkh>,
    end_time: u32,
    #[serde(with = "U32StringSerde")]
    min_bid_increment: u32,
  },
}

impl From<&ListingEvent> for ListingTerms {
  fn from(event: &ListingEvent) -> Self {
    match event.listing_type {
      ListingType::Fixed => ListingTerms::Fixed { price: event.price },
      ListingType::Auction => ListingTerms::Auction {
        min_bid: event.min_bid,
        current_bid: 0,
        current_bidder: None,
        end_time: event.end_time,
        min_bid_increment: event.min_bid_increment,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
  pub txid: Txid,
  pub bidder_pkh: Pkh,
  #[serde(with = "U64StringSerde")]
  pub amount: u64,
  pub height: i64,
  pub time: u64,
  /// Whether this bid became the current bid when it was applied.
  pub promoted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
  pub txid: Txid,
  #[serde(flatten)]
  pub terms: ListingTerms,
  pub seller_pkh: Pkh,
  pub creator_pkh: Pkh,
  pub royalty_bps: u16,
  pub token_category: TokenCategory,
  pub tracking_category: Option<TokenCategory>,
  pub contract: Option<ScriptBuf>,
  pub commitment: Option<Commitment>,
  pub bid_history: Vec<BidRecord>,
  pub status: ListingStatus,
  pub status_inferred: bool,
  pub conflicted: bool,
  pub created_at: u64,
  pub updated_at: u64,
  pub created_height: i64,
  pub updated_height: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Value>,
}

impl Listing {
  pub fn has_bid(&self) -> bool {
    matches!(
      self.terms,
      ListingTerms::Auction {
        current_bidder: Some(_),
        ..
      }
    )
  }

  /// Whether a token of this category belongs to the listing.
  pub fn holds(&self, category: &TokenCategory) -> bool {
    self.token_category == *category || self.tracking_category.as_ref() == Some(category)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bitcoin::hashes::Hash;

  #[test]
  fn test_listing_json_flattens_terms() {
    let listing = Listing {
      txid: Txid::all_zeros(),
      terms: ListingTerms::Auction {
        min_bid: 5000,
        current_bid: 9000,
        current_bidder: Some(Pkh([0xbb; 20])),
        end_time: 1_700_000_000,
        min_bid_increment: 100,
      },
      seller_pkh: Pkh([0x11; 20]),
      creator_pkh: Pkh([0x22; 20]),
      royalty_bps: 250,
      token_category: TokenCategory([0x33; 32]),
      tracking_category: None,
      contract: None,
      commitment: None,
      bid_history: Vec::new(),
      status: ListingStatus::Active,
      status_inferred: false,
      conflicted: false,
      created_at: 10,
      updated_at: 10,
      created_height: 1,
      updated_height: 1,
      metadata: None,
    };

    let json = serde_json::to_value(&listing).unwrap();
    assert_eq!(json["listingType"], "auction");
    assert_eq!(json["currentBid"], "9000");
    assert_eq!(json["minBidIncrement"], "100");
    assert_eq!(json["status"], "active");
    assert!(json.get("metadata").is_none());
    assert!(listing.has_bid());
    assert!(listing.holds(&TokenCategory([0x33; 32])));
    assert!(!listing.holds(&TokenCategory([0x44; 32])));
  }

  #[test]
  fn test_status_from_code() {
    assert_eq!(ListingStatus::from(StatusCode::Claimed), ListingStatus::Claimed);
    assert!(ListingStatus::Sold.is_terminal());
    assert!(!ListingStatus::Active.is_terminal());
    assert_eq!(ListingStatus::Cancelled.to_string(), "cancelled");
  }
}
