use super::{DecodeError, EventKind, MAGIC_LEN};
use bitcoin::{hashes::Hash, Txid};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
  fmt::{self, Display, Formatter},
  str::FromStr,
};

pub const PKH_LEN: usize = 20;
pub const HASH_LEN: usize = 32;

macro_rules! hex_newtype {
  ($name:ident, $len:expr) => {
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct $name(pub [u8; $len]);

    impl $name {
      pub fn as_bytes(&self) -> &[u8; $len] {
        &self.0
      }

      pub fn hex(&self) -> String {
        hex::encode(self.0)
      }
    }

    impl From<[u8; $len]> for $name {
      fn from(bytes: [u8; $len]) -> Self {
        Self(bytes)
      }
    }

    impl Display for $name {
      fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.hex())
      }
    }

    impl fmt::Debug for $name {
      fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}({})", stringify!($name), self.hex())
      }
    }

    impl FromStr for $name {
      type Err = hex::FromHexError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; $len];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
      }
    }

    impl Serialize for $name {
      fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
      where
        S: Serializer,
      {
        self.hex().serialize(serializer)
      }
    }

    impl<'de> Deserialize<'de> for $name {
      fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
      where
        D: Deserializer<'de>,
      {
        Self::from_str(&String::deserialize(deserializer)?).map_err(|e| {
          de::Error::custom(format!("deserialize {} error: {}", stringify!($name), e))
        })
      }
    }
  };
}

hex_newtype!(Pkh, PKH_LEN);
hex_newtype!(TokenCategory, HASH_LEN);
hex_newtype!(BidSalt, HASH_LEN);

/// Transaction ids travel in display byte order, the reverse of `Txid`'s
/// internal order.
pub(crate) fn txid_from_wire(mut bytes: [u8; HASH_LEN]) -> Txid {
  bytes.reverse();
  Txid::from_byte_array(bytes)
}

pub(crate) fn txid_to_wire(txid: &Txid) -> [u8; HASH_LEN] {
  let mut bytes = txid.to_byte_array();
  bytes.reverse();
  bytes
}

/// Checks magic, version and length, returning the declared version.
pub(super) fn check_header(
  kind: EventKind,
  payload: &[u8],
  required_len: impl Fn(u8) -> Option<usize>,
) -> Result<u8, DecodeError> {
  if payload.get(..MAGIC_LEN) != Some(kind.magic().as_slice()) {
    return Err(DecodeError::BadMagic);
  }

  let version = *payload.get(MAGIC_LEN).ok_or(DecodeError::Truncated {
    kind,
    expected: MAGIC_LEN + 1,
    actual: payload.len(),
  })?;

  let expected = required_len(version).ok_or(DecodeError::UnsupportedVersion { kind, version })?;

  if payload.len() < expected {
    return Err(DecodeError::Truncated {
      kind,
      expected,
      actual: payload.len(),
    });
  }

  Ok(version)
}

pub(super) fn take<const N: usize>(
  kind: EventKind,
  payload: &[u8],
  offset: usize,
) -> Result<[u8; N], DecodeError> {
  payload
    .get(offset..offset + N)
    .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
    .ok_or(DecodeError::Truncated {
      kind,
      expected: offset + N,
      actual: payload.len(),
    })
}

pub(super) fn take_u8(kind: EventKind, payload: &[u8], offset: usize) -> Result<u8, DecodeError> {
  take::<1>(kind, payload, offset).map(|[byte]| byte)
}

pub(super) fn take_u16(kind: EventKind, payload: &[u8], offset: usize) -> Result<u16, DecodeError> {
  take(kind, payload, offset).map(u16::from_be_bytes)
}

pub(super) fn take_u32(kind: EventKind, payload: &[u8], offset: usize) -> Result<u32, DecodeError> {
  take(kind, payload, offset).map(u32::from_be_bytes)
}

pub(super) fn take_u64(kind: EventKind, payload: &[u8], offset: usize) -> Result<u64, DecodeError> {
  take(kind, payload, offset).map(u64::from_be_bytes)
}

pub(super) fn take_txid(kind: EventKind, payload: &[u8], offset: usize) -> Result<Txid, DecodeError> {
  take(kind, payload, offset).map(txid_from_wire)
}
