use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Satoshi amounts cross JSON as decimal strings so no client parses them
/// as floating point.
pub struct U64StringSerde;

impl U64StringSerde {
  pub fn serialize<S>(val: &u64, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    String::serialize(&val.to_string(), serializer)
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
  where
    D: Deserializer<'de>,
  {
    u64::from_str(&String::deserialize(deserializer)?)
      .map_err(|e| de::Error::custom(format!("u64 from string error: {}", e)))
  }
}
