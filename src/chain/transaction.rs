use super::{Capability, Commitment, Nft, TokenData};
use crate::market::codec::{TokenCategory, HASH_LEN};
use bitcoin::{
  consensus::{
    encode::{self, VarInt},
    Decodable, Encodable,
  },
  hashes::Hash,
  opcodes,
  script::{Builder, Instruction, PushBytesBuf, PushBytesError},
  ScriptBuf, TxIn, Txid,
};
use std::io;

pub const TOKEN_PREFIX: u8 = 0xef;

const RESERVED_BIT: u8 = 0x80;
const HAS_COMMITMENT_LENGTH: u8 = 0x40;
const HAS_NFT: u8 = 0x20;
const HAS_AMOUNT: u8 = 0x10;
const CAPABILITY_MASK: u8 = 0x0f;

/// An output as Bitcoin Cash serializes it: the token prefix, when present,
/// is carried inside the length-prefixed locking bytecode field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashOutput {
  pub value: u64,
  pub script_pubkey: ScriptBuf,
  pub token: Option<TokenData>,
}

impl CashOutput {
  pub fn is_null_data(&self) -> bool {
    self.script_pubkey.is_op_return()
  }

  /// Every data push following OP_RETURN.
  pub fn null_data_pushes(&self) -> Vec<&[u8]> {
    if !self.is_null_data() {
      return Vec::new();
    }

    self
      .script_pubkey
      .instructions()
      .skip(1)
      .filter_map(|instruction| match instruction {
        Ok(Instruction::PushBytes(push)) => Some(push.as_bytes()),
        _ => None,
      })
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashTransaction {
  pub version: u32,
  pub input: Vec<TxIn>,
  pub output: Vec<CashOutput>,
  pub lock_time: u32,
}

impl CashTransaction {
  pub fn txid(&self) -> Txid {
    Txid::hash(&encode::serialize(self))
  }

  pub fn from_bytes(raw: &[u8]) -> Result<Self, encode::Error> {
    encode::deserialize(raw)
  }

  pub fn to_bytes(&self) -> Vec<u8> {
    encode::serialize(self)
  }
}

pub fn null_data_script(payload: &[u8]) -> Result<ScriptBuf, PushBytesError> {
  Ok(
    Builder::new()
      .push_opcode(opcodes::all::OP_RETURN)
      .push_slice(PushBytesBuf::try_from(payload.to_vec())?)
      .into_script(),
  )
}

impl Encodable for CashOutput {
  fn consensus_encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
    let mut field = Vec::new();
    if let Some(token) = &self.token {
      encode_token_prefix(token, &mut field)?;
    }
    field.extend_from_slice(self.script_pubkey.as_bytes());

    let mut len = self.value.consensus_encode(writer)?;
    len += field.consensus_encode(writer)?;
    Ok(len)
  }
}

impl Decodable for CashOutput {
  fn consensus_decode_from_finite_reader<R: io::Read + ?Sized>(
    reader: &mut R,
  ) -> Result<Self, encode::Error> {
    let value = u64::consensus_decode_from_finite_reader(reader)?;
    let field = Vec::<u8>::consensus_decode_from_finite_reader(reader)?;

    if field.first() != Some(&TOKEN_PREFIX) {
      return Ok(Self {
        value,
        script_pubkey: ScriptBuf::from_bytes(field),
        token: None,
      });
    }

    let mut cursor = io::Cursor::new(&field[1..]);
    let token = decode_token_prefix(&mut cursor)?;
    let consumed = usize::try_from(cursor.position())
      .map_err(|_| encode::Error::ParseFailed("token prefix too long"))?;

    Ok(Self {
      value,
      script_pubkey: ScriptBuf::from_bytes(field[1 + consumed..].to_vec()),
      token: Some(token),
    })
  }
}

impl Encodable for CashTransaction {
  fn consensus_encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
    let mut len = self.version.consensus_encode(writer)?;
    len += self.input.consensus_encode(writer)?;
    len += VarInt(self.output.len() as u64).consensus_encode(writer)?;
    for output in &self.output {
      len += output.consensus_encode(writer)?;
    }
    len += self.lock_time.consensus_encode(writer)?;
    Ok(len)
  }
}

impl Decodable for CashTransaction {
  fn consensus_decode_from_finite_reader<R: io::Read + ?Sized>(
    reader: &mut R,
  ) -> Result<Self, encode::Error> {
    let version = u32::consensus_decode_from_finite_reader(reader)?;
    let input = Vec::<TxIn>::consensus_decode_from_finite_reader(reader)?;
    let VarInt(count) = VarInt::consensus_decode_from_finite_reader(reader)?;
    let mut output = Vec::new();
    for _ in 0..count {
      output.push(CashOutput::consensus_decode_from_finite_reader(reader)?);
    }
    let lock_time = u32::consensus_decode_from_finite_reader(reader)?;

    Ok(Self {
      version,
      input,
      output,
      lock_time,
    })
  }
}

fn decode_token_prefix<R: io::Read + ?Sized>(reader: &mut R) -> Result<TokenData, encode::Error> {
  let mut category = <[u8; HASH_LEN]>::consensus_decode_from_finite_reader(reader)?;
  category.reverse();

  let bitfield = u8::consensus_decode_from_finite_reader(reader)?;
  let has_nft = bitfield & HAS_NFT != 0;
  let has_amount = bitfield & HAS_AMOUNT != 0;
  let has_commitment = bitfield & HAS_COMMITMENT_LENGTH != 0;

  if bitfield & RESERVED_BIT != 0 {
    return Err(encode::Error::ParseFailed("token prefix reserved bit set"));
  }
  if !has_nft && !has_amount {
    return Err(encode::Error::ParseFailed("token prefix encodes no tokens"));
  }
  if !has_nft && (has_commitment || bitfield & CAPABILITY_MASK != 0) {
    return Err(encode::Error::ParseFailed("token prefix nft fields without nft"));
  }

  let capability = match bitfield & CAPABILITY_MASK {
    0 => Capability::None,
    1 => Capability::Mutable,
    2 => Capability::Minting,
    _ => return Err(encode::Error::ParseFailed("token prefix capability")),
  };

  let commitment = if has_commitment {
    let bytes = Vec::<u8>::consensus_decode_from_finite_reader(reader)?;
    if bytes.is_empty() {
      return Err(encode::Error::ParseFailed("token prefix empty commitment"));
    }
    bytes
  } else {
    Vec::new()
  };

  let amount = if has_amount {
    let VarInt(amount) = VarInt::consensus_decode_from_finite_reader(reader)?;
    if amount == 0 {
      return Err(encode::Error::ParseFailed("token prefix zero amount"));
    }
    amount
  } else {
    0
  };

  Ok(TokenData {
    category: TokenCategory(category),
    amount,
    nft: has_nft.then(|| Nft {
      capability,
      commitment: Commitment(commitment),
    }),
  })
}

fn encode_token_prefix(token: &TokenData, field: &mut Vec<u8>) -> Result<usize, io::Error> {
  let mut category = token.category.0;
  category.reverse();

  let mut bitfield = 0u8;
  if token.amount > 0 {
    bitfield |= HAS_AMOUNT;
  }
  if let Some(nft) = &token.nft {
    bitfield |= HAS_NFT;
    bitfield |= match nft.capability {
      Capability::None => 0,
      Capability::Mutable => 1,
      Capability::Minting => 2,
    };
    if !nft.commitment.0.is_empty() {
      bitfield |= HAS_COMMITMENT_LENGTH;
    }
  }

  let mut len = TOKEN_PREFIX.consensus_encode(field)?;
  len += category.consensus_encode(field)?;
  len += bitfield.consensus_encode(field)?;
  if let Some(nft) = token.nft.as_ref().filter(|nft| !nft.commitment.0.is_empty()) {
    len += nft.commitment.0.consensus_encode(field)?;
  }
  if token.amount > 0 {
    len += VarInt(token.amount).consensus_encode(field)?;
  }
  Ok(len)
}
