use super::{script_hash, Capability, ChainSource, Commitment, HistoryEntry, Nft, TokenData, Utxo};
use crate::{market::codec::TokenCategory, Result};
use anyhow::{anyhow, Context};
use bitcoin::{block::Header, consensus::encode, OutPoint, Script, Txid};
use http::header;
use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
  collections::HashMap,
  io::{BufRead, BufReader, Write},
  net::TcpStream,
  str::FromStr,
  sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
  },
  time::Duration,
};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
  jsonrpc: &'static str,
  id: u64,
  method: &'a str,
  params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
  result: Option<T>,
  error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MerkleItem {
  pos: u32,
}

#[derive(Debug, Deserialize)]
struct HistoryItem {
  tx_hash: Txid,
  height: i64,
}

#[derive(Debug, Deserialize)]
struct UnspentItem {
  tx_hash: Txid,
  tx_pos: u32,
  height: i64,
  value: u64,
  token_data: Option<TokenDataItem>,
}

#[derive(Debug, Deserialize)]
struct TokenDataItem {
  category: String,
  amount: String,
  nft: Option<NftItem>,
}

#[derive(Debug, Deserialize)]
struct NftItem {
  capability: String,
  commitment: String,
}

enum Transport {
  /// Newline-delimited JSON-RPC, as Fulcrum and ElectrumX serve it.
  Tcp {
    address: String,
    connection: Mutex<Option<BufReader<TcpStream>>>,
  },
  /// JSON-RPC POSTed to an HTTP bridge in front of the server.
  Http { client: Client, url: String },
}

/// An Electrum Cash server. `tcp://host:port` connects to the server itself;
/// `http://` and `https://` URLs go through an HTTP JSON-RPC bridge.
pub struct ElectrumClient {
  transport: Transport,
  id: AtomicU64,
  block_times: Mutex<HashMap<i64, u32>>,
  positions: Mutex<HashMap<(Txid, i64), u32>>,
}

impl ElectrumClient {
  pub fn new(url: &str) -> Result<Self> {
    let transport = match url.strip_prefix("tcp://") {
      Some(address) => Transport::Tcp {
        address: address.trim_end_matches('/').to_string(),
        connection: Mutex::new(None),
      },
      None => {
        let mut headers = header::HeaderMap::new();
        headers.insert(
          header::CONTENT_TYPE,
          header::HeaderValue::from_static("application/json"),
        );
        Transport::Http {
          client: Client::builder()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()?,
          url: url.to_string(),
        }
      }
    };

    Ok(Self {
      transport,
      id: AtomicU64::new(0),
      block_times: Mutex::new(HashMap::new()),
      positions: Mutex::new(HashMap::new()),
    })
  }

  fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
    let request = RpcRequest {
      jsonrpc: "2.0",
      id: self.id.fetch_add(1, Ordering::Relaxed),
      method,
      params,
    };
    log::trace!("electrum request: {:?}", request);

    let response: RpcResponse<T> = match &self.transport {
      Transport::Tcp {
        address,
        connection,
      } => {
        let mut connection = connection.lock().unwrap();
        if connection.is_none() {
          *connection = Some(BufReader::new(connect(address)?));
        }
        let result = match connection.as_mut() {
          Some(reader) => exchange(reader, &request),
          None => Err(anyhow!("not connected to {address}")),
        };
        if result.is_err() {
          // reconnect on the next call
          *connection = None;
        }
        result.with_context(|| format!("{method} request failed"))?
      }
      Transport::Http { client, url } => {
        let response = client
          .post(url)
          .json(&request)
          .send()
          .with_context(|| format!("{method} request failed"))?;

        if !response.status().is_success() {
          return Err(anyhow!("{method} failed: {}", response.status()));
        }

        response
          .json()
          .with_context(|| format!("{method} returned malformed json"))?
      }
    };

    if let Some(error) = response.error {
      return Err(anyhow!("{method} error: {error}"));
    }

    response
      .result
      .ok_or_else(|| anyhow!("{method} returned no result"))
  }

  fn block_time(&self, height: i64) -> Result<Option<u32>> {
    if height <= 0 {
      return Ok(None);
    }

    if let Some(time) = self.block_times.lock().unwrap().get(&height) {
      return Ok(Some(*time));
    }

    let header: String = self.call("blockchain.block.header", json!([height]))?;
    let header: Header = encode::deserialize(&hex::decode(header)?)?;
    self.block_times.lock().unwrap().insert(height, header.time);

    Ok(Some(header.time))
  }

  fn position(&self, txid: Txid, height: i64) -> Result<Option<u32>> {
    if height <= 0 {
      return Ok(None);
    }

    if let Some(position) = self.positions.lock().unwrap().get(&(txid, height)) {
      return Ok(Some(*position));
    }

    let merkle: MerkleItem = self.call(
      "blockchain.transaction.get_merkle",
      json!([txid.to_string(), height]),
    )?;
    self
      .positions
      .lock()
      .unwrap()
      .insert((txid, height), merkle.pos);

    Ok(Some(merkle.pos))
  }
}

fn connect(address: &str) -> Result<TcpStream> {
  let stream =
    TcpStream::connect(address).with_context(|| format!("failed to connect to {address}"))?;
  stream.set_read_timeout(Some(TIMEOUT))?;
  stream.set_write_timeout(Some(TIMEOUT))?;
  Ok(stream)
}

fn exchange<T: DeserializeOwned>(
  reader: &mut BufReader<TcpStream>,
  request: &RpcRequest,
) -> Result<RpcResponse<T>> {
  let mut line = serde_json::to_vec(request)?;
  line.push(b'\n');
  reader.get_mut().write_all(&line)?;

  let mut response = String::new();
  if reader.read_line(&mut response)? == 0 {
    return Err(anyhow!("connection closed"));
  }

  Ok(serde_json::from_str(&response)?)
}

impl ChainSource for ElectrumClient {
  fn history(&self, script: &Script) -> Result<Vec<HistoryEntry>> {
    let items: Vec<HistoryItem> =
      self.call("blockchain.scripthash.get_history", json!([script_hash(script)]))?;

    items
      .into_iter()
      .map(|item| {
        Ok(HistoryEntry {
          txid: item.tx_hash,
          height: item.height,
          position: self.position(item.tx_hash, item.height)?,
          time: self.block_time(item.height)?,
        })
      })
      .collect()
  }

  fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>> {
    let raw: String = self.call("blockchain.transaction.get", json!([txid.to_string(), false]))?;
    Ok(hex::decode(raw)?)
  }

  fn unspent_outputs(&self, script: &Script) -> Result<Vec<Utxo>> {
    let items: Vec<UnspentItem> =
      self.call("blockchain.scripthash.listunspent", json!([script_hash(script)]))?;

    items
      .into_iter()
      .map(|item| {
        Ok(Utxo {
          outpoint: OutPoint::new(item.tx_hash, item.tx_pos),
          value: item.value,
          height: item.height,
          token: item.token_data.map(TokenData::try_from).transpose()?,
        })
      })
      .collect()
  }
}

impl TryFrom<TokenDataItem> for TokenData {
  type Error = anyhow::Error;

  fn try_from(item: TokenDataItem) -> Result<Self> {
    let nft = match item.nft {
      Some(nft) => Some(Nft {
        capability: match nft.capability.as_str() {
          "none" => Capability::None,
          "mutable" => Capability::Mutable,
          "minting" => Capability::Minting,
          other => return Err(anyhow!("unknown nft capability {other}")),
        },
        commitment: Commitment(hex::decode(nft.commitment)?),
      }),
      None => None,
    };

    Ok(TokenData {
      category: TokenCategory::from_str(&item.category)?,
      amount: item.amount.parse()?,
      nft,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_listunspent_token_data() {
    let json = r#"[{
      "height": 800000,
      "tx_hash": "b61b0172d95e266c18aea0c624db987e971a5d6d4ebc2aaed85da4642d635735",
      "tx_pos": 1,
      "value": 1000,
      "token_data": {
        "amount": "0",
        "category": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        "nft": { "capability": "none", "commitment": "0102" }
      }
    }]"#;

    let items: Vec<UnspentItem> = serde_json::from_str(json).unwrap();
    let token = TokenData::try_from(items.into_iter().next().unwrap().token_data.unwrap()).unwrap();

    assert_eq!(token.category, TokenCategory([0xaa; 32]));
    assert_eq!(token.amount, 0);
    assert_eq!(
      token.nft,
      Some(Nft {
        capability: Capability::None,
        commitment: Commitment(vec![1, 2]),
      })
    );
  }

  #[test]
  fn test_rpc_error_response() {
    let response: RpcResponse<String> =
      serde_json::from_str(r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32600,"message":"bad"}}"#)
        .unwrap();
    assert!(response.result.is_none());
    assert!(response.error.is_some());
  }

  #[test]
  fn test_unknown_capability_rejected() {
    let item = TokenDataItem {
      category: "00".repeat(32),
      amount: "1".into(),
      nft: Some(NftItem {
        capability: "burnt".into(),
        commitment: String::new(),
      }),
    };
    assert!(TokenData::try_from(item).is_err());
  }

  #[test]
  fn test_tcp_history_carries_block_positions() {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let txid = "b61b0172d95e266c18aea0c624db987e971a5d6d4ebc2aaed85da4642d635735";

    let server = std::thread::spawn(move || {
      let (stream, _) = listener.accept().unwrap();
      let mut reader = BufReader::new(stream);
      let mut methods = Vec::new();
      loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 {
          break;
        }
        let request: Value = serde_json::from_str(&line).unwrap();
        let method = request["method"].as_str().unwrap().to_string();
        let result = match method.as_str() {
          "blockchain.scripthash.get_history" => json!([{ "tx_hash": txid, "height": 0 }, { "tx_hash": txid, "height": 800000 }]),
          "blockchain.transaction.get_merkle" => json!({ "block_height": 800000, "merkle": [], "pos": 7 }),
          "blockchain.block.header" => json!("00".repeat(80)),
          other => panic!("unexpected method {other}"),
        };
        methods.push(method);
        let response = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
        writeln!(reader.get_mut(), "{response}").unwrap();
      }
      methods
    });

    let client = ElectrumClient::new(&format!("tcp://{address}")).unwrap();
    let history = client.history(Script::from_bytes(&[0x51])).unwrap();
    drop(client);

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].position, None);
    assert_eq!(history[0].time, None);
    assert_eq!(history[1].position, Some(7));
    assert_eq!(history[1].time, Some(0));
    assert_eq!(
      server.join().unwrap(),
      vec![
        "blockchain.scripthash.get_history",
        "blockchain.transaction.get_merkle",
        "blockchain.block.header",
      ]
    );
  }
}
