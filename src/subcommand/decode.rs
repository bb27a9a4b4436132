use super::*;
use crate::{
  chain::CashTransaction,
  market::{codec::Event, protocol::resolve_events},
};

#[derive(Serialize, Eq, PartialEq, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Output {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub txid: Option<Txid>,
  pub events: Vec<Event>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failures: Vec<String>,
}

#[derive(Debug, Parser)]
pub(crate) struct Decode {
  #[arg(
    long,
    help = "Treat <HEX> as a raw transaction and decode every event it carries."
  )]
  transaction: bool,
  #[arg(help = "Decode <HEX>.")]
  hex: String,
}

impl Decode {
  pub(crate) fn run(self) -> SubcommandResult {
    Ok(Some(Box::new(self.output()?)))
  }

  fn output(&self) -> Result<Output> {
    let bytes = hex::decode(self.hex.trim()).context("input is not hex")?;

    if !self.transaction {
      let event = Event::decode(&bytes).context("failed to decode payload")?;
      event.validate().context("payload decodes to an invalid event")?;
      return Ok(Output {
        txid: None,
        events: vec![event],
        failures: Vec::new(),
      });
    }

    let transaction = CashTransaction::from_bytes(&bytes).context("failed to decode transaction")?;

    let (mut events, mut failures) = (Vec::new(), Vec::new());
    for resolved in resolve_events(&transaction) {
      match resolved {
        Ok(event) => events.push(event),
        Err(err) => failures.push(err.to_string()),
      }
    }

    Ok(Output {
      txid: Some(transaction.txid()),
      events,
      failures,
    })
  }
}
