use super::Error;
use crate::{
  chain::CashTransaction,
  market::codec::{Event, EventKind},
};

/// Decodes every null-data push carrying a marketplace magic. Pushes of other
/// protocols are not reported at all.
pub fn resolve_events(tx: &CashTransaction) -> Vec<Result<Event, Error>> {
  tx.output
    .iter()
    .flat_map(|output| output.null_data_pushes())
    .filter(|payload| EventKind::from_magic(payload).is_some())
    .map(|payload| {
      let event = Event::decode(payload).map_err(Error::Malformed)?;
      event.validate().map_err(Error::Invalid)?;
      Ok(event)
    })
    .collect()
}
