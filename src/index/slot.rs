use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc, Mutex,
};

#[derive(Debug)]
pub(crate) struct Published<T> {
  pub(crate) table: Arc<T>,
  pub(crate) version: u64,
  pub(crate) refreshed_at: u64,
}

impl<T> Clone for Published<T> {
  fn clone(&self) -> Self {
    Self {
      table: self.table.clone(),
      version: self.version,
      refreshed_at: self.refreshed_at,
    }
  }
}

#[derive(Debug)]
struct State<T> {
  published: Option<Published<T>>,
  /// Last ticket handed out when the table was invalidated.
  invalidated_at: Option<u64>,
  last_error: Option<(u64, String)>,
}

/// The published table of one family. Refreshes take a ticket when they
/// start and publish only if no later ticket has published since.
#[derive(Debug)]
pub(crate) struct Slot<T> {
  tickets: AtomicU64,
  state: Mutex<State<T>>,
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Self {
      tickets: AtomicU64::new(0),
      state: Mutex::new(State {
        published: None,
        invalidated_at: None,
        last_error: None,
      }),
    }
  }
}

impl<T> Slot<T> {
  pub(crate) fn begin(&self) -> u64 {
    self.tickets.fetch_add(1, Ordering::SeqCst) + 1
  }

  /// Returns `false` when a refresh that started later already published.
  pub(crate) fn publish(&self, version: u64, table: T, now: u64) -> bool {
    let mut state = self.state.lock().unwrap();

    if let Some(published) = &state.published {
      if published.version >= version {
        log::debug!(
          "discarding refresh {version}, refresh {} already published",
          published.version
        );
        return false;
      }
    }

    state.published = Some(Published {
      table: Arc::new(table),
      version,
      refreshed_at: now,
    });
    if matches!(state.invalidated_at, Some(ticket) if version > ticket) {
      state.invalidated_at = None;
    }
    if matches!(state.last_error, Some((failed, _)) if failed < version) {
      state.last_error = None;
    }

    true
  }

  /// Remembers a failed refresh unless a later one already published.
  pub(crate) fn fail(&self, version: u64, message: String) {
    let mut state = self.state.lock().unwrap();

    let superseded = state
      .published
      .as_ref()
      .map(|published| published.version > version)
      .unwrap_or_default();

    if !superseded {
      state.last_error = Some((version, message));
    }
  }

  pub(crate) fn published(&self) -> Option<Published<T>> {
    self.state.lock().unwrap().published.clone()
  }

  pub(crate) fn last_error(&self) -> Option<String> {
    self
      .state
      .lock()
      .unwrap()
      .last_error
      .as_ref()
      .map(|(_, message)| message.clone())
  }

  pub(crate) fn is_fresh(&self, now: u64, ttl: u64) -> bool {
    let state = self.state.lock().unwrap();
    match &state.published {
      Some(published) => state.invalidated_at.is_none() && now.saturating_sub(published.refreshed_at) < ttl,
      None => false,
    }
  }

  /// The published table stays servable until a refresh started after this
  /// call replaces it.
  pub(crate) fn invalidate(&self) {
    let mut state = self.state.lock().unwrap();
    state.invalidated_at = Some(self.tickets.load(Ordering::SeqCst));
  }
}
