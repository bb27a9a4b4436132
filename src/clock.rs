use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Seconds since the unix epoch.
pub trait Clock: Send + Sync {
  fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
  }
}

pub struct FixedClock(AtomicU64);

impl FixedClock {
  pub fn new(now: u64) -> Self {
    Self(AtomicU64::new(now))
  }

  pub fn set(&self, now: u64) {
    self.0.store(now, Ordering::SeqCst);
  }

  pub fn advance(&self, secs: u64) {
    self.0.fetch_add(secs, Ordering::SeqCst);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> u64 {
    self.0.load(Ordering::SeqCst)
  }
}
