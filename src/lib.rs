#![allow(clippy::too_many_arguments, clippy::type_complexity)]
#![deny(
  clippy::cast_lossless,
  clippy::cast_possible_truncation,
  clippy::cast_possible_wrap,
  clippy::cast_sign_loss
)]

use {
  self::{
    arguments::Arguments,
    config::Config,
    index::{Index, IndexSettings},
    subcommand::SubcommandResult,
  },
  anyhow::{anyhow, Context, Error},
  bitcoin::{ScriptBuf, Txid},
  clap::Parser,
  serde::{Deserialize, Serialize},
  std::{
    env,
    fs::{self, File},
    net::ToSocketAddrs,
    path::{Path, PathBuf},
    process,
    str::FromStr,
    sync::{
      atomic::{self, AtomicBool},
      Arc, Mutex,
    },
    thread,
    time::Duration,
  },
  tokio::{runtime::Runtime, task},
};

pub use self::options::Options;

mod arguments;
pub mod chain;
pub mod clock;
mod config;
pub mod custom_serde;
pub mod index;
mod logger;
pub mod market;
pub mod metadata;
mod options;
mod subcommand;

type Result<T = (), E = Error> = std::result::Result<T, E>;

static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);
static LISTENERS: Mutex<Vec<axum_server::Handle>> = Mutex::new(Vec::new());
static INDEXER: Mutex<Option<thread::JoinHandle<()>>> = Mutex::new(Option::None);

fn gracefully_shutdown_indexer() {
  if let Some(indexer) = INDEXER.lock().unwrap().take() {
    // stop the refresher from starting another round
    SHUTTING_DOWN.store(true, atomic::Ordering::Relaxed);
    log::info!("Waiting for refresh thread to finish...");
    if indexer.join().is_err() {
      log::warn!("Refresh thread panicked; join failed");
    }
  }
}

pub fn main() {
  let args = Arguments::parse();
  let log_dir = match args.options.log_dir() {
    Ok(d) => d,
    Err(e) => panic!("get log dir error: {}", e),
  };
  if let Err(e) = logger::init(args.options.log_level(), log_dir) {
    panic!("initialize logger error: {}", e);
  }

  ctrlc::set_handler(move || {
    if SHUTTING_DOWN.fetch_or(true, atomic::Ordering::Relaxed) {
      process::exit(1);
    }

    println!("Shutting down gracefully. Press <CTRL-C> again to shutdown immediately.");

    LISTENERS
      .lock()
      .unwrap()
      .iter()
      .for_each(|handle| handle.graceful_shutdown(Some(Duration::from_millis(100))));
  })
  .expect("Error setting <CTRL-C> handler");

  match args.run() {
    Err(err) => {
      eprintln!("error: {err}");
      err
        .chain()
        .skip(1)
        .for_each(|cause| eprintln!("because: {cause}"));
      if env::var_os("RUST_BACKTRACE")
        .map(|val| val == "1")
        .unwrap_or_default()
      {
        eprintln!("{}", err.backtrace());
      }

      gracefully_shutdown_indexer();

      process::exit(1);
    }
    Ok(output) => {
      if let Some(output) = output {
        output.print_json();
      }
    }
  }

  gracefully_shutdown_indexer();
}
