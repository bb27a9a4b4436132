use super::*;

#[derive(Clone, Debug, Parser)]
pub struct Options {
  #[arg(long, help = "Load configuration from <CONFIG>.")]
  pub(crate) config: Option<PathBuf>,
  #[arg(long, help = "Query the Electrum server at <CHAIN_URL> (tcp://host:port, or an http(s):// JSON-RPC bridge).")]
  pub(crate) chain_url: Option<String>,
  #[arg(long, default_value = "info", help = "Log at <LOG_LEVEL>.")]
  pub(crate) log_level: log::LevelFilter,
  #[arg(long, help = "Write logs to <LOG_DIR>. [default: <DATA_DIR>/logs]")]
  pub(crate) log_dir: Option<PathBuf>,
  #[arg(long, help = "Store the transaction cache in <DATA_DIR>.")]
  pub(crate) data_dir: Option<PathBuf>,
  #[arg(long, help = "Serve cached tables for <CACHE_TTL> seconds. [default: 300]")]
  pub(crate) cache_ttl: Option<u64>,
  #[arg(long, help = "Resolve token metadata through the IPFS gateway at <IPFS_GATEWAY>.")]
  pub(crate) ipfs_gateway: Option<String>,
  #[arg(long, help = "Do not cache confirmed transactions on disk.")]
  pub(crate) no_tx_cache: bool,
}

impl Options {
  pub(crate) fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(data_dir) => Ok(data_dir.clone()),
      None => Ok(
        dirs::data_dir()
          .ok_or_else(|| anyhow!("failed to retrieve data dir"))?
          .join("bazaar"),
      ),
    }
  }

  pub(crate) fn log_dir(&self) -> Result<PathBuf> {
    match &self.log_dir {
      Some(log_dir) => Ok(log_dir.clone()),
      None => Ok(self.data_dir()?.join("logs")),
    }
  }

  pub(crate) fn log_level(&self) -> log::LevelFilter {
    self.log_level
  }

  pub(crate) fn load_config(&self) -> Result<Config> {
    match &self.config {
      Some(path) => Config::load(path),
      None => {
        let path = self.data_dir()?.join("bazaar.yaml");
        if path.exists() {
          Config::load(&path)
        } else {
          Ok(Config::default())
        }
      }
    }
  }

  /// Flags override the config file.
  pub(crate) fn settings(&self, config: &Config) -> Result<IndexSettings> {
    Ok(IndexSettings {
      listing_index: config.listing_index()?,
      collection_bid_index: config.collection_bid_index()?,
      pool_index: config.pool_index()?,
      cache_ttl: self
        .cache_ttl
        .or(config.cache_ttl)
        .unwrap_or(index::DEFAULT_CACHE_TTL),
      refresh_interval: config
        .refresh_interval
        .unwrap_or(index::DEFAULT_REFRESH_INTERVAL),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn parse(args: &[&str]) -> Options {
    Options::try_parse_from(std::iter::once("bazaar").chain(args.iter().copied())).unwrap()
  }

  #[test]
  fn test_defaults() {
    let options = parse(&[]);
    assert_eq!(options.log_level(), log::LevelFilter::Info);
    assert!(!options.no_tx_cache);
    assert_eq!(options.config, None);
  }

  #[test]
  fn test_explicit_dirs() {
    let options = parse(&["--data-dir", "/tmp/market", "--log-level", "debug"]);
    assert_eq!(options.data_dir().unwrap(), PathBuf::from("/tmp/market"));
    assert_eq!(options.log_dir().unwrap(), PathBuf::from("/tmp/market/logs"));
    assert_eq!(options.log_level(), log::LevelFilter::Debug);
  }

  #[test]
  fn test_flags_override_config() {
    let config = Config {
      cache_ttl: Some(120),
      refresh_interval: Some(15),
      listing_index: vec!["a914000000000000000000000000000000000000000087".into()],
      ..Default::default()
    };

    let settings = parse(&[]).settings(&config).unwrap();
    assert_eq!(settings.cache_ttl, 120);
    assert_eq!(settings.refresh_interval, 15);
    assert_eq!(settings.listing_index.len(), 1);

    let settings = parse(&["--cache-ttl", "30"]).settings(&config).unwrap();
    assert_eq!(settings.cache_ttl, 30);
  }

  #[test]
  fn test_missing_default_config_is_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let options = parse(&["--data-dir", dir.path().to_str().unwrap()]);
    assert_eq!(options.load_config().unwrap(), Config::default());
    assert_eq!(
      options.settings(&Config::default()).unwrap(),
      IndexSettings::default()
    );
  }
}
