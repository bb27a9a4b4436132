use super::*;

#[derive(Deserialize, Default, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
  pub(crate) chain_url: Option<String>,
  pub(crate) listing_index: Vec<String>,
  pub(crate) collection_bid_index: Vec<String>,
  pub(crate) pool_index: Vec<String>,
  pub(crate) cache_ttl: Option<u64>,
  pub(crate) refresh_interval: Option<u64>,
  pub(crate) ipfs_gateway: Option<String>,
}

impl Config {
  pub(crate) fn load(path: &Path) -> Result<Self> {
    let file =
      File::open(path).with_context(|| format!("failed to open config `{}`", path.display()))?;
    serde_yaml::from_reader(file)
      .with_context(|| format!("failed to parse config `{}`", path.display()))
  }

  pub(crate) fn listing_index(&self) -> Result<Vec<ScriptBuf>> {
    parse_scripts("listing_index", &self.listing_index)
  }

  pub(crate) fn collection_bid_index(&self) -> Result<Vec<ScriptBuf>> {
    parse_scripts("collection_bid_index", &self.collection_bid_index)
  }

  pub(crate) fn pool_index(&self) -> Result<Vec<ScriptBuf>> {
    parse_scripts("pool_index", &self.pool_index)
  }
}

fn parse_scripts(key: &str, scripts: &[String]) -> Result<Vec<ScriptBuf>> {
  scripts
    .iter()
    .map(|script| {
      hex::decode(script)
        .map(ScriptBuf::from_bytes)
        .with_context(|| format!("{key}: `{script}` is not locking bytecode hex"))
    })
    .collect()
}
