use super::*;
use super::subcommand::Subcommand;

#[derive(Debug, Parser)]
#[command(version, about = "CashTokens marketplace indexer")]
pub(crate) struct Arguments {
  #[command(flatten)]
  pub(crate) options: Options,
  #[command(subcommand)]
  pub(crate) subcommand: Subcommand,
}

impl Arguments {
  pub(crate) fn run(self) -> SubcommandResult {
    self.subcommand.run(self.options)
  }
}
