use super::*;

mod decode;
mod index;
mod server;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
  #[command(about = "Refresh every family once and print the tables")]
  Index(index::IndexSubcommand),
  #[command(about = "Decode an event payload or a raw transaction")]
  Decode(decode::Decode),
  #[command(about = "Run the marketplace API server")]
  Server(server::Server),
}

impl Subcommand {
  pub(crate) fn run(self, options: Options) -> SubcommandResult {
    match self {
      Self::Index(index) => index.run(options),
      Self::Decode(decode) => decode.run(),
      Self::Server(server) => {
        let index = Arc::new(Index::open(&options)?);
        let handle = axum_server::Handle::new();
        LISTENERS.lock().unwrap().push(handle.clone());
        server.run(index, handle)
      }
    }
  }
}

pub(crate) trait Output: Send {
  fn print_json(&self);
}

impl<T> Output for T
where
  T: Serialize + Send,
{
  fn print_json(&self) {
    match serde_json::to_writer_pretty(std::io::stdout(), self) {
      Ok(()) => println!(),
      Err(err) => eprintln!("error: failed to write output: {err}"),
    }
  }
}

pub(crate) type SubcommandResult = Result<Option<Box<dyn Output>>>;
