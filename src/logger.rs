use super::*;
use log::LevelFilter;
use log4rs::{
  append::{
    console::{ConsoleAppender, Target},
    rolling_file::{
      policy::compound::{
        roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
      },
      RollingFileAppender,
    },
  },
  config::{Appender, Root},
  encode::pattern::PatternEncoder,
  filter::threshold::ThresholdFilter,
};

const LOG_FILE: &str = "bazaar.log";
const ROLL_SIZE: u64 = 100 * 1024 * 1024;
const ARCHIVES: u32 = 10;
const PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:5})} {M}] {m}{n}";

fn config(level: LevelFilter, log_dir: &Path) -> Result<log4rs::Config> {
  let log_file = log_dir.join(LOG_FILE);

  let roller = FixedWindowRoller::builder()
    .build(&format!("{}.{{}}.gz", log_file.display()), ARCHIVES)
    .map_err(|err| anyhow!("failed to build log roller: {err}"))?;

  let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));

  let file = RollingFileAppender::builder()
    .encoder(Box::new(PatternEncoder::new(PATTERN)))
    .build(&log_file, Box::new(policy))
    .with_context(|| format!("failed to open log file `{}`", log_file.display()))?;

  let stderr = ConsoleAppender::builder()
    .target(Target::Stderr)
    .encoder(Box::new(PatternEncoder::new(PATTERN)))
    .build();

  Ok(
    log4rs::Config::builder()
      .appender(
        Appender::builder()
          .filter(Box::new(ThresholdFilter::new(level)))
          .build("stderr", Box::new(stderr)),
      )
      .appender(Appender::builder().build("file", Box::new(file)))
      .build(Root::builder().appender("stderr").appender("file").build(level))?,
  )
}

pub(crate) fn init<P: AsRef<Path>>(level: LevelFilter, log_dir: P) -> Result<log4rs::Handle> {
  let log_dir = log_dir.as_ref();
  fs::create_dir_all(log_dir)
    .with_context(|| format!("failed to create log dir `{}`", log_dir.display()))?;

  Ok(log4rs::init_config(config(level, log_dir)?)?)
}
