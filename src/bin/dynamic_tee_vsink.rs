use clap::Parser;
use dynamic_pipelines::config::TeeConfig;
use dynamic_pipelines::dynamic_tee::DynamicTee;
use dynamic_pipelines::error::{DynamicPipelineError, Result};
use dynamic_pipelines::{init_logging, parse_args};

/// Plays a video file while randomly adding and removing video sinks behind a tee
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to play
    filename: String,

    /// Seconds between two branch changes
    #[arg(long, default_value_t = TeeConfig::default().interval)]
    interval: u32,

    /// Sink element factory of the added branches
    #[arg(long, default_value_t = TeeConfig::default().sink)]
    sink: String,
}

impl Args {
    fn config(self) -> TeeConfig {
        TeeConfig {
            location: self.filename,
            interval: self.interval,
            sink: self.sink,
            ..TeeConfig::default()
        }
    }
}

fn run() -> Result<()> {
    let config = parse_args::<Args>()?.config();
    log::debug!("starting with {:?}", config);

    let player = DynamicTee::new(&config)?;
    let branches = player.branches().clone();
    let outcome = player.run();
    log::info!("{} branches attached at exit", branches.len());

    outcome
}

fn main() {
    init_logging();

    match run() {
        Ok(()) => {}
        Err(DynamicPipelineError::InfoRequested(text)) => print!("{}", text),
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(err.exit_code());
        }
    }
}
