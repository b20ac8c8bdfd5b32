use clap::Parser;
use dynamic_pipelines::config::FilterConfig;
use dynamic_pipelines::dynamic_filter::DynamicFilter;
use dynamic_pipelines::error::{DynamicPipelineError, Result};
use dynamic_pipelines::{init_logging, parse_args};

/// Plays a video file and toggles a filter in and out of the running pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to play
    filename: String,

    /// Seconds between two toggles
    #[arg(long, default_value_t = FilterConfig::default().interval)]
    interval: u32,

    /// Filter element factory to insert
    #[arg(long, default_value_t = FilterConfig::default().filter)]
    filter: String,

    /// Video sink element factory
    #[arg(long, default_value_t = FilterConfig::default().sink)]
    sink: String,
}

impl Args {
    fn config(self) -> FilterConfig {
        FilterConfig {
            location: self.filename,
            interval: self.interval,
            filter: self.filter,
            sink: self.sink,
            ..FilterConfig::default()
        }
    }
}

fn run() -> Result<()> {
    let config = parse_args::<Args>()?.config();
    log::debug!("starting with {:?}", config);

    DynamicFilter::new(&config)?.run()
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
