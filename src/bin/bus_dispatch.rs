use clap::Parser;
use dynamic_pipelines::config::DispatchConfig;
use dynamic_pipelines::dispatch::PlaybackApp;
use dynamic_pipelines::error::{DynamicPipelineError, Result};
use dynamic_pipelines::{init_logging, parse_args};

/// Runs a pipeline whose bus messages are all handled on the application event loop
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline description in gst-launch syntax
    #[arg(long, default_value_t = DispatchConfig::default().launch)]
    launch: String,
}

fn run() -> Result<()> {
    let args = parse_args::<Args>()?;
    let config = DispatchConfig {
        launch: args.launch,
    };

    let context = glib::MainContext::default();
    let app = PlaybackApp::new(&config, &context)?;
    app.start()?;
    app.run()
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
