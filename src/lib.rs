pub mod bus;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod dynamic_filter;
pub mod dynamic_tee;
pub mod error;

use crate::error::{DynamicPipelineError, Result};
use gstreamer::{parse_launch, prelude::*, Element, ElementFactory, Pad, Pipeline};

// Log at info unless RUST_LOG says otherwise
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

// `--help` and `--version` come back as `InfoRequested` for the caller to print
pub fn parse_args<P: clap::Parser>() -> Result<P> {
    parse_args_from(std::env::args_os())
}

pub fn parse_args_from<P, I, T>(args: I) -> Result<P>
where
    P: clap::Parser,
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    P::try_parse_from(args).map_err(|err| {
        if err.use_stderr() {
            DynamicPipelineError::UsageError(err.to_string())
        } else {
            DynamicPipelineError::InfoRequested(err.to_string())
        }
    })
}

// Initialize gstreamer
pub fn init() -> Result<()> {
    gstreamer::init().map_err(|e| DynamicPipelineError::InitError(e.to_string()))
}

// Initialize gstreamer and create a pipeline from a launch line
pub fn create_pipeline(launch: &str) -> Result<Pipeline> {
    init()?;

    let pipeline = parse_launch(launch)
        .map_err(|e| DynamicPipelineError::ParseLaunchError(e.to_string()))?
        .downcast::<Pipeline>()
        .map_err(|_| DynamicPipelineError::CreatePipelineError)?;

    Ok(pipeline)
}

// Create an anonymous element from its factory name
pub fn make_element(factory: &str) -> Result<Element> {
    ElementFactory::make(factory, None)
        .map_err(|_| DynamicPipelineError::CreateElementError(factory.to_string()))
}

pub fn static_pad(element: &Element, name: &str) -> Result<Pad> {
    element
        .static_pad(name)
        .ok_or_else(|| DynamicPipelineError::MissingPadError {
            element: element.name().to_string(),
            pad: name.to_string(),
        })
}

pub fn link_pads(src: &Pad, sink: &Pad) -> Result<()> {
    src.link(sink)
        .map(|_| ())
        .map_err(|e| DynamicPipelineError::LinkError {
            src: src.path_string().to_string(),
            sink: sink.path_string().to_string(),
            reason: format!("{:?}", e),
        })
}

pub fn unlink_pads(src: &Pad, sink: &Pad) -> Result<()> {
    src.unlink(sink)?;

    Ok(())
}
