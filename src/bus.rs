use crate::error::{DynamicPipelineError, Result};
use gstreamer::prelude::*;
use gstreamer::{Message, MessageView, Pipeline};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum BusVerdict {
    Continue,

    // with the error that stopped the loop, if any
    Quit(Option<DynamicPipelineError>),
}

fn source_path(msg: &Message) -> String {
    msg.src()
        .map(|s| String::from(s.path_string()))
        .unwrap_or_else(|| String::from("None"))
}

// Logs the interesting messages and decides whether the loop keeps running
pub fn classify(msg: &Message) -> BusVerdict {
    match msg.view() {
        MessageView::Error(err) => {
            let src = source_path(msg);
            log::error!("ERROR: from element {}: {}", src, err.error());
            if let Some(debug) = err.debug() {
                log::error!("Additional debug info:\n{}", debug);
            }

            BusVerdict::Quit(Some(DynamicPipelineError::BusError {
                src,
                error: err.error().to_string(),
                debug: err.debug().map(String::from),
            }))
        }
        MessageView::Warning(warning) => {
            log::warn!(
                "WARNING: from element {}: {}",
                source_path(msg),
                warning.error()
            );
            if let Some(debug) = warning.debug() {
                log::warn!("Additional debug info:\n{}", debug);
            }

            BusVerdict::Continue
        }
        MessageView::Eos(..) => {
            log::info!("Got EOS");
            BusVerdict::Quit(None)
        }
        _ => BusVerdict::Continue,
    }
}

// Runs until `func` returns `Continue(false)`
pub fn schedule_every<F>(context: &glib::MainContext, seconds: u32, func: F) -> glib::SourceId
where
    F: FnMut() -> glib::Continue + Send + 'static,
{
    glib::timeout_source_new_seconds(seconds, None, glib::PRIORITY_DEFAULT, func)
        .attach(Some(context))
}

// Timers scheduled on `context` are dispatched by the same loop
pub fn run(pipeline: &Pipeline, context: &glib::MainContext) -> Result<()> {
    let main_loop = glib::MainLoop::new(Some(context), false);
    let bus = pipeline
        .bus()
        .ok_or_else(|| DynamicPipelineError::GlibError("Pipeline without bus".into()))?;

    let failure = Arc::new(Mutex::new(None));
    let failure_clone = failure.clone();
    let main_loop_clone = main_loop.clone();

    let watch = bus.create_watch(None, glib::PRIORITY_DEFAULT, move |_, msg| {
        if let BusVerdict::Quit(error) = classify(msg) {
            if let Some(error) = error {
                if let Ok(mut failure) = failure_clone.lock() {
                    failure.get_or_insert(error);
                }
            }
            main_loop_clone.quit();
        }

        glib::Continue(true)
    });
    watch.attach(Some(context));

    if let Err(error) = pipeline.set_state(gstreamer::State::Playing) {
        let _ = pipeline.set_state(gstreamer::State::Null);
        watch.destroy();
        return Err(error.into());
    }

    main_loop.run();

    let stopped = pipeline.set_state(gstreamer::State::Null);
    watch.destroy();
    stopped?;

    let failure = failure.lock().ok().and_then(|mut failure| failure.take());
    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
