use crate::bus::{self, schedule_every};
use crate::config::TeeConfig;
use crate::decode::link_first_video_pad;
use crate::error::{DynamicPipelineError, Result};
use crate::{init, link_pads, make_element, static_pad, unlink_pads};
use gstreamer::prelude::*;
use gstreamer::{element_error, Element, Pad, PadProbeReturn, PadProbeType, Pipeline};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Add,
    Remove,
}

// `heads` is a fair coin flip
pub fn choose(branch_count: usize, heads: bool) -> TickAction {
    if branch_count == 0 || heads {
        TickAction::Add
    } else {
        TickAction::Remove
    }
}

struct Branch {
    teepad: Pad,
    queue: Element,
    convert: Element,
    sink: Element,
    removing: AtomicBool,
}

struct Inner {
    pipeline: Pipeline,
    tee: Element,
    converter: String,
    sink: String,
    branches: Mutex<VecDeque<Arc<Branch>>>,
}

// Sink branches hanging off a tee, oldest first
#[derive(Clone)]
pub struct TeeBranches {
    inner: Arc<Inner>,
}

impl TeeBranches {
    pub fn new(pipeline: &Pipeline, tee: &Element, converter: &str, sink: &str) -> Self {
        TeeBranches {
            inner: Arc::new(Inner {
                pipeline: pipeline.clone(),
                tee: tee.clone(),
                converter: converter.to_string(),
                sink: sink.to_string(),
                branches: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .branches
            .lock()
            .map(|branches| branches.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tick(&self) -> Result<TickAction> {
        let action = choose(self.len(), rand::random::<u32>() % 2 == 0);

        match action {
            TickAction::Add => self.add_branch()?,
            TickAction::Remove => {
                self.remove_oldest();
            }
        }

        Ok(action)
    }

    pub fn add_branch(&self) -> Result<()> {
        let inner = &self.inner;

        log::info!("add");

        let queue = make_element("queue")?;
        let convert = make_element(&inner.converter)?;
        let sink = make_element(&inner.sink)?;

        let teepad = attach_chain(&inner.pipeline, &inner.tee, &[&queue, &convert, &sink])?;

        log::info!("added");

        let branch = Arc::new(Branch {
            teepad,
            queue,
            convert,
            sink,
            removing: AtomicBool::new(false),
        });
        if let Ok(mut branches) = inner.branches.lock() {
            branches.push_back(branch);
        }

        Ok(())
    }

    // false if there was nothing to remove
    pub fn remove_oldest(&self) -> bool {
        let branch = match self
            .inner
            .branches
            .lock()
            .ok()
            .and_then(|mut branches| branches.pop_front())
        {
            Some(branch) => branch,
            None => return false,
        };

        log::info!("remove");

        let inner = self.inner.clone();
        let teepad = branch.teepad.clone();
        teepad.add_probe(PadProbeType::IDLE, move |_pad, _info| {
            if branch
                .removing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return PadProbeReturn::Ok;
            }

            if let Err(err) = inner.unlink(&branch) {
                log::error!("{}", err);
                element_error!(
                    inner.pipeline,
                    gstreamer::CoreError::StateChange,
                    ("Failed to remove a branch"),
                    ["{}", err]
                );
            }

            PadProbeReturn::Remove
        });

        true
    }
}

impl Inner {
    fn unlink(&self, branch: &Branch) -> Result<()> {
        unlink_pads(&branch.teepad, &static_pad(&branch.queue, "sink")?)?;

        self.pipeline
            .remove_many(&[&branch.queue, &branch.convert, &branch.sink])?;

        branch.sink.set_state(gstreamer::State::Null)?;
        branch.convert.set_state(gstreamer::State::Null)?;
        branch.queue.set_state(gstreamer::State::Null)?;

        self.tee.release_request_pad(&branch.teepad);

        log::info!("removed");

        Ok(())
    }
}

fn request_tee_pad(tee: &Element) -> Result<Pad> {
    tee.request_pad_simple("src_%u")
        .ok_or_else(|| DynamicPipelineError::MissingPadError {
            element: tee.name().to_string(),
            pad: "src_%u".into(),
        })
}

// Adds and links `chain`, then feeds it from a new tee pad. On failure the graph is
// left as it was.
fn attach_chain(pipeline: &Pipeline, tee: &Element, chain: &[&Element]) -> Result<Pad> {
    let first = chain
        .first()
        .ok_or(DynamicPipelineError::CreatePipelineError)?;
    let chain_sink = static_pad(first, "sink")?;

    pipeline.add_many(chain)?;

    let attached = link_and_sync(chain).and_then(|_| {
        let teepad = request_tee_pad(tee)?;
        match link_pads(&teepad, &chain_sink) {
            Ok(()) => Ok(teepad),
            Err(err) => {
                tee.release_request_pad(&teepad);
                Err(err)
            }
        }
    });

    if attached.is_err() {
        let _ = pipeline.remove_many(chain);
        for element in chain {
            let _ = element.set_state(gstreamer::State::Null);
        }
    }

    attached
}

fn link_and_sync(chain: &[&Element]) -> Result<()> {
    Element::link_many(chain).map_err(|e| DynamicPipelineError::LinkError {
        src: chain.first().map(|e| e.name().to_string()).unwrap_or_default(),
        sink: chain.last().map(|e| e.name().to_string()).unwrap_or_default(),
        reason: e.to_string(),
    })?;

    for element in chain {
        element.sync_state_with_parent()?;
    }

    Ok(())
}

// Hangs a `queue ! sink sync=true` branch off the tee for the rest of the run
fn attach_monitor(pipeline: &Pipeline, tee: &Element, sink_factory: &str) -> Result<()> {
    let queue = make_element("queue")?;
    let sink = make_element(sink_factory)?;

    sink.set_property("sync", true)?;

    attach_chain(pipeline, tee, &[&queue, &sink]).map(|_| ())
}

// filesrc ! decodebin, videoconvert ! tee
pub struct DynamicTee {
    pipeline: Pipeline,
    decodebin: Element,
    branches: TeeBranches,
    pad_added: Option<glib::SignalHandlerId>,
    context: glib::MainContext,
}

impl DynamicTee {
    pub fn new(config: &TeeConfig) -> Result<Self> {
        config.validate()?;
        init()?;

        let pipeline = Pipeline::new(None);
        let src = make_element("filesrc")?;
        let dbin = make_element("decodebin")?;
        let conv = make_element(&config.converter)?;
        let tee = make_element("tee")?;

        src.set_property("location", config.location.as_str())?;

        pipeline.add_many(&[&src, &dbin, &conv, &tee])?;
        Element::link_many(&[&src, &dbin])
            .and_then(|_| Element::link_many(&[&conv, &tee]))
            .map_err(|e| DynamicPipelineError::LinkError {
                src: src.name().to_string(),
                sink: tee.name().to_string(),
                reason: e.to_string(),
            })?;

        let branches = TeeBranches::new(&pipeline, &tee, &config.converter, &config.sink);
        let context = glib::MainContext::new();
        let interval = config.interval;
        let monitor_sink = config.monitor_sink.clone();
        let pipeline_weak = pipeline.downgrade();
        let context_clone = context.clone();
        let branches_clone = branches.clone();

        let pad_added = link_first_video_pad(&dbin, static_pad(&conv, "sink")?, move |_pad| {
            let pipeline = match pipeline_weak.upgrade() {
                Some(pipeline) => pipeline,
                None => return,
            };

            if let Err(err) = attach_monitor(&pipeline, &tee, &monitor_sink) {
                log::error!("{}", err);
                element_error!(
                    pipeline,
                    gstreamer::CoreError::Negotiation,
                    ("Failed to attach the monitor branch"),
                    ["{}", err]
                );
                return;
            }

            let branches = branches_clone.clone();
            let pipeline_weak = pipeline.downgrade();
            schedule_every(&context_clone, interval, move || {
                if let Err(err) = branches.tick() {
                    log::error!("{}", err);
                    if let Some(pipeline) = pipeline_weak.upgrade() {
                        element_error!(
                            pipeline,
                            gstreamer::CoreError::StateChange,
                            ("Failed to add a branch"),
                            ["{}", err]
                        );
                    }
                }

                glib::Continue(true)
            });
        });

        Ok(DynamicTee {
            pipeline,
            decodebin: dbin,
            branches,
            pad_added: Some(pad_added),
            context,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn branches(&self) -> &TeeBranches {
        &self.branches
    }

    pub fn run(mut self) -> Result<()> {
        let result = bus::run(&self.pipeline, &self.context);

        if let Some(pad_added) = self.pad_added.take() {
            self.decodebin.disconnect(pad_added);
        }

        result
    }
}
