use crate::bus::{classify, BusVerdict};
use crate::config::DispatchConfig;
use crate::create_pipeline;
use crate::error::{DynamicPipelineError, Result};
use gstreamer::prelude::*;
use gstreamer::{Bus, BusSyncReply, Message, MessageView, Pipeline};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

// Messages never reach the bus queue while the dispatcher is alive
pub struct MessageDispatcher {
    bus: Bus,
}

impl MessageDispatcher {
    pub fn new<F>(bus: &Bus, context: &glib::MainContext, handler: F) -> Self
    where
        F: FnMut(Message) -> glib::Continue + 'static,
    {
        let (sender, receiver) = glib::MainContext::channel(glib::PRIORITY_DEFAULT);
        receiver.attach(Some(context), handler);

        let sender = Mutex::new(sender);
        bus.set_sync_handler(move |_, msg| {
            if let Ok(sender) = sender.lock() {
                // the loop is gone, nobody is left to care
                let _ = sender.send(msg.clone());
            }

            BusSyncReply::Drop
        });

        MessageDispatcher { bus: bus.clone() }
    }
}

impl Drop for MessageDispatcher {
    fn drop(&mut self) {
        self.bus.unset_sync_handler();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    ReachedPlaying,
    ReachedEos,
}

fn handle_message(pipeline: &Pipeline, msg: &Message) -> Result<Option<AppEvent>> {
    if let MessageView::StateChanged(state_changed) = msg.view() {
        let from_pipeline = msg.src().as_ref() == Some(pipeline.upcast_ref());
        if from_pipeline && state_changed.current() == gstreamer::State::Playing {
            log::info!("reached PLAYING");
            return Ok(Some(AppEvent::ReachedPlaying));
        }

        return Ok(None);
    }

    match classify(msg) {
        BusVerdict::Continue => Ok(None),
        BusVerdict::Quit(None) => {
            log::info!("reached EOS");
            Ok(Some(AppEvent::ReachedEos))
        }
        BusVerdict::Quit(Some(error)) => Err(error),
    }
}

pub struct PlaybackApp {
    pipeline: Pipeline,
    main_loop: glib::MainLoop,
    events: Rc<RefCell<Vec<AppEvent>>>,
    failure: Rc<RefCell<Option<DynamicPipelineError>>>,
    _dispatcher: MessageDispatcher,
}

impl PlaybackApp {
    pub fn new(config: &DispatchConfig, context: &glib::MainContext) -> Result<Self> {
        let pipeline = create_pipeline(&config.launch)?;
        let bus = pipeline
            .bus()
            .ok_or_else(|| DynamicPipelineError::GlibError("Pipeline without bus".into()))?;

        let main_loop = glib::MainLoop::new(Some(context), false);
        let events = Rc::new(RefCell::new(Vec::new()));
        let failure = Rc::new(RefCell::new(None));

        let pipeline_weak = pipeline.downgrade();
        let main_loop_clone = main_loop.clone();
        let events_clone = events.clone();
        let failure_clone = failure.clone();

        let dispatcher = MessageDispatcher::new(&bus, context, move |msg| {
            let pipeline = match pipeline_weak.upgrade() {
                Some(pipeline) => pipeline,
                None => return glib::Continue(false),
            };

            let stop = match handle_message(&pipeline, &msg) {
                Ok(Some(event)) => {
                    events_clone.borrow_mut().push(event);
                    event == AppEvent::ReachedEos
                }
                Ok(None) => false,
                Err(error) => {
                    failure_clone.borrow_mut().get_or_insert(error);
                    true
                }
            };

            if stop {
                if let Err(err) = pipeline.set_state(gstreamer::State::Null) {
                    log::error!("Failed to stop the pipeline: {}", err);
                }
                main_loop_clone.quit();
            }

            glib::Continue(true)
        });

        Ok(PlaybackApp {
            pipeline,
            main_loop,
            events,
            failure,
            _dispatcher: dispatcher,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn start(&self) -> Result<()> {
        self.pipeline.set_state(gstreamer::State::Playing)?;

        Ok(())
    }

    pub fn run(&self) -> Result<()> {
        self.main_loop.run();

        match self.failure.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.borrow().clone()
    }
}
