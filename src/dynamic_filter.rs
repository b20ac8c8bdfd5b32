use crate::bus::{self, schedule_every};
use crate::config::FilterConfig;
use crate::decode::link_first_video_pad;
use crate::error::{DynamicPipelineError, Result};
use crate::{init, link_pads, make_element, static_pad, unlink_pads};
use gstreamer::prelude::*;
use gstreamer::{element_error, Element, Pad, PadProbeReturn, PadProbeType, Pipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Inserted,
    Removed,
}

struct FilterElements {
    convert: Element,
    filter: Element,
}

struct Inner {
    pipeline: Pipeline,
    upstream: Pad,
    downstream: Element,
    converter: String,
    filter: String,
    inserted: Mutex<Option<FilterElements>>,
    in_idle_probe: AtomicBool,
}

// Inserts and removes a filter between `upstream` and the sink pad of `downstream`
#[derive(Clone)]
pub struct FilterSwitcher {
    inner: Arc<Inner>,
}

impl FilterSwitcher {
    pub fn new(
        pipeline: &Pipeline,
        upstream: &Pad,
        downstream: &Element,
        converter: &str,
        filter: &str,
    ) -> Self {
        FilterSwitcher {
            inner: Arc::new(Inner {
                pipeline: pipeline.clone(),
                upstream: upstream.clone(),
                downstream: downstream.clone(),
                converter: converter.to_string(),
                filter: filter.to_string(),
                inserted: Mutex::new(None),
                in_idle_probe: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_filter_inserted(&self) -> bool {
        self.inner
            .inserted
            .lock()
            .map(|inserted| inserted.is_some())
            .unwrap_or(false)
    }

    // On an idle pad the callback runs before this returns
    pub fn schedule_toggle(&self) {
        self.inner.in_idle_probe.store(false, Ordering::SeqCst);

        let inner_weak = Arc::downgrade(&self.inner);
        self.inner
            .upstream
            .add_probe(PadProbeType::IDLE, move |_pad, _info| {
                idle_probe(&inner_weak)
            });
    }

    pub fn toggle(&self) -> Result<FilterState> {
        self.inner.toggle()
    }
}

fn idle_probe(inner_weak: &Weak<Inner>) -> PadProbeReturn {
    let inner = match inner_weak.upgrade() {
        Some(inner) => inner,
        None => return PadProbeReturn::Remove,
    };

    if inner
        .in_idle_probe
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return PadProbeReturn::Ok;
    }

    match inner.toggle() {
        Ok(FilterState::Inserted) => log::info!("inserted {}", inner.filter),
        Ok(FilterState::Removed) => log::info!("removed {}", inner.filter),
        Err(err) => {
            log::error!("{}", err);
            element_error!(
                inner.pipeline,
                gstreamer::CoreError::Negotiation,
                ("Failed to toggle the filter"),
                ["{}", err]
            );
        }
    }

    PadProbeReturn::Remove
}

impl Inner {
    fn toggle(&self) -> Result<FilterState> {
        let mut inserted = self
            .inserted
            .lock()
            .map_err(|_| DynamicPipelineError::GlibError("filter state poisoned".into()))?;

        if inserted.is_some() {
            self.remove(&mut inserted)?;
            Ok(FilterState::Removed)
        } else {
            *inserted = Some(self.insert()?);
            Ok(FilterState::Inserted)
        }
    }

    fn insert(&self) -> Result<FilterElements> {
        let convert = make_element(&self.converter)?;
        let filter = make_element(&self.filter)?;
        let convert_sink = static_pad(&convert, "sink")?;
        let filter_src = static_pad(&filter, "src")?;
        let downstream_sink = static_pad(&self.downstream, "sink")?;

        self.pipeline.add_many(&[&convert, &filter])?;
        let elements = FilterElements { convert, filter };

        if let Err(err) = self.prepare(&elements, &downstream_sink) {
            self.discard(&elements);
            return Err(err);
        }

        let relinked = link_pads(&self.upstream, &convert_sink)
            .and_then(|_| link_pads(&filter_src, &downstream_sink));
        if let Err(err) = relinked {
            self.discard(&elements);
            link_pads(&self.upstream, &downstream_sink)?;
            return Err(err);
        }

        Ok(elements)
    }

    // Everything up to the point where upstream feeds nothing
    fn prepare(&self, elements: &FilterElements, downstream_sink: &Pad) -> Result<()> {
        let FilterElements { convert, filter } = elements;

        convert.sync_state_with_parent()?;
        filter.sync_state_with_parent()?;
        convert
            .link(filter)
            .map_err(|e| DynamicPipelineError::LinkError {
                src: convert.name().to_string(),
                sink: filter.name().to_string(),
                reason: e.to_string(),
            })?;

        unlink_pads(&self.upstream, downstream_sink)
    }

    // Removing from the bin unlinks every pad of the element
    fn discard(&self, elements: &FilterElements) {
        let _ = self
            .pipeline
            .remove_many(&[&elements.filter, &elements.convert]);
        let _ = elements.filter.set_state(gstreamer::State::Null);
        let _ = elements.convert.set_state(gstreamer::State::Null);
    }

    fn remove(&self, inserted: &mut Option<FilterElements>) -> Result<()> {
        let downstream_sink = static_pad(&self.downstream, "sink")?;

        if let Some(elements) = inserted.as_ref() {
            self.pipeline
                .remove_many(&[&elements.filter, &elements.convert])?;
        }

        // out of the graph now, whatever happens next
        if let Some(FilterElements { convert, filter }) = inserted.take() {
            filter.set_state(gstreamer::State::Null)?;
            convert.set_state(gstreamer::State::Null)?;
        }

        link_pads(&self.upstream, &downstream_sink)
    }
}

// filesrc ! decodebin, videoconvert ! videoscale ! navseek ! queue ! autovideosink
pub struct DynamicFilter {
    pipeline: Pipeline,
    decodebin: Element,
    pad_added: Option<glib::SignalHandlerId>,
    context: glib::MainContext,
}

impl DynamicFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        config.validate()?;
        init()?;

        let pipeline = Pipeline::new(None);
        let src = make_element("filesrc")?;
        let dbin = make_element("decodebin")?;
        let conv = make_element(&config.converter)?;
        let scale = make_element(&config.scaler)?;
        let navseek = make_element(&config.seeker)?;
        let queue = make_element("queue")?;
        let sink = make_element(&config.sink)?;

        src.set_property("location", config.location.as_str())?;

        pipeline.add_many(&[&src, &dbin, &conv, &scale, &navseek, &queue, &sink])?;
        Element::link_many(&[&src, &dbin])
            .and_then(|_| Element::link_many(&[&conv, &scale, &navseek, &queue, &sink]))
            .map_err(|e| DynamicPipelineError::LinkError {
                src: src.name().to_string(),
                sink: sink.name().to_string(),
                reason: e.to_string(),
            })?;

        let context = glib::MainContext::new();
        let interval = config.interval;
        let filter = config.filter.clone();
        let converter = config.converter.clone();
        let pipeline_weak = pipeline.downgrade();
        let context_clone = context.clone();
        let conv_clone = conv.clone();

        let pad_added = link_first_video_pad(&dbin, static_pad(&conv, "sink")?, move |pad| {
            let pipeline = match pipeline_weak.upgrade() {
                Some(pipeline) => pipeline,
                None => return,
            };

            let switcher = FilterSwitcher::new(&pipeline, pad, &conv_clone, &converter, &filter);
            schedule_every(&context_clone, interval, move || {
                switcher.schedule_toggle();
                glib::Continue(true)
            });
        });

        Ok(DynamicFilter {
            pipeline,
            decodebin: dbin,
            pad_added: Some(pad_added),
            context,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn run(mut self) -> Result<()> {
        let result = bus::run(&self.pipeline, &self.context);

        if let Some(pad_added) = self.pad_added.take() {
            self.decodebin.disconnect(pad_added);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    fn upstream_peer_factory(switcher: &FilterSwitcher) -> Option<String> {
        switcher
            .inner
            .upstream
            .peer()
            .and_then(|peer| peer.parent_element())
            .and_then(|element| element.factory())
            .map(|factory| factory.name().to_string())
    }

    fn wait_for(switcher: &FilterSwitcher, inserted: bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if switcher.is_filter_inserted() == inserted {
                return true;
            }
            sleep(Duration::from_millis(10));
        }

        false
    }

    fn idle_pipeline() -> (Pipeline, Pad, Element) {
        init().unwrap();

        let pipeline = Pipeline::new(None);
        let src = make_element("fakesrc").unwrap();
        let sink = make_element("fakesink").unwrap();
        pipeline.add_many(&[&src, &sink]).unwrap();
        src.link(&sink).unwrap();

        (pipeline, static_pad(&src, "src").unwrap(), sink)
    }

    #[test]
    fn it_toggles_the_filter_on_an_idle_pad() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "identity");

        // an idle pad runs the callback right away
        switcher.schedule_toggle();
        assert!(switcher.is_filter_inserted());
        assert_eq!(pipeline.children().len(), 4);
        assert_eq!(upstream_peer_factory(&switcher).as_deref(), Some("identity"));

        switcher.schedule_toggle();
        assert!(!switcher.is_filter_inserted());
        assert_eq!(pipeline.children().len(), 2);
        assert_eq!(upstream_peer_factory(&switcher).as_deref(), Some("fakesink"));
    }

    #[test]
    fn it_toggles_the_filter_directly() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "identity");

        assert_eq!(switcher.toggle().unwrap(), FilterState::Inserted);
        assert_eq!(switcher.toggle().unwrap(), FilterState::Removed);
        assert_eq!(switcher.toggle().unwrap(), FilterState::Inserted);
        assert_eq!(pipeline.children().len(), 4);
    }

    #[test]
    fn it_keeps_the_graph_when_the_filter_is_unknown() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher =
            FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "no-such-filter");

        assert!(matches!(
            switcher.toggle(),
            Err(DynamicPipelineError::CreateElementError(_))
        ));
        assert!(!switcher.is_filter_inserted());
        assert_eq!(upstream_peer_factory(&switcher).as_deref(), Some("fakesink"));
    }

    #[test]
    fn it_keeps_the_graph_when_the_filter_has_no_src_pad() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "fakesink");

        for _ in 0..2 {
            assert!(matches!(
                switcher.toggle(),
                Err(DynamicPipelineError::MissingPadError { .. })
            ));
            assert!(!switcher.is_filter_inserted());
            assert_eq!(pipeline.children().len(), 2);
            assert_eq!(upstream_peer_factory(&switcher).as_deref(), Some("fakesink"));
        }
    }

    #[test]
    fn it_drops_the_new_elements_when_relinking_fails() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        upstream
            .unlink(&static_pad(&sink, "sink").unwrap())
            .unwrap();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "identity");

        // upstream doesn't feed downstream, so there is nothing to cut
        assert!(switcher.toggle().is_err());
        assert!(!switcher.is_filter_inserted());
        assert_eq!(pipeline.children().len(), 2);
        assert!(!upstream.is_linked());
    }

    #[test]
    fn it_stays_inserted_when_removal_fails() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "identity");
        assert_eq!(switcher.toggle().unwrap(), FilterState::Inserted);

        // take the filter out behind the switcher's back
        let filter = static_pad(&sink, "sink")
            .unwrap()
            .peer()
            .and_then(|peer| peer.parent_element())
            .unwrap();
        pipeline.remove(&filter).unwrap();

        assert!(switcher.toggle().is_err());
        assert!(switcher.is_filter_inserted());
        assert_eq!(pipeline.children().len(), 3);
    }

    #[test]
    fn it_toggles_the_filter_while_playing() {
        let _ = env_logger::try_init();

        let (pipeline, upstream, sink) = idle_pipeline();
        let switcher = FilterSwitcher::new(&pipeline, &upstream, &sink, "identity", "identity");

        pipeline.set_state(gstreamer::State::Playing).unwrap();

        switcher.schedule_toggle();
        assert!(wait_for(&switcher, true));

        switcher.schedule_toggle();
        assert!(wait_for(&switcher, false));

        pipeline.set_state(gstreamer::State::Null).unwrap();
        assert_eq!(upstream_peer_factory(&switcher).as_deref(), Some("fakesink"));
    }

    #[test]
    fn it_fails_to_build_with_an_unknown_sink() {
        let _ = env_logger::try_init();

        let config = FilterConfig {
            location: "/dev/null".into(),
            sink: "no-such-sink".into(),
            ..FilterConfig::default()
        };

        assert!(matches!(
            DynamicFilter::new(&config),
            Err(DynamicPipelineError::CreateElementError(_))
        ));
    }
}
