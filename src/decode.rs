use crate::link_pads;
use gstreamer::prelude::*;
use gstreamer::{element_error, Caps, Element, Pad};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const RAW_VIDEO: &str = "video/x-raw";

pub fn is_raw_video(caps: &Caps) -> bool {
    caps.structure(0)
        .map(|s| s.name() == RAW_VIDEO)
        .unwrap_or(false)
}

// `on_linked` runs once, from the streaming thread, after the link succeeded
pub fn link_first_video_pad<F>(decodebin: &Element, target: Pad, on_linked: F) -> glib::SignalHandlerId
where
    F: Fn(&Pad) + Send + Sync + 'static,
{
    let linked = Arc::new(AtomicBool::new(false));

    decodebin.connect_pad_added(move |dbin, pad| {
        if linked.load(Ordering::SeqCst) {
            return;
        }

        let is_video = match pad.current_caps() {
            Some(caps) => is_raw_video(&caps),
            None => {
                log::debug!("ignoring pad {} without caps", pad.name());
                false
            }
        };
        if !is_video {
            return;
        }

        // two video pads racing for the same target, only one may win
        if linked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        match link_pads(pad, &target) {
            Ok(()) => {
                log::info!("linked {} with {}", pad.name(), target.path_string());
                on_linked(pad);
            }
            Err(err) => {
                log::error!("{}", err);
                element_error!(
                    dbin,
                    gstreamer::CoreError::Negotiation,
                    ("Failed to link dbin with conv"),
                    ["{}", err]
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{init, make_element, static_pad};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn it_detects_raw_video_caps() {
        init().unwrap();

        assert!(is_raw_video(&Caps::new_simple("video/x-raw", &[])));
        assert!(!is_raw_video(&Caps::new_simple("audio/x-raw", &[])));
        assert!(!is_raw_video(&Caps::new_simple("video/x-h264", &[])));
        assert!(!is_raw_video(&Caps::new_empty()));
    }

    fn pad_with_caps(name: &str, media_type: &str) -> Pad {
        let pad = Pad::new(Some(name), gstreamer::PadDirection::Src);
        pad.set_active(true).unwrap();
        pad.store_sticky_event(&gstreamer::event::StreamStart::new(name))
            .unwrap();
        pad.store_sticky_event(&gstreamer::event::Caps::new(&Caps::new_simple(
            media_type,
            &[],
        )))
        .unwrap();

        pad
    }

    #[test]
    fn it_links_only_the_first_video_pad() {
        let _ = env_logger::try_init();
        init().unwrap();

        let dbin = make_element("identity").unwrap();
        let sink = make_element("fakesink").unwrap();
        let target = static_pad(&sink, "sink").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        link_first_video_pad(&dbin, target.clone(), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let audio = pad_with_caps("src_0", "audio/x-raw");
        dbin.add_pad(&audio).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!target.is_linked());

        let first = pad_with_caps("src_1", "video/x-raw");
        dbin.add_pad(&first).unwrap();
        let second = pad_with_caps("src_2", "video/x-raw");
        dbin.add_pad(&second).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(target.peer(), Some(first));
        assert!(!second.is_linked());
        assert!(!audio.is_linked());
    }

    #[test]
    fn it_ignores_pads_without_caps() {
        let _ = env_logger::try_init();
        init().unwrap();

        let dbin = make_element("identity").unwrap();
        let sink = make_element("fakesink").unwrap();
        let target = static_pad(&sink, "sink").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        link_first_video_pad(&dbin, target.clone(), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let pad = Pad::new(Some("src_0"), gstreamer::PadDirection::Src);
        pad.set_active(true).unwrap();
        dbin.add_pad(&pad).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!target.is_linked());
    }
}
