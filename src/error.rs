use glib::{BoolError, Error as GlibError};
use gstreamer::StateChangeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DynamicPipelineError>;

#[derive(Error, Debug)]
pub enum DynamicPipelineError {
    #[error("Usage: {0}")]
    UsageError(String),

    // `--help` or `--version` output, not a failure
    #[error("{0}")]
    InfoRequested(String),

    #[error("Could not create element: {0}")]
    CreateElementError(String),

    #[error("Failed to create a pipeline")]
    CreatePipelineError,

    #[error("Element {element} has no pad named {pad}")]
    MissingPadError { element: String, pad: String },

    #[error("Failed to link {src} with {sink}: {reason}")]
    LinkError {
        src: String,
        sink: String,
        reason: String,
    },

    #[error("Error in glib: {0}")]
    GlibError(String),

    #[error("Failed to initialize GStreamer: {0}")]
    InitError(String),

    #[error("Failed to parse the launch: {0}")]
    ParseLaunchError(String),

    #[error("Failed to change state: {0}")]
    StateChangeError(String),

    #[error("Received error from {src}: {error} (debug: {debug:?})")]
    BusError {
        src: String,
        error: String,
        debug: Option<String>,
    },
}

impl DynamicPipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DynamicPipelineError::InfoRequested(_) => 0,
            DynamicPipelineError::UsageError(_) => -1,
            DynamicPipelineError::CreateElementError(_)
            | DynamicPipelineError::CreatePipelineError => -2,
            DynamicPipelineError::MissingPadError { .. }
            | DynamicPipelineError::LinkError { .. } => -3,
            DynamicPipelineError::StateChangeError(_) => -4,
            _ => -5,
        }
    }
}

impl From<GlibError> for DynamicPipelineError {
    fn from(error: GlibError) -> Self {
        DynamicPipelineError::GlibError(error.to_string())
    }
}

impl From<BoolError> for DynamicPipelineError {
    fn from(error: BoolError) -> Self {
        DynamicPipelineError::GlibError(error.to_string())
    }
}

impl From<StateChangeError> for DynamicPipelineError {
    fn from(error: StateChangeError) -> Self {
        DynamicPipelineError::StateChangeError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_errors_to_exit_codes() {
        assert_eq!(DynamicPipelineError::InfoRequested("x".into()).exit_code(), 0);
        assert_eq!(DynamicPipelineError::UsageError("x".into()).exit_code(), -1);
        assert_eq!(
            DynamicPipelineError::CreateElementError("agingtv".into()).exit_code(),
            -2
        );
        assert_eq!(DynamicPipelineError::CreatePipelineError.exit_code(), -2);
        assert_eq!(
            DynamicPipelineError::LinkError {
                src: "a".into(),
                sink: "b".into(),
                reason: "nope".into(),
            }
            .exit_code(),
            -3
        );
        assert_eq!(
            DynamicPipelineError::StateChangeError("x".into()).exit_code(),
            -4
        );
        assert_eq!(
            DynamicPipelineError::BusError {
                src: "/pipeline0/filesrc0".into(),
                error: "not found".into(),
                debug: None,
            }
            .exit_code(),
            -5
        );
    }

    #[test]
    fn it_names_both_sides_of_a_failed_link() {
        let error = DynamicPipelineError::LinkError {
            src: "decodebin0:src_0".into(),
            sink: "videoconvert0:sink".into(),
            reason: "Noformat".into(),
        };

        assert_eq!(
            error.to_string(),
            "Failed to link decodebin0:src_0 with videoconvert0:sink: Noformat"
        );
    }
}
