use crate::error::{DynamicPipelineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub location: String,
    pub interval: u32,
    pub converter: String,
    pub filter: String,
    pub scaler: String,
    pub seeker: String,
    pub sink: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            location: String::new(),
            interval: 5,
            converter: "videoconvert".into(),
            filter: "agingtv".into(),
            scaler: "videoscale".into(),
            seeker: "navseek".into(),
            sink: "autovideosink".into(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.interval)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeeConfig {
    pub location: String,
    // each tick adds or removes one branch
    pub interval: u32,
    pub converter: String,
    pub sink: String,
    // stays attached for the whole run
    pub monitor_sink: String,
}

impl Default for TeeConfig {
    fn default() -> Self {
        TeeConfig {
            location: String::new(),
            interval: 3,
            converter: "videoconvert".into(),
            sink: "autovideosink".into(),
            monitor_sink: "fakesink".into(),
        }
    }
}

impl TeeConfig {
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.interval)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub launch: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            launch: "audiotestsrc num-buffers=100 ! autoaudiosink".into(),
        }
    }
}

fn validate_interval(interval: u32) -> Result<()> {
    if interval == 0 {
        return Err(DynamicPipelineError::UsageError(
            "interval must be at least one second".into(),
        ));
    }

    Ok(())
}
