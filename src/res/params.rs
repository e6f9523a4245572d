//! Setup parameters of the resource system.

use std::path::PathBuf;

use crate::errors::*;

/// The order in which `wait` collects pending loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitOrder {
    /// Ascending slot index, with periodic sweeps over every outstanding load.
    Forward,
    /// Descending slot index.
    Reverse,
}

impl Default for WaitOrder {
    fn default() -> Self {
        WaitOrder::Forward
    }
}

/// A structure containing configuration data for the resource system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceParams {
    /// Directory that relative host names are resolved against.
    pub path_prefix: PathBuf,
    /// Slots reserved by `create_manager` when no capacity is given.
    pub initial_slots: usize,
    /// Slots appended every time a full table grows.
    pub grow_increment: usize,
    /// Number of async reads that may be in flight at once.
    pub async_read_slots: usize,
    /// Threads serving async reads.
    pub io_threads: usize,
    pub wait_order: WaitOrder,
    pub background: BackgroundParams,
}

impl Default for ResourceParams {
    fn default() -> Self {
        ResourceParams {
            path_prefix: PathBuf::new(),
            initial_slots: 0,
            grow_increment: 100,
            async_read_slots: 32,
            io_threads: 2,
            wait_order: WaitOrder::Forward,
            background: BackgroundParams::default(),
        }
    }
}

impl ResourceParams {
    /// Parses parameters from a JSON object. Missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let bad = |err: serde_json::Error| {
            Error::InvalidArgument(format!("Bad resource params: {}", err))
        };

        let value: serde_json::Value = serde_json::from_str(json).map_err(bad)?;
        if !value.is_object() {
            return Err(Error::InvalidArgument(
                "Resource params must be a JSON object.".into(),
            ));
        }

        let params: ResourceParams = serde_json::from_value(value).map_err(bad)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grow_increment == 0 {
            return Err(Error::InvalidArgument("grow_increment must be positive.".into()));
        }

        if self.async_read_slots == 0 {
            return Err(Error::InvalidArgument("async_read_slots must be positive.".into()));
        }

        self.background.validate()
    }
}

/// Setup of background (streaming) decompression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParams {
    pub enabled: bool,
    /// Compressed entries with at least this many stored bytes are streamed.
    pub threshold: u64,
    /// Size of each of the two input buffers of a streaming job.
    pub buffer_size: usize,
    pub threads: usize,
    /// Streaming jobs that may be outstanding before loads fall back to
    /// foreground decompression.
    pub queue_limit: usize,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        BackgroundParams {
            enabled: false,
            threshold: 64 * 1024,
            buffer_size: 16 * 1024,
            threads: 2,
            queue_limit: 16,
        }
    }
}

impl BackgroundParams {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && (self.buffer_size == 0 || self.threads == 0) {
            return Err(Error::InvalidArgument(
                "Background decompression needs a buffer and at least one thread.".into(),
            ));
        }

        Ok(())
    }
}
