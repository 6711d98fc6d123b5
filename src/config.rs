//! Engine configuration.

use crate::body::DEFAULT_MAX_MULTIPART_BYTES;

/// Request-handling limits, fixed when the engine is created.
#[derive(Clone, Debug)]
pub struct Config {
    /// Largest `multipart/form-data` body that will be buffered. Larger bodies
    /// fail body parsing with a 500.
    pub max_multipart_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_multipart_bytes: DEFAULT_MAX_MULTIPART_BYTES }
    }
}
