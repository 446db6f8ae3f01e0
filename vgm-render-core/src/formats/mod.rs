pub mod spm;
pub mod subsong;
pub mod vag;

use std::sync::Arc;

use crate::models::descriptor::StreamDescriptor;
use crate::models::error::StreamError;
use crate::traits::recognizer::FormatRecognizer;
use crate::traits::stream_file::{extension_of, StreamFile};

/// Ordered set of recognizers; the first one that accepts a file wins.
pub struct FormatRegistry {
    recognizers: Vec<Box<dyn FormatRecognizer>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    /// Registry with every built-in recognizer, in priority order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(spm::SpmRecognizer));
        registry.register(Box::new(vag::VagRecognizer));
        registry
    }

    /// Append a recognizer at the lowest priority.
    pub fn register(&mut self, recognizer: Box<dyn FormatRecognizer>) {
        self.recognizers.push(recognizer);
    }

    /// Sorted, deduplicated list of accepted extensions.
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .recognizers
            .iter()
            .flat_map(|r| r.extensions().iter().copied())
            .collect();
        extensions.sort_unstable();
        extensions.dedup();
        extensions
    }

    /// Whether some recognizer accepts the extension of `file_name`.
    pub fn is_supported_extension(&self, file_name: &str) -> bool {
        let Some(extension) = extension_of(file_name) else {
            return false;
        };
        self.recognizers.iter().any(|r| r.accepts_extension(&extension))
    }

    /// Describe subsong `subsong` of `file` with the first recognizer that accepts it.
    pub fn recognize(
        &self,
        file: &Arc<dyn StreamFile>,
        subsong: usize,
    ) -> Result<StreamDescriptor, StreamError> {
        for recognizer in &self.recognizers {
            if let Some(descriptor) = recognizer.recognize(file, subsong)? {
                log::debug!("{}: recognized by {}", file.name(), recognizer.name());
                return Ok(descriptor);
            }
        }
        Err(StreamError::UnrecognizedFormat(file.name().to_string()))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
