use std::sync::Arc;

use crate::models::descriptor::StreamDescriptor;
use crate::models::error::StreamError;
use crate::traits::stream_file::StreamFile;

/// A container format the registry can identify.
///
/// Implemented by:
/// - `SpmRecognizer` (Lethal Skies Elite Pilot `.spm`)
/// - `VagRecognizer` (Sony `.vag`)
pub trait FormatRecognizer: Send + Sync {
    /// Label reported as the metadata source of recognized streams.
    fn name(&self) -> &'static str;

    /// Lowercase file extensions, without dot, this format accepts.
    fn extensions(&self) -> &'static [&'static str];

    /// Try to describe subsong `subsong` (1-based, 0 = default) of `file`.
    ///
    /// `Ok(None)` means "not this format": wrong extension, magic, or an
    /// implausible header. Errors are reserved for I/O failures while reading
    /// a header that already matched.
    fn recognize(
        &self,
        file: &Arc<dyn StreamFile>,
        subsong: usize,
    ) -> Result<Option<StreamDescriptor>, StreamError>;

    fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}
