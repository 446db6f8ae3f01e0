use std::sync::Arc;

use crate::models::error::StreamError;
use crate::traits::stream_file::StreamFile;

/// `StreamFile` over an in-memory buffer.
///
/// Clones and reopened handles share the same bytes.
#[derive(Debug, Clone)]
pub struct MemoryStreamFile {
    name: String,
    data: Arc<[u8]>,
}

impl MemoryStreamFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            name: name.into(),
            data: Arc::from(data),
        }
    }

    /// Wrap into the shared handle type used by descriptors and recognizers.
    pub fn shared(self) -> Arc<dyn StreamFile> {
        Arc::new(self)
    }
}

impl StreamFile for MemoryStreamFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StreamError> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn reopen(&self) -> Result<Arc<dyn StreamFile>, StreamError> {
        Ok(Arc::new(self.clone()))
    }
}
