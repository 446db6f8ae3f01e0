use std::sync::Arc;

use crate::models::error::StreamError;

/// Random-access byte source backing one or more channels.
///
/// Reads are positional, so one handle can be shared by several channels that
/// each keep their own offset. Implemented by:
/// - `MemoryStreamFile` (in-memory buffers, tests)
/// - `StdioStreamFile` (local files, in the command-line crate)
pub trait StreamFile: Send + Sync {
    /// Display name, usually the path the file was opened from.
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read, which is 0 at or past the end of the file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Open an independent handle to the same data.
    fn reopen(&self) -> Result<Arc<dyn StreamFile>, StreamError>;

    /// Fill `buf` completely or fail.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), StreamError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(StreamError::Io(format!(
                    "{}: unexpected end of file reading {} bytes at 0x{:x}",
                    self.name(),
                    buf.len(),
                    offset
                )));
            }
            filled += n;
        }
        Ok(())
    }

    fn read_u8(&self, offset: u64) -> Result<u8, StreamError> {
        let mut b = [0u8; 1];
        self.read_exact_at(offset, &mut b)?;
        Ok(b[0])
    }

    fn read_u16_le(&self, offset: u64) -> Result<u16, StreamError> {
        let mut b = [0u8; 2];
        self.read_exact_at(offset, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_u16_be(&self, offset: u64) -> Result<u16, StreamError> {
        let mut b = [0u8; 2];
        self.read_exact_at(offset, &mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn read_u32_le(&self, offset: u64) -> Result<u32, StreamError> {
        let mut b = [0u8; 4];
        self.read_exact_at(offset, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_u32_be(&self, offset: u64) -> Result<u32, StreamError> {
        let mut b = [0u8; 4];
        self.read_exact_at(offset, &mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    /// Lowercase extension of `name()`, without the dot.
    fn extension(&self) -> Option<String> {
        extension_of(self.name())
    }
}

/// Lowercase extension of a path-like name, ignoring directory separators.
pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("music/BGM01.SPM").as_deref(), Some("spm"));
        assert_eq!(extension_of("C:\\games\\voice.Vag").as_deref(), Some("vag"));
    }

    #[test]
    fn extension_ignores_dots_in_directories() {
        assert_eq!(extension_of("dir.v2/readme"), None);
        assert_eq!(extension_of("noext"), None);
    }
}
