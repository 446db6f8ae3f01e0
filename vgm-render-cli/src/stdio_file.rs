use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use vgm_render_core::{StreamError, StreamFile};

/// `StreamFile` over a local file.
///
/// Positional reads go through one OS handle guarded by a mutex, so channels
/// sharing the handle never observe each other's seeks. `reopen` opens a new
/// handle with its own cursor.
pub struct StdioStreamFile {
    path: PathBuf,
    name: String,
    size: u64,
    file: Mutex<File>,
}

impl StdioStreamFile {
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let file = File::open(path)
            .map_err(|e| StreamError::Io(format!("file {} not found: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .map_err(|e| StreamError::Io(format!("{}: {}", path.display(), e)))?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            name: path.to_string_lossy().into_owned(),
            size,
            file: Mutex::new(file),
        })
    }

    pub fn shared(self) -> Arc<dyn StreamFile> {
        Arc::new(self)
    }
}

impl StreamFile for StdioStreamFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StreamError> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StreamError::Io(format!("{}: seek to 0x{:x} failed: {}", self.name, offset, e)))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StreamError::Io(format!(
                        "{}: read at 0x{:x} failed: {}",
                        self.name, offset, e
                    )))
                }
            }
        }
        Ok(filled)
    }

    fn reopen(&self) -> Result<Arc<dyn StreamFile>, StreamError> {
        log::debug!("reopening {}", self.name);
        Ok(Self::open(&self.path)?.shared())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vgm_render_stdio_{}", name));
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn positional_reads() {
        let path = temp_file("reads.bin", &[1, 2, 3, 4, 5, 6]);
        let file = StdioStreamFile::open(&path).unwrap();

        assert_eq!(file.size(), 6);
        assert_eq!(file.read_u16_le(4).unwrap(), 0x0605);
        assert_eq!(file.read_u16_be(0).unwrap(), 0x0102);

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(file.read_at(10, &mut buf).unwrap(), 0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reopened_handle_reads_same_data() {
        let path = temp_file("reopen.SPM", b"SPM\0");
        let file = StdioStreamFile::open(&path).unwrap().shared();
        let again = file.reopen().unwrap();

        assert_eq!(again.read_u32_be(0).unwrap(), 0x5350_4D00);
        assert_eq!(again.extension().as_deref(), Some("spm"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = StdioStreamFile::open(Path::new("/nonexistent/vgm-render/none.spm"));
        assert!(matches!(result, Err(StreamError::Io(_))));
    }
}
