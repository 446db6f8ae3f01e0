use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::StreamError;
use crate::processing::wav_format::{self, WavSpec};

/// Outcome of a finished WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavSummary {
    pub file_path: PathBuf,
    pub frames_written: u64,
    /// Whole file, header included.
    pub bytes_written: u64,
    /// Hex SHA-256 of the PCM payload alone, so files with different headers
    /// but identical audio compare equal.
    pub pcm_sha256: String,
}

/// Streaming 16-bit PCM WAV writer.
///
/// ## File Format
///
/// ```text
/// [0x2C-byte header, or 0x70 with a smpl loop chunk]
/// [little-endian interleaved i16 PCM...]
/// ```
///
/// Sizes in the header are placeholders until `close` patches them.
pub struct WavFileWriter {
    file_path: PathBuf,
    spec: WavSpec,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
    hasher: Sha256,
    byte_buf: Vec<u8>,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, spec: WavSpec) -> Self {
        Self {
            file_path,
            spec,
            file: None,
            data_bytes: 0,
            hasher: Sha256::new(),
            byte_buf: Vec::new(),
        }
    }

    /// Create the file and write the header.
    pub fn open(&mut self) -> Result<(), StreamError> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StreamError::Io(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&self.file_path).map_err(|e| {
            StreamError::Io(format!("failed to create {}: {}", self.file_path.display(), e))
        })?;
        let mut file = BufWriter::new(file);

        let header = wav_format::generate_wav_header(&self.spec, 0);
        file.write_all(&header)
            .map_err(|e| StreamError::Io(format!("write failed: {}", e)))?;

        self.file = Some(file);
        self.data_bytes = 0;
        self.hasher = Sha256::new();
        log::debug!("writing {}", self.file_path.display());
        Ok(())
    }

    /// Append interleaved frames of `spec.channels` samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StreamError::Io("file is not open for writing".into()))?;

        wav_format::samples_to_le_bytes(samples, &mut self.byte_buf);
        file.write_all(&self.byte_buf)
            .map_err(|e| StreamError::Io(format!("write failed: {}", e)))?;
        self.hasher.update(&self.byte_buf);
        self.data_bytes += self.byte_buf.len() as u64;
        Ok(())
    }

    /// Patch the header sizes and flush.
    pub fn close(&mut self) -> Result<WavSummary, StreamError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StreamError::Io("file is not open".into()))?;

        let header_size = self.spec.header_size() as u64;
        let total = header_size + self.data_bytes;
        let mut header = wav_format::generate_wav_header(&self.spec, 0);
        wav_format::patch_data_size(&mut header, &self.spec, self.data_bytes);
        wav_format::patch_file_size(&mut header, total);

        file.seek(SeekFrom::Start(0))
            .map_err(|e| StreamError::Io(e.to_string()))?;
        file.write_all(&header)
            .map_err(|e| StreamError::Io(e.to_string()))?;
        file.flush().map_err(|e| StreamError::Io(e.to_string()))?;

        let digest = std::mem::take(&mut self.hasher).finalize();
        let block_align = self.spec.block_align().max(1) as u64;
        Ok(WavSummary {
            file_path: self.file_path.clone(),
            frames_written: self.data_bytes / block_align,
            bytes_written: total,
            pcm_sha256: hex_encode(&digest),
        })
    }

    /// PCM bytes written so far, header excluded.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Lowercase hex SHA-256 of a PCM block, as reported in `WavSummary`.
pub fn pcm_sha256(samples: &[i16]) -> String {
    let mut bytes = Vec::new();
    wav_format::samples_to_le_bytes(samples, &mut bytes);
    hex_encode(&Sha256::digest(&bytes))
}

/// Lowercase hex of a digest.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vgm_render_test_{}", name))
    }

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
    }

    #[test]
    fn write_plain_wav() {
        let path = temp_file_path("plain.wav");
        let mut writer = WavFileWriter::new(path.clone(), WavSpec::new(48000, 2));
        writer.open().unwrap();
        writer.write_samples(&[1, -1, 2, -2]).unwrap();
        writer.write_samples(&[3, -3]).unwrap();
        let summary = writer.close().unwrap();

        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.bytes_written, 44 + 12);
        assert_eq!(summary.pcm_sha256, pcm_sha256(&[1, -1, 2, -2, 3, -3]));

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 56);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(u32_at(&data, 4), 48);
        assert_eq!(u32_at(&data, 40), 12);
        assert_eq!(&data[44..46], &[1, 0]);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn write_wav_with_loop_chunk() {
        let path = temp_file_path("smpl.wav");
        let spec = WavSpec::new(22050, 1).with_smpl_loop(2, 5);
        let mut writer = WavFileWriter::new(path.clone(), spec);
        writer.open().unwrap();
        writer.write_samples(&[0; 8]).unwrap();
        let summary = writer.close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(summary.bytes_written, 0x70 + 16);
        assert_eq!(data.len(), 0x70 + 16);
        assert_eq!(&data[0x24..0x28], b"smpl");
        assert_eq!(u32_at(&data, 0x6C), 16);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = WavFileWriter::new(temp_file_path("closed.wav"), WavSpec::new(8000, 1));
        assert!(matches!(writer.write_samples(&[0]), Err(StreamError::Io(_))));
        assert!(writer.close().is_err());
    }

    #[test]
    fn same_audio_same_digest() {
        assert_eq!(pcm_sha256(&[5, 6, 7]), pcm_sha256(&[5, 6, 7]));
        assert_ne!(pcm_sha256(&[5, 6, 7]), pcm_sha256(&[5, 6, 8]));
        assert_eq!(pcm_sha256(&[]).len(), 64);
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex_encode(&[0x00, 0x0A, 0xFF]), "000aff");
        assert_eq!(hex_encode(&[]), "");
    }
}
