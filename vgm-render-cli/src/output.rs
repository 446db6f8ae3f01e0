use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use vgm_render_core::processing::wav_format::{self, WavSpec};
use vgm_render_core::storage::wav_writer::hex_encode;
use vgm_render_core::{WavFileWriter, WavSummary};

/// Replace characters that are invalid in file names. With `clean_paths`,
/// path separators are replaced too.
pub fn clean_filename(name: &str, clean_paths: bool) -> String {
    name.chars()
        .map(|c| match c {
            '*' | '?' | ':' | '<' | '>' | '|' | '"' => '_',
            '\\' | '/' if clean_paths => '_',
            c => c,
        })
        .collect()
}

/// Expand an output name template.
///
/// - `?s` subsong number
/// - `?0Ns` subsong zero-padded to N digits
/// - `?n` stream name, or the input file name when the stream has none
/// - `?f` input file name
///
/// Without a template the output is `<infile>.wav`.
pub fn resolve_output_name(
    template: Option<&str>,
    infile: &Path,
    subsong: usize,
    stream_name: Option<&str>,
) -> PathBuf {
    let Some(template) = template else {
        let mut name = infile.as_os_str().to_owned();
        name.push(".wav");
        return PathBuf::from(name);
    };

    let infile_name = infile
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stream_name = stream_name
        .map(|n| clean_filename(n, true))
        .unwrap_or_else(|| infile_name.clone());

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '?' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('s') => {
                chars.next();
                out.push_str(&subsong.to_string());
            }
            Some('n') => {
                chars.next();
                out.push_str(&stream_name);
            }
            Some('f') => {
                chars.next();
                out.push_str(&infile_name);
            }
            Some('0') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                match (lookahead.next(), lookahead.next()) {
                    (Some(d), Some('s')) if d.is_ascii_digit() => {
                        let width = d.to_digit(10).unwrap_or(0) as usize;
                        out.push_str(&format!("{:0width$}", subsong, width = width));
                        chars = lookahead;
                    }
                    _ => out.push(c),
                }
            }
            _ => out.push(c),
        }
    }
    PathBuf::from(out)
}

/// `<out>.reset.wav` beside the main output.
pub fn reset_output_name(outfile: &Path) -> PathBuf {
    let mut name = outfile.as_os_str().to_owned();
    name.push(".reset.wav");
    PathBuf::from(name)
}

/// Whether a write reached the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// The reader went away; stop decoding.
    Closed,
}

/// Destination for rendered PCM.
pub enum PcmSink {
    Wav(WavFileWriter),
    Stdout {
        out: BufWriter<Stdout>,
        byte_buf: Vec<u8>,
        hasher: Sha256,
    },
    /// Decode without writing; only the digest is kept.
    Discard { byte_buf: Vec<u8>, hasher: Sha256 },
}

impl PcmSink {
    pub fn wav(path: PathBuf, spec: WavSpec) -> anyhow::Result<Self> {
        let mut writer = WavFileWriter::new(path, spec);
        writer.open()?;
        Ok(PcmSink::Wav(writer))
    }

    /// Stdout sink. With `data_bytes` a header carrying that length is
    /// written first; forever mode passes `None` and writes raw PCM.
    pub fn stdout(spec: &WavSpec, data_bytes: Option<u64>) -> anyhow::Result<Self> {
        let mut out = BufWriter::new(io::stdout());
        if let Some(bytes) = data_bytes {
            let size = u32::try_from(bytes).unwrap_or(u32::MAX);
            let header = wav_format::generate_wav_header(spec, size);
            if let Err(e) = out.write_all(&header) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        Ok(PcmSink::Stdout {
            out,
            byte_buf: Vec::new(),
            hasher: Sha256::new(),
        })
    }

    pub fn discard() -> Self {
        PcmSink::Discard {
            byte_buf: Vec::new(),
            hasher: Sha256::new(),
        }
    }

    pub fn write(&mut self, samples: &[i16]) -> anyhow::Result<WriteStatus> {
        match self {
            PcmSink::Wav(writer) => {
                writer.write_samples(samples)?;
                Ok(WriteStatus::Written)
            }
            PcmSink::Stdout {
                out,
                byte_buf,
                hasher,
            } => {
                wav_format::samples_to_le_bytes(samples, byte_buf);
                match out.write_all(byte_buf) {
                    Ok(()) => {
                        hasher.update(&byte_buf[..]);
                        Ok(WriteStatus::Written)
                    }
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        log::debug!("stdout closed by reader");
                        Ok(WriteStatus::Closed)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            PcmSink::Discard { byte_buf, hasher } => {
                wav_format::samples_to_le_bytes(samples, byte_buf);
                hasher.update(&byte_buf[..]);
                Ok(WriteStatus::Written)
            }
        }
    }

    /// Flush and close. Returns the PCM digest, plus the file summary for WAV
    /// output.
    pub fn finish(self) -> anyhow::Result<(String, Option<WavSummary>)> {
        match self {
            PcmSink::Wav(mut writer) => {
                let summary = writer.close()?;
                Ok((summary.pcm_sha256.clone(), Some(summary)))
            }
            PcmSink::Stdout { mut out, hasher, .. } => {
                if let Err(e) = out.flush() {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        return Err(e.into());
                    }
                }
                Ok((hex_encode(&hasher.finalize()), None))
            }
            PcmSink::Discard { hasher, .. } => Ok((hex_encode(&hasher.finalize()), None)),
        }
    }
}
