//! WAV file format utilities.
//!
//! Generates RIFF headers for 16-bit PCM output, optionally carrying a
//! `smpl` chunk with one forward loop so samplers can loop the file.

/// Size of the plain RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 0x2C;

/// Size of the `smpl` chunk including its 8-byte chunk header.
pub const SMPL_CHUNK_SIZE: usize = 0x3C + 0x08;

const BITS_PER_SAMPLE: u16 = 16;

/// Output format of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Inclusive loop start and end sample for the `smpl` chunk.
    pub smpl_loop: Option<(u32, u32)>,
}

impl WavSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            smpl_loop: None,
        }
    }

    pub fn with_smpl_loop(mut self, loop_start: u32, loop_end: u32) -> Self {
        self.smpl_loop = Some((loop_start, loop_end));
        self
    }

    /// Header length: 0x2C, plus the `smpl` chunk when a loop is set.
    pub fn header_size(&self) -> usize {
        match self.smpl_loop {
            Some(_) => WAV_HEADER_SIZE + SMPL_CHUNK_SIZE,
            None => WAV_HEADER_SIZE,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * BITS_PER_SAMPLE / 8
    }

    /// Bytes of PCM data for `frames` sample frames.
    pub fn data_size(&self, frames: usize) -> u64 {
        (frames as u64).saturating_mul(self.block_align() as u64)
    }

    fn data_size_offset(&self) -> usize {
        self.header_size() - 4
    }
}

/// Generate a RIFF header for `data_size` bytes of PCM.
///
/// Layout:
/// ```text
/// [0x00]  "RIFF", header_size - 8 + data_size
/// [0x08]  "WAVE"
/// [0x0C]  "fmt ", 16, PCM, channels, rate, byte rate, block align, 16 bits
/// [0x24]  optional "smpl" chunk (0x3C bytes of body)
/// [....]  "data", data_size
/// ```
pub fn generate_wav_header(spec: &WavSpec, data_size: u32) -> Vec<u8> {
    let header_size = spec.header_size();
    let byte_rate = spec.sample_rate * spec.block_align() as u32;
    let riff_size = (header_size as u32 - 8).wrapping_add(data_size);

    let mut header = vec![0u8; header_size];

    header[0x00..0x04].copy_from_slice(b"RIFF");
    header[0x04..0x08].copy_from_slice(&riff_size.to_le_bytes());
    header[0x08..0x0C].copy_from_slice(b"WAVE");

    header[0x0C..0x10].copy_from_slice(b"fmt ");
    header[0x10..0x14].copy_from_slice(&16u32.to_le_bytes());
    header[0x14..0x16].copy_from_slice(&1u16.to_le_bytes());
    header[0x16..0x18].copy_from_slice(&spec.channels.to_le_bytes());
    header[0x18..0x1C].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[0x1C..0x20].copy_from_slice(&byte_rate.to_le_bytes());
    header[0x20..0x22].copy_from_slice(&spec.block_align().to_le_bytes());
    header[0x22..0x24].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    let mut data_chunk = 0x24;
    if let Some((loop_start, loop_end)) = spec.smpl_loop {
        write_smpl_chunk(&mut header[0x24..0x24 + SMPL_CHUNK_SIZE], loop_start, loop_end);
        data_chunk += SMPL_CHUNK_SIZE;
    }
    header[data_chunk..data_chunk + 4].copy_from_slice(b"data");
    header[data_chunk + 4..data_chunk + 8].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Sampler chunk with a single forward loop; every other field stays zero.
fn write_smpl_chunk(buf: &mut [u8], loop_start: u32, loop_end: u32) {
    buf[0x00..0x04].copy_from_slice(b"smpl");
    buf[0x04..0x08].copy_from_slice(&0x3Cu32.to_le_bytes());
    // number of sample loops
    buf[0x24..0x28].copy_from_slice(&1u32.to_le_bytes());
    buf[0x34..0x38].copy_from_slice(&loop_start.to_le_bytes());
    buf[0x38..0x3C].copy_from_slice(&loop_end.to_le_bytes());
}

/// Patch the RIFF size at offset 4 (file size - 8).
pub fn patch_file_size(header: &mut [u8], total_file_size: u64) {
    let chunk_size = total_file_size.saturating_sub(8) as u32;
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
}

/// Patch the `data` chunk size, wherever the `smpl` chunk put it.
pub fn patch_data_size(header: &mut [u8], spec: &WavSpec, data_size: u64) {
    let offset = spec.data_size_offset();
    header[offset..offset + 4].copy_from_slice(&(data_size as u32).to_le_bytes());
}

/// Serialize samples little-endian regardless of host byte order.
pub fn samples_to_le_bytes(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}
