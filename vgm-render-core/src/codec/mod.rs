//! Decode adapters.
//!
//! Each coding kind maps to one decode function. The kind is fixed per
//! decoder at initialization, so dispatch is a plain `match`.

pub mod ima;
pub mod pcm;
pub mod psx;

use serde::Serialize;

use crate::models::channel::ChannelState;
use crate::models::error::StreamError;
use crate::traits::stream_file::StreamFile;

/// Sample encoding of a stream's channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodingKind {
    Pcm16Le,
    Pcm16Be,
    /// Signed 8-bit PCM.
    Pcm8,
    /// PlayStation 4-bit ADPCM, 16-byte frames of 28 samples.
    PsxAdpcm,
    /// IMA 4-bit ADPCM, one nibble per sample, low nibble first.
    ImaAdpcm,
}

/// Codec history carried between decode calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecState {
    #[default]
    Stateless,
    Psx { hist1: i32, hist2: i32 },
    Ima { hist: i32, step_index: i32 },
}

impl CodingKind {
    /// Bytes per frame of one channel.
    pub fn frame_size(self) -> usize {
        match self {
            Self::Pcm16Le | Self::Pcm16Be => 2,
            Self::Pcm8 | Self::ImaAdpcm => 1,
            Self::PsxAdpcm => psx::FRAME_SIZE,
        }
    }

    pub fn samples_per_frame(self) -> usize {
        match self {
            Self::Pcm16Le | Self::Pcm16Be | Self::Pcm8 => 1,
            Self::ImaAdpcm => 2,
            Self::PsxAdpcm => psx::SAMPLES_PER_FRAME,
        }
    }

    /// Whether any sample can be decoded without the history before it.
    pub fn is_randomly_addressable(self) -> bool {
        matches!(self, Self::Pcm16Le | Self::Pcm16Be | Self::Pcm8)
    }

    pub fn initial_state(self) -> CodecState {
        match self {
            Self::Pcm16Le | Self::Pcm16Be | Self::Pcm8 => CodecState::Stateless,
            Self::PsxAdpcm => CodecState::Psx { hist1: 0, hist2: 0 },
            Self::ImaAdpcm => CodecState::Ima { hist: 0, step_index: 0 },
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Pcm16Le => "Little Endian 16-bit PCM",
            Self::Pcm16Be => "Big Endian 16-bit PCM",
            Self::Pcm8 => "8-bit signed PCM",
            Self::PsxAdpcm => "Playstation 4-bit ADPCM",
            Self::ImaAdpcm => "IMA 4-bit ADPCM",
        }
    }

    /// Whole samples per channel held in `bytes` of data split over `channels`.
    pub fn bytes_to_samples(self, bytes: u64, channels: usize) -> usize {
        if channels == 0 {
            return 0;
        }
        let per_channel = bytes / channels as u64;
        (per_channel / self.frame_size() as u64) as usize * self.samples_per_frame()
    }

    /// Decode `samples_to_do` samples of one channel into `out[i * stride]`.
    ///
    /// `first_sample` is the sample index relative to the channel's current
    /// offset (the block start for interleaved data).
    pub(crate) fn decode(
        self,
        channel: &mut ChannelState,
        out: &mut [i16],
        stride: usize,
        first_sample: usize,
        samples_to_do: usize,
    ) -> Result<(), StreamError> {
        if samples_to_do == 0 {
            return Ok(());
        }
        match self {
            Self::Pcm16Le => pcm::decode_pcm16(channel, out, stride, first_sample, samples_to_do, false),
            Self::Pcm16Be => pcm::decode_pcm16(channel, out, stride, first_sample, samples_to_do, true),
            Self::Pcm8 => pcm::decode_pcm8(channel, out, stride, first_sample, samples_to_do),
            Self::PsxAdpcm => psx::decode_psx(channel, out, stride, first_sample, samples_to_do),
            Self::ImaAdpcm => ima::decode_ima(channel, out, stride, first_sample, samples_to_do),
        }
    }
}

/// Read `len` bytes at `offset` into `scratch`, reporting short reads as decode faults.
pub(crate) fn read_frames<'a>(
    file: &dyn StreamFile,
    scratch: &'a mut Vec<u8>,
    offset: u64,
    len: usize,
) -> Result<&'a [u8], StreamError> {
    if scratch.len() < len {
        scratch.resize(len, 0);
    }
    let buf = &mut scratch[..len];
    file.read_exact_at(offset, buf).map_err(|e| {
        StreamError::decode_fault(format!("truncated data in {} at 0x{:x}: {}", file.name(), offset, e))
    })?;
    Ok(buf)
}

#[inline]
pub(crate) fn clamp16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
