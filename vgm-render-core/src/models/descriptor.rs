use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::codec::CodingKind;
use crate::models::error::StreamError;
use crate::traits::stream_file::StreamFile;

/// How channel data is arranged in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Flat,
    Interleaved,
    Segmented,
    Layered,
}

impl LayoutKind {
    pub fn description(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Interleaved => "interleave",
            Self::Segmented => "segmented",
            Self::Layered => "layered",
        }
    }
}

/// Channel data arrangement together with the data each arrangement needs.
#[derive(Debug, Clone)]
pub enum Layout {
    /// Each channel is one contiguous run starting at its channel offset.
    Flat,
    /// Channels alternate in blocks of `block_size` bytes. The final block may
    /// be shorter, in which case each channel holds `last_block_size` bytes of it.
    Interleaved {
        block_size: usize,
        last_block_size: Option<usize>,
    },
    /// Sub-streams played back to back, each with its own codec state.
    Segmented(Vec<StreamDescriptor>),
    /// Sub-streams played at once, their channels concatenated in order.
    Layered(Vec<StreamDescriptor>),
}

impl Layout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::Flat => LayoutKind::Flat,
            Self::Interleaved { .. } => LayoutKind::Interleaved,
            Self::Segmented(_) => LayoutKind::Segmented,
            Self::Layered(_) => LayoutKind::Layered,
        }
    }
}

/// Where one channel's data lives.
#[derive(Clone)]
pub struct ChannelSource {
    /// Cloning the `Arc` across channels shares one handle.
    pub file: Arc<dyn StreamFile>,
    pub start_offset: u64,
}

impl ChannelSource {
    pub fn new(file: Arc<dyn StreamFile>, start_offset: u64) -> Self {
        Self { file, start_offset }
    }
}

impl fmt::Debug for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSource")
            .field("file", &self.file.name())
            .field("start_offset", &format_args!("0x{:x}", self.start_offset))
            .finish()
    }
}

/// Loop region in samples, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopPoints {
    pub start: usize,
    pub end: usize,
}

/// Everything a recognizer learned about one stream.
///
/// Produced by a `FormatRecognizer`, immutable afterwards. Segmented and
/// layered streams keep their channel tables in their children; `channels`
/// is empty for them.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub channel_count: usize,
    pub sample_rate: u32,
    pub num_samples: usize,
    pub coding: CodingKind,
    pub layout: Layout,
    pub loop_points: Option<LoopPoints>,
    /// 0 when the container holds a single stream.
    pub subsong_index: usize,
    pub subsong_count: usize,
    pub stream_name: Option<String>,
    /// Label of the recognizer that produced this descriptor.
    pub format_name: &'static str,
    pub channels: Vec<ChannelSource>,
}

impl StreamDescriptor {
    pub fn loop_flag(&self) -> bool {
        self.loop_points.is_some()
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.layout.kind()
    }

    pub fn interleave_block_size(&self) -> Option<usize> {
        match self.layout {
            Layout::Interleaved { block_size, .. } => Some(block_size),
            _ => None,
        }
    }

    pub fn interleave_last_block_size(&self) -> Option<usize> {
        match self.layout {
            Layout::Interleaved { last_block_size, .. } => last_block_size,
            _ => None,
        }
    }

    /// Check the cross-field rules every descriptor must satisfy.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.channel_count == 0 {
            return Err(invalid("channel count must be at least 1"));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample rate must be positive"));
        }
        if self.subsong_count == 0 {
            return Err(invalid("subsong count must be at least 1"));
        }
        if self.subsong_index > self.subsong_count {
            return Err(invalid(format!(
                "subsong index {} exceeds subsong count {}",
                self.subsong_index, self.subsong_count
            )));
        }
        if let Some(lp) = self.loop_points {
            if lp.start > lp.end || lp.end > self.num_samples {
                return Err(invalid(format!(
                    "loop [{}, {}) outside stream of {} samples",
                    lp.start, lp.end, self.num_samples
                )));
            }
        }

        match &self.layout {
            Layout::Flat => self.validate_channel_table(),
            Layout::Interleaved {
                block_size,
                last_block_size,
            } => {
                self.validate_channel_table()?;
                let frame_size = self.coding.frame_size();
                for size in std::iter::once(*block_size).chain(*last_block_size) {
                    if size == 0 || size % frame_size != 0 {
                        return Err(invalid(format!(
                            "interleave of 0x{:x} bytes is not a whole number of {}-byte frames",
                            size, frame_size
                        )));
                    }
                }
                Ok(())
            }
            Layout::Segmented(segments) => self.validate_segments(segments),
            Layout::Layered(layers) => self.validate_layers(layers),
        }
    }

    fn validate_channel_table(&self) -> Result<(), StreamError> {
        if self.channels.len() != self.channel_count {
            return Err(invalid(format!(
                "{} channel sources for {} channels",
                self.channels.len(),
                self.channel_count
            )));
        }
        Ok(())
    }

    fn validate_segments(&self, segments: &[StreamDescriptor]) -> Result<(), StreamError> {
        if segments.is_empty() {
            return Err(invalid("segmented layout without segments"));
        }
        let mut total = 0usize;
        for (i, segment) in segments.iter().enumerate() {
            segment.validate()?;
            if segment.channel_count != self.channel_count || segment.sample_rate != self.sample_rate {
                return Err(invalid(format!(
                    "segment {} is {} ch at {} Hz, stream is {} ch at {} Hz",
                    i, segment.channel_count, segment.sample_rate, self.channel_count, self.sample_rate
                )));
            }
            total += segment.num_samples;
        }
        if total != self.num_samples {
            return Err(invalid(format!(
                "segments hold {} samples, stream declares {}",
                total, self.num_samples
            )));
        }
        Ok(())
    }

    fn validate_layers(&self, layers: &[StreamDescriptor]) -> Result<(), StreamError> {
        if layers.is_empty() {
            return Err(invalid("layered layout without layers"));
        }
        let mut channels = 0usize;
        for (i, layer) in layers.iter().enumerate() {
            layer.validate()?;
            if layer.sample_rate != self.sample_rate {
                return Err(invalid(format!(
                    "layer {} runs at {} Hz, stream at {} Hz",
                    i, layer.sample_rate, self.sample_rate
                )));
            }
            if layer.num_samples < self.num_samples {
                return Err(invalid(format!(
                    "layer {} holds {} samples, stream needs {}",
                    i, layer.num_samples, self.num_samples
                )));
            }
            channels += layer.channel_count;
        }
        if channels != self.channel_count {
            return Err(invalid(format!(
                "layers provide {} channels, stream declares {}",
                channels, self.channel_count
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> StreamError {
    StreamError::InvalidDescriptor(message.into())
}
