use std::sync::Arc;

use crate::codec::CodingKind;
use crate::models::descriptor::{ChannelSource, Layout, LoopPoints, StreamDescriptor};
use crate::models::error::StreamError;
use crate::traits::recognizer::FormatRecognizer;
use crate::traits::stream_file::StreamFile;

/// "SPM\0"
const SPM_MAGIC: u32 = 0x5350_4D00;
const START_OFFSET: u64 = 0x800;
const CHANNELS: usize = 2;
const SAMPLE_RATE: u32 = 48000;
const INTERLEAVE: usize = 0x02;

/// SPM streams from Lethal Skies Elite Pilot: Team SW (PS2).
///
/// ```text
/// [0x00] "SPM\0"
/// [0x04] u32le  data size in bytes
/// [0x08] u32le  loop start sample
/// [0x0C] u32le  loop end sample
/// [0x800]       stereo PCM16LE, 2-byte interleave
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SpmRecognizer;

impl FormatRecognizer for SpmRecognizer {
    fn name(&self) -> &'static str {
        "Lethal Skies Elite Pilot: Team SW SPM header"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["spm"]
    }

    fn recognize(
        &self,
        file: &Arc<dyn StreamFile>,
        _subsong: usize,
    ) -> Result<Option<StreamDescriptor>, StreamError> {
        match file.extension() {
            Some(ext) if self.accepts_extension(&ext) => {}
            _ => return Ok(None),
        }
        match file.read_u32_be(0x00) {
            Ok(SPM_MAGIC) => {}
            _ => return Ok(None),
        }

        let data_size = file.read_u32_le(0x04)?;
        let num_samples = data_size as usize / 4;
        let loop_points = header_loop(
            file.name(),
            num_samples,
            file.read_u32_le(0x08)? as usize,
            file.read_u32_le(0x0C)? as usize,
        );

        // both channels read through one handle of their own
        let handle = file.reopen()?;
        let channels = (0..CHANNELS)
            .map(|i| ChannelSource::new(Arc::clone(&handle), START_OFFSET + (INTERLEAVE * i) as u64))
            .collect();

        Ok(Some(StreamDescriptor {
            channel_count: CHANNELS,
            sample_rate: SAMPLE_RATE,
            num_samples,
            coding: CodingKind::Pcm16Le,
            layout: Layout::Interleaved {
                block_size: INTERLEAVE,
                last_block_size: None,
            },
            loop_points,
            subsong_index: 0,
            subsong_count: 1,
            stream_name: None,
            format_name: self.name(),
            channels,
        }))
    }
}

/// Loop points as stored, with the end clamped to the stream length. A loop
/// left empty after clamping is dropped.
fn header_loop(name: &str, num_samples: usize, start: usize, end: usize) -> Option<LoopPoints> {
    let mut end = end;
    if end > num_samples {
        log::warn!(
            "{}: loop end {} past stream end {}, clamping",
            name,
            end,
            num_samples
        );
        end = num_samples;
    }
    if start >= end {
        log::warn!("{}: empty loop [{}, {}), playing without loop", name, start, end);
        return None;
    }
    Some(LoopPoints { start, end })
}
