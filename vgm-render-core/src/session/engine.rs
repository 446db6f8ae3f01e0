use std::sync::Arc;

use crate::formats::subsong::resolve_subsong;
use crate::formats::FormatRegistry;
use crate::models::config::PlaybackConfig;
use crate::models::descriptor::{Layout, StreamDescriptor};
use crate::models::error::StreamError;
use crate::models::info::{InterleaveInfo, LoopingInfo, MixingInfo, StreamInfo, SubsongInfo};
use crate::models::state::PlaybackState;
use crate::processing::layout::Decoder;
use crate::processing::loop_policy::PlaybackPolicy;
use crate::processing::mixing::MixingGraph;
use crate::session::cursor::StreamCursor;
use crate::traits::stream_file::StreamFile;

/// One opened stream and everything needed to render it.
///
/// Data flow per `render` call:
/// ```text
/// [Decoder tree] → [StreamCursor] ─ loop jumps ─→ [fade gain] → [MixingGraph] → caller buffer
///        ↑ seek / reset
/// ```
///
/// An engine is owned by a single caller. Independent engines over the same
/// file each hold their own channel offsets and codec state.
pub struct StreamEngine {
    descriptor: StreamDescriptor,
    config: PlaybackConfig,
    policy: PlaybackPolicy,
    graph: MixingGraph,
    cursor: StreamCursor,

    /// Output samples produced since the start, loops unrolled.
    position: usize,
    loop_count: usize,

    mix_scratch: Vec<f32>,
}

impl StreamEngine {
    /// Initialize from a recognized descriptor.
    pub fn new(descriptor: StreamDescriptor, config: PlaybackConfig) -> Result<Self, StreamError> {
        descriptor.validate()?;
        let policy = PlaybackPolicy::resolve(&descriptor, &config)?;
        let graph = MixingGraph::build(
            descriptor.channel_count,
            config.downmix_target_channels,
            config.stereo_pair,
        )?;
        let cursor = StreamCursor::new(
            Decoder::from_descriptor(&descriptor),
            descriptor.channel_count,
            policy.loop_region().map(|lp| lp.start),
        );

        log::info!(
            "{}: {} ({} ch, {} Hz, {} samples, {}, {})",
            descriptor
                .channels
                .first()
                .map_or(descriptor.format_name, |c| c.file.name()),
            descriptor.format_name,
            descriptor.channel_count,
            descriptor.sample_rate,
            descriptor.num_samples,
            descriptor.coding.description(),
            descriptor.layout_kind().description(),
        );
        match policy.effective_total_samples() {
            Some(total) => log::debug!("play length {} samples", total),
            None => log::debug!("playing forever"),
        }

        Ok(Self {
            descriptor,
            config,
            policy,
            graph,
            cursor,
            position: 0,
            loop_count: 0,
            mix_scratch: Vec::new(),
        })
    }

    /// Recognize `file` and initialize subsong `subsong` (1-based, 0 = default).
    pub fn open(
        file: &Arc<dyn StreamFile>,
        subsong: usize,
        registry: &FormatRegistry,
        config: PlaybackConfig,
    ) -> Result<Self, StreamError> {
        let mut descriptor = registry.recognize(file, subsong)?;
        let selected = resolve_subsong(subsong, descriptor.subsong_count);
        if selected != descriptor.subsong_index {
            descriptor = registry.recognize(file, selected)?;
        }
        Self::new(descriptor, config)
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    pub fn mixing(&self) -> &MixingGraph {
        &self.graph
    }

    pub fn input_channels(&self) -> usize {
        self.graph.input_channels()
    }

    pub fn output_channels(&self) -> usize {
        self.graph.output_channels()
    }

    /// Channels per frame the render buffer must hold. Mixing only ever
    /// reduces, so this is the decoded channel count.
    pub fn buffer_channels(&self) -> usize {
        self.descriptor.channel_count
    }

    /// Play position in output samples.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    pub fn plays_forever(&self) -> bool {
        self.policy.plays_forever()
    }

    pub fn effective_total_samples(&self) -> Option<usize> {
        self.policy.effective_total_samples()
    }

    /// Samples left before the end, `None` when playing forever.
    pub fn remaining_samples(&self) -> Option<usize> {
        self.effective_total_samples()
            .map(|total| total.saturating_sub(self.position))
    }

    pub fn state(&self) -> PlaybackState {
        self.policy.state_at(self.position)
    }

    /// Render up to `sample_count` frames into the front of `buf`.
    ///
    /// `buf` must hold `sample_count * buffer_channels()` samples; the count is
    /// clamped to what it holds. On return the first `n * output_channels()`
    /// samples are valid. Returns 0 once the play length is exhausted.
    pub fn render(&mut self, buf: &mut [i16], sample_count: usize) -> Result<usize, StreamError> {
        let channels = self.buffer_channels();
        let mut sample_count = sample_count.min(buf.len() / channels);
        if let Some(remaining) = self.remaining_samples() {
            sample_count = sample_count.min(remaining);
        }

        let mut done = 0;
        let result = self.decode_into(buf, sample_count, &mut done);
        self.finish_block(buf, done);

        match result {
            Ok(()) => Ok(done),
            Err(e) => {
                log::warn!("render stopped after {} samples: {}", done, e);
                Err(e.with_samples_done(done))
            }
        }
    }

    fn decode_into(&mut self, buf: &mut [i16], count: usize, done: &mut usize) -> Result<(), StreamError> {
        let channels = self.buffer_channels();
        let loop_region = self.policy.loop_region();

        while *done < count {
            let stream_position = self.cursor.position();
            let mut to_do = count - *done;

            if let Some(lp) = loop_region {
                if stream_position == lp.end && self.policy.should_jump(self.position + *done) {
                    self.cursor.seek(lp.start)?;
                    self.loop_count += 1;
                    log::debug!(
                        "loop {} at play sample {}",
                        self.loop_count,
                        self.position + *done
                    );
                    continue;
                }
                if stream_position < lp.end {
                    to_do = to_do.min(lp.end - stream_position);
                }
            }

            match self.cursor.decode(&mut buf[*done * channels..], to_do) {
                Ok(0) => break,
                Ok(decoded) => *done += decoded,
                Err(StreamError::DecodeFault {
                    samples_done,
                    reason,
                }) => {
                    *done += samples_done;
                    return Err(StreamError::DecodeFault {
                        samples_done: 0,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fade and mix `frames` freshly decoded frames, then advance the play position.
    fn finish_block(&mut self, buf: &mut [i16], frames: usize) {
        if frames == 0 {
            return;
        }
        let channels = self.buffer_channels();
        self.policy
            .apply_fade(&mut buf[..frames * channels], channels, self.position);
        self.graph.apply_in_place(buf, frames, &mut self.mix_scratch);
        self.position += frames;
    }

    /// Move to play position `target`, clamped to `[0, total]`. Returns the
    /// position actually reached. On failure playback is rewound to the start.
    pub fn seek(&mut self, target: i64) -> Result<usize, StreamError> {
        let mut position = if target < 0 {
            log::warn!("seek to {} before the stream start, using 0", target);
            0
        } else {
            usize::try_from(target).unwrap_or(usize::MAX)
        };
        if let Some(total) = self.effective_total_samples() {
            if position > total {
                log::warn!("seek to {} past the end, using {}", position, total);
                position = total;
            }
        }

        let location = self.policy.locate(position);
        if let Err(e) = self.cursor.seek(location.stream_sample) {
            log::warn!("seek to {} failed, back at the stream start: {}", position, e);
            self.reset();
            return Err(e);
        }
        self.position = position;
        self.loop_count = location.loop_iteration;
        log::debug!(
            "seek to play sample {} (stream sample {}, loop {})",
            position,
            location.stream_sample,
            location.loop_iteration
        );
        Ok(position)
    }

    /// Rewind to the start with fresh codec state, keeping the open handles.
    /// The following renders repeat the first pass exactly.
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.position = 0;
        self.loop_count = 0;
        log::info!("reset to stream start");
    }

    /// Read-only snapshot for reporting.
    pub fn info(&self) -> StreamInfo {
        let d = &self.descriptor;
        let mixing_info = (self.output_channels() != self.input_channels()).then(|| MixingInfo {
            input_channels: self.input_channels(),
            output_channels: self.output_channels(),
        });
        let interleave_info = d.interleave_block_size().map(|first_block| InterleaveInfo {
            first_block,
            last_block: d.interleave_last_block_size(),
        });
        let frame_size = match d.layout {
            Layout::Flat | Layout::Interleaved { .. } => Some(d.coding.frame_size()),
            Layout::Segmented(_) | Layout::Layered(_) => None,
        };

        StreamInfo {
            sample_rate: d.sample_rate,
            channels: d.channel_count,
            mixing_info,
            looping_info: self.policy.loop_region().map(|lp| LoopingInfo {
                start: lp.start,
                end: lp.end,
            }),
            interleave_info,
            number_of_samples: d.num_samples,
            play_samples: self.effective_total_samples(),
            encoding: d.coding.description().to_string(),
            layout: d.layout_kind().description().to_string(),
            frame_size,
            metadata_source: d.format_name.to_string(),
            stream_info: SubsongInfo {
                index: d.subsong_index,
                name: d.stream_name.clone(),
                total: d.subsong_count,
            },
        }
    }
}
