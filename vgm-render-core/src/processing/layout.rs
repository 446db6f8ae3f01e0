//! Layout resolver.
//!
//! Turns a descriptor into a tree of decoders that know where each channel's
//! next bytes are. Flat and interleaved layouts decode channels directly;
//! segmented and layered layouts delegate to child decoders.

use crate::codec::{CodecState, CodingKind};
use crate::models::channel::ChannelState;
use crate::models::descriptor::{Layout, StreamDescriptor};
use crate::models::error::StreamError;

/// Frames decoded per step when a layer is moved back by decoding.
const REPOSITION_FRAMES: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Interleave {
    block_size: usize,
    last_block_size: Option<usize>,
}

/// Saved decoder position: offsets, codec history and block counters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DecoderSnapshot {
    Block {
        current_sample: usize,
        samples_into_block: usize,
        block_index: usize,
        channels: Vec<(u64, CodecState)>,
    },
    Segmented {
        current: usize,
        current_sample: usize,
        inner: Box<DecoderSnapshot>,
    },
    Layered {
        current_sample: usize,
        layers: Vec<DecoderSnapshot>,
    },
}

/// Decoder for flat and interleaved channel data.
pub(crate) struct BlockDecoder {
    coding: CodingKind,
    interleave: Option<Interleave>,
    num_samples: usize,
    channels: Vec<ChannelState>,
    current_sample: usize,
    samples_into_block: usize,
    block_index: usize,
    /// Codec states at the start of the sub-range being decoded.
    saved_states: Vec<CodecState>,
}

impl BlockDecoder {
    fn new(descriptor: &StreamDescriptor, interleave: Option<Interleave>) -> Self {
        Self {
            coding: descriptor.coding,
            interleave,
            num_samples: descriptor.num_samples,
            channels: descriptor
                .channels
                .iter()
                .map(|source| ChannelState::new(source, descriptor.coding))
                .collect(),
            current_sample: 0,
            samples_into_block: 0,
            block_index: 0,
            saved_states: Vec::new(),
        }
    }

    fn samples_per_block(&self, bytes: usize) -> usize {
        bytes / self.coding.frame_size() * self.coding.samples_per_frame()
    }

    /// Index of the short last block, if the layout has one.
    fn last_block_index(&self) -> Option<usize> {
        let interleave = self.interleave?;
        interleave
            .last_block_size
            .map(|_| self.num_samples / self.samples_per_block(interleave.block_size))
    }

    fn block_samples(&self, block_index: usize) -> usize {
        match self.interleave {
            None => usize::MAX,
            Some(interleave) => match interleave.last_block_size {
                Some(last) if Some(block_index) == self.last_block_index() => self.samples_per_block(last),
                _ => self.samples_per_block(interleave.block_size),
            },
        }
    }

    fn block_offset(&self, channel: usize, block_index: usize) -> u64 {
        let start = self.channels[channel].channel_start_offset;
        let Some(interleave) = self.interleave else {
            return start;
        };
        let stride = (interleave.block_size * self.channels.len()) as u64;
        let base = start + stride * block_index as u64;
        match interleave.last_block_size {
            Some(last) if Some(block_index) == self.last_block_index() => {
                (base + (channel * last) as u64).saturating_sub((channel * interleave.block_size) as u64)
            }
            _ => base,
        }
    }

    fn move_to_block(&mut self, block_index: usize) {
        self.block_index = block_index;
        for c in 0..self.channels.len() {
            let offset = self.block_offset(c, block_index);
            self.channels[c].current_offset = offset;
        }
    }

    fn decode(&mut self, out: &mut [i16], stride: usize, ch_offset: usize, count: usize) -> Result<(), StreamError> {
        let coding = self.coding;
        let mut done = 0;
        while done < count {
            let block_samples = self.block_samples(self.block_index);
            let to_do = (count - done).min(block_samples - self.samples_into_block);

            self.saved_states.clear();
            self.saved_states
                .extend(self.channels.iter().map(|channel| channel.codec_state));
            let into_block = self.samples_into_block;
            let result = self.channels.iter_mut().enumerate().try_for_each(|(c, channel)| {
                let start = done * stride + ch_offset + c;
                coding.decode(channel, &mut out[start..], stride, into_block, to_do)
            });
            if let Err(e) = result {
                // channels decoded before the fault must not keep their new history
                for (channel, state) in self.channels.iter_mut().zip(&self.saved_states) {
                    channel.codec_state = *state;
                }
                return Err(e.after_samples(done));
            }

            done += to_do;
            self.current_sample += to_do;
            self.samples_into_block += to_do;
            if self.interleave.is_some() && self.samples_into_block == block_samples {
                self.samples_into_block = 0;
                self.move_to_block(self.block_index + 1);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        let coding = self.coding;
        for channel in &mut self.channels {
            channel.reset(coding);
        }
        self.current_sample = 0;
        self.samples_into_block = 0;
        self.block_index = 0;
    }

    /// Position by arithmetic alone. Only valid for stateless codecs.
    fn seek_direct(&mut self, sample: usize) {
        self.reset();
        self.current_sample = sample;
        let Some(interleave) = self.interleave else {
            self.samples_into_block = sample;
            return;
        };
        let per_block = self.samples_per_block(interleave.block_size);
        let block_index = match self.last_block_index() {
            Some(last) if sample >= last * per_block => last,
            _ => sample / per_block,
        };
        self.samples_into_block = sample - block_index * per_block;
        self.move_to_block(block_index);
    }

    fn snapshot(&self) -> DecoderSnapshot {
        DecoderSnapshot::Block {
            current_sample: self.current_sample,
            samples_into_block: self.samples_into_block,
            block_index: self.block_index,
            channels: self
                .channels
                .iter()
                .map(|ch| (ch.current_offset, ch.codec_state))
                .collect(),
        }
    }

    fn restore(&mut self, snapshot: &DecoderSnapshot) {
        if let DecoderSnapshot::Block {
            current_sample,
            samples_into_block,
            block_index,
            channels,
        } = snapshot
        {
            self.current_sample = *current_sample;
            self.samples_into_block = *samples_into_block;
            self.block_index = *block_index;
            for (channel, (offset, state)) in self.channels.iter_mut().zip(channels) {
                channel.current_offset = *offset;
                channel.codec_state = *state;
            }
        }
    }
}

/// Sub-streams played in sequence.
pub(crate) struct SegmentedDecoder {
    segments: Vec<Decoder>,
    num_samples: usize,
    current: usize,
    current_sample: usize,
}

impl SegmentedDecoder {
    fn decode(&mut self, out: &mut [i16], stride: usize, ch_offset: usize, count: usize) -> Result<(), StreamError> {
        let mut done = 0;
        while done < count {
            let segment = &mut self.segments[self.current];
            let remaining = segment.num_samples() - segment.current_sample();
            if remaining == 0 {
                if self.current + 1 >= self.segments.len() {
                    return Err(StreamError::decode_fault("read past the last segment").after_samples(done));
                }
                // each segment starts from its own clean codec state
                self.current += 1;
                self.segments[self.current].reset();
                continue;
            }

            let to_do = (count - done).min(remaining);
            if let Err(e) = segment.decode(&mut out[done * stride..], stride, ch_offset, to_do) {
                self.current_sample += e.samples_done();
                return Err(e.after_samples(done));
            }
            done += to_do;
            self.current_sample += to_do;
        }
        Ok(())
    }

    fn reset(&mut self) {
        for segment in &mut self.segments {
            segment.reset();
        }
        self.current = 0;
        self.current_sample = 0;
    }

    fn seek_direct(&mut self, sample: usize) {
        self.reset();
        let mut start = 0;
        let last = self.segments.len() - 1;
        for (i, segment) in self.segments.iter_mut().enumerate() {
            let len = segment.num_samples();
            if sample < start + len || i == last {
                self.current = i;
                segment.seek_direct(sample - start);
                break;
            }
            start += len;
        }
        self.current_sample = sample;
    }
}

/// Sub-streams played together, each feeding its own channel range.
pub(crate) struct LayeredDecoder {
    layers: Vec<Decoder>,
    channel_offsets: Vec<usize>,
    num_samples: usize,
    current_sample: usize,
    scratch: Vec<i16>,
}

impl LayeredDecoder {
    /// A fault in one layer leaves every layer, and this decoder, at the
    /// sample where that layer stopped.
    fn decode(&mut self, out: &mut [i16], stride: usize, ch_offset: usize, count: usize) -> Result<(), StreamError> {
        for i in 0..self.layers.len() {
            let offset = ch_offset + self.channel_offsets[i];
            if let Err(e) = self.layers[i].decode(out, stride, offset, count) {
                return Err(self.realign(i, e, out, stride, ch_offset));
            }
        }
        self.current_sample += count;
        Ok(())
    }

    /// Bring all layers to where layer `failed` stopped. Earlier layers are
    /// moved back; later ones decode the frames they have not written yet.
    /// A later layer faulting sooner becomes the new stopping point.
    fn realign(
        &mut self,
        mut failed: usize,
        mut error: StreamError,
        out: &mut [i16],
        stride: usize,
        ch_offset: usize,
    ) -> StreamError {
        'retry: loop {
            let partial = error.samples_done();
            let target = self.current_sample + partial;
            for i in 0..self.layers.len() {
                let layer = &mut self.layers[i];
                if i < failed || (i == failed && layer.current_sample() != target) {
                    if let Err(e) = layer.reposition(target, &mut self.scratch) {
                        log::warn!("layer {} could not return to sample {}: {}", i, target, e);
                        return e.with_samples_done(0);
                    }
                } else if i > failed {
                    let offset = ch_offset + self.channel_offsets[i];
                    if let Err(e) = layer.decode(out, stride, offset, partial) {
                        failed = i;
                        error = e;
                        continue 'retry;
                    }
                }
            }
            log::debug!("layers realigned at sample {} after a fault", target);
            self.current_sample = target;
            return error.with_samples_done(partial);
        }
    }
}

/// Decoder tree built from a descriptor's layout.
pub(crate) enum Decoder {
    Block(BlockDecoder),
    Segmented(SegmentedDecoder),
    Layered(LayeredDecoder),
}

impl Decoder {
    pub(crate) fn from_descriptor(descriptor: &StreamDescriptor) -> Self {
        match &descriptor.layout {
            Layout::Flat => Self::Block(BlockDecoder::new(descriptor, None)),
            Layout::Interleaved {
                block_size,
                last_block_size,
            } => Self::Block(BlockDecoder::new(
                descriptor,
                Some(Interleave {
                    block_size: *block_size,
                    last_block_size: *last_block_size,
                }),
            )),
            Layout::Segmented(segments) => Self::Segmented(SegmentedDecoder {
                segments: segments.iter().map(Self::from_descriptor).collect(),
                num_samples: descriptor.num_samples,
                current: 0,
                current_sample: 0,
            }),
            Layout::Layered(layers) => {
                let mut channel_offsets = Vec::with_capacity(layers.len());
                let mut next = 0;
                for layer in layers {
                    channel_offsets.push(next);
                    next += layer.channel_count;
                }
                Self::Layered(LayeredDecoder {
                    layers: layers.iter().map(Self::from_descriptor).collect(),
                    channel_offsets,
                    num_samples: descriptor.num_samples,
                    current_sample: 0,
                    scratch: Vec::new(),
                })
            }
        }
    }

    pub(crate) fn num_samples(&self) -> usize {
        match self {
            Self::Block(d) => d.num_samples,
            Self::Segmented(d) => d.num_samples,
            Self::Layered(d) => d.num_samples,
        }
    }

    pub(crate) fn current_sample(&self) -> usize {
        match self {
            Self::Block(d) => d.current_sample,
            Self::Segmented(d) => d.current_sample,
            Self::Layered(d) => d.current_sample,
        }
    }

    pub(crate) fn channel_count(&self) -> usize {
        match self {
            Self::Block(d) => d.channels.len(),
            Self::Segmented(d) => d.segments.first().map_or(0, Self::channel_count),
            Self::Layered(d) => d.layers.iter().map(Self::channel_count).sum(),
        }
    }

    pub(crate) fn is_randomly_addressable(&self) -> bool {
        match self {
            Self::Block(d) => d.coding.is_randomly_addressable(),
            Self::Segmented(d) => d.segments.iter().all(Self::is_randomly_addressable),
            Self::Layered(d) => d.layers.iter().all(Self::is_randomly_addressable),
        }
    }

    /// Decode `count` samples of every channel into `out`, channel `c` of this
    /// decoder landing at `out[i * stride + ch_offset + c]`.
    pub(crate) fn decode(
        &mut self,
        out: &mut [i16],
        stride: usize,
        ch_offset: usize,
        count: usize,
    ) -> Result<(), StreamError> {
        match self {
            Self::Block(d) => d.decode(out, stride, ch_offset, count),
            Self::Segmented(d) => d.decode(out, stride, ch_offset, count),
            Self::Layered(d) => d.decode(out, stride, ch_offset, count),
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            Self::Block(d) => d.reset(),
            Self::Segmented(d) => d.reset(),
            Self::Layered(d) => {
                for layer in &mut d.layers {
                    layer.reset();
                }
                d.current_sample = 0;
            }
        }
    }

    /// Jump straight to `sample`. Callers check `is_randomly_addressable` first.
    pub(crate) fn seek_direct(&mut self, sample: usize) {
        match self {
            Self::Block(d) => d.seek_direct(sample),
            Self::Segmented(d) => d.seek_direct(sample),
            Self::Layered(d) => {
                for layer in &mut d.layers {
                    layer.seek_direct(sample);
                }
                d.current_sample = sample;
            }
        }
    }

    /// Move to `sample` by arithmetic when possible, otherwise by decoding
    /// from the start into `scratch`.
    fn reposition(&mut self, sample: usize, scratch: &mut Vec<i16>) -> Result<(), StreamError> {
        if self.is_randomly_addressable() {
            self.seek_direct(sample);
            return Ok(());
        }
        self.reset();
        let channels = self.channel_count();
        scratch.resize(REPOSITION_FRAMES * channels, 0);
        while self.current_sample() < sample {
            let chunk = (sample - self.current_sample()).min(REPOSITION_FRAMES);
            self.decode(scratch, channels, 0, chunk)?;
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> DecoderSnapshot {
        match self {
            Self::Block(d) => d.snapshot(),
            Self::Segmented(d) => DecoderSnapshot::Segmented {
                current: d.current,
                current_sample: d.current_sample,
                inner: Box::new(d.segments[d.current].snapshot()),
            },
            Self::Layered(d) => DecoderSnapshot::Layered {
                current_sample: d.current_sample,
                layers: d.layers.iter().map(Self::snapshot).collect(),
            },
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &DecoderSnapshot) {
        match (self, snapshot) {
            (Self::Block(d), snapshot) => d.restore(snapshot),
            (
                Self::Segmented(d),
                DecoderSnapshot::Segmented {
                    current,
                    current_sample,
                    inner,
                },
            ) => {
                d.current = *current;
                d.current_sample = *current_sample;
                d.segments[*current].restore(inner);
            }
            (Self::Layered(d), DecoderSnapshot::Layered { current_sample, layers }) => {
                for (layer, inner) in d.layers.iter_mut().zip(layers) {
                    layer.restore(inner);
                }
                d.current_sample = *current_sample;
            }
            _ => log::warn!("ignoring snapshot taken from a different layout"),
        }
    }
}
