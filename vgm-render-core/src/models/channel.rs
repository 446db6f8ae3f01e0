use std::sync::Arc;

use crate::codec::{CodecState, CodingKind};
use crate::models::descriptor::ChannelSource;
use crate::traits::stream_file::StreamFile;

/// Per-channel decode cursor.
///
/// Owned by exactly one decoder. The file handle may be shared with sibling
/// channels; the offsets and codec state never are.
pub struct ChannelState {
    pub(crate) file: Arc<dyn StreamFile>,
    pub(crate) channel_start_offset: u64,
    pub(crate) current_offset: u64,
    pub(crate) codec_state: CodecState,
    /// Reused read buffer for the codec adapter.
    pub(crate) scratch: Vec<u8>,
}

impl ChannelState {
    pub fn new(source: &ChannelSource, coding: CodingKind) -> Self {
        Self {
            file: Arc::clone(&source.file),
            channel_start_offset: source.start_offset,
            current_offset: source.start_offset,
            codec_state: coding.initial_state(),
            scratch: Vec::new(),
        }
    }

    /// Rewind to the channel start with a fresh codec state.
    pub fn reset(&mut self, coding: CodingKind) {
        self.current_offset = self.channel_start_offset;
        self.codec_state = coding.initial_state();
    }

    pub fn channel_start_offset(&self) -> u64 {
        self.channel_start_offset
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn codec_state(&self) -> CodecState {
        self.codec_state
    }

    pub fn file_name(&self) -> &str {
        self.file.name()
    }
}

impl std::fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelState")
            .field("file", &self.file.name())
            .field("channel_start_offset", &self.channel_start_offset)
            .field("current_offset", &self.current_offset)
            .field("codec_state", &self.codec_state)
            .finish()
    }
}
