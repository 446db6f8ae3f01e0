use crate::models::error::StreamError;
use crate::processing::layout::{Decoder, DecoderSnapshot};

/// Frames decoded per step while fast-forwarding.
const DISCARD_FRAMES: usize = 4096;

/// Stream-position cursor over a decoder tree.
///
/// Decodes forward in stream samples without ever jumping, and repositions
/// either by arithmetic (stateless codecs) or by decode-and-discard from the
/// nearest point whose decoder state is known: the current position, the
/// saved loop-start state, or the stream start.
pub(crate) struct StreamCursor {
    decoder: Decoder,
    channels: usize,
    random_access: bool,
    loop_start: Option<usize>,
    loop_snapshot: Option<(usize, DecoderSnapshot)>,
    discard: Vec<i16>,
}

impl StreamCursor {
    pub(crate) fn new(decoder: Decoder, channels: usize, loop_start: Option<usize>) -> Self {
        Self {
            random_access: decoder.is_randomly_addressable(),
            decoder,
            channels,
            loop_start,
            loop_snapshot: None,
            discard: Vec::new(),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.decoder.current_sample()
    }

    pub(crate) fn num_samples(&self) -> usize {
        self.decoder.num_samples()
    }

    #[cfg(test)]
    pub(crate) fn has_loop_snapshot(&self) -> bool {
        self.loop_snapshot.is_some()
    }

    fn capture_loop_start(&mut self) {
        if self.random_access || self.loop_snapshot.is_some() {
            return;
        }
        let position = self.position();
        if self.loop_start == Some(position) {
            log::debug!("saved decoder state at loop start {}", position);
            self.loop_snapshot = Some((position, self.decoder.snapshot()));
        }
    }

    /// Decode up to `count` frames into `out`, stopping at the end of the stream.
    /// Sub-ranges are split at the loop start so its state can be saved.
    pub(crate) fn decode(&mut self, out: &mut [i16], count: usize) -> Result<usize, StreamError> {
        let count = count.min(self.num_samples() - self.position());
        let mut done = 0;
        while done < count {
            self.capture_loop_start();
            let mut to_do = count - done;
            if let Some(loop_start) = self.loop_start {
                let position = self.position();
                if position < loop_start {
                    to_do = to_do.min(loop_start - position);
                }
            }
            self.decoder
                .decode(&mut out[done * self.channels..], self.channels, 0, to_do)
                .map_err(|e| e.after_samples(done))?;
            done += to_do;
        }
        self.capture_loop_start();
        Ok(done)
    }

    /// Move to stream sample `target` (clamped to the stream length).
    pub(crate) fn seek(&mut self, target: usize) -> Result<(), StreamError> {
        let target = target.min(self.num_samples());
        let current = self.position();
        if current == target {
            return Ok(());
        }
        if self.random_access {
            log::debug!("direct seek {} -> {}", current, target);
            self.decoder.seek_direct(target);
            return Ok(());
        }

        let snapshot_sample = match &self.loop_snapshot {
            Some((sample, _)) if *sample <= target && (*sample > current || current > target) => Some(*sample),
            _ => None,
        };
        if let (Some(sample), Some((_, snapshot))) = (snapshot_sample, &self.loop_snapshot) {
            log::debug!("seek {} -> {} from loop start state at {}", current, target, sample);
            self.decoder.restore(snapshot);
        } else if current > target {
            log::debug!("seek {} -> {} from stream start", current, target);
            self.decoder.reset();
        } else {
            log::debug!("seek {} -> {} forward", current, target);
        }

        let mut discard = std::mem::take(&mut self.discard);
        let result = self.skip_to(target, &mut discard);
        self.discard = discard;
        result
    }

    fn skip_to(&mut self, target: usize, discard: &mut Vec<i16>) -> Result<(), StreamError> {
        discard.resize(DISCARD_FRAMES * self.channels, 0);
        while self.position() < target {
            let chunk = (target - self.position()).min(DISCARD_FRAMES);
            match self.decode(discard, chunk) {
                Ok(_) => {}
                Err(StreamError::DecodeFault { reason, .. }) => {
                    return Err(StreamError::UnseekableRequest(format!(
                        "stream data ends at sample {} before seek target {}: {}",
                        self.position(),
                        target,
                        reason
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Back to the stream start with fresh codec state; the saved loop-start
    /// state is dropped.
    pub(crate) fn reset(&mut self) {
        self.decoder.reset();
        self.loop_snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodingKind;
    use crate::models::descriptor::{ChannelSource, Layout, StreamDescriptor};
    use crate::storage::memory_file::MemoryStreamFile;

    fn psx_cursor(frames: usize, loop_start: Option<usize>) -> StreamCursor {
        truncated_psx_cursor(frames, frames, loop_start)
    }

    /// Header claims `declared` frames; only `frames` are present.
    fn truncated_psx_cursor(frames: usize, declared: usize, loop_start: Option<usize>) -> StreamCursor {
        let mut data = Vec::with_capacity(frames * 16);
        for f in 0..frames {
            data.push(0x12 + (f % 3) as u8 * 0x10);
            data.push(0);
            data.extend((0..14).map(|i| (f * 31 + i * 7) as u8));
        }
        let file = MemoryStreamFile::new("cursor.vag", data).shared();
        let desc = StreamDescriptor {
            channel_count: 1,
            sample_rate: 22050,
            num_samples: declared * 28,
            coding: CodingKind::PsxAdpcm,
            layout: Layout::Flat,
            loop_points: None,
            subsong_index: 0,
            subsong_count: 1,
            stream_name: None,
            format_name: "test",
            channels: vec![ChannelSource::new(file, 0)],
        };
        StreamCursor::new(Decoder::from_descriptor(&desc), 1, loop_start)
    }

    fn read(cursor: &mut StreamCursor, count: usize) -> Vec<i16> {
        let mut out = vec![0i16; count];
        let n = cursor.decode(&mut out, count).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn decode_stops_at_stream_end() {
        let mut cursor = psx_cursor(2, None);
        assert_eq!(read(&mut cursor, 100).len(), 56);
        assert_eq!(read(&mut cursor, 10).len(), 0);
    }

    #[test]
    fn loop_start_state_is_saved_on_the_way_through() {
        let mut cursor = psx_cursor(4, Some(40));
        read(&mut cursor, 30);
        assert!(!cursor.has_loop_snapshot());
        read(&mut cursor, 30);
        assert!(cursor.has_loop_snapshot());
    }

    #[test]
    fn seek_matches_sequential_decode() {
        let mut reference = psx_cursor(4, Some(40));
        let all = read(&mut reference, 112);

        let mut cursor = psx_cursor(4, Some(40));
        // forward from the start
        cursor.seek(50).unwrap();
        assert_eq!(read(&mut cursor, 20), all[50..70].to_vec());
        // backwards past the loop start: restart
        cursor.seek(10).unwrap();
        assert_eq!(read(&mut cursor, 10), all[10..20].to_vec());
        // backwards to the loop body: restore the saved state
        cursor.seek(90).unwrap();
        cursor.seek(45).unwrap();
        assert_eq!(read(&mut cursor, 15), all[45..60].to_vec());
    }

    #[test]
    fn reset_drops_saved_state() {
        let mut cursor = psx_cursor(4, Some(20));
        read(&mut cursor, 30);
        assert!(cursor.has_loop_snapshot());
        cursor.reset();
        assert!(!cursor.has_loop_snapshot());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn seek_clamps_to_stream_length() {
        let mut cursor = psx_cursor(1, None);
        cursor.seek(1000).unwrap();
        assert_eq!(cursor.position(), 28);
    }

    #[test]
    fn seek_past_truncated_data_is_unseekable() {
        let mut cursor = truncated_psx_cursor(2, 10, None);
        assert_eq!(cursor.num_samples(), 280);

        let err = cursor.seek(200).unwrap_err();
        assert!(matches!(err, StreamError::UnseekableRequest(_)), "{:?}", err);
        assert!(cursor.position() < 200);

        // still usable from the start
        cursor.reset();
        let mut reference = psx_cursor(2, None);
        assert_eq!(read(&mut cursor, 56), read(&mut reference, 56));
    }

    #[test]
    fn seek_within_truncated_data_succeeds() {
        let mut cursor = truncated_psx_cursor(2, 10, None);
        cursor.seek(40).unwrap();
        assert_eq!(cursor.position(), 40);
    }
}
