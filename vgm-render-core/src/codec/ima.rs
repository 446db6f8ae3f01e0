use super::{clamp16, read_frames, CodecState};
use crate::models::channel::ChannelState;
use crate::models::error::StreamError;

/// Standard IMA ADPCM step table.
#[rustfmt::skip]
static IMA_STEP: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14,
    16, 17, 19, 21, 23, 25, 28, 31,
    34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143,
    157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658,
    724, 796, 876, 963, 1060, 1166, 1282, 1411,
    1552, 1707, 1878, 2066, 2272, 2499, 2749, 3024,
    3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484,
    7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

#[rustfmt::skip]
static IMA_INDEX: [i32; 16] = [
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8,
];

/// Expand one nibble against the running predictor and step index.
fn expand_nibble(nibble: u8, hist: &mut i32, step_index: &mut i32) -> i16 {
    let step = IMA_STEP[(*step_index).clamp(0, 88) as usize];
    let mut delta = step >> 3;
    if nibble & 1 != 0 {
        delta += step >> 2;
    }
    if nibble & 2 != 0 {
        delta += step >> 1;
    }
    if nibble & 4 != 0 {
        delta += step;
    }
    if nibble & 8 != 0 {
        delta = -delta;
    }

    let sample = clamp16(*hist + delta);
    *hist = sample as i32;
    *step_index = (*step_index + IMA_INDEX[(nibble & 0x0F) as usize]).clamp(0, 88);
    sample
}

/// Decode mono IMA ADPCM, two samples per byte, low nibble first.
pub(crate) fn decode_ima(
    channel: &mut ChannelState,
    out: &mut [i16],
    stride: usize,
    first_sample: usize,
    samples_to_do: usize,
) -> Result<(), StreamError> {
    let first_byte = first_sample / 2;
    let last_byte = (first_sample + samples_to_do - 1) / 2;
    let offset = channel.current_offset + first_byte as u64;
    let data = read_frames(&*channel.file, &mut channel.scratch, offset, last_byte - first_byte + 1)?;

    let (mut hist, mut step_index) = match channel.codec_state {
        CodecState::Ima { hist, step_index } => (hist, step_index),
        _ => (0, 0),
    };

    for (i, sample) in (first_sample..first_sample + samples_to_do).enumerate() {
        let byte = data[sample / 2 - first_byte];
        let nibble = if sample % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        out[i * stride] = expand_nibble(nibble, &mut hist, &mut step_index);
    }

    channel.codec_state = CodecState::Ima { hist, step_index };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodingKind;
    use crate::models::descriptor::ChannelSource;
    use crate::storage::memory_file::MemoryStreamFile;

    #[test]
    fn tables_have_expected_shape() {
        assert_eq!(IMA_STEP[0], 7);
        assert_eq!(IMA_STEP[88], 32767);
        assert_eq!(IMA_INDEX[7], 8);
    }

    #[test]
    fn expands_known_sequence() {
        let mut hist = 0;
        let mut index = 0;
        // step 7: 0 + 1 + 3 + 7
        assert_eq!(expand_nibble(7, &mut hist, &mut index), 11);
        assert_eq!(index, 8);
        // step 16: 16 >> 3
        assert_eq!(expand_nibble(0, &mut hist, &mut index), 13);
        assert_eq!(index, 7);
        // negative: -(14 >> 3)
        assert_eq!(expand_nibble(8, &mut hist, &mut index), 12);
        assert_eq!(index, 6);
    }

    #[test]
    fn decodes_low_nibble_first_and_keeps_state() {
        let source = ChannelSource::new(MemoryStreamFile::new("ima.bin", vec![0x07, 0x08]).shared(), 0);
        let mut ch = ChannelState::new(&source, CodingKind::ImaAdpcm);
        let mut out = [0i16; 3];
        decode_ima(&mut ch, &mut out, 1, 0, 3).unwrap();
        assert_eq!(out, [11, 13, 12]);
        assert_eq!(ch.codec_state, CodecState::Ima { hist: 12, step_index: 6 });

        let mut last = [0i16; 1];
        decode_ima(&mut ch, &mut last, 1, 3, 1).unwrap();
        // step 13 for index 6
        assert_eq!(last, [12 + (13 >> 3)]);
    }
}
