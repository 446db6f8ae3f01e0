use super::read_frames;
use crate::models::channel::ChannelState;
use crate::models::error::StreamError;

pub(crate) fn decode_pcm16(
    channel: &mut ChannelState,
    out: &mut [i16],
    stride: usize,
    first_sample: usize,
    samples_to_do: usize,
    big_endian: bool,
) -> Result<(), StreamError> {
    let offset = channel.current_offset + first_sample as u64 * 2;
    let data = read_frames(&*channel.file, &mut channel.scratch, offset, samples_to_do * 2)?;

    for (i, bytes) in data.chunks_exact(2).enumerate() {
        let pair = [bytes[0], bytes[1]];
        out[i * stride] = if big_endian {
            i16::from_be_bytes(pair)
        } else {
            i16::from_le_bytes(pair)
        };
    }
    Ok(())
}

pub(crate) fn decode_pcm8(
    channel: &mut ChannelState,
    out: &mut [i16],
    stride: usize,
    first_sample: usize,
    samples_to_do: usize,
) -> Result<(), StreamError> {
    let offset = channel.current_offset + first_sample as u64;
    let data = read_frames(&*channel.file, &mut channel.scratch, offset, samples_to_do)?;

    for (i, &byte) in data.iter().enumerate() {
        out[i * stride] = (byte as i8 as i16) << 8;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodingKind;
    use crate::models::descriptor::ChannelSource;
    use crate::storage::memory_file::MemoryStreamFile;

    fn channel(data: Vec<u8>, start: u64, coding: CodingKind) -> ChannelState {
        let source = ChannelSource::new(MemoryStreamFile::new("pcm.bin", data).shared(), start);
        ChannelState::new(&source, coding)
    }

    #[test]
    fn pcm16_le_and_be() {
        let data = vec![0x34, 0x12, 0xFF, 0xFF];
        let mut out = [0i16; 2];

        let mut ch = channel(data.clone(), 0, CodingKind::Pcm16Le);
        decode_pcm16(&mut ch, &mut out, 1, 0, 2, false).unwrap();
        assert_eq!(out, [0x1234, -1]);

        let mut ch = channel(data, 0, CodingKind::Pcm16Be);
        decode_pcm16(&mut ch, &mut out, 1, 0, 2, true).unwrap();
        assert_eq!(out, [0x3412, -1]);
    }

    #[test]
    fn pcm16_writes_with_stride_from_first_sample() {
        let data: Vec<u8> = (0i16..8).flat_map(|s| s.to_le_bytes()).collect();
        let mut ch = channel(data, 0, CodingKind::Pcm16Le);
        let mut out = [99i16; 6];
        decode_pcm16(&mut ch, &mut out, 2, 5, 3, false).unwrap();
        assert_eq!(out, [5, 99, 6, 99, 7, 99]);
    }

    #[test]
    fn pcm8_scales_signed_bytes() {
        let mut ch = channel(vec![0x01, 0x80, 0x7F], 0, CodingKind::Pcm8);
        let mut out = [0i16; 3];
        decode_pcm8(&mut ch, &mut out, 1, 0, 3).unwrap();
        assert_eq!(out, [256, -32768, 32512]);
    }

    #[test]
    fn truncated_data_is_a_decode_fault() {
        let mut ch = channel(vec![0x00, 0x01, 0x02], 0, CodingKind::Pcm16Le);
        let mut out = [0i16; 2];
        let err = decode_pcm16(&mut ch, &mut out, 1, 0, 2, false).unwrap_err();
        assert!(err.is_decode_fault());
    }
}
