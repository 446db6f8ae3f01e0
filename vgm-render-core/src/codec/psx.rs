use super::{clamp16, read_frames, CodecState};
use crate::models::channel::ChannelState;
use crate::models::error::StreamError;

/// Bytes per PS-ADPCM frame: header, flags, 14 bytes of nibbles.
pub const FRAME_SIZE: usize = 16;
pub const SAMPLES_PER_FRAME: usize = 28;

/// Predictor coefficients, in 1/64 units.
static PSX_COEFS: [(i32, i32); 5] = [(0, 0), (60, 0), (115, -52), (98, -55), (122, -60)];

/// Decode PlayStation ADPCM.
///
/// Every frame is decoded sample by sample from the running history, so a
/// call may start and stop anywhere inside a frame.
pub(crate) fn decode_psx(
    channel: &mut ChannelState,
    out: &mut [i16],
    stride: usize,
    first_sample: usize,
    samples_to_do: usize,
) -> Result<(), StreamError> {
    let first_frame = first_sample / SAMPLES_PER_FRAME;
    let last_frame = (first_sample + samples_to_do - 1) / SAMPLES_PER_FRAME;
    let offset = channel.current_offset + (first_frame * FRAME_SIZE) as u64;
    let len = (last_frame - first_frame + 1) * FRAME_SIZE;
    let data = read_frames(&*channel.file, &mut channel.scratch, offset, len)?;

    let (mut hist1, mut hist2) = match channel.codec_state {
        CodecState::Psx { hist1, hist2 } => (hist1, hist2),
        _ => (0, 0),
    };

    for (i, sample) in (first_sample..first_sample + samples_to_do).enumerate() {
        let frame = &data[(sample / SAMPLES_PER_FRAME - first_frame) * FRAME_SIZE..][..FRAME_SIZE];
        let pos = sample % SAMPLES_PER_FRAME;

        let mut shift = (frame[0] & 0x0F) as i32;
        if shift > 12 {
            shift = 9;
        }
        let predictor = ((frame[0] >> 4) & 0x0F) as usize;
        let (coef1, coef2) = PSX_COEFS.get(predictor).copied().unwrap_or((0, 0));

        let byte = frame[2 + pos / 2];
        let nibble = if pos % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        let scale = (((nibble as u16) << 12) as i16 as i32) >> shift;

        let decoded = clamp16(scale + ((hist1 * coef1 + hist2 * coef2) >> 6));
        out[i * stride] = decoded;
        hist2 = hist1;
        hist1 = decoded as i32;
    }

    channel.codec_state = CodecState::Psx { hist1, hist2 };
    Ok(())
}
