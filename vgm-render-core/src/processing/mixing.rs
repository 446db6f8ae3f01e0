//! Channel reduction applied after decoding.
//!
//! Downmix coefficients follow ITU-R BS.775 for the common surround layouts.
//! Any other reduction keeps the leading channels and folds the rest evenly
//! into every output. Coefficients are stored as `coeffs[out * inputs + in]`.

use std::f32::consts::FRAC_1_SQRT_2;

use crate::models::error::StreamError;

/// Centre channel weight when folding into front left/right (-3 dB).
pub const CENTER_COEFF: f32 = FRAC_1_SQRT_2;

/// Surround channel weight when folding into front left/right (-3 dB).
pub const SURROUND_COEFF: f32 = FRAC_1_SQRT_2;

/// Fixed channel-reduction pipeline: optional downmix, then optional stereo pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MixingGraph {
    input_channels: usize,
    downmix_channels: usize,
    coeffs: Option<Vec<f32>>,
    stereo_pair: Option<usize>,
}

impl MixingGraph {
    pub fn identity(channels: usize) -> Self {
        Self {
            input_channels: channels,
            downmix_channels: channels,
            coeffs: None,
            stereo_pair: None,
        }
    }

    /// Build the graph for `input_channels`, reducing to `downmix_target` when
    /// it is smaller, then keeping only pair `stereo_pair` if set.
    pub fn build(
        input_channels: usize,
        downmix_target: Option<usize>,
        stereo_pair: Option<usize>,
    ) -> Result<Self, StreamError> {
        if input_channels == 0 {
            return Err(StreamError::ConfigConflict("cannot mix a stream without channels".into()));
        }
        let mut graph = Self::identity(input_channels);

        match downmix_target {
            Some(0) => {
                return Err(StreamError::ConfigConflict("downmix target must be at least 1 channel".into()));
            }
            Some(target) if target < input_channels => {
                graph.downmix_channels = target;
                graph.coeffs = Some(downmix_matrix(input_channels, target));
            }
            _ => {}
        }

        if let Some(pair) = stereo_pair {
            if 2 * pair + 1 >= graph.downmix_channels {
                return Err(StreamError::ConfigConflict(format!(
                    "stereo pair {} needs {} channels, stream has {}",
                    pair,
                    2 * pair + 2,
                    graph.downmix_channels
                )));
            }
            graph.stereo_pair = Some(pair);
        }

        Ok(graph)
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        if self.stereo_pair.is_some() {
            2
        } else {
            self.downmix_channels
        }
    }

    pub fn is_identity(&self) -> bool {
        self.coeffs.is_none() && self.stereo_pair.is_none()
    }

    /// Mix interleaved `input` into a new block of `output_channels()` channels.
    pub fn apply(&self, input: &[i16]) -> Vec<i16> {
        let mut block = input.to_vec();
        let frames = block.len() / self.input_channels;
        let mut scratch = Vec::new();
        self.apply_in_place(&mut block, frames, &mut scratch);
        block.truncate(frames * self.output_channels());
        block
    }

    /// Mix `frames` interleaved frames in place. The result occupies the first
    /// `frames * output_channels()` samples of `buf`.
    pub fn apply_in_place(&self, buf: &mut [i16], frames: usize, scratch: &mut Vec<f32>) {
        if self.is_identity() {
            return;
        }
        let inputs = self.input_channels;
        let outputs = self.output_channels();
        let first = self.stereo_pair.map_or(0, |pair| pair * 2);
        scratch.resize(self.downmix_channels, 0.0);

        // outputs <= inputs, so frame f is written at or before where it was read
        for f in 0..frames {
            let frame = &buf[f * inputs..(f + 1) * inputs];
            match &self.coeffs {
                Some(coeffs) => {
                    for (o, mixed) in scratch.iter_mut().enumerate() {
                        let row = &coeffs[o * inputs..(o + 1) * inputs];
                        *mixed = row.iter().zip(frame).map(|(c, &s)| c * s as f32).sum();
                    }
                }
                None => {
                    for (mixed, &s) in scratch.iter_mut().zip(frame) {
                        *mixed = s as f32;
                    }
                }
            }
            for o in 0..outputs {
                buf[f * outputs + o] = to_i16(scratch[first + o]);
            }
        }
    }
}

#[inline]
fn to_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[rustfmt::skip]
fn downmix_matrix(inputs: usize, outputs: usize) -> Vec<f32> {
    match (inputs, outputs) {
        (2, 1) => vec![0.5, 0.5],
        // FL FR FC LFE BL BR
        (6, 2) => vec![
            1.0, 0.0, CENTER_COEFF, 0.0, SURROUND_COEFF, 0.0,
            0.0, 1.0, CENTER_COEFF, 0.0, 0.0, SURROUND_COEFF,
        ],
        // FL FR FC LFE BL BR SL SR
        (8, 2) => vec![
            1.0, 0.0, CENTER_COEFF, 0.0, SURROUND_COEFF, 0.0, SURROUND_COEFF, 0.0,
            0.0, 1.0, CENTER_COEFF, 0.0, 0.0, SURROUND_COEFF, 0.0, SURROUND_COEFF,
        ],
        (6, 1) | (8, 1) => {
            let stereo = downmix_matrix(inputs, 2);
            (0..inputs).map(|i| 0.5 * (stereo[i] + stereo[inputs + i])).collect()
        }
        _ => generic_matrix(inputs, outputs),
    }
}

/// Keep channel `i` for `i < outputs`; every extra channel adds `1 / outputs`
/// of itself to each output.
fn generic_matrix(inputs: usize, outputs: usize) -> Vec<f32> {
    let share = 1.0 / outputs as f32;
    let mut coeffs = vec![0.0f32; inputs * outputs];
    for o in 0..outputs {
        coeffs[o * inputs + o] = 1.0;
        for i in outputs..inputs {
            coeffs[o * inputs + i] = share;
        }
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn identity_passes_through() {
        let graph = MixingGraph::build(2, None, None).unwrap();
        assert!(graph.is_identity());
        assert_eq!(graph.apply(&[1, 2, 3, 4]), vec![1, 2, 3, 4]);

        // no upmix
        let graph = MixingGraph::build(2, Some(6), None).unwrap();
        assert!(graph.is_identity());
        assert_eq!(graph.output_channels(), 2);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let graph = MixingGraph::build(2, Some(1), None).unwrap();
        assert_eq!(graph.apply(&[100, 300, -50, -150]), vec![200, -100]);
    }

    #[test]
    fn surround_to_stereo_folds_centre_and_rears() {
        let graph = MixingGraph::build(6, Some(2), None).unwrap();
        // FL FR FC LFE BL BR
        let out = graph.apply(&[1000, 2000, 1000, 30000, 1000, 0]);
        let expected_left = 1000.0 + 1000.0 * CENTER_COEFF + 1000.0 * SURROUND_COEFF;
        let expected_right = 2000.0 + 1000.0 * CENTER_COEFF;
        assert_abs_diff_eq!(out[0] as f32, expected_left, epsilon = 0.5);
        assert_abs_diff_eq!(out[1] as f32, expected_right, epsilon = 0.5);
    }

    #[test]
    fn surround_to_mono_goes_through_stereo() {
        let coeffs = downmix_matrix(6, 1);
        assert_eq!(coeffs.len(), 6);
        assert_abs_diff_eq!(coeffs[0], 0.5);
        assert_abs_diff_eq!(coeffs[2], CENTER_COEFF);
        assert_abs_diff_eq!(coeffs[3], 0.0);
        assert_abs_diff_eq!(coeffs[4], 0.5 * SURROUND_COEFF);
    }

    #[test]
    fn generic_downmix_spreads_extra_channels() {
        let graph = MixingGraph::build(3, Some(2), None).unwrap();
        assert_eq!(graph.apply(&[100, 200, 1000]), vec![600, 700]);
    }

    #[test]
    fn output_saturates() {
        let graph = MixingGraph::build(3, Some(2), None).unwrap();
        assert_eq!(graph.apply(&[32000, -32000, 32000]), vec![i16::MAX, -16000]);
    }

    #[test]
    fn stereo_pair_selects_after_downmix() {
        let graph = MixingGraph::build(4, None, Some(1)).unwrap();
        assert_eq!(graph.output_channels(), 2);
        assert_eq!(graph.apply(&[1, 2, 3, 4, 5, 6, 7, 8]), vec![3, 4, 7, 8]);

        assert!(matches!(
            MixingGraph::build(4, Some(2), Some(1)),
            Err(StreamError::ConfigConflict(_))
        ));
        assert!(matches!(MixingGraph::build(3, None, Some(1)), Err(StreamError::ConfigConflict(_))));
    }

    #[test]
    fn zero_target_is_a_conflict() {
        assert!(MixingGraph::build(2, Some(0), None).is_err());
    }

    proptest! {
        #[test]
        fn downmix_yields_target_channels_and_is_pure(
            inputs in 1usize..10,
            target_seed in 1usize..10,
            frames in 0usize..16,
            seed in any::<i16>(),
        ) {
            let target = 1 + (target_seed - 1) % inputs;
            let graph = MixingGraph::build(inputs, Some(target), None).unwrap();
            let block: Vec<i16> = (0..inputs * frames)
                .map(|i| seed.wrapping_add((i as i16).wrapping_mul(311)))
                .collect();

            let first = graph.apply(&block);
            let second = graph.apply(&block);
            prop_assert_eq!(graph.output_channels(), target);
            prop_assert_eq!(first.len(), frames * target);
            prop_assert_eq!(first, second);
        }
    }
}
