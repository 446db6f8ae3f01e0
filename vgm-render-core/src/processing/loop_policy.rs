use crate::models::config::PlaybackConfig;
use crate::models::descriptor::{LoopPoints, StreamDescriptor};
use crate::models::error::StreamError;
use crate::models::state::PlaybackState;

/// Convert seconds to samples, rounding half away from zero. Saturates at
/// `usize::MAX`.
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndMode {
    /// No loop: play the stream once.
    Once,
    Forever,
    /// Stop jumping at `threshold` and play on to the end of the stream.
    /// `tail_start` is the stream position at `threshold`.
    Tail { threshold: usize, tail_start: usize },
    /// Keep looping through `delay` full-volume samples and a `length`-sample fade.
    Fade {
        threshold: usize,
        delay: usize,
        length: usize,
    },
}

/// Where a play position lands in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayLocation {
    pub stream_sample: usize,
    /// Loop jumps taken to get there.
    pub loop_iteration: usize,
}

/// Loop and fade decisions for one stream and config.
///
/// Play positions count output samples from the start of playback, loops
/// unrolled. Stream positions index the decoded stream itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPolicy {
    num_samples: usize,
    loop_region: Option<LoopPoints>,
    mode: EndMode,
}

impl PlaybackPolicy {
    pub fn resolve(descriptor: &StreamDescriptor, config: &PlaybackConfig) -> Result<Self, StreamError> {
        config.validate().map_err(StreamError::ConfigConflict)?;

        let num_samples = descriptor.num_samples;
        let mut region = descriptor.loop_points;
        if config.really_force_loop || (config.force_loop && region.is_none()) {
            region = Some(LoopPoints {
                start: 0,
                end: num_samples,
            });
        }
        if config.ignore_loop {
            region = None;
        }
        if let Some(lp) = region {
            if lp.start >= lp.end {
                log::warn!("loop [{}, {}) is empty, playing without loop", lp.start, lp.end);
                region = None;
            }
        }

        let mode = match region {
            None if config.play_forever => {
                return Err(StreamError::ConfigConflict(
                    "cannot play forever: stream has no loop".into(),
                ));
            }
            None => EndMode::Once,
            Some(_) if config.play_forever => EndMode::Forever,
            Some(lp) => {
                let body = lp.end - lp.start;
                let threshold = lp.start.saturating_add((body as f64 * config.loop_count).round() as usize);
                if config.ignore_fade {
                    let into = threshold - lp.start;
                    let jumps = if into == 0 { 0 } else { (into - 1) / body };
                    EndMode::Tail {
                        threshold,
                        tail_start: threshold - jumps * body,
                    }
                } else {
                    EndMode::Fade {
                        threshold,
                        delay: seconds_to_samples(config.fade_delay, descriptor.sample_rate),
                        length: seconds_to_samples(config.fade_time, descriptor.sample_rate),
                    }
                }
            }
        };

        Ok(Self {
            num_samples,
            loop_region: region,
            mode,
        })
    }

    /// Loop region after overrides, if playback loops at all.
    pub fn loop_region(&self) -> Option<LoopPoints> {
        self.loop_region
    }

    pub fn plays_forever(&self) -> bool {
        self.mode == EndMode::Forever
    }

    /// Total play length, `None` when playing forever.
    pub fn effective_total_samples(&self) -> Option<usize> {
        match self.mode {
            EndMode::Once => Some(self.num_samples),
            EndMode::Forever => None,
            EndMode::Tail { threshold, tail_start } => {
                Some(threshold.saturating_add(self.num_samples - tail_start))
            }
            EndMode::Fade {
                threshold,
                delay,
                length,
            } => Some(threshold.saturating_add(delay).saturating_add(length)),
        }
    }

    /// Play position at which the loop count is reached.
    pub fn loop_threshold(&self) -> Option<usize> {
        match self.mode {
            EndMode::Tail { threshold, .. } | EndMode::Fade { threshold, .. } => Some(threshold),
            _ => None,
        }
    }

    /// Play positions `[start, end)` over which the gain ramps down.
    pub fn fade_window(&self) -> Option<(usize, usize)> {
        match self.mode {
            EndMode::Fade {
                threshold,
                delay,
                length,
            } if length > 0 => {
                let start = threshold.saturating_add(delay);
                Some((start, start.saturating_add(length)))
            }
            _ => None,
        }
    }

    /// Whether arriving at the loop end at play position `position` jumps back.
    pub fn should_jump(&self, position: usize) -> bool {
        match self.mode {
            EndMode::Once => false,
            EndMode::Forever | EndMode::Fade { .. } => true,
            EndMode::Tail { threshold, .. } => position < threshold,
        }
    }

    pub fn locate(&self, position: usize) -> PlayLocation {
        let Some(lp) = self.loop_region else {
            return PlayLocation {
                stream_sample: position,
                loop_iteration: 0,
            };
        };
        let body = lp.end - lp.start;

        if let EndMode::Tail { threshold, tail_start } = self.mode {
            if position >= threshold {
                return PlayLocation {
                    stream_sample: tail_start.saturating_add(position - threshold),
                    loop_iteration: (threshold - tail_start) / body,
                };
            }
        }
        if position < lp.end {
            return PlayLocation {
                stream_sample: position,
                loop_iteration: 0,
            };
        }
        let into = position - lp.start;
        PlayLocation {
            stream_sample: lp.start + into % body,
            loop_iteration: into / body,
        }
    }

    pub fn state_at(&self, position: usize) -> PlaybackState {
        if let Some(total) = self.effective_total_samples() {
            if position >= total {
                return PlaybackState::Done;
            }
        }
        let Some(lp) = self.loop_region else {
            return PlaybackState::BeforeLoop;
        };
        if position < lp.start {
            return PlaybackState::BeforeLoop;
        }
        let looping = PlaybackState::Looping {
            iteration: self.locate(position).loop_iteration,
        };
        match self.mode {
            EndMode::Once | EndMode::Forever => looping,
            EndMode::Tail { threshold, .. } | EndMode::Fade { threshold, .. } if position < threshold => looping,
            EndMode::Tail { .. } => PlaybackState::PostLoopTail,
            EndMode::Fade { .. } => PlaybackState::Fading,
        }
    }

    /// Linear fade gain at a play position: 1.0 before the fade window, 0.0 after it.
    pub fn fade_gain(&self, position: usize) -> f64 {
        match self.fade_window() {
            Some((start, _)) if position < start => 1.0,
            Some((_, end)) if position >= end => 0.0,
            Some((start, end)) => (end - position) as f64 / (end - start) as f64,
            None => 1.0,
        }
    }

    /// Scale interleaved frames starting at play position `first_position`.
    pub fn apply_fade(&self, samples: &mut [i16], channels: usize, first_position: usize) {
        let Some((start, end)) = self.fade_window() else {
            return;
        };
        let frames = samples.len() / channels;
        if first_position.saturating_add(frames) <= start || first_position >= end {
            return;
        }
        for (i, frame) in samples.chunks_exact_mut(channels).enumerate() {
            let position = first_position.saturating_add(i);
            if position < start {
                continue;
            }
            let gain = self.fade_gain(position);
            for sample in frame {
                *sample = (*sample as f64 * gain) as i16;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodingKind;
    use crate::models::descriptor::Layout;
    use approx::assert_relative_eq;

    fn descriptor(num_samples: usize, loop_points: Option<(usize, usize)>) -> StreamDescriptor {
        StreamDescriptor {
            channel_count: 1,
            sample_rate: 1000,
            num_samples,
            coding: CodingKind::Pcm16Le,
            layout: Layout::Flat,
            loop_points: loop_points.map(|(start, end)| LoopPoints { start, end }),
            subsong_index: 0,
            subsong_count: 1,
            stream_name: None,
            format_name: "test",
            channels: Vec::new(),
        }
    }

    fn tail_config(loop_count: f64) -> PlaybackConfig {
        PlaybackConfig {
            loop_count,
            ignore_fade: true,
            ..Default::default()
        }
    }

    #[test]
    fn unlooped_stream_plays_once() {
        let policy = PlaybackPolicy::resolve(&descriptor(500, None), &PlaybackConfig::default()).unwrap();
        assert_eq!(policy.effective_total_samples(), Some(500));
        assert_eq!(policy.state_at(0), PlaybackState::BeforeLoop);
        assert_eq!(policy.state_at(499), PlaybackState::BeforeLoop);
        assert_eq!(policy.state_at(500), PlaybackState::Done);
        assert!(!policy.should_jump(0));
    }

    #[test]
    fn tail_mode_plays_loops_then_remainder() {
        let policy = PlaybackPolicy::resolve(&descriptor(6000, Some((1000, 5000))), &tail_config(2.0)).unwrap();
        assert_eq!(policy.loop_threshold(), Some(9000));
        assert_eq!(policy.effective_total_samples(), Some(10_000));

        assert_eq!(policy.state_at(999), PlaybackState::BeforeLoop);
        assert_eq!(policy.state_at(1000), PlaybackState::Looping { iteration: 0 });
        assert_eq!(policy.state_at(5000), PlaybackState::Looping { iteration: 1 });
        assert_eq!(policy.state_at(8999), PlaybackState::Looping { iteration: 1 });
        assert_eq!(policy.state_at(9000), PlaybackState::PostLoopTail);
        assert_eq!(policy.state_at(10_000), PlaybackState::Done);

        // first arrival at the loop end jumps, the second one plays through
        assert!(policy.should_jump(5000));
        assert!(!policy.should_jump(9000));
        assert_eq!(
            policy.locate(9500),
            PlayLocation {
                stream_sample: 5500,
                loop_iteration: 1
            }
        );
    }

    #[test]
    fn fractional_tail_continues_from_mid_body() {
        let policy = PlaybackPolicy::resolve(&descriptor(6000, Some((1000, 5000))), &tail_config(1.5)).unwrap();
        assert_eq!(policy.loop_threshold(), Some(7000));
        // stream is at 3000 when the threshold hits: 3000 more to the end
        assert_eq!(policy.effective_total_samples(), Some(10_000));
        assert_eq!(policy.locate(7000).stream_sample, 3000);
    }

    #[test]
    fn fade_mode_length_and_gain() {
        let config = PlaybackConfig {
            loop_count: 1.0,
            fade_time: 2.0,
            fade_delay: 0.5,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&descriptor(3000, Some((1000, 3000))), &config).unwrap();
        assert_eq!(policy.loop_threshold(), Some(3000));
        assert_eq!(policy.fade_window(), Some((3500, 5500)));
        assert_eq!(policy.effective_total_samples(), Some(5500));

        assert_eq!(policy.state_at(3200), PlaybackState::Fading);
        assert_relative_eq!(policy.fade_gain(3499), 1.0);
        assert_relative_eq!(policy.fade_gain(3500), 1.0);
        assert_relative_eq!(policy.fade_gain(4500), 0.5);
        assert_relative_eq!(policy.fade_gain(5499), 1.0 / 2000.0);
        assert!(policy.should_jump(4000));
        assert_eq!(policy.locate(4500).stream_sample, 2500);
    }

    #[test]
    fn apply_fade_only_touches_the_window() {
        let config = PlaybackConfig {
            loop_count: 1.0,
            fade_time: 0.004,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&descriptor(10, Some((0, 10))), &config).unwrap();
        assert_eq!(policy.fade_window(), Some((10, 14)));

        let mut samples = vec![1000i16; 2 * 4];
        policy.apply_fade(&mut samples, 2, 8);
        assert_eq!(samples, vec![1000, 1000, 1000, 1000, 1000, 1000, 750, 750]);
    }

    #[test]
    fn forced_loops_and_ignore_loop_precedence() {
        let plain = descriptor(2000, None);
        let native = descriptor(2000, Some((500, 1500)));

        let force = PlaybackConfig {
            force_loop: true,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&plain, &force).unwrap();
        assert_eq!(policy.loop_region(), Some(LoopPoints { start: 0, end: 2000 }));
        // force_loop keeps native loop points
        let policy = PlaybackPolicy::resolve(&native, &force).unwrap();
        assert_eq!(policy.loop_region(), Some(LoopPoints { start: 500, end: 1500 }));

        let really = PlaybackConfig {
            really_force_loop: true,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&native, &really).unwrap();
        assert_eq!(policy.loop_region(), Some(LoopPoints { start: 0, end: 2000 }));

        let ignore = PlaybackConfig {
            really_force_loop: true,
            ignore_loop: true,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&native, &ignore).unwrap();
        assert_eq!(policy.loop_region(), None);
        assert_eq!(policy.effective_total_samples(), Some(2000));
    }

    #[test]
    fn play_forever_needs_a_loop() {
        let forever = PlaybackConfig {
            play_forever: true,
            ..Default::default()
        };
        assert!(matches!(
            PlaybackPolicy::resolve(&descriptor(100, None), &forever),
            Err(StreamError::ConfigConflict(_))
        ));

        let policy = PlaybackPolicy::resolve(&descriptor(100, Some((10, 90))), &forever).unwrap();
        assert!(policy.plays_forever());
        assert_eq!(policy.effective_total_samples(), None);
        assert_eq!(policy.state_at(1_000_000), PlaybackState::Looping { iteration: 12_499 });
        assert_eq!(policy.fade_gain(1_000_000), 1.0);
    }

    #[test]
    fn empty_loop_is_dropped() {
        let policy =
            PlaybackPolicy::resolve(&descriptor(100, Some((40, 40))), &PlaybackConfig::default()).unwrap();
        assert_eq!(policy.loop_region(), None);
        assert_eq!(policy.effective_total_samples(), Some(100));
    }

    #[test]
    fn invalid_config_is_a_conflict() {
        let config = PlaybackConfig {
            fade_time: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            PlaybackPolicy::resolve(&descriptor(100, None), &config),
            Err(StreamError::ConfigConflict(_))
        ));
    }

    #[test]
    fn huge_loop_count_saturates() {
        let policy =
            PlaybackPolicy::resolve(&descriptor(6000, Some((1000, 5000))), &tail_config(1e300)).unwrap();
        assert_eq!(policy.loop_threshold(), Some(usize::MAX));
        assert_eq!(policy.effective_total_samples(), Some(usize::MAX));
        let iteration = (usize::MAX - 1 - 1000) / 4000;
        assert_eq!(policy.state_at(usize::MAX - 1), PlaybackState::Looping { iteration });
        assert!(policy.should_jump(5000));

        let config = PlaybackConfig {
            loop_count: 1e300,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&descriptor(6000, Some((1000, 5000))), &config).unwrap();
        assert_eq!(policy.effective_total_samples(), Some(usize::MAX));
        assert_eq!(policy.fade_window(), Some((usize::MAX, usize::MAX)));
        assert_relative_eq!(policy.fade_gain(1_000_000), 1.0);
    }

    #[test]
    fn huge_fade_time_saturates() {
        let config = PlaybackConfig {
            loop_count: 1.0,
            fade_time: 1e17,
            ..Default::default()
        };
        let policy = PlaybackPolicy::resolve(&descriptor(3000, Some((1000, 3000))), &config).unwrap();
        assert_eq!(policy.effective_total_samples(), Some(usize::MAX));
        assert_eq!(policy.fade_window(), Some((3000, usize::MAX)));
        assert_eq!(policy.state_at(usize::MAX), PlaybackState::Done);

        let mut samples = vec![1000i16; 8];
        policy.apply_fade(&mut samples, 2, usize::MAX - 2);
        assert_eq!(samples, vec![0; 8]);
    }

    #[test]
    fn seconds_round_half_away_from_zero() {
        assert_eq!(seconds_to_samples(0.5, 3), 2);
        assert_eq!(seconds_to_samples(10.0, 48000), 480_000);
    }
}
