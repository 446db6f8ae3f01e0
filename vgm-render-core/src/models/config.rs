/// Playback options applied on top of a recognized stream.
///
/// Loop points come from the descriptor; these options decide how many times
/// the loop body plays, how the stream ends, and how channels are reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Number of loop body passes before the ending phase (default: 2.0).
    /// Fractional values play a partial final pass.
    pub loop_count: f64,

    /// Fade-out length in seconds (default: 10.0).
    pub fade_time: f64,

    /// Seconds of full-volume looping after the loop count is reached and
    /// before the fade starts (default: 0.0).
    pub fade_delay: f64,

    /// Skip the fade and play the remainder of the stream after the last loop.
    pub ignore_fade: bool,

    /// Drop native loop points and play the stream once.
    pub ignore_loop: bool,

    /// Loop the whole stream when it has no native loop.
    pub force_loop: bool,

    /// Loop the whole stream even over native loop points.
    pub really_force_loop: bool,

    /// Loop without end. Requires a loop-capable stream.
    pub play_forever: bool,

    /// Reduce output to this many channels.
    pub downmix_target_channels: Option<usize>,

    /// Output only channels `[2k, 2k+1]` after downmixing.
    pub stereo_pair: Option<usize>,
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.loop_count.is_finite() || self.loop_count < 0.0 {
            return Err(format!("loop count must be a non-negative number: {}", self.loop_count));
        }
        if !self.fade_time.is_finite() || self.fade_time < 0.0 {
            return Err(format!("fade time must be a non-negative number: {}", self.fade_time));
        }
        if !self.fade_delay.is_finite() || self.fade_delay < 0.0 {
            return Err(format!("fade delay must be a non-negative number: {}", self.fade_delay));
        }
        if self.downmix_target_channels == Some(0) {
            return Err("downmix target must be at least 1 channel".into());
        }
        Ok(())
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_count: 2.0,
            fade_time: 10.0,
            fade_delay: 0.0,
            ignore_fade: false,
            ignore_loop: false,
            force_loop: false,
            really_force_loop: false,
            play_forever: false,
            downmix_target_channels: None,
            stereo_pair: None,
        }
    }
}
