use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use vgm_render_core::PlaybackConfig;

/// Decode game audio streams to WAV
#[derive(Parser, Debug, Clone)]
#[command(name = "vgm-render")]
#[command(version)]
#[command(about = "Decode game audio streams to 16-bit PCM WAV", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Input file
    #[arg(value_name = "INFILE", required_unless_present = "version_json")]
    pub infile: Option<PathBuf>,

    /// Output file, default <infile>.wav. Wildcards: ?s subsong, ?0Ns padded
    /// subsong, ?n stream name, ?f infile
    #[arg(short = 'o', value_name = "OUTFILE")]
    pub outfile: Option<String>,

    /// Loop count
    #[arg(short = 'l', value_name = "N", default_value_t = 2.0)]
    pub loop_count: f64,

    /// Fade time in seconds after the loops
    #[arg(short = 'f', value_name = "SECONDS", default_value_t = 10.0)]
    pub fade_time: f64,

    /// Fade delay in seconds
    #[arg(short = 'd', value_name = "SECONDS", default_value_t = 0.0)]
    pub fade_delay: f64,

    /// Don't fade after the loops; play the rest of the stream
    #[arg(short = 'F')]
    pub ignore_fade: bool,

    /// Ignore looping information and play the stream once
    #[arg(short = 'i')]
    pub ignore_loop: bool,

    /// Force end-to-end looping
    #[arg(short = 'e')]
    pub force_loop: bool,

    /// Force end-to-end looping even over real loop points
    #[arg(short = 'E')]
    pub really_force_loop: bool,

    /// Select subsong N, if the format has several
    #[arg(short = 's', value_name = "N", default_value_t = 0)]
    pub subsong: usize,

    /// Print metadata only, don't decode
    #[arg(short = 'm')]
    pub metadata_only: bool,

    /// Append a smpl chunk and write a looping wav (decodes without looping)
    #[arg(short = 'L')]
    pub loop_wav: bool,

    /// Only output the Nth (first is 0) pair of stereo channels
    #[arg(short = '2', value_name = "N")]
    pub stereo_pair: Option<usize>,

    /// Output to stdout
    #[arg(short = 'p')]
    pub stdout: bool,

    /// Output to stdout even if stdout is a terminal
    #[arg(short = 'P')]
    pub stdout_anyway: bool,

    /// Loop forever to stdout
    #[arg(short = 'c')]
    pub play_forever: bool,

    /// Print stream info as JSON
    #[arg(short = 'I')]
    pub json_info: bool,

    /// Print version and supported extensions as JSON
    #[arg(short = 'V')]
    pub version_json: bool,

    /// Fail unless the input extension is supported
    #[arg(short = 'v')]
    pub validate_extension: bool,

    /// Decode a second file after resetting and compare
    #[arg(short = 'r')]
    pub test_reset: bool,

    /// Seek to N samples before decoding (below -1: loop start)
    #[arg(short = 'k', value_name = "N", allow_negative_numbers = true)]
    pub seek: Option<i64>,

    /// Seek again to N samples before decoding
    #[arg(short = 'K', value_name = "N", allow_negative_numbers = true)]
    pub seek_again: Option<i64>,

    /// Downmix to at most N channels
    #[arg(short = 'D', value_name = "CHANNELS")]
    pub downmix: Option<usize>,

    /// Decode without writing output
    #[arg(short = 'O')]
    pub decode_only: bool,
}

/// Option combinations rejected before anything is opened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("refusing to write wave data to a terminal; use -P instead of -p")]
    TerminalOutput,

    #[error("-c must be used with -p or -P")]
    ForeverNeedsStdout,

    #[error("use either -p or -o")]
    StdoutWithOutfile,

    #[error("-r needs file output")]
    ResetNeedsFile,

    #[error("same infile and outfile name: {0}")]
    SameInOut(String),

    #[error("unsupported extension: {0}")]
    UnsupportedExtension(String),
}

impl Cli {
    pub fn to_stdout(&self) -> bool {
        self.stdout || self.stdout_anyway
    }

    /// `-I` implies `-m`.
    pub fn metadata_only(&self) -> bool {
        self.metadata_only || self.json_info
    }

    pub fn validate(&self, stdout_is_terminal: bool) -> Result<(), UsageError> {
        if self.stdout && !self.stdout_anyway && stdout_is_terminal {
            return Err(UsageError::TerminalOutput);
        }
        if self.play_forever && !self.to_stdout() {
            return Err(UsageError::ForeverNeedsStdout);
        }
        if self.to_stdout() && self.outfile.is_some() {
            return Err(UsageError::StdoutWithOutfile);
        }
        if self.test_reset && self.to_stdout() {
            return Err(UsageError::ResetNeedsFile);
        }
        Ok(())
    }

    /// Playback options for the engine. `-L` decodes without looping so the
    /// loop can live in the smpl chunk instead.
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            loop_count: self.loop_count,
            fade_time: self.fade_time,
            fade_delay: self.fade_delay,
            ignore_fade: self.ignore_fade,
            ignore_loop: self.ignore_loop || self.loop_wav,
            force_loop: self.force_loop,
            really_force_loop: self.really_force_loop,
            play_forever: self.play_forever,
            downmix_target_channels: self.downmix.filter(|&n| n > 0),
            stereo_pair: self.stereo_pair,
        }
    }
}
