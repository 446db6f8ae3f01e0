//! # vgm-render-cli
//!
//! Command-line front end for vgm-render-core.
//!
//! Provides:
//! - `Cli`: option parsing and conflict checks
//! - `StdioStreamFile`: `StreamFile` over local files
//! - `output`: output naming and PCM sinks (WAV file, stdout, discard)
//! - `report`: text and JSON stream descriptions
//! - `runner::run`: open, describe, seek, decode, and the reset check
//!
//! ## Usage
//! ```text
//! vgm-render -o ?n_?02s.wav -l 2 -f 10 bgm.spm
//! vgm-render -I bank.vag
//! vgm-render -p -c bgm.spm | aplay
//! ```

pub mod cli;
pub mod output;
pub mod report;
pub mod runner;
pub mod stdio_file;

pub use cli::{Cli, UsageError};
pub use runner::run;
pub use stdio_file::StdioStreamFile;
