//! # vgm-render-core
//!
//! Game audio stream engine.
//!
//! Turns a recognized game audio container into correctly ordered, looped,
//! faded and mixed 16-bit PCM. Per-format recognizers implement the
//! `FormatRecognizer` trait and hand a `StreamDescriptor` to the generic
//! `StreamEngine`, which owns decoding, looping, seeking and mixing.
//!
//! ## Architecture
//!
//! ```text
//! vgm-render-core (this crate)
//! ├── traits/       ← StreamFile, FormatRecognizer
//! ├── models/       ← StreamError, StreamDescriptor, ChannelState, PlaybackConfig, PlaybackState, StreamInfo
//! ├── codec/        ← PCM, PS-ADPCM and IMA ADPCM decode adapters
//! ├── processing/   ← decoder tree (layouts), loop & fade policy, MixingGraph, WAV header generation
//! ├── session/      ← StreamEngine (render/seek/reset orchestrator)
//! ├── formats/      ← FormatRegistry, subsong selection, SPM and VAG recognizers
//! └── storage/      ← MemoryStreamFile, WavFileWriter
//! ```

pub mod codec;
pub mod formats;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use codec::CodingKind;
pub use formats::subsong::resolve_subsong;
pub use formats::FormatRegistry;
pub use models::config::PlaybackConfig;
pub use models::descriptor::{ChannelSource, Layout, LayoutKind, LoopPoints, StreamDescriptor};
pub use models::error::StreamError;
pub use models::info::StreamInfo;
pub use models::state::PlaybackState;
pub use processing::loop_policy::PlaybackPolicy;
pub use processing::mixing::MixingGraph;
pub use processing::wav_format::WavSpec;
pub use session::engine::StreamEngine;
pub use storage::memory_file::MemoryStreamFile;
pub use storage::wav_writer::{WavFileWriter, WavSummary};
pub use traits::recognizer::FormatRecognizer;
pub use traits::stream_file::StreamFile;
