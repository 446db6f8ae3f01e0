pub mod layout;
pub mod loop_policy;
pub mod mixing;
pub mod wav_format;
