pub mod memory_file;
pub mod wav_writer;
