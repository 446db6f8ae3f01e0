pub mod recognizer;
pub mod stream_file;
