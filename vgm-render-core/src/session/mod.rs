pub(crate) mod cursor;
pub mod engine;
