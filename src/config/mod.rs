mod settings;

pub use settings::{CodecConfig, DEFAULT_MAX_BYTES_LEN, DEFAULT_MAX_DEPTH};
