/// Tagged binary codec: tags, encoder, decoder, records, dynamic values.
pub mod codec;
/// Decoder limits loaded from defaults and `ZBIN_*` environment variables.
pub mod config;
/// Decoding of value streams for the `zbin-dump` tool.
pub mod dump;
/// Logging setup (tracing-subscriber).
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Encoding and decoding entry points.
pub use codec::{
    decode, decode_element, decode_element_to_dynamic, decode_to_dynamic, encode, encode_indexed,
    encode_ref, ArrayElement, Decode, Decoder, Encode, Encoder, FieldSlot, Reader, Record, Tag,
    Value,
};
/// Decoder limits.
pub use config::CodecConfig;
/// Codec errors and result types.
pub use zbin_error::{CodecError, CodecResult, StackError, ZbinResult};
