//! Самоописывающий бинарный формат с тегами.

pub mod collections;
pub mod decode;
pub mod encode;
pub mod reader;
pub mod record;
pub mod tags;
pub mod value;

pub use collections::ArrayElement;
pub use decode::{
    decode, decode_element, decode_element_to_dynamic, decode_to_dynamic, Decode, Decoder,
};
pub use encode::{encode, encode_indexed, encode_ref, Encode, Encoder};
pub use reader::Reader;
pub use record::{decode_record, decode_record_into, encode_record, FieldSlot, Record};
pub use tags::Tag;
pub use value::Value;
