//! Динамическое значение: по одному варианту на каждый вид данных формата.
//!
//! Используется, когда тип данных заранее неизвестен: декодер выбирает
//! вариант по тегу на проводе.

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize, Serializer,
};
use zbin_error::{CodecError, CodecResult};

use super::{
    collections::{read_array_body, read_map_body},
    decode::{read_bytes_payload, read_string_payload, Decode},
    encode::{put_array_header, put_bytes, put_int, put_map, put_string, put_uint, Encode},
    reader::{incompatible, Reader},
    record::{put_field, put_struct_header, read_struct_body},
    tags::Tag,
};

/// Значение произвольного вида.
///
/// `Map` сохраняет порядок вставки; равный ключ заменяет значение ранее
/// вставленной записи. В `Record` так же ведут себя повторные имена полей.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Целое платформенной ширины (`Tag::Int`).
    Int(i64),
    /// Беззнаковое платформенной ширины (`Tag::Uint`).
    Uint(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
    IntArray(Vec<i64>),
    UintArray(Vec<u64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    BoolArray(Vec<bool>),
    StrArray(Vec<String>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Vec<(String, Value)>),
}

/// Пустой массив.
impl Default for Value {
    fn default() -> Self {
        Value::Array(Vec::new())
    }
}

impl Value {
    /// Тег, с которого начинается закодированное значение.
    pub fn tag(&self) -> Tag {
        match self {
            Value::U8(_) => Tag::Uint8,
            Value::U16(_) => Tag::Uint16,
            Value::U32(_) => Tag::Uint32,
            Value::U64(_) => Tag::Uint64,
            Value::I8(_) => Tag::Int8,
            Value::I16(_) => Tag::Int16,
            Value::I32(_) => Tag::Int32,
            Value::I64(_) => Tag::Int64,
            Value::Int(_) => Tag::Int,
            Value::Uint(_) => Tag::Uint,
            Value::F32(_) => Tag::Float32,
            Value::F64(_) => Tag::Float64,
            Value::Bool(_) => Tag::Bool,
            Value::Str(_) => Tag::String,
            Value::Bytes(_) => Tag::Bytes,
            Value::Timestamp(_) => Tag::Timestamp,
            Value::Duration(_) => Tag::Duration,
            Value::IntArray(_) => Tag::ArrayInt,
            Value::UintArray(_) => Tag::ArrayUint,
            Value::F32Array(_) => Tag::ArrayFloat32,
            Value::F64Array(_) => Tag::ArrayFloat,
            Value::BoolArray(_) => Tag::ArrayBool,
            Value::StrArray(_) => Tag::ArrayString,
            Value::Array(_) => Tag::Array,
            Value::Map(_) => Tag::Map,
            Value::Record(_) => Tag::Struct,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.tag().is_scalar()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Любое целое, представимое в i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::U8(v) => Some(i64::from(v)),
            Value::U16(v) => Some(i64::from(v)),
            Value::U32(v) => Some(i64::from(v)),
            Value::U64(v) | Value::Uint(v) => i64::try_from(v).ok(),
            Value::I8(v) => Some(i64::from(v)),
            Value::I16(v) => Some(i64::from(v)),
            Value::I32(v) => Some(i64::from(v)),
            Value::I64(v) | Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Поле записи или значение по строковому ключу отображения.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == key).map(|(_, v)| v),
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Вставка в `Map` с заменой значения для равного ключа. Для других
    /// вариантов ничего не делает и возвращает `false`.
    pub fn insert(
        &mut self,
        key: Value,
        value: Value,
    ) -> bool {
        let Value::Map(entries) = self else {
            return false;
        };
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
        true
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

impl_from! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Str,
    Bytes => Bytes,
    DateTime<Utc> => Timestamp,
    TimeDelta => Duration,
    Vec<Value> => Array,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Uint(v as u64)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Кодирование
////////////////////////////////////////////////////////////////////////////////

impl Encode for Value {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        match self {
            Value::U8(v) => v.encode_to(out),
            Value::U16(v) => v.encode_to(out),
            Value::U32(v) => v.encode_to(out),
            Value::U64(v) => v.encode_to(out),
            Value::I8(v) => v.encode_to(out),
            Value::I16(v) => v.encode_to(out),
            Value::I32(v) => v.encode_to(out),
            Value::I64(v) => v.encode_to(out),
            Value::Int(v) => {
                put_int(out, *v);
                Ok(())
            }
            Value::Uint(v) => {
                put_uint(out, *v);
                Ok(())
            }
            Value::F32(v) => v.encode_to(out),
            Value::F64(v) => v.encode_to(out),
            Value::Bool(v) => v.encode_to(out),
            Value::Str(s) => put_string(out, s),
            Value::Bytes(b) => put_bytes(out, b),
            Value::Timestamp(t) => t.encode_to(out),
            Value::Duration(d) => d.encode_to(out),
            Value::IntArray(items) => {
                put_array_header(out, Tag::ArrayInt, items.len())?;
                for v in items {
                    put_int(out, *v);
                }
                Ok(())
            }
            Value::UintArray(items) => {
                put_array_header(out, Tag::ArrayUint, items.len())?;
                for v in items {
                    put_uint(out, *v);
                }
                Ok(())
            }
            Value::F32Array(items) => items.encode_to(out),
            Value::F64Array(items) => items.encode_to(out),
            Value::BoolArray(items) => items.encode_to(out),
            Value::StrArray(items) => items.encode_to(out),
            Value::Array(items) => items.encode_to(out),
            Value::Map(entries) => put_map(out, entries.len(), entries.iter().map(|(k, v)| (k, v))),
            Value::Record(fields) => {
                put_struct_header(out, fields.len())?;
                for (name, value) in fields {
                    put_field(out, name, value)?;
                }
                Ok(())
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Декодирование
////////////////////////////////////////////////////////////////////////////////

impl Decode for Value {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        let offset = r.position();
        let tag = r.read_value_tag()?;
        let value = match tag {
            Tag::Uint8 => Value::U8(r.read_u8()?),
            Tag::Uint16 => Value::U16(r.read_u16()?),
            Tag::Uint32 => Value::U32(r.read_u32()?),
            Tag::Uint64 => Value::U64(r.read_u64()?),
            Tag::Int8 => Value::I8(r.read_i8()?),
            Tag::Int16 => Value::I16(r.read_i16()?),
            Tag::Int32 => Value::I32(r.read_i32()?),
            Tag::Int64 => Value::I64(r.read_i64()?),
            Tag::Int => Value::Int(r.read_i64()?),
            Tag::Uint => Value::Uint(r.read_u64()?),
            Tag::Float32 => Value::F32(r.read_f32()?),
            Tag::Float64 => Value::F64(r.read_f64()?),
            Tag::Bool => Value::Bool(r.read_u8()? != 0),
            Tag::String => Value::Str(read_string_payload(r)?),
            Tag::Bytes => Value::Bytes(read_bytes_payload(r)?),
            Tag::Timestamp => Value::Timestamp(DateTime::from_timestamp_nanos(r.read_i64()?)),
            Tag::Duration => Value::Duration(TimeDelta::nanoseconds(r.read_i64()?)),
            Tag::ArrayInt => Value::IntArray(read_exact_elements(r, tag)?),
            Tag::ArrayUint => Value::UintArray(read_exact_elements(r, tag)?),
            Tag::ArrayFloat32 => Value::F32Array(read_exact_elements(r, tag)?),
            Tag::ArrayFloat => Value::F64Array(read_exact_elements(r, tag)?),
            Tag::ArrayBool => Value::BoolArray(read_exact_elements(r, tag)?),
            Tag::ArrayString => Value::StrArray(read_exact_elements(r, tag)?),
            Tag::Array => Value::Array(read_array_body(r, Value::decode)?),
            Tag::Map => Value::Map(read_dynamic_map(r)?),
            Tag::Struct => Value::Record(read_dynamic_record(r)?),
            other => {
                return Err(CodecError::InvalidTag {
                    tag: other.byte(),
                    offset,
                })
            }
        };
        Ok(value)
    }
}

/// Каждый элемент однородного массива должен нести ровно тег элемента
/// этого массива.
fn read_exact_elements<T: Decode>(
    r: &mut Reader<'_>,
    array: Tag,
) -> CodecResult<Vec<T>> {
    let element = array.element_tag();
    read_array_body(r, |r| {
        let offset = r.position();
        match Tag::from_byte(r.peek_u8()?) {
            Some(found) if found.is_value() && Some(found) != element => Err(incompatible(
                element.map_or(array.name(), Tag::name),
                found,
                offset,
            )),
            _ => T::decode(r),
        }
    })
}

/// Ключи сравниваются по каноническому кодированию декодированного ключа:
/// `Bool` с байтом `0x02` и `Bool` с байтом `0x01` считаются одним ключом.
fn read_dynamic_map(r: &mut Reader<'_>) -> CodecResult<Vec<(Value, Value)>> {
    let mut entries: Vec<(Value, Value)> = Vec::new();
    let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
    read_map_body(r, |key: Value, value: Value| {
        let mut canonical = Vec::new();
        key.encode_to(&mut canonical)?;
        match index.get(&canonical) {
            Some(&i) => {
                if let Some(slot) = entries.get_mut(i) {
                    slot.1 = value;
                }
            }
            None => {
                index.insert(canonical, entries.len());
                entries.push((key, value));
            }
        }
        Ok(())
    })?;
    Ok(entries)
}

fn read_dynamic_record<'a>(r: &mut Reader<'a>) -> CodecResult<Vec<(String, Value)>> {
    let mut fields: Vec<(String, Value)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    read_struct_body(
        r,
        |name, _| Ok(name),
        |name, r| {
            let value = Value::decode(r)?;
            match index.get(name) {
                Some(&i) => {
                    if let Some(slot) = fields.get_mut(i) {
                        slot.1 = value;
                    }
                }
                None => {
                    index.insert(name, fields.len());
                    fields.push((name.to_owned(), value));
                }
            }
            Ok(())
        },
    )?;
    Ok(fields)
}

////////////////////////////////////////////////////////////////////////////////
// Display / Serialize
////////////////////////////////////////////////////////////////////////////////

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) | Value::Uint(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) | Value::Int(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Timestamp(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => write!(f, "{d}"),
            Value::IntArray(v) => write_list(f, v),
            Value::UintArray(v) => write_list(f, v),
            Value::F32Array(v) => write_list(f, v),
            Value::F64Array(v) => write_list(f, v),
            Value::BoolArray(v) => write_list(f, v),
            Value::StrArray(v) => {
                let quoted: Vec<String> = v.iter().map(|s| format!("{s:?}")).collect();
                write_list(f, &quoted)
            }
            Value::Array(v) => write_list(f, v),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// JSON-представление для инструментов: `Map` сериализуется списком пар,
/// так как ключи могут быть нестроковыми, а `Duration` числом наносекунд.
impl Serialize for Value {
    fn serialize<S: Serializer>(
        &self,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            Value::U8(v) => s.serialize_u8(*v),
            Value::U16(v) => s.serialize_u16(*v),
            Value::U32(v) => s.serialize_u32(*v),
            Value::U64(v) | Value::Uint(v) => s.serialize_u64(*v),
            Value::I8(v) => s.serialize_i8(*v),
            Value::I16(v) => s.serialize_i16(*v),
            Value::I32(v) => s.serialize_i32(*v),
            Value::I64(v) | Value::Int(v) => s.serialize_i64(*v),
            Value::F32(v) => s.serialize_f32(*v),
            Value::F64(v) => s.serialize_f64(*v),
            Value::Bool(v) => s.serialize_bool(*v),
            Value::Str(v) => s.serialize_str(v),
            Value::Bytes(v) => s.serialize_bytes(v),
            Value::Timestamp(t) => t.serialize(s),
            Value::Duration(d) => match d.num_nanoseconds() {
                Some(nanos) => s.serialize_i64(nanos),
                None => s.collect_str(d),
            },
            Value::IntArray(v) => v.serialize(s),
            Value::UintArray(v) => v.serialize(s),
            Value::F32Array(v) => v.serialize(s),
            Value::F64Array(v) => v.serialize(s),
            Value::BoolArray(v) => v.serialize(s),
            Value::StrArray(v) => v.serialize(s),
            Value::Array(v) => v.serialize(s),
            Value::Map(entries) => {
                let mut seq = s.serialize_seq(Some(entries.len()))?;
                for (k, v) in entries {
                    seq.serialize_element(&(k, v))?;
                }
                seq.end()
            }
            Value::Record(fields) => {
                let mut map = s.serialize_map(Some(fields.len()))?;
                for (name, v) in fields {
                    map.serialize_entry(name, v)?;
                }
                map.end()
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
