//! Декодирование бинарного формата в типизированные приёмники и в
//! динамический [`Value`].
//!
//! Декодер никогда не читает за пределами переданного буфера: каждое чтение
//! проверяется через [`Reader`], а заявленные количества элементов
//! сверяются с остатком буфера до выделения памяти.

use std::time::Duration as StdDuration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};
use zbin_error::{CodecError, CodecResult};

use super::{
    reader::{incompatible, Reader},
    tags::Tag,
    value::Value,
};
use crate::config::CodecConfig;

/// Тип, который можно прочитать из бинарного формата.
pub trait Decode: Sized {
    /// Читает одно значение начиная с текущей позиции.
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self>;

    /// Перезаписывает `self` прочитанным значением. Записи переопределяют
    /// этот метод, чтобы заполнять поля по одному и сохранять отсутствующие
    /// в потоке поля.
    fn decode_into(
        &mut self,
        r: &mut Reader<'_>,
    ) -> CodecResult<()> {
        *self = Self::decode(r)?;
        Ok(())
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        T::decode(r).map(Box::new)
    }

    fn decode_into(
        &mut self,
        r: &mut Reader<'_>,
    ) -> CodecResult<()> {
        (**self).decode_into(r)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Полезные нагрузки
////////////////////////////////////////////////////////////////////////////////

/// Строка до терминатора. Обрыв до `0x00` даёт `UnterminatedString`.
pub(crate) fn read_string_payload(r: &mut Reader<'_>) -> CodecResult<String> {
    let offset = r.position();
    let raw = r
        .read_cstr()
        .ok_or(CodecError::UnterminatedString { offset })?;
    let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 { offset })?;
    Ok(s.to_owned())
}

/// Блоб: длина u32 и байты.
pub(crate) fn read_bytes_payload(r: &mut Reader<'_>) -> CodecResult<Bytes> {
    let len = r.read_u32()? as usize;
    if len > r.max_bytes_len() {
        return Err(CodecError::LengthOverflow {
            what: "bytes",
            len,
            max: r.max_bytes_len(),
        });
    }
    Ok(Bytes::copy_from_slice(r.read_bytes(len)?))
}

/// Числовое значение с провода до приведения к типу приёмника.
enum Number {
    Signed(i64),
    Unsigned(u64),
    F32(f32),
    F64(f64),
}

/// Читает тег и числовую нагрузку. Нечисловой тег даёт `IncompatibleType`.
fn read_number(
    r: &mut Reader<'_>,
    expected: &'static str,
) -> CodecResult<(Tag, usize, Number)> {
    let offset = r.position();
    let tag = r.read_value_tag()?;
    let number = match tag {
        Tag::Uint8 => Number::Unsigned(u64::from(r.read_u8()?)),
        Tag::Uint16 => Number::Unsigned(u64::from(r.read_u16()?)),
        Tag::Uint32 => Number::Unsigned(u64::from(r.read_u32()?)),
        Tag::Uint64 | Tag::Uint => Number::Unsigned(r.read_u64()?),
        Tag::Int8 => Number::Signed(i64::from(r.read_i8()?)),
        Tag::Int16 => Number::Signed(i64::from(r.read_i16()?)),
        Tag::Int32 => Number::Signed(i64::from(r.read_i32()?)),
        Tag::Int64 | Tag::Int => Number::Signed(r.read_i64()?),
        Tag::Float32 => Number::F32(r.read_f32()?),
        Tag::Float64 => Number::F64(r.read_f64()?),
        other => return Err(incompatible(expected, other, offset)),
    };
    Ok((tag, offset, number))
}

/// Читает тег и требует точного совпадения.
fn expect_tag(
    r: &mut Reader<'_>,
    want: Tag,
    expected: &'static str,
) -> CodecResult<()> {
    let offset = r.position();
    let tag = r.read_value_tag()?;
    if tag != want {
        return Err(incompatible(expected, tag, offset));
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Скаляры
////////////////////////////////////////////////////////////////////////////////

// Любой целочисленный тег приводится к целому приёмнику через `TryFrom`;
// значение вне диапазона даёт `IncompatibleType`.
macro_rules! impl_decode_int {
    ($($ty:ty),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
                let (tag, offset, number) = read_number(r, stringify!($ty))?;
                let converted = match number {
                    Number::Signed(v) => <$ty>::try_from(v).ok(),
                    Number::Unsigned(v) => <$ty>::try_from(v).ok(),
                    Number::F32(_) | Number::F64(_) => None,
                };
                converted.ok_or_else(|| incompatible(stringify!($ty), tag, offset))
            }
        }
    )*};
}

impl_decode_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Decode for f32 {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        match read_number(r, "f32")? {
            (_, _, Number::F32(v)) => Ok(v),
            (tag, offset, _) => Err(incompatible("f32", tag, offset)),
        }
    }
}

impl Decode for f64 {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        match read_number(r, "f64")? {
            (_, _, Number::F32(v)) => Ok(f64::from(v)),
            (_, _, Number::F64(v)) => Ok(v),
            (tag, offset, _) => Err(incompatible("f64", tag, offset)),
        }
    }
}

impl Decode for bool {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_tag(r, Tag::Bool, "bool")?;
        Ok(r.read_u8()? != 0)
    }
}

impl Decode for String {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_tag(r, Tag::String, "String")?;
        read_string_payload(r)
    }
}

impl Decode for Bytes {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_tag(r, Tag::Bytes, "Bytes")?;
        read_bytes_payload(r)
    }
}

impl Decode for DateTime<Utc> {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_tag(r, Tag::Timestamp, "DateTime<Utc>")?;
        Ok(DateTime::from_timestamp_nanos(r.read_i64()?))
    }
}

impl Decode for TimeDelta {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_tag(r, Tag::Duration, "TimeDelta")?;
        Ok(TimeDelta::nanoseconds(r.read_i64()?))
    }
}

/// Отрицательная длительность не представима в `std::time::Duration`.
impl Decode for StdDuration {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        let offset = r.position();
        expect_tag(r, Tag::Duration, "std::time::Duration")?;
        let nanos = r.read_i64()?;
        u64::try_from(nanos)
            .map(StdDuration::from_nanos)
            .map_err(|_| incompatible("std::time::Duration", Tag::Duration, offset))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Decoder
////////////////////////////////////////////////////////////////////////////////

/// Декодер верхнего уровня с лимитами из [`CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: CodecConfig,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn reader<'a>(
        &self,
        buf: &'a [u8],
    ) -> Reader<'a> {
        Reader::with_config(buf, &self.config)
    }

    /// Декодирует одно значение из начала `buf` в `dst` и возвращает
    /// количество прочитанных байт. Хвост буфера за значением игнорируется.
    pub fn decode<T: Decode>(
        &self,
        buf: &[u8],
        dst: &mut T,
    ) -> CodecResult<usize> {
        let mut r = self.reader(buf);
        let tag = buf.first().copied().and_then(Tag::from_byte).map(Tag::name);
        match dst.decode_into(&mut r) {
            Ok(()) => {
                trace!(tag, consumed = r.position(), "decoded value");
                Ok(r.position())
            }
            Err(err) => {
                debug!(tag, error = %err, "decode rejected");
                Err(err)
            }
        }
    }

    /// Декодирует одно значение в [`Value`], тип определяется тегом.
    pub fn decode_to_dynamic(
        &self,
        buf: &[u8],
    ) -> CodecResult<Value> {
        self.decode_value(buf).map(|(value, _)| value)
    }

    /// Как [`Decoder::decode_to_dynamic`], но дополнительно возвращает
    /// количество прочитанных байт.
    pub fn decode_value(
        &self,
        buf: &[u8],
    ) -> CodecResult<(Value, usize)> {
        let mut value = Value::default();
        let consumed = self.decode(buf, &mut value)?;
        Ok((value, consumed))
    }

    /// Декодирует элемент в обёртке `ElementValue`/`ElementRef`.
    ///
    /// Возвращает признак ссылки и количество прочитанных байт, включая
    /// байт обёртки. Для ссылки приёмник получает строковый идентификатор.
    pub fn decode_element<T: Decode>(
        &self,
        buf: &[u8],
        dst: &mut T,
    ) -> CodecResult<(bool, usize)> {
        let mut r = self.reader(buf);
        let is_ref = read_element_kind(&mut r)?;

        let offset = r.position();
        let first = r.peek_u8()?;
        let tag = match Tag::from_byte(first) {
            Some(tag) if tag.is_scalar() || tag == Tag::Bytes => tag,
            Some(tag) if tag.is_value() => {
                debug!(tag = tag.name(), "element wrapper around an aggregate");
                return Err(incompatible("scalar element", tag, offset));
            }
            _ => return Err(CodecError::InvalidTag { tag: first, offset }),
        };

        dst.decode_into(&mut r)?;
        let consumed = r.position();
        trace!(is_ref, tag = tag.name(), consumed, "decoded element");
        Ok((is_ref, consumed))
    }

    /// Декодирует элемент в [`Value`].
    pub fn decode_element_to_dynamic(
        &self,
        buf: &[u8],
    ) -> CodecResult<(Value, bool)> {
        let mut value = Value::default();
        let (is_ref, _) = self.decode_element(buf, &mut value)?;
        Ok((value, is_ref))
    }

    /// Элемент вместе с количеством прочитанных байт.
    pub fn decode_element_value(
        &self,
        buf: &[u8],
    ) -> CodecResult<(Value, bool, usize)> {
        let mut value = Value::default();
        let (is_ref, consumed) = self.decode_element(buf, &mut value)?;
        Ok((value, is_ref, consumed))
    }
}

/// Первый байт элемента: `ElementValue` или `ElementRef`.
fn read_element_kind(r: &mut Reader<'_>) -> CodecResult<bool> {
    match r.read_u8()? {
        b if b == Tag::ElementValue.byte() => Ok(false),
        b if b == Tag::ElementRef.byte() => Ok(true),
        found => {
            debug!(found, "invalid element kind");
            Err(CodecError::InvalidElementKind { found })
        }
    }
}

/// Декодирует значение из начала `buf` с лимитами по умолчанию.
pub fn decode<T: Decode>(
    buf: &[u8],
    dst: &mut T,
) -> CodecResult<usize> {
    Decoder::new().decode(buf, dst)
}

pub fn decode_to_dynamic(buf: &[u8]) -> CodecResult<Value> {
    Decoder::new().decode_to_dynamic(buf)
}

pub fn decode_element<T: Decode>(
    buf: &[u8],
    dst: &mut T,
) -> CodecResult<(bool, usize)> {
    Decoder::new().decode_element(buf, dst)
}

pub fn decode_element_to_dynamic(buf: &[u8]) -> CodecResult<(Value, bool)> {
    Decoder::new().decode_element_to_dynamic(buf)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
