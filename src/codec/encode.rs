//! Кодирование значений в самоописывающий бинарный формат.
//!
//! Каждый тип, который умеет записывать себя, реализует [`Encode`]: запись
//! начинается с тега и продолжается полезной нагрузкой в little-endian.
//! [`Encoder`] добавляет поверх этого обёртки элементов (`ElementValue` и
//! `ElementRef`).

use std::time::Duration as StdDuration;

use bytes::{BufMut, Bytes};
use chrono::{DateTime, TimeDelta, TimeZone};
use tracing::{debug, trace};
use zbin_error::{CodecError, CodecResult};

use super::tags::Tag;

/// Тип, который можно записать в бинарном формате.
pub trait Encode {
    /// Дописывает закодированное значение (тег + нагрузка) в `out`.
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        (**self).encode_to(out)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        (**self).encode_to(out)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Примитивы записи
////////////////////////////////////////////////////////////////////////////////

pub(crate) fn put_tag(
    out: &mut Vec<u8>,
    tag: Tag,
) {
    out.put_u8(tag.byte());
}

/// `Int`: целое платформенной ширины, всегда 8 байт.
pub(crate) fn put_int(
    out: &mut Vec<u8>,
    v: i64,
) {
    put_tag(out, Tag::Int);
    out.put_i64_le(v);
}

/// `Uint`: беззнаковое платформенной ширины, всегда 8 байт.
pub(crate) fn put_uint(
    out: &mut Vec<u8>,
    v: u64,
) {
    put_tag(out, Tag::Uint);
    out.put_u64_le(v);
}

/// Байты строки и терминатор, без тега.
pub(crate) fn put_cstr(
    out: &mut Vec<u8>,
    s: &str,
    what: &'static str,
) -> CodecResult<()> {
    if memchr::memchr(0, s.as_bytes()).is_some() {
        return Err(CodecError::EmbeddedNul { what });
    }
    out.put_slice(s.as_bytes());
    out.put_u8(0);
    Ok(())
}

pub(crate) fn put_string(
    out: &mut Vec<u8>,
    s: &str,
) -> CodecResult<()> {
    put_tag(out, Tag::String);
    put_cstr(out, s, "string")
}

pub(crate) fn put_bytes(
    out: &mut Vec<u8>,
    data: &[u8],
) -> CodecResult<()> {
    let len = u32_len("bytes", data.len())?;
    put_tag(out, Tag::Bytes);
    out.put_u32_le(len);
    out.put_slice(data);
    Ok(())
}

/// Заголовок массива: тег и количество элементов (u16).
pub(crate) fn put_array_header(
    out: &mut Vec<u8>,
    tag: Tag,
    len: usize,
) -> CodecResult<()> {
    let count = u16::try_from(len).map_err(|_| CodecError::LengthOverflow {
        what: "array",
        len,
        max: u16::MAX as usize,
    })?;
    put_tag(out, tag);
    out.put_u16_le(count);
    Ok(())
}

pub(crate) fn u32_len(
    what: &'static str,
    len: usize,
) -> CodecResult<u32> {
    u32::try_from(len).map_err(|_| CodecError::LengthOverflow {
        what,
        len,
        max: u32::MAX as usize,
    })
}

/// Записывает отображение из итератора пар. Записи идут в порядке
/// итерации.
pub(crate) fn put_map<'a, K, V, I>(
    out: &mut Vec<u8>,
    len: usize,
    entries: I,
) -> CodecResult<()>
where
    K: Encode + ?Sized + 'a,
    V: Encode + ?Sized + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let count = u32_len("map", len)?;
    put_tag(out, Tag::Map);
    out.put_u32_le(count);
    for (key, value) in entries {
        put_tag(out, Tag::MapKey);
        key.encode_to(out)?;
        put_tag(out, Tag::MapValue);
        value.encode_to(out)?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Скаляры
////////////////////////////////////////////////////////////////////////////////

macro_rules! impl_encode_fixed {
    ($($ty:ty => $tag:ident, $put:ident;)*) => {$(
        impl Encode for $ty {
            fn encode_to(
                &self,
                out: &mut Vec<u8>,
            ) -> CodecResult<()> {
                put_tag(out, Tag::$tag);
                out.$put(*self);
                Ok(())
            }
        }
    )*};
}

impl_encode_fixed! {
    u8 => Uint8, put_u8;
    u16 => Uint16, put_u16_le;
    u32 => Uint32, put_u32_le;
    u64 => Uint64, put_u64_le;
    i8 => Int8, put_i8;
    i16 => Int16, put_i16_le;
    i32 => Int32, put_i32_le;
    i64 => Int64, put_i64_le;
    f32 => Float32, put_f32_le;
    f64 => Float64, put_f64_le;
}

impl Encode for isize {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_int(out, *self as i64);
        Ok(())
    }
}

impl Encode for usize {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_uint(out, *self as u64);
        Ok(())
    }
}

impl Encode for bool {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_tag(out, Tag::Bool);
        out.put_u8(u8::from(*self));
        Ok(())
    }
}

impl Encode for str {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_string(out, self)
    }
}

impl Encode for String {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_string(out, self)
    }
}

impl Encode for Bytes {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_bytes(out, self)
    }
}

/// Момент времени: наносекунды от Unix epoch в UTC. Часовой пояс на
/// проводе не сохраняется.
impl<Tz: TimeZone> Encode for DateTime<Tz> {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        let nanos = self
            .timestamp_nanos_opt()
            .ok_or_else(|| CodecError::UnsupportedType {
                kind: "timestamp",
                reason: format!(
                    "{} is outside the i64 nanosecond range",
                    self.naive_utc()
                ),
            })?;
        put_tag(out, Tag::Timestamp);
        out.put_i64_le(nanos);
        Ok(())
    }
}

impl Encode for TimeDelta {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        let nanos = self
            .num_nanoseconds()
            .ok_or_else(|| CodecError::UnsupportedType {
                kind: "duration",
                reason: format!("{self} is outside the i64 nanosecond range"),
            })?;
        put_tag(out, Tag::Duration);
        out.put_i64_le(nanos);
        Ok(())
    }
}

impl Encode for StdDuration {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        let nanos =
            i64::try_from(self.as_nanos()).map_err(|_| CodecError::UnsupportedType {
                kind: "duration",
                reason: format!("{self:?} is outside the i64 nanosecond range"),
            })?;
        put_tag(out, Tag::Duration);
        out.put_i64_le(nanos);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Encoder и обёртки элементов
////////////////////////////////////////////////////////////////////////////////

/// Кодировщик верхнего уровня. Состояния не хранит, каждый вызов
/// возвращает свежий буфер.
#[derive(Debug, Default, Clone, Copy)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Self
    }

    /// Кодирует значение в новый буфер.
    pub fn encode<T: Encode + ?Sized>(
        &self,
        value: &T,
    ) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(value, &mut out)?;
        Ok(out)
    }

    /// Дописывает значение в существующий буфер, возвращает количество
    /// записанных байт. При ошибке буфер обрезается до исходной длины.
    pub fn encode_into<T: Encode + ?Sized>(
        &self,
        value: &T,
        out: &mut Vec<u8>,
    ) -> CodecResult<usize> {
        let start = out.len();
        match value.encode_to(out) {
            Ok(()) => {
                let written = out.len() - start;
                trace!(
                    tag = out.get(start).copied().and_then(Tag::from_byte).map(Tag::name),
                    written,
                    "encoded value"
                );
                Ok(written)
            }
            Err(err) => {
                out.truncate(start);
                debug!(error = %err, "encode failed");
                Err(err)
            }
        }
    }

    /// Кодирует скаляр с префиксом `ElementValue`.
    ///
    /// Индекс на провод не пишется и используется только в диагностике.
    pub fn encode_indexed<T: Encode + ?Sized>(
        &self,
        index: usize,
        value: &T,
    ) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        put_tag(&mut out, Tag::ElementValue);
        value.encode_to(&mut out)?;

        let inner = out.get(1).copied().and_then(Tag::from_byte);
        match inner {
            Some(tag) if tag.is_scalar() => {
                trace!(index, tag = tag.name(), "encoded indexed element");
                Ok(out)
            }
            other => {
                let found = other.map(Tag::name).unwrap_or("unknown");
                debug!(index, found, "indexed element is not a scalar");
                Err(CodecError::MustBeScalar { found })
            }
        }
    }

    /// Кодирует ссылочный идентификатор с префиксом `ElementRef`.
    pub fn encode_ref(
        &self,
        index: usize,
        reference_id: &str,
    ) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(reference_id.len() + 3);
        put_tag(&mut out, Tag::ElementRef);
        put_string(&mut out, reference_id)?;
        trace!(index, reference_id, "encoded reference element");
        Ok(out)
    }
}

/// Кодирует значение в новый буфер.
pub fn encode<T: Encode + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    Encoder::new().encode(value)
}

/// См. [`Encoder::encode_indexed`].
pub fn encode_indexed<T: Encode + ?Sized>(
    index: usize,
    value: &T,
) -> CodecResult<Vec<u8>> {
    Encoder::new().encode_indexed(index, value)
}

/// См. [`Encoder::encode_ref`].
pub fn encode_ref(
    index: usize,
    reference_id: &str,
) -> CodecResult<Vec<u8>> {
    Encoder::new().encode_ref(index, reference_id)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    #[test]
    fn test_encode_u8() {
        assert_eq!(encode(&1u8).unwrap(), vec![0xFF, 0x01]);
    }

    #[test]
    fn test_encode_integers_little_endian() {
        assert_eq!(encode(&0x0102u16).unwrap(), vec![0xFE, 0x02, 0x01]);
        assert_eq!(
            encode(&-2i32).unwrap(),
            vec![0xF9, 0xFE, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            encode(&1isize).unwrap(),
            vec![0xF7, 1, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            encode(&7usize).unwrap(),
            vec![0xF6, 7, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_encode_floats() {
        assert_eq!(encode(&10.3f32).unwrap(), vec![0xF5, 205, 204, 36, 65]);
        assert_eq!(
            encode(&12.5f64).unwrap(),
            vec![0xF4, 0, 0, 0, 0, 0, 0, 41, 64]
        );
    }

    #[test]
    fn test_encode_bool_and_string() {
        assert_eq!(encode(&true).unwrap(), vec![0xF2, 0x01]);
        assert_eq!(encode(&false).unwrap(), vec![0xF2, 0x00]);
        assert_eq!(encode("hi").unwrap(), vec![0xF3, b'h', b'i', 0x00]);
        assert_eq!(encode("").unwrap(), vec![0xF3, 0x00]);
    }

    #[test]
    fn test_encode_string_with_nul_fails() {
        let err = encode("a\0b").unwrap_err();
        assert_eq!(err, CodecError::EmbeddedNul { what: "string" });
    }

    #[test]
    fn test_encode_bytes() {
        let blob = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(
            encode(&blob).unwrap(),
            vec![0xEE, 3, 0, 0, 0, 1, 2, 3]
        );
    }

    #[test]
    fn test_encode_duration() {
        let out = encode(&TimeDelta::seconds(10)).unwrap();
        assert_eq!(out, vec![0xF1, 0x00, 0xE4, 0x0B, 0x54, 0x02, 0, 0, 0]);

        let std = encode(&StdDuration::from_secs(3)).unwrap();
        assert_eq!(std, vec![0xF1, 0x00, 0x5E, 0xD0, 0xB2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_duration_out_of_range() {
        let err = encode(&StdDuration::from_secs(u64::MAX)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedType {
                kind: "duration",
                ..
            }
        ));
    }

    #[test]
    fn test_encode_timestamp() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 12, 59, 59).unwrap();
        assert_eq!(
            encode(&ts).unwrap(),
            vec![0xEF, 0x00, 0x56, 0x4F, 0xF7, 0xC5, 0xC4, 0xE5, 0x15]
        );
    }

    #[test]
    fn test_encode_map_entries_in_iteration_order() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), 1u8);
        let out = encode(&m).unwrap();
        assert_eq!(
            out,
            vec![0xE3, 1, 0, 0, 0, 0xE2, 0xF3, b'a', 0, 0xE1, 0xFF, 1]
        );
    }

    #[test]
    fn test_encode_indexed_scalar() {
        let out = encode_indexed(3, &5u8).unwrap();
        assert_eq!(out, vec![0xE0, 0xFF, 0x05]);
    }

    #[test]
    fn test_encode_indexed_rejects_aggregates() {
        let err = encode_indexed(0, &vec![1isize]).unwrap_err();
        assert_eq!(err, CodecError::MustBeScalar { found: "ArrayInt" });

        let err = encode_indexed(0, &Bytes::new()).unwrap_err();
        assert_eq!(err, CodecError::MustBeScalar { found: "Bytes" });
    }

    #[test]
    fn test_encode_ref() {
        let out = encode_ref(9, "obj-1").unwrap();
        assert_eq!(out[0], 0xDF);
        assert_eq!(&out[1..], encode("obj-1").unwrap().as_slice());
    }

    #[test]
    fn test_encode_into_truncates_on_error() {
        let mut out = vec![0xAA];
        let err = Encoder::new().encode_into(&vec!["ok".to_string(), "b\0ad".to_string()], &mut out);
        assert!(err.is_err());
        assert_eq!(out, vec![0xAA]);
    }
}
