//! Структурные записи.
//!
//! Запись кодируется как `Struct`, количество полей u32 и далее для каждого
//! поля `StructField <имя> 0x00 StructValue <значение>`. Описание полей
//! задаётся один раз на тип макросом [`impl_record!`](crate::impl_record):
//! он строит статическую таблицу [`FieldSlot`] и реализует
//! [`Encode`]/[`Decode`] через неё.

use bytes::BufMut;
use tracing::trace;
use zbin_error::{CodecError, CodecResult};

use super::{
    decode::Decode,
    encode::{put_cstr, put_tag, u32_len, Encode},
    reader::{incompatible, Reader},
    tags::Tag,
};

/// `StructField` + имя (минимум 1 байт и терминатор) + `StructValue` +
/// значение (минимум 2).
pub(crate) const MIN_STRUCT_FIELD: usize = 6;

/// Кодировщик одного поля записи.
pub type FieldEncoder<R> = fn(&R, &mut Vec<u8>) -> CodecResult<()>;

/// Декодировщик одного поля записи: пишет прочитанное значение прямо в
/// поле приёмника.
pub type FieldDecoder<R> = fn(&mut R, &mut Reader<'_>) -> CodecResult<()>;

/// Описание поля записи: имя на проводе и доступ к полю.
pub struct FieldSlot<R: 'static> {
    pub name: &'static str,
    pub encode: FieldEncoder<R>,
    pub decode: FieldDecoder<R>,
}

impl<R: 'static> std::fmt::Debug for FieldSlot<R> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FieldSlot").field("name", &self.name).finish()
    }
}

/// Тип, который кодируется как `Struct`.
///
/// Реализуется макросом [`impl_record!`](crate::impl_record).
pub trait Record: Default + 'static {
    /// Имя типа для диагностики.
    const NAME: &'static str;

    /// Поля в порядке кодирования.
    const FIELDS: &'static [FieldSlot<Self>];

    /// Индекс поля по имени на проводе.
    ///
    /// `impl_record!` заменяет перебор на `match` по литералам имён.
    fn field_index(name: &str) -> Option<usize> {
        Self::FIELDS.iter().position(|slot| slot.name == name)
    }
}

/// Позиция поля `name` в таблице, вычисляется при компиляции.
#[doc(hidden)]
pub const fn slot_position<R: 'static>(
    fields: &[FieldSlot<R>],
    name: &str,
) -> usize {
    let mut i = 0;
    while i < fields.len() {
        if const_str_eq(fields[i].name, name) {
            return i;
        }
        i += 1;
    }
    panic!("field is not in the record table");
}

const fn const_str_eq(
    a: &str,
    b: &str,
) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

pub(crate) fn put_struct_header(
    out: &mut Vec<u8>,
    len: usize,
) -> CodecResult<()> {
    let count = u32_len("record", len)?;
    put_tag(out, Tag::Struct);
    out.put_u32_le(count);
    Ok(())
}

/// `StructField`, имя, `0x00`, `StructValue`.
fn put_field_name(
    out: &mut Vec<u8>,
    name: &str,
) -> CodecResult<()> {
    if name.is_empty() {
        return Err(CodecError::UnsupportedType {
            kind: "field name",
            reason: "field name must not be empty".to_string(),
        });
    }
    put_tag(out, Tag::StructField);
    put_cstr(out, name, "field name")?;
    put_tag(out, Tag::StructValue);
    Ok(())
}

pub(crate) fn put_field<T: Encode + ?Sized>(
    out: &mut Vec<u8>,
    name: &str,
    value: &T,
) -> CodecResult<()> {
    put_field_name(out, name)?;
    value.encode_to(out)
}

/// Кодирует запись целиком.
pub fn encode_record<R: Record>(
    rec: &R,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    put_struct_header(out, R::FIELDS.len())?;
    for slot in R::FIELDS {
        put_field_name(out, slot.name)?;
        (slot.encode)(rec, out)?;
    }
    Ok(())
}

/// Читает поля записи; тег `Struct` уже прочитан.
///
/// Для каждого поля `resolve` получает имя и его смещение и решает, куда
/// писать значение; ошибка `resolve` прерывает чтение до разделителя
/// `StructValue`. Затем `assign` читает само значение.
pub(crate) fn read_struct_body<'a, S>(
    r: &mut Reader<'a>,
    mut resolve: impl FnMut(&'a str, usize) -> CodecResult<S>,
    mut assign: impl FnMut(S, &mut Reader<'a>) -> CodecResult<()>,
) -> CodecResult<()> {
    let count = r.read_u32()? as usize;
    r.ensure_count(count, MIN_STRUCT_FIELD)?;
    r.enter()?;
    for _ in 0..count {
        let field_offset = r.position();
        if r.read_u8()? != Tag::StructField.byte() {
            return Err(CodecError::InvalidStructField {
                offset: field_offset,
            });
        }

        let name_offset = r.position();
        let raw = r
            .read_cstr()
            .filter(|raw| !raw.is_empty())
            .ok_or(CodecError::InvalidStructField {
                offset: name_offset,
            })?;
        let name = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 {
            offset: name_offset,
        })?;

        let target = resolve(name, name_offset)?;
        r.expect_delimiter(Tag::StructValue)?;
        assign(target, r)?;
    }
    r.leave();
    Ok(())
}

/// Заполняет поля `rec` из потока. Поля, отсутствующие в потоке,
/// сохраняют прежние значения.
pub fn decode_record_into<R: Record>(
    rec: &mut R,
    r: &mut Reader<'_>,
) -> CodecResult<()> {
    let offset = r.position();
    let tag = r.read_value_tag()?;
    if tag != Tag::Struct {
        return Err(incompatible(R::NAME, tag, offset));
    }

    read_struct_body(
        r,
        |name, name_offset| {
            R::field_index(name)
                .and_then(|i| R::FIELDS.get(i))
                .ok_or_else(|| CodecError::UnknownField {
                    name: name.to_owned(),
                    offset: name_offset,
                })
        },
        |slot, r| {
            trace!(record = R::NAME, field = slot.name, "decoding field");
            (slot.decode)(rec, r)
        },
    )
}

/// Декодирует запись в значение по умолчанию.
pub fn decode_record<R: Record>(r: &mut Reader<'_>) -> CodecResult<R> {
    let mut rec = R::default();
    decode_record_into(&mut rec, r)?;
    Ok(rec)
}

/// Регистрирует тип как запись: сопоставляет поля Rust с именами на
/// проводе и реализует `Encode`, `Decode` и `Record`.
///
/// Тип должен реализовывать `Default`, а каждое поле `Encode` и
/// `Decode`. Поля кодируются в порядке перечисления.
///
/// ```
/// use zbin::{decode, encode, impl_record};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Product {
///     name: String,
///     price: f64,
/// }
///
/// impl_record!(Product {
///     name => "Name",
///     price => "Price",
/// });
///
/// let p = Product { name: "Apple".into(), price: 13.5 };
/// let buf = encode(&p).unwrap();
/// let mut back = Product::default();
/// decode(&buf, &mut back).unwrap();
/// assert_eq!(back, p);
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ident { $($field:ident => $wire:literal),* $(,)? }) => {
        impl $crate::Record for $ty {
            const NAME: &'static str = stringify!($ty);

            const FIELDS: &'static [$crate::FieldSlot<Self>] = &[$(
                $crate::FieldSlot {
                    name: $wire,
                    encode: {
                        fn encode_field(
                            rec: &$ty,
                            out: &mut ::std::vec::Vec<u8>,
                        ) -> $crate::CodecResult<()> {
                            $crate::Encode::encode_to(&rec.$field, out)
                        }
                        encode_field
                    },
                    decode: {
                        fn decode_field(
                            rec: &mut $ty,
                            r: &mut $crate::Reader<'_>,
                        ) -> $crate::CodecResult<()> {
                            $crate::Decode::decode_into(&mut rec.$field, r)
                        }
                        decode_field
                    },
                },
            )*];

            fn field_index(name: &str) -> ::std::option::Option<usize> {
                match name {
                    $($wire => ::std::option::Option::Some(const {
                        $crate::codec::record::slot_position(
                            <$ty as $crate::Record>::FIELDS,
                            $wire,
                        )
                    }),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl $crate::Encode for $ty {
            fn encode_to(
                &self,
                out: &mut ::std::vec::Vec<u8>,
            ) -> $crate::CodecResult<()> {
                $crate::codec::record::encode_record(self, out)
            }
        }

        impl $crate::Decode for $ty {
            fn decode(r: &mut $crate::Reader<'_>) -> $crate::CodecResult<Self> {
                $crate::codec::record::decode_record(r)
            }

            fn decode_into(
                &mut self,
                r: &mut $crate::Reader<'_>,
            ) -> $crate::CodecResult<()> {
                $crate::codec::record::decode_record_into(self, r)
            }
        }
    };
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use crate::{decode, encode, CodecError, Record, Value};

    #[derive(Debug, Default, PartialEq)]
    struct Product {
        name: String,
        price: f64,
        off: bool,
        amount: isize,
    }

    crate::impl_record!(Product {
        name => "Name",
        price => "Price",
        off => "Off",
        amount => "Amount",
    });

    #[derive(Debug, Default, PartialEq)]
    struct Wrapper {
        label: String,
        inner: Product,
    }

    crate::impl_record!(Wrapper {
        label => "Label",
        inner => "Inner",
    });

    fn apple() -> Product {
        Product {
            name: "Apple".into(),
            price: 13.5,
            off: true,
            amount: 500,
        }
    }

    #[test]
    fn test_field_table() {
        assert_eq!(Product::NAME, "Product");
        assert_eq!(Product::FIELDS.len(), 4);
        assert_eq!(Product::field_index("Off"), Some(2));
        assert_eq!(Product::field_index("off"), None);
    }

    #[test]
    fn test_record_layout() {
        let buf = encode(&apple()).unwrap();
        let mut expected = vec![0xE6, 4, 0, 0, 0];
        expected.extend_from_slice(&[0xE5, b'N', b'a', b'm', b'e', 0, 0xE4]);
        expected.extend_from_slice(&[0xF3, b'A', b'p', b'p', b'l', b'e', 0]);
        expected.extend_from_slice(&[0xE5, b'P', b'r', b'i', b'c', b'e', 0, 0xE4]);
        expected.extend_from_slice(&[0xF4, 0, 0, 0, 0, 0, 0, 0x2B, 0x40]);
        expected.extend_from_slice(&[0xE5, b'O', b'f', b'f', 0, 0xE4, 0xF2, 1]);
        expected.extend_from_slice(&[0xE5, b'A', b'm', b'o', b'u', b'n', b't', 0, 0xE4]);
        expected.extend_from_slice(&[0xF7, 0xF4, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_record_roundtrip_nested() {
        let w = Wrapper {
            label: "box".into(),
            inner: apple(),
        };
        let buf = encode(&w).unwrap();
        let mut back = Wrapper::default();
        assert_eq!(decode(&buf, &mut back).unwrap(), buf.len());
        assert_eq!(back, w);
    }

    #[test]
    fn test_missing_fields_keep_values() {
        // Только поле Name.
        let buf = [
            0xE6, 1, 0, 0, 0, 0xE5, b'N', b'a', b'm', b'e', 0, 0xE4, 0xF3, b'P', b'e', b'a', b'r',
            0,
        ];
        let mut p = apple();
        decode(&buf, &mut p).unwrap();
        assert_eq!(p.name, "Pear");
        assert_eq!(p.amount, 500);
        assert!(p.off);
    }

    #[test]
    fn test_unknown_field() {
        let buf = [0xE6, 1, 0, 0, 0, 0xE5, b'Z', 0, 0xE4, 0xFF, 1];
        let mut p = Product::default();
        assert_eq!(
            decode(&buf, &mut p).unwrap_err(),
            CodecError::UnknownField {
                name: "Z".into(),
                offset: 6
            }
        );

        // Динамический приёмник принимает любые имена.
        let v = crate::decode_to_dynamic(&buf).unwrap();
        assert_eq!(v, Value::Record(vec![("Z".into(), Value::U8(1))]));
    }

    #[test]
    fn test_struct_delimiter_errors() {
        let mut p = Product::default();

        let no_field_tag = [0xE6, 1, 0, 0, 0, 0xE4, b'N', 0, 0xE4, 0xFF, 1];
        assert_eq!(
            decode(&no_field_tag, &mut p).unwrap_err(),
            CodecError::InvalidStructField { offset: 5 }
        );

        let empty_name = [0xE6, 1, 0, 0, 0, 0xE5, 0, 0xE4, 0xFF, 1, 0];
        assert_eq!(
            decode(&empty_name, &mut p).unwrap_err(),
            CodecError::InvalidStructField { offset: 6 }
        );

        let no_value_tag = [0xE6, 1, 0, 0, 0, 0xE5, b'O', b'f', b'f', 0, 0xF2, 1];
        assert_eq!(
            decode(&no_value_tag, &mut p).unwrap_err(),
            CodecError::InvalidStructValue {
                found: 0xF2,
                offset: 10
            }
        );
    }

    #[test]
    fn test_record_into_wrong_tag() {
        let buf = encode(&1u8).unwrap();
        let mut p = Product::default();
        assert!(matches!(
            decode(&buf, &mut p),
            Err(CodecError::IncompatibleType {
                expected: "Product",
                found: "Uint8",
                ..
            })
        ));
    }

    #[test]
    fn test_dynamic_record_duplicate_field_replaces() {
        let buf = [
            0xE6, 2, 0, 0, 0, //
            0xE5, b'A', 0, 0xE4, 0xFF, 1, //
            0xE5, b'A', 0, 0xE4, 0xFF, 2,
        ];
        let v = crate::decode_to_dynamic(&buf).unwrap();
        assert_eq!(v, Value::Record(vec![("A".into(), Value::U8(2))]));
    }
}
