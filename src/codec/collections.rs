//! Массивы и отображения.
//!
//! Массив: тег, количество u16, затем элементы, каждый со своим тегом.
//! Отображение: `Map`, количество u32, затем записи
//! `MapKey <ключ> MapValue <значение>`.

use std::{
    any::type_name,
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

use zbin_error::CodecResult;

use super::{
    decode::Decode,
    encode::{put_array_header, put_map, Encode},
    reader::{incompatible, Reader},
    tags::Tag,
    value::Value,
};

/// Минимальный размер элемента массива: тег и байт нагрузки.
pub(crate) const MIN_ARRAY_ELEMENT: usize = 2;
/// `MapKey` + ключ (минимум 2) + `MapValue` + значение (минимум 2).
pub(crate) const MIN_MAP_ENTRY: usize = 6;

/// Тип элемента массива и тег массива, которым он кодируется.
pub trait ArrayElement: Encode {
    const ARRAY_TAG: Tag;

    /// Теги массивов, которые можно декодировать в `Vec<Self>`.
    fn accepts_array(tag: Tag) -> bool {
        tag == Self::ARRAY_TAG
    }
}

impl ArrayElement for isize {
    const ARRAY_TAG: Tag = Tag::ArrayInt;
}

impl ArrayElement for usize {
    const ARRAY_TAG: Tag = Tag::ArrayUint;
}

impl ArrayElement for f32 {
    const ARRAY_TAG: Tag = Tag::ArrayFloat32;
}

impl ArrayElement for f64 {
    const ARRAY_TAG: Tag = Tag::ArrayFloat;
}

impl ArrayElement for bool {
    const ARRAY_TAG: Tag = Tag::ArrayBool;
}

impl ArrayElement for String {
    const ARRAY_TAG: Tag = Tag::ArrayString;
}

impl ArrayElement for str {
    const ARRAY_TAG: Tag = Tag::ArrayString;
}

/// Произвольные значения; при декодировании принимается любой тег массива.
impl ArrayElement for Value {
    const ARRAY_TAG: Tag = Tag::Array;

    fn accepts_array(tag: Tag) -> bool {
        tag.is_array()
    }
}

impl<T: ArrayElement + ?Sized> ArrayElement for &T {
    const ARRAY_TAG: Tag = T::ARRAY_TAG;
}

impl<T: ArrayElement> Encode for [T] {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_array_header(out, T::ARRAY_TAG, self.len())?;
        for item in self {
            item.encode_to(out)?;
        }
        Ok(())
    }
}

impl<T: ArrayElement> Encode for Vec<T> {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        self.as_slice().encode_to(out)
    }
}

impl<T: ArrayElement, const N: usize> Encode for [T; N] {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        self.as_slice().encode_to(out)
    }
}

/// Читает количество и элементы массива; тег уже прочитан.
pub(crate) fn read_array_body<'a, T>(
    r: &mut Reader<'a>,
    mut element: impl FnMut(&mut Reader<'a>) -> CodecResult<T>,
) -> CodecResult<Vec<T>> {
    let count = r.read_u16()? as usize;
    r.ensure_count(count, MIN_ARRAY_ELEMENT)?;
    r.enter()?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(element(r)?);
    }
    r.leave();
    Ok(items)
}

impl<T: ArrayElement + Decode> Decode for Vec<T> {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        let offset = r.position();
        let tag = r.read_value_tag()?;
        if !T::accepts_array(tag) {
            return Err(incompatible(type_name::<Self>(), tag, offset));
        }
        read_array_body(r, T::decode)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Отображения
////////////////////////////////////////////////////////////////////////////////

/// Читает количество и записи отображения; тег `Map` уже прочитан.
///
/// Ошибка из `insert` прерывает чтение.
pub(crate) fn read_map_body<K, V>(
    r: &mut Reader<'_>,
    mut insert: impl FnMut(K, V) -> CodecResult<()>,
) -> CodecResult<()>
where
    K: Decode,
    V: Decode,
{
    let count = r.read_u32()? as usize;
    r.ensure_count(count, MIN_MAP_ENTRY)?;
    r.enter()?;
    for _ in 0..count {
        r.expect_delimiter(Tag::MapKey)?;
        let key = K::decode(r)?;
        r.expect_delimiter(Tag::MapValue)?;
        let value = V::decode(r)?;
        insert(key, value)?;
    }
    r.leave();
    Ok(())
}

fn expect_map(
    r: &mut Reader<'_>,
    expected: &'static str,
) -> CodecResult<()> {
    let offset = r.position();
    let tag = r.read_value_tag()?;
    if tag != Tag::Map {
        return Err(incompatible(expected, tag, offset));
    }
    Ok(())
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_map(out, self.len(), self.iter())
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode_to(
        &self,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        put_map(out, self.len(), self.iter())
    }
}

/// Повторный ключ перезаписывает предыдущее значение.
impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_map(r, type_name::<Self>())?;
        let mut map = HashMap::default();
        read_map_body(r, |k, v| {
            map.insert(k, v);
            Ok(())
        })?;
        Ok(map)
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        expect_map(r, type_name::<Self>())?;
        let mut map = BTreeMap::new();
        read_map_body(r, |k, v| {
            map.insert(k, v);
            Ok(())
        })?;
        Ok(map)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
