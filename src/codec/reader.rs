//! Курсор чтения для декодера.
//!
//! Обёртка над `Cursor<&[u8]>` с проверкой длины перед каждым чтением:
//! методы `bytes::Buf` паникуют при нехватке данных, поэтому любое чтение
//! сначала проходит через [`Reader::ensure`] и возвращает
//! [`CodecError::BufferTooSmall`] вместо паники.

use std::io::Cursor;

use bytes::Buf;
use zbin_error::{CodecError, CodecResult};

use super::tags::Tag;
use crate::config::CodecConfig;

/// Позиционный читатель буфера с учётом глубины вложенности.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: Cursor<&'a [u8]>,
    depth: usize,
    max_depth: usize,
    max_bytes_len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, &CodecConfig::default())
    }

    pub fn with_config(
        data: &'a [u8],
        config: &CodecConfig,
    ) -> Self {
        Self {
            buf: Cursor::new(data),
            depth: 0,
            max_depth: config.max_depth,
            max_bytes_len: config.max_bytes_len as usize,
        }
    }

    /// Количество уже прочитанных байт.
    pub fn position(&self) -> usize {
        self.buf.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    pub fn max_bytes_len(&self) -> usize {
        self.max_bytes_len
    }

    /// Проверяет, что в буфере есть хотя бы `needed` байт.
    pub fn ensure(
        &self,
        needed: usize,
    ) -> CodecResult<()> {
        let available = self.remaining();
        if available < needed {
            return Err(CodecError::BufferTooSmall {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Проверяет заявленное количество элементов против остатка буфера до
    /// выделения памяти: каждый элемент занимает минимум `min_width` байт.
    pub fn ensure_count(
        &self,
        count: usize,
        min_width: usize,
    ) -> CodecResult<()> {
        self.ensure(count.saturating_mul(min_width))
    }

    pub fn peek_u8(&self) -> CodecResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.chunk()[0])
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> CodecResult<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i16(&mut self) -> CodecResult<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Возвращает срез длиной `len` без копирования.
    pub fn read_bytes(
        &mut self,
        len: usize,
    ) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let start = self.position();
        let data: &'a [u8] = self.buf.get_ref();
        self.buf.advance(len);
        Ok(&data[start..start + len])
    }

    /// Читает байты до нулевого терминатора (терминатор пропускается).
    ///
    /// Возвращает `None`, если терминатора в остатке буфера нет; курсор при
    /// этом не сдвигается.
    pub fn read_cstr(&mut self) -> Option<&'a [u8]> {
        let start = self.position();
        let data: &'a [u8] = self.buf.get_ref();
        let tail = &data[start..];
        let end = memchr::memchr(0, tail)?;
        self.buf.advance(end + 1);
        Some(&tail[..end])
    }

    /// Читает байт тега, неизвестный байт даёт [`CodecError::InvalidTag`].
    pub fn read_tag(&mut self) -> CodecResult<Tag> {
        let offset = self.position();
        let b = self.read_u8()?;
        Tag::from_byte(b).ok_or(CodecError::InvalidTag { tag: b, offset })
    }

    /// Читает тег, с которого может начинаться значение. Разделители,
    /// обёртки элементов и зарезервированные теги отклоняются как
    /// [`CodecError::InvalidTag`].
    pub fn read_value_tag(&mut self) -> CodecResult<Tag> {
        let offset = self.position();
        let tag = self.read_tag()?;
        if !tag.is_value() {
            return Err(CodecError::InvalidTag {
                tag: tag.byte(),
                offset,
            });
        }
        Ok(tag)
    }

    /// Проверяет структурный разделитель.
    pub fn expect_delimiter(
        &mut self,
        expected: Tag,
    ) -> CodecResult<()> {
        let offset = self.position();
        let found = self.read_u8()?;
        if found == expected.byte() {
            return Ok(());
        }
        Err(match expected {
            Tag::MapKey => CodecError::InvalidMapKey { found, offset },
            Tag::MapValue => CodecError::InvalidMapValue { found, offset },
            Tag::StructValue => CodecError::InvalidStructValue { found, offset },
            _ => CodecError::InvalidStructField { offset },
        })
    }

    /// Вход в составное значение.
    pub fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= self.max_depth {
            return Err(CodecError::DepthLimit {
                max: self.max_depth,
                offset: self.position(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Ошибка несовпадения типа приёмника и тега на проводе.
pub(crate) fn incompatible(
    expected: &'static str,
    found: Tag,
    offset: usize,
) -> CodecError {
    CodecError::IncompatibleType {
        expected,
        found: found.name(),
        offset,
    }
}
