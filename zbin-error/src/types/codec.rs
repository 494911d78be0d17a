use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки бинарного кодека.
///
/// Все ошибки терминальны для вызова, который их вернул: кодек не пытается
/// восстановиться и не возвращает частичный результат. Смещения (`offset`)
/// указываются относительно начала буфера, переданного в `decode`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// В буфере осталось меньше байт, чем требует очередное поле.
    #[error("Buffer too small at offset {offset}: need {needed} bytes, {available} available")]
    BufferTooSmall {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Первый байт не является известным тегом значения.
    #[error("Invalid tag 0x{tag:02X} at offset {offset}")]
    InvalidTag { tag: u8, offset: usize },

    /// Строка не завершена нулевым байтом.
    #[error("String at offset {offset} is not zero-terminated")]
    UnterminatedString { offset: usize },

    #[error("String at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    /// Ожидался разделитель `MapKey`.
    #[error("Invalid map key delimiter 0x{found:02X} at offset {offset}")]
    InvalidMapKey { found: u8, offset: usize },

    /// Ожидался разделитель `MapValue`.
    #[error("Invalid map value delimiter 0x{found:02X} at offset {offset}")]
    InvalidMapValue { found: u8, offset: usize },

    /// Нет разделителя `StructField` или имя поля пустое/не завершено.
    #[error("Invalid struct field at offset {offset}")]
    InvalidStructField { offset: usize },

    /// Ожидался разделитель `StructValue`.
    #[error("Invalid struct value delimiter 0x{found:02X} at offset {offset}")]
    InvalidStructValue { found: u8, offset: usize },

    /// Имя поля отсутствует в описании записи-приёмника.
    #[error("Unknown struct field `{name}` at offset {offset}")]
    UnknownField { name: String, offset: usize },

    /// Первый байт не `ElementValue` и не `ElementRef`.
    #[error("Invalid element kind 0x{found:02X}")]
    InvalidElementKind { found: u8 },

    /// Значение на проводе не может быть записано в приёмник данного типа.
    #[error("Cannot decode {found} into {expected} at offset {offset}")]
    IncompatibleType {
        expected: &'static str,
        found: &'static str,
        offset: usize,
    },

    #[error("Nesting depth exceeds {max} at offset {offset}")]
    DepthLimit { max: usize, offset: usize },

    /// Значение не представимо в формате.
    #[error("Unsupported {kind}: {reason}")]
    UnsupportedType { kind: &'static str, reason: String },

    #[error("{what} length {len} exceeds limit {max}")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// Формат не экранирует нулевой байт внутри строк и имён полей.
    #[error("{what} contains an embedded zero byte")]
    EmbeddedNul { what: &'static str },

    /// `encode_indexed` получил не скалярное значение.
    #[error("Indexed element must be a scalar, got {found}")]
    MustBeScalar { found: &'static str },
}

impl CodecError {
    /// Смещение в буфере, где обнаружена ошибка (только для ошибок
    /// декодирования).
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::BufferTooSmall { offset, .. }
            | Self::InvalidTag { offset, .. }
            | Self::UnterminatedString { offset }
            | Self::InvalidUtf8 { offset }
            | Self::InvalidMapKey { offset, .. }
            | Self::InvalidMapValue { offset, .. }
            | Self::InvalidStructField { offset }
            | Self::InvalidStructValue { offset, .. }
            | Self::UnknownField { offset, .. }
            | Self::IncompatibleType { offset, .. }
            | Self::DepthLimit { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Ошибка вызвана обрывом входных данных.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::BufferTooSmall { .. } | Self::UnterminatedString { .. }
        )
    }

    /// Ошибка возникла на стороне кодирования.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType { .. }
                | Self::LengthOverflow { .. }
                | Self::EmbeddedNul { .. }
                | Self::MustBeScalar { .. }
        )
    }
}

impl ErrorExt for CodecError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BufferTooSmall { .. } | Self::UnterminatedString { .. } => {
                StatusCode::UnexpectedEof
            }
            Self::InvalidTag { .. }
            | Self::InvalidMapKey { .. }
            | Self::InvalidMapValue { .. }
            | Self::InvalidStructField { .. }
            | Self::InvalidStructValue { .. }
            | Self::InvalidElementKind { .. } => StatusCode::InvalidFrame,
            Self::InvalidUtf8 { .. } => StatusCode::InvalidUtf8,
            Self::UnknownField { .. } => StatusCode::UnknownField,
            Self::IncompatibleType { .. } => StatusCode::TypeError,
            Self::DepthLimit { .. } => StatusCode::DepthLimit,
            Self::UnsupportedType { .. } => StatusCode::Unsupported,
            Self::LengthOverflow { .. } => StatusCode::SizeLimit,
            Self::EmbeddedNul { .. } => StatusCode::EncodingError,
            Self::MustBeScalar { .. } => StatusCode::InvalidArgs,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
            ("truncation", self.is_truncation().to_string()),
        ];

        match self {
            Self::InvalidTag { tag, .. } => {
                tags.push(("invalid_tag", format!("0x{tag:02X}")));
            }
            Self::UnknownField { name, .. } => {
                tags.push(("field", name.clone()));
            }
            Self::LengthOverflow { what, .. } => {
                tags.push(("limit_type", what.to_string()));
            }
            _ => {}
        }

        tags
    }
}
