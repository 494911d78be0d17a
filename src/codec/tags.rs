//! Словарь тегов бинарного формата.
//!
//! Каждая закодированная единица начинается ровно с одного байта-тега.
//! Значения тегов выделяются сверху вниз начиная с `0xFF` и являются частью
//! wire-контракта: менять порядок вариантов нельзя.
//!
//! | Тег | Полезная нагрузка |
//! |---|---|
//! | `Uint8`/`Int8`/`Bool` | 1 байт |
//! | `Uint16`/`Int16` | 2 байта |
//! | `Uint32`/`Int32`/`Float32` | 4 байта |
//! | `Uint64`/`Int64`/`Uint`/`Int`/`Float64`/`Timestamp`/`Duration` | 8 байт |
//! | `String` | UTF-8 + `0x00` |
//! | `Bytes` | длина u32 + байты |
//! | `Array*` | количество u16 + элементы (каждый со своим тегом) |
//! | `Map` | количество u32 + (`MapKey` ключ `MapValue` значение)* |
//! | `Struct` | количество u32 + (`StructField` имя `0x00` `StructValue` значение)* |
//!
//! Все многобайтовые поля записываются в little-endian.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Однобайтовый тег типа или структурного разделителя.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Display,
    IntoStaticStr,
    EnumIter,
)]
#[repr(u8)]
pub enum Tag {
    Uint8 = 0xFF,
    Uint16 = 0xFE,
    Uint32 = 0xFD,
    Uint64 = 0xFC,
    Int8 = 0xFB,
    Int16 = 0xFA,
    Int32 = 0xF9,
    Int64 = 0xF8,
    /// Целое платформенной ширины, на проводе всегда 8 байт.
    Int = 0xF7,
    /// Беззнаковое платформенной ширины, на проводе всегда 8 байт.
    Uint = 0xF6,
    Float32 = 0xF5,
    Float64 = 0xF4,
    String = 0xF3,
    Bool = 0xF2,
    /// Знаковое количество наносекунд.
    Duration = 0xF1,
    /// Зарезервирован, никогда не записывается.
    Rune = 0xF0,
    /// Наносекунды от Unix epoch (UTC), i64.
    Timestamp = 0xEF,
    Bytes = 0xEE,
    /// Массив произвольных значений.
    Array = 0xED,
    ArrayInt = 0xEC,
    ArrayUint = 0xEB,
    ArrayFloat = 0xEA,
    ArrayFloat32 = 0xE9,
    ArrayString = 0xE8,
    ArrayBool = 0xE7,
    Struct = 0xE6,
    StructField = 0xE5,
    StructValue = 0xE4,
    Map = 0xE3,
    MapKey = 0xE2,
    MapValue = 0xE1,
    ElementValue = 0xE0,
    ElementRef = 0xDF,
}

impl Tag {
    /// Разбирает байт в тег. `None` для байтов вне словаря.
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::try_from(b).ok()
    }

    /// Байтовое значение тега.
    pub fn byte(self) -> u8 {
        self.into()
    }

    /// Имя тега для диагностики.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Скаляр: числа фиксированной ширины, bool, строка, timestamp и
    /// duration. Байтовый блоб скаляром не считается.
    pub fn is_scalar(self) -> bool {
        self.fixed_width().is_some() || self == Tag::String
    }

    /// Теги однородных массивов, включая `Array`.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Tag::Array
                | Tag::ArrayInt
                | Tag::ArrayUint
                | Tag::ArrayFloat
                | Tag::ArrayFloat32
                | Tag::ArrayString
                | Tag::ArrayBool
        )
    }

    pub fn is_delimiter(self) -> bool {
        matches!(
            self,
            Tag::StructField | Tag::StructValue | Tag::MapKey | Tag::MapValue
        )
    }

    pub fn is_element_wrapper(self) -> bool {
        matches!(self, Tag::ElementValue | Tag::ElementRef)
    }

    /// Теги, с которых может начинаться значение.
    pub fn is_value(self) -> bool {
        self.is_scalar()
            || self.is_array()
            || matches!(self, Tag::Bytes | Tag::Map | Tag::Struct)
    }

    /// Ширина полезной нагрузки для скаляров фиксированного размера.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Uint8 | Tag::Int8 | Tag::Bool => Some(1),
            Tag::Uint16 | Tag::Int16 => Some(2),
            Tag::Uint32 | Tag::Int32 | Tag::Float32 => Some(4),
            Tag::Uint64
            | Tag::Int64
            | Tag::Int
            | Tag::Uint
            | Tag::Float64
            | Tag::Timestamp
            | Tag::Duration => Some(8),
            _ => None,
        }
    }

    /// Тег элементов однородного массива. Для `Array` элементы произвольны.
    pub fn element_tag(self) -> Option<Tag> {
        match self {
            Tag::ArrayInt => Some(Tag::Int),
            Tag::ArrayUint => Some(Tag::Uint),
            Tag::ArrayFloat => Some(Tag::Float64),
            Tag::ArrayFloat32 => Some(Tag::Float32),
            Tag::ArrayString => Some(Tag::String),
            Tag::ArrayBool => Some(Tag::Bool),
            _ => None,
        }
    }
}
