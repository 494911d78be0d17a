pub mod ext;
pub mod stack;
pub mod status_code;
pub mod types;

// Публичный экспорт всех типов ошибок и функций из вложенных модулей,
// чтобы упростить доступ к ним из внешнего кода.
pub use ext::*;
pub use stack::*;
pub use status_code::*;
pub use types::*;

pub type ZbinResult<T> = Result<T, StackError>;

/// Результат операций кодека.
pub type CodecResult<T> = Result<T, CodecError>;
