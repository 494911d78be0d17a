use serde::{Deserialize, Serialize};

use config::{Config, ConfigError, Environment};

/// Лимит вложенности по умолчанию.
pub const DEFAULT_MAX_DEPTH: usize = 32;
/// Лимит длины байтового блоба по умолчанию (512 MiB).
pub const DEFAULT_MAX_BYTES_LEN: u32 = 512 * 1024 * 1024;

/// Лимиты декодера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Максимальная вложенность массивов, отображений и записей.
    pub max_depth: usize,
    /// Максимальная длина полезной нагрузки `Bytes`.
    pub max_bytes_len: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bytes_len: DEFAULT_MAX_BYTES_LEN,
        }
    }
}

impl CodecConfig {
    /// Значения по умолчанию, затем переменные окружения `ZBIN_*`
    /// (`ZBIN_MAX_DEPTH`, `ZBIN_MAX_BYTES_LEN`).
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("max_depth", DEFAULT_MAX_DEPTH as u64)?
            .set_default("max_bytes_len", u64::from(DEFAULT_MAX_BYTES_LEN))?
            // Переменные окружения с префиксом ZBIN_
            .add_source(Environment::with_prefix("ZBIN").try_parsing(true))
            .build()?;

        cfg.try_deserialize()
    }
}
