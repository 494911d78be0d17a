mod filters;

pub use filters::build_filter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Инициализация логирования: fmt-слой в stderr с фильтром по уровню.
///
/// `RUST_LOG`, если задан, имеет приоритет над `level`. Повторная
/// инициализация возвращает ошибку.
pub fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), filter = level, "logging initialized");
    Ok(())
}
