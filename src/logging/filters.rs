use tracing_subscriber::EnvFilter;

/// Фильтр из `RUST_LOG`, а если он не задан, из переданного уровня.
///
/// Некорректная директива откатывается к `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("Invalid log filter directive '{level}': {e}; falling back to 'info'");
                EnvFilter::new("info")
            }
        },
    }
}
