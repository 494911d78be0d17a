//! zbin-dump
//!
//! Печатает содержимое файла (или stdin) с последовательностью
//! закодированных значений: смещение, размер, тег и само значение.

use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;
use zbin::{
    dump::{dump, DumpFormat, DumpOptions},
    logging::init_logging,
    CodecConfig,
};
use zbin_error::{GenericError, StatusCode, ZbinResult};

/// Аргументы командной строки
#[derive(Parser)]
#[command(name = "zbin-dump")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect a stream of zbin-encoded values", long_about = None)]
struct Cli {
    /// Входной файл; без аргумента читается stdin
    #[arg(help = "Файл с закодированными значениями (по умолчанию stdin)")]
    input: Option<PathBuf>,
    /// Формат вывода
    #[arg(long, value_enum, default_value = "text")]
    format: DumpFormat,
    /// Вход состоит из элементов в обёртках ElementValue/ElementRef
    #[arg(long, help = "Декодировать элементы в обёртках ElementValue/ElementRef")]
    element: bool,
    /// Уровень логирования (RUST_LOG имеет приоритет)
    #[arg(long, default_value = "warn", env = "ZBIN_LOG")]
    log_level: String,
}

fn run(cli: &Cli) -> ZbinResult<usize> {
    let config = CodecConfig::load().map_err(|e| {
        GenericError::new(StatusCode::InvalidArgs, format!("configuration: {e}"))
    })?;

    let opts = DumpOptions {
        format: cli.format,
        element: cli.element,
        config,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump(cli.input.as_deref(), &opts, &mut out)
}

/// Код выхода: 2 для повреждённого или обрезанного входа, 1 для остальных
/// ошибок.
fn exit_status(code: StatusCode) -> u8 {
    if code.is_format_error() || code == StatusCode::UnexpectedEof {
        2
    } else {
        1
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = %err.status_code(), "{err}");
            match cli.format {
                DumpFormat::Json => match serde_json::to_string(&err.to_response()) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("error: {err}"),
                },
                DumpFormat::Text => eprintln!("error: {err}"),
            }
            ExitCode::from(exit_status(err.status_code()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_separates_corrupt_input() {
        assert_eq!(exit_status(StatusCode::InvalidFrame), 2);
        assert_eq!(exit_status(StatusCode::DepthLimit), 2);
        assert_eq!(exit_status(StatusCode::UnexpectedEof), 2);
        assert_eq!(exit_status(StatusCode::InvalidArgs), 1);
        assert_eq!(exit_status(StatusCode::Io), 1);
    }
}
