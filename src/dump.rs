//! Разбор потока закодированных значений для утилиты `zbin-dump`.
//!
//! Вход читается целиком и декодируется значение за значением, пока буфер
//! не закончится. Каждое значение печатается со смещением и размером.

use std::{
    io::{Read, Write},
    path::Path,
};

use serde::Serialize;
use tracing::{debug, info};
use zbin_error::{GenericError, ResultExt, StatusCode, ZbinResult};

use crate::{codec::Decoder, config::CodecConfig, Value};

/// Формат вывода.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DumpFormat {
    /// Человекочитаемые строки
    #[default]
    Text,
    /// JSON-массив записей
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub format: DumpFormat,
    /// Вход состоит из элементов в обёртках `ElementValue`/`ElementRef`.
    pub element: bool,
    pub config: CodecConfig,
}

/// Одно декодированное значение потока.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpEntry {
    pub offset: usize,
    pub size: usize,
    pub tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ref: Option<bool>,
    pub value: Value,
}

/// Декодирует все значения буфера по порядку.
pub fn decode_stream(
    buf: &[u8],
    opts: &DumpOptions,
) -> ZbinResult<Vec<DumpEntry>> {
    let decoder = Decoder::with_config(opts.config.clone());
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];
        let index = entries.len();
        let (value, is_ref, size) = if opts.element {
            let (value, is_ref, size) = decoder
                .decode_element_value(rest)
                .with_context(|| format!("element #{index} at offset {offset}"))?;
            (value, Some(is_ref), size)
        } else {
            let (value, size) = decoder
                .decode_value(rest)
                .with_context(|| format!("value #{index} at offset {offset}"))?;
            (value, None, size)
        };

        debug!(index, offset, size, "decoded stream entry");
        entries.push(DumpEntry {
            offset,
            size,
            tag: value.tag().name(),
            is_ref,
            value,
        });
        offset += size;
    }

    info!(count = entries.len(), bytes = buf.len(), "stream decoded");
    Ok(entries)
}

/// Печатает записи в выбранном формате.
pub fn render<W: Write>(
    entries: &[DumpEntry],
    format: DumpFormat,
    out: &mut W,
) -> ZbinResult<()> {
    match format {
        DumpFormat::Text => {
            for e in entries {
                let kind = match e.is_ref {
                    Some(true) => "ref ",
                    Some(false) => "val ",
                    None => "",
                };
                writeln!(
                    out,
                    "{:>8}  {:>6}  {kind}{:<12} {}",
                    e.offset, e.size, e.tag, e.value
                )?;
            }
        }
        DumpFormat::Json => {
            let json = serde_json::to_string_pretty(entries).map_err(|e| {
                GenericError::new(StatusCode::EncodingError, format!("JSON output: {e}"))
            })?;
            writeln!(out, "{json}")?;
        }
    }
    Ok(())
}

/// Читает файл (или stdin, если путь не задан), декодирует и печатает.
/// Возвращает количество значений.
pub fn dump<W: Write>(
    input: Option<&Path>,
    opts: &DumpOptions,
    out: &mut W,
) -> ZbinResult<usize> {
    let buf = match input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let entries = decode_stream(&buf, opts)?;
    render(&entries, opts.format, out)?;
    Ok(entries.len())
}
