use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sllp_client::Statistics;

use crate::exit::{CliError, CliResult};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Transaction counters, rendered for humans or as JSON.
pub fn print_stats(stats: &Statistics, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mut table = table(&["COUNTER", "VALUE"]);
            table
                .add_row(vec!["commands".to_string(), stats.commands.to_string()])
                .add_row(vec![
                    "setpoint updates".to_string(),
                    stats.setpoint_updates.to_string(),
                ])
                .add_row(vec!["retries".to_string(), stats.retries.to_string()])
                .add_row(vec!["no replies".to_string(), stats.no_replies.to_string()])
                .add_row(vec!["bad replies".to_string(), stats.bad_replies.to_string()])
                .add_row(vec!["rejections".to_string(), stats.rejections.to_string()])
                .add_row(vec!["time avg (s)".to_string(), format!("{:.3e}", stats.time_avg)])
                .add_row(vec!["time max (s)".to_string(), format!("{:.3e}", stats.time_max)]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!("{stats}"),
    }
}

/// Uppercase hex octets separated by spaces.
pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Parse hex octets, tolerating whitespace, `:` separators and a `0x` prefix.
pub fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::usage(format!(
            "hex value '{text}' has an odd number of digits"
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::usage(format!("'{text}' is not valid hex")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formats_and_parses() {
        assert_eq!(hex(&[0x7F, 0x00, 0xAB]), "7F 00 AB");
        assert_eq!(hex(&[]), "");
        assert_eq!(parse_hex("7f 00 ab").unwrap(), vec![0x7F, 0x00, 0xAB]);
        assert_eq!(parse_hex("0x0307").unwrap(), vec![0x03, 0x07]);
        assert_eq!(parse_hex("de:ad").unwrap(), vec![0xDE, 0xAD]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
