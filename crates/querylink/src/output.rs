use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use querylink_channel::{Event, ResultEvent, StatusEvent};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
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

#[derive(Serialize)]
struct ResultOutput<'a> {
    generation: u64,
    query: &'a str,
    count: usize,
    results: &'a [String],
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match event {
        Event::Status(status) => print_status(status, format),
        Event::Results(results) => print_results(results, format),
    }
}

pub fn print_results(results: &ResultEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResultOutput {
                generation: results.generation,
                query: &results.query,
                count: results.results.len(),
                results: results.results.paths(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "TYPE", "PATH"]);
            for path in &results.results {
                table.add_row(vec![
                    file_name(path).to_string(),
                    file_kind(path),
                    path.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "query={:?} generation={} results={}",
                results.query,
                results.generation,
                results.results.len()
            );
            for path in &results.results {
                println!("  {} ({}) {}", file_name(path), file_kind(path), path);
            }
        }
        OutputFormat::Raw => {
            let mut text = String::new();
            for path in &results.results {
                text.push_str(path);
                text.push('\n');
            }
            print_raw(text.as_bytes());
        }
    }
}

pub fn print_status(status: &StatusEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(status).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATUS", "MESSAGE"])
                .add_row(vec![
                    status_label(status).to_string(),
                    status.message.clone().unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &status.message {
            Some(message) => println!("status={} message={message}", status_label(status)),
            None => println!("status={}", status_label(status)),
        },
        OutputFormat::Raw => {
            print_raw(format!("{}\n", status_label(status)).as_bytes());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn status_label(status: &StatusEvent) -> &'static str {
    if status.connected {
        "connected"
    } else if status.connecting {
        "connecting"
    } else {
        "disconnected"
    }
}

/// Last path component, splitting on either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Display type of a result, e.g. `PDF file`.
pub fn file_kind(path: &str) -> String {
    match file_name(path).rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{} file", ext.to_uppercase()),
        _ => "file".to_string(),
    }
}
