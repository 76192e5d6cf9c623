use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use camlink_session::FrameUpdate;
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
struct ImageOutput<'a> {
    name: &'a str,
    size: usize,
}

#[derive(Serialize)]
struct UpdateOutput<'a> {
    frame: u64,
    source: &'a str,
    images: Vec<ImageOutput<'a>>,
    results: &'a serde_json::Value,
    timestamp: String,
}

pub fn print_update(update: &FrameUpdate, frame: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = UpdateOutput {
                frame,
                source: source_name(update),
                images: update
                    .images
                    .iter()
                    .map(|image| ImageOutput {
                        name: &image.name,
                        size: image.data.len(),
                    })
                    .collect(),
                results: &update.results,
                timestamp: now_unix_seconds(),
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
                .set_header(vec!["FRAME", "SOURCE", "IMAGES", "BYTES", "RESULTS"])
                .add_row(vec![
                    frame.to_string(),
                    source_name(update).to_string(),
                    image_names(update),
                    image_bytes(update).to_string(),
                    results_preview(update),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} source={} images={} bytes={} results={}",
                frame,
                source_name(update),
                image_names(update),
                image_bytes(update),
                results_preview(update)
            );
        }
        OutputFormat::Raw => {
            print_raw(update.metadata.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

fn source_name(update: &FrameUpdate) -> &'static str {
    if update.replayed {
        "replay"
    } else {
        "live"
    }
}

fn image_names(update: &FrameUpdate) -> String {
    if update.images.is_empty() {
        return "-".to_string();
    }
    update
        .images
        .iter()
        .map(|image| image.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn image_bytes(update: &FrameUpdate) -> usize {
    update.images.iter().map(|image| image.data.len()).sum()
}

fn results_preview(update: &FrameUpdate) -> String {
    const MAX: usize = 120;
    let text = update.results.to_string();
    if text.chars().count() > MAX {
        let truncated: String = text.chars().take(MAX).collect();
        format!("{truncated}...")
    } else {
        text
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
