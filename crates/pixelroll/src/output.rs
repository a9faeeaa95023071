use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pixelroll_frame::InboundFrame;
use pixelroll_session::{Outcome, ResultTier};
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

#[derive(Serialize, Default)]
struct FrameOutput {
    message: &'static str,
    message_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    led_count: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    design_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_flash: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_timestamp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roll_tag: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_value: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_tag: Option<&'static str>,
}

impl FrameOutput {
    fn from_frame(frame: &InboundFrame) -> Self {
        let base = Self {
            message: frame.name(),
            message_type: frame.message_type(),
            ..Self::default()
        };
        match frame {
            InboundFrame::Identity(id) => Self {
                device_id: Some(id.device_id),
                led_count: Some(id.led_count),
                design_code: Some(id.design_code),
                dataset_hash: Some(format!("{:#010x}", id.dataset_hash)),
                available_flash: Some(id.available_flash),
                build_timestamp: Some(id.build_timestamp),
                roll_tag: Some(id.roll_tag.name()),
                face_index: Some(id.face_index),
                face_value: Some(id.face_value()),
                battery_level: Some(id.battery_level),
                battery_tag: Some(id.battery_tag.name()),
                ..base
            },
            InboundFrame::RollState(state) => Self {
                roll_tag: Some(state.roll_tag.name()),
                face_index: Some(state.face_index),
                face_value: Some(state.face_value()),
                ..base
            },
            InboundFrame::Battery(battery) => Self {
                battery_level: Some(battery.battery_level),
                battery_tag: Some(battery.battery_tag.name()),
                ..base
            },
            InboundFrame::BlinkAck => base,
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("message", self.message.to_string()),
            ("message_type", self.message_type.to_string()),
        ];
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                rows.push((key, value));
            }
        };
        push("device_id", self.device_id.map(|v| format!("{v:#010x}")));
        push("led_count", self.led_count.map(|v| v.to_string()));
        push("design_code", self.design_code.map(|v| v.to_string()));
        push("dataset_hash", self.dataset_hash.clone());
        push("available_flash", self.available_flash.map(|v| v.to_string()));
        push("build_timestamp", self.build_timestamp.map(|v| v.to_string()));
        push("roll_tag", self.roll_tag.map(str::to_string));
        push("face_index", self.face_index.map(|v| v.to_string()));
        push("face_value", self.face_value.map(|v| v.to_string()));
        push("battery_level", self.battery_level.map(|v| v.to_string()));
        push("battery_tag", self.battery_tag.map(str::to_string));
        rows
    }
}

pub fn print_frame(frame: &InboundFrame, raw: &[u8], format: OutputFormat) {
    let out = FrameOutput::from_frame(frame);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in out.rows() {
                table.add_row(vec![key.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = out
                .rows()
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            println!("{}", fields.join(" "));
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    command: &'a str,
    size: usize,
    hex: String,
}

pub fn print_encoded(command: &str, bytes: &[u8], format: OutputFormat) {
    let out = EncodedOutput {
        command,
        size: bytes.len(),
        hex: hex::encode(bytes),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SIZE", "HEX"])
                .add_row(vec![
                    out.command.to_string(),
                    out.size.to_string(),
                    out.hex.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", out.hex),
        OutputFormat::Raw => print_raw(bytes),
    }
}

#[derive(Serialize)]
struct TierOutput {
    total: u32,
    tier: ResultTier,
}

pub fn print_tier(total: u32, tier: ResultTier, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&TierOutput { total, tier }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["TOTAL", "TIER"])
                .add_row(vec![total.to_string(), tier.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!("{tier}"),
    }
}

/// A resolved outcome plus when it resolved, in milliseconds from the start
/// of the run.
pub struct ResolvedOutcome {
    pub at_ms: u64,
    pub outcome: Outcome,
}

#[derive(Serialize)]
struct OutcomeOutput<'a> {
    resolved_at_ms: u64,
    #[serde(flatten)]
    outcome: &'a Outcome,
    highest: Option<u8>,
}

/// Print one outcome as soon as it is known. Table output falls back to one
/// table per outcome.
pub fn print_outcome(resolved: &ResolvedOutcome, format: OutputFormat) {
    print_outcomes(std::slice::from_ref(resolved), format);
}

pub fn print_outcomes(outcomes: &[ResolvedOutcome], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for resolved in outcomes {
                print_json(&OutcomeOutput {
                    resolved_at_ms: resolved.at_ms,
                    outcome: &resolved.outcome,
                    highest: resolved.outcome.highest(),
                });
            }
        }
        OutputFormat::Table => {
            if outcomes.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "AT (ms)", "DICE", "FACES", "TOTAL", "HIGHEST", "TIER", "FLAGS",
                ]);
            for resolved in outcomes {
                let outcome = &resolved.outcome;
                table.add_row(vec![
                    resolved.at_ms.to_string(),
                    outcome.participants().len().to_string(),
                    join(outcome.face_values()),
                    outcome.total().to_string(),
                    outcome
                        .highest()
                        .map_or_else(|| "-".to_string(), |v| v.to_string()),
                    outcome.tier().to_string(),
                    flags(outcome),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for resolved in outcomes {
                let outcome = &resolved.outcome;
                println!(
                    "at={}ms total={} tier={} faces=[{}] flags={}",
                    resolved.at_ms,
                    outcome.total(),
                    outcome.tier(),
                    join(outcome.face_values()),
                    flags(outcome),
                );
            }
        }
        OutputFormat::Raw => {
            for resolved in outcomes {
                println!("{}", resolved.outcome.total());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn join(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn flags(outcome: &Outcome) -> String {
    match (outcome.degraded(), outcome.low_confidence()) {
        (false, false) => "-".to_string(),
        (true, false) => "degraded".to_string(),
        (false, true) => "low-confidence".to_string(),
        (true, true) => "degraded,low-confidence".to_string(),
    }
}
