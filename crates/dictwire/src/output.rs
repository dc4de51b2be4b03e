use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dictwire_codec::{Message, Value};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct MessageOutput<'a> {
    peer: &'a str,
    entry_count: usize,
    entries: serde_json::Map<String, serde_json::Value>,
}

pub fn print_message(msg: &Message, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                peer,
                entry_count: msg.len(),
                entries: msg
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_json(v)))
                    .collect(),
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
                .set_header(vec!["KEY", "TYPE", "VALUE"]);
            for (key, value) in msg {
                table.add_row(vec![
                    key.clone(),
                    value.type_name().to_string(),
                    render_value(value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={} entries={}", peer, msg.len());
            for (key, value) in msg {
                println!("  {} ({}) = {}", key, value.type_name(), render_value(value));
            }
        }
    }
}

/// JSON rendering of a value. Binary becomes lowercase hex; a float with no
/// JSON representation (NaN, infinities) becomes null.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int64(v) => serde_json::Value::from(*v),
        Value::UInt64(v) => serde_json::Value::from(*v),
        Value::Float64(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(v) => serde_json::Value::from(v.as_str()),
        Value::Binary(v) => serde_json::Value::from(to_hex(v)),
    }
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Int64(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Binary(v) => format!("<binary {} bytes>", v.len()),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rendering_covers_every_variant() {
        assert_eq!(value_to_json(&Value::Int64(-5)), serde_json::json!(-5));
        assert_eq!(
            value_to_json(&Value::UInt64(u64::MAX)),
            serde_json::json!(u64::MAX)
        );
        assert_eq!(value_to_json(&Value::Float64(0.5)), serde_json::json!(0.5));
        assert_eq!(
            value_to_json(&Value::String("hi".into())),
            serde_json::json!("hi")
        );
        assert_eq!(
            value_to_json(&Value::Binary(vec![0xDE, 0xAD])),
            serde_json::json!("dead")
        );
    }

    #[test]
    fn non_finite_floats_render_as_null() {
        assert_eq!(value_to_json(&Value::Float64(f64::NAN)), serde_json::Value::Null);
        assert_eq!(
            value_to_json(&Value::Float64(f64::INFINITY)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn binary_preview_shows_length_not_contents() {
        assert_eq!(
            render_value(&Value::Binary(vec![1, 2, 3])),
            "<binary 3 bytes>"
        );
    }
}
