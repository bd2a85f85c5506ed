use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use parmirror_proto::{encode, Message, ParamValue};
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
struct MessageOutput<'a> {
    kind: &'a str,
    id: Option<&'a str>,
    detail: String,
    timestamp: String,
}

pub fn print_message(msg: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: msg.kind(),
                id: msg.operation_id(),
                detail: detail(msg),
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
                .set_header(vec!["TYPE", "ID", "DETAIL"])
                .add_row(vec![
                    msg.kind().to_string(),
                    msg.operation_id().unwrap_or("-").to_string(),
                    detail(msg),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} id={} {}",
                msg.kind(),
                msg.operation_id().unwrap_or("-"),
                detail(msg)
            );
        }
        OutputFormat::Raw => {
            // The message's own wire document, one per line.
            if let Ok(payload) = encode(msg) {
                print_raw(&payload);
                println!();
            }
        }
    }
}

fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn detail(msg: &Message) -> String {
    match msg {
        Message::ClientReady | Message::RemoveWindow { .. } => String::new(),
        Message::SchemaUpdate { title, state, .. } => {
            format!("title={title:?} params={}", state.len())
        }
        Message::ParameterUpdate { values, .. } => render_values(values),
        Message::Ping { payload } | Message::Pong { payload } => payload
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default(),
        Message::Unknown { raw, .. } => raw.to_string(),
    }
}

fn render_values(values: &BTreeMap<String, ParamValue>) -> String {
    values
        .iter()
        .map(|(name, value)| {
            let rendered =
                serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string());
            format!("{name}={rendered}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_update_detail_lists_values() {
        let msg = Message::ParameterUpdate {
            id: "op-1".into(),
            values: BTreeMap::from([
                ("enabled".to_string(), ParamValue::Toggle(true)),
                ("speed".to_string(), ParamValue::Number(4.5)),
            ]),
        };
        assert_eq!(detail(&msg), "enabled=true speed=4.5");
    }

    #[test]
    fn schema_update_detail_counts_params() {
        let msg = Message::SchemaUpdate {
            id: "op-1".into(),
            title: "Beam".into(),
            schema: serde_json::json!({}),
            state: BTreeMap::from([("speed".to_string(), ParamValue::Number(1.0))]),
        };
        assert_eq!(detail(&msg), "title=\"Beam\" params=1");
    }
}
