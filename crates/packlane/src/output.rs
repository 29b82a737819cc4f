use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use packlane_frame::{Encoding, Packet};
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
struct PacketOutput<'a> {
    type_tag: u8,
    encoding: &'a str,
    payload_size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_packet(packet: &Packet, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                type_tag: packet.type_tag(),
                encoding: encoding_name(packet.encoding()),
                payload_size: packet.data().len(),
                payload: payload_preview(packet.data()),
                peer,
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
                .set_header(vec!["TYPE", "ENCODING", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    packet.type_tag().to_string(),
                    encoding_name(packet.encoding()).to_string(),
                    packet.data().len().to_string(),
                    peer.to_string(),
                    payload_preview(packet.data()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} encoding={} size={} peer={} payload={}",
                packet.type_tag(),
                encoding_name(packet.encoding()),
                packet.data().len(),
                peer,
                payload_preview(packet.data())
            );
        }
        OutputFormat::Raw => {
            print_raw(packet.data());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn encoding_name(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Json => "JSON",
        Encoding::Custom => "CUSTOM",
        Encoding::Reserved2 | Encoding::Reserved3 => "RESERVED",
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
