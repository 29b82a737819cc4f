use std::fs;
use std::io::Write;
use std::net::TcpStream;

use packlane_frame::{Encoding, Packet, PacketEncoder, MAX_PAYLOAD_SIZE};
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

/// Payload assembled from CLI arguments. Arguments are validated before the
/// encoder is handed to the frame layer, so its contract holds.
#[derive(Debug)]
struct CliPayload {
    type_tag: u8,
    encoding: Encoding,
    bytes: Vec<u8>,
}

impl PacketEncoder for CliPayload {
    fn type_tag(&self) -> u8 {
        self.type_tag
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn write_payload(&self, buf: &mut [u8]) -> usize {
        buf[..self.bytes.len()].copy_from_slice(&self.bytes);
        self.bytes.len()
    }
}

pub fn run(args: SendArgs, _format: OutputFormat) -> CliResult<i32> {
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "--repeat must be at least 1"));
    }

    let payload = resolve_payload(&args)?;
    let packet = Packet::from_encoder(&payload);

    let mut stream = TcpStream::connect(&args.addr)
        .map_err(|err| io_error(&format!("connect to {} failed", args.addr), err))?;

    for _ in 0..args.repeat {
        packet
            .write_to(&mut stream)
            .map_err(|err| frame_error("send failed", err))?;
    }
    stream
        .flush()
        .map_err(|err| io_error("flush failed", err))?;

    info!(
        type_tag = packet.type_tag(),
        bytes = packet.total_len(),
        repeat = args.repeat,
        "packet sent"
    );
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<CliPayload> {
    if args.type_tag > 62 {
        return Err(CliError::new(
            USAGE,
            format!("--type-tag must be 0-62, got {}", args.type_tag),
        ));
    }

    let (encoding, bytes) = if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        (Encoding::Json, json.as_bytes().to_vec())
    } else if let Some(data) = &args.data {
        (Encoding::Custom, data.as_bytes().to_vec())
    } else if let Some(path) = &args.file {
        let bytes = fs::read(path).map_err(|err| {
            io_error(&format!("failed reading {}", path.display()), err)
        })?;
        (Encoding::Custom, bytes)
    } else {
        return Err(CliError::new(
            USAGE,
            "one of --json, --data, or --file is required",
        ));
    };

    if bytes.is_empty() {
        return Err(CliError::new(USAGE, "payload must not be empty"));
    }
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(CliError::new(
            USAGE,
            format!(
                "payload too large ({} bytes, max {MAX_PAYLOAD_SIZE})",
                bytes.len()
            ),
        ));
    }

    Ok(CliPayload {
        type_tag: args.type_tag,
        encoding,
        bytes,
    })
}
