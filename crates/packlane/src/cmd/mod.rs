use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode and send a single packet.
    Send(SendArgs),
    /// Listen and print received packets.
    Listen(ListenArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    pub addr: String,
    /// Packet type tag (0-62).
    #[arg(long, short = 't', default_value = "1")]
    pub type_tag: u8,
    /// JSON payload (validated, sent with the JSON encoding tag).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload (sent with the custom encoding tag).
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read the payload from a file (sent with the custom encoding tag).
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<std::path::PathBuf>,
    /// Send the packet N times over the same connection.
    #[arg(long, default_value = "1")]
    pub repeat: usize,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub addr: String,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Bound on undelivered packets per connection; a full queue throttles
    /// the reader.
    #[arg(long, default_value = "64")]
    pub queue_depth: usize,
}
