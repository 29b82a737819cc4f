use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use packlane_frame::{CancelToken, FrameError, PacketPump};
use tracing::{debug, warn};

use crate::cmd::ListenArgs;
use crate::exit::{io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = TcpListener::bind(&args.addr)
        .map_err(|err| io_error(&format!("bind to {} failed", args.addr), err))?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut printed = 0usize;

    while !cancel.is_cancelled() {
        let (stream, peer_addr) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) => return Err(io_error("accept failed", err)),
        };
        let peer = peer_addr.to_string();
        debug!(%peer, "connection accepted");

        // One pump and one framer per connection, driven by their own
        // thread; the bounded channel is the only concurrency boundary.
        let (tx, rx) = mpsc::sync_channel(args.queue_depth.max(1));
        let pump_cancel = cancel.clone();
        let pump = thread::spawn(move || PacketPump::new(stream).run(&tx, &pump_cancel));

        for packet in rx {
            print_packet(&packet, &peer, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    cancel.cancel();
                    break;
                }
            }
        }

        // A failure on this connection must not take the listener down.
        match pump.join() {
            Ok(Ok(())) => debug!(%peer, "pump finished"),
            Ok(Err(FrameError::Closed)) => debug!(%peer, "peer disconnected"),
            Ok(Err(err)) => warn!(%peer, error = %err, "connection failed"),
            Err(_) => warn!(%peer, "pump thread panicked"),
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(cancel: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
