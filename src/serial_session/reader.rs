use crossbeam_channel::{SendTimeoutError, Sender};
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::transport::SerialLink;
use super::{Arrival, ArrivalPayload, SessionId};
use crate::decoder::{FramingMode, MAX_RECORD_BYTES};
use crate::{log_debug, log_debug_content};

const READ_BUFFER_BYTES: usize = 1024;
const DELIVER_RETRY: Duration = Duration::from_millis(50);

/// Shared flags and the outbound channel for one reader thread.
pub(super) struct ReaderContext {
    pub(super) session: SessionId,
    pub(super) port: String,
    pub(super) stop: Arc<AtomicBool>,
    pub(super) open: Arc<AtomicBool>,
    pub(super) arrivals: Sender<Arrival>,
}

impl ReaderContext {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Push one arrival to the consumer, giving up once the session is being closed.
    fn deliver(&self, payload: ArrivalPayload) -> bool {
        let mut message = Arrival {
            session: self.session,
            payload,
        };
        while !self.stopped() {
            match self.arrivals.send_timeout(message, DELIVER_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(unsent)) => message = unsent,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
        false
    }
}

pub(super) fn should_retry_read_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn stream_closed() -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, "serial stream closed")
}

/// Continuously read from the serial line and forward arrivals to the consumer.
///
/// The thread owns the link; it is dropped (and the port released) when the loop ends.
pub(super) fn spawn_reader_thread(
    link: SerialLink,
    framing: FramingMode,
    ctx: ReaderContext,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("serial-reader-{}", ctx.port))
        .spawn(move || {
            let outcome = match framing {
                FramingMode::Line => read_lines(link, &ctx),
                FramingMode::Burst => read_chunks(link, &ctx),
            };
            ctx.open.store(false, Ordering::SeqCst);
            match outcome {
                Ok(()) => log_debug(&format!("serial reader for {} stopped", ctx.port)),
                Err(err) => {
                    log_debug(&format!("serial read error on {}: {err}", ctx.port));
                    ctx.deliver(ArrivalPayload::Lost(err.to_string()));
                }
            }
        })
}

/// Burst framing: forward whatever each read returned.
fn read_chunks(mut link: SerialLink, ctx: &ReaderContext) -> io::Result<()> {
    let mut buffer = [0u8; READ_BUFFER_BYTES];
    while !ctx.stopped() {
        match link.read(&mut buffer) {
            Ok(0) => return Err(stream_closed()),
            Ok(n) => {
                let chunk = buffer.get(..n).unwrap_or(&[]).to_vec();
                if !ctx.deliver(ArrivalPayload::Chunk(chunk)) {
                    break;
                }
            }
            Err(err) if should_retry_read_error(&err) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Line framing: forward one `\n`-terminated line per arrival.
///
/// A read timeout mid-line keeps the partial bytes for the next attempt. A line longer
/// than `MAX_RECORD_BYTES` is discarded through its newline.
fn read_lines(link: SerialLink, ctx: &ReaderContext) -> io::Result<()> {
    let mut reader = BufReader::new(link);
    let mut line = Vec::new();
    let mut discarding = false;
    while !ctx.stopped() {
        let budget = (MAX_RECORD_BYTES + 1).saturating_sub(line.len()) as u64;
        match (&mut reader).take(budget).read_until(b'\n', &mut line) {
            Ok(0) => return Err(stream_closed()),
            Ok(_) if line.ends_with(b"\n") => {
                if mem::take(&mut discarding) {
                    line.clear();
                    continue;
                }
                log_debug_content(&format!(
                    "serial line from {}: {:?}",
                    ctx.port,
                    String::from_utf8_lossy(&line)
                ));
                if !ctx.deliver(ArrivalPayload::Chunk(mem::take(&mut line))) {
                    break;
                }
            }
            Ok(_) if line.len() > MAX_RECORD_BYTES => {
                if !discarding {
                    log_debug(&format!(
                        "dropping serial line over {MAX_RECORD_BYTES} bytes from {}",
                        ctx.port
                    ));
                }
                line.clear();
                discarding = true;
            }
            Ok(_) => return Err(stream_closed()),
            Err(err) if should_retry_read_error(&err) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
