//! The two threads that shuttle bytes between the PTY master and the session.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tracing::debug;

const READ_BUFFER_SIZE: usize = 4096;

/// One read's worth of output, exactly as the read returned it.
///
/// Chunk boundaries carry no meaning: a line may span several chunks and a
/// chunk may hold several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(pub(crate) Vec<u8>);

impl Chunk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The chunk decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

pub(crate) type OutputHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Callbacks the relay threads use to report back to the session.
pub(crate) trait RelayEvents: Send + Sync + 'static {
    /// The master reached end-of-file.
    fn closed(&self);
    /// A read or write failed for good.
    fn failed(&self, err: io::Error);
    fn debug(&self) -> bool;
}

/// Whether a read error just means the slave side went away.
///
/// Linux reports a hung-up PTY master as `EIO` rather than a zero-length read.
#[cfg(unix)]
fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_hangup(_err: &io::Error) -> bool {
    false
}

/// Spawn the reader thread: every read becomes one [`Chunk`] on `tx`.
pub(crate) fn spawn_reader<R, E>(
    mut reader: R,
    tx: UnboundedSender<Chunk>,
    tee: Option<OutputHandler>,
    events: Arc<E>,
) -> io::Result<()>
where
    R: Read + Send + 'static,
    E: RelayEvents,
{
    thread::Builder::new()
        .name("expectty-read".to_string())
        .spawn(move || {
            let mut buffer = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => {
                        if events.debug() {
                            debug!("received EOF");
                        }
                        events.closed();
                        break;
                    }
                    Ok(n) => {
                        if events.debug() {
                            debug!("read returned {n} bytes");
                        }
                        if let Some(tee) = &tee {
                            tee(&buffer[..n]);
                        }
                        if tx.send(Chunk(buffer[..n].to_vec())).is_err() {
                            break; // Session dropped
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if is_hangup(&e) => {
                        if events.debug() {
                            debug!("PTY hung up");
                        }
                        events.closed();
                        break;
                    }
                    Err(e) => {
                        events.failed(e);
                        break;
                    }
                }
            }
        })?;
    Ok(())
}

/// Spawn the writer thread: each message is written and flushed on arrival.
pub(crate) fn spawn_writer<W, E>(
    mut writer: W,
    mut rx: Receiver<Vec<u8>>,
    events: Arc<E>,
) -> io::Result<()>
where
    W: Write + Send + 'static,
    E: RelayEvents,
{
    thread::Builder::new()
        .name("expectty-write".to_string())
        .spawn(move || {
            while let Some(msg) = rx.blocking_recv() {
                if let Err(e) = writer.write_all(&msg).and_then(|()| writer.flush()) {
                    events.failed(e);
                    break;
                }
                if events.debug() {
                    debug!("wrote {} bytes", msg.len());
                }
            }
        })?;
    Ok(())
}
