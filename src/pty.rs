use crate::error::{Error, Result};
use portable_pty::{MasterPty, PtySize, SlavePty};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Default terminal geometry for spawned programs
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

/// A freshly opened pseudo-terminal pair
pub struct Pty {
    pub(crate) master: Box<dyn MasterPty + Send>,
    slave: Option<Box<dyn SlavePty + Send>>,
    slave_path: Option<PathBuf>,
}

/// Open a new PTY pair sized `rows` x `cols`.
///
/// The master end stays open until the returned [`Pty`] (or the session that
/// takes it over) is dropped.
pub fn allocate(rows: u16, cols: u16) -> Result<Pty> {
    let pty_system = portable_pty::native_pty_system();

    let size = PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    };

    let pair = pty_system
        .openpty(size)
        .map_err(|e| Error::PtyAllocation {
            reason: format!("{e:#}"),
        })?;

    #[cfg(unix)]
    let slave_path = pair.master.tty_name();
    #[cfg(not(unix))]
    let slave_path = None;

    Ok(Pty {
        master: pair.master,
        slave: Some(pair.slave),
        slave_path,
    })
}

impl Pty {
    /// Filesystem path of the slave side, e.g. `/dev/pts/4`
    pub fn slave_path(&self) -> Option<&PathBuf> {
        self.slave_path.as_ref()
    }

    /// The slave end, while it is still held by this process
    pub(crate) fn slave(&self) -> Option<&(dyn SlavePty + Send)> {
        self.slave.as_deref()
    }

    /// Drop our copy of the slave end.
    ///
    /// Must happen once the child holds its own descriptors, otherwise the
    /// master never observes EOF when the child goes away.
    pub(crate) fn close_slave(&mut self) {
        self.slave = None;
    }

    /// Split off the read and write halves of the master for the relay threads
    pub(crate) fn master_io(&self) -> Result<(Box<dyn Read + Send>, Box<dyn Write + Send>)> {
        let reader = self
            .master
            .try_clone_reader()
            .map_err(|e| Error::PtyAllocation {
                reason: format!("failed to clone PTY reader: {e:#}"),
            })?;
        let writer = self
            .master
            .take_writer()
            .map_err(|e| Error::PtyAllocation {
                reason: format!("failed to take PTY writer: {e:#}"),
            })?;
        Ok((reader, writer))
    }

    /// Resize the PTY
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master.resize(size).map_err(|e| {
            Error::from(std::io::Error::other(format!("PTY resize failed: {e:#}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_resolves_slave_path() {
        let pty = allocate(DEFAULT_ROWS, DEFAULT_COLS).unwrap();
        let path = pty.slave_path().expect("slave path");
        assert!(path.exists(), "slave {} should exist", path.display());
    }

    #[test]
    fn test_close_slave() {
        let mut pty = allocate(DEFAULT_ROWS, DEFAULT_COLS).unwrap();
        assert!(pty.slave().is_some());
        pty.close_slave();
        assert!(pty.slave().is_none());
    }

    #[test]
    fn test_resize() {
        let pty = allocate(DEFAULT_ROWS, DEFAULT_COLS).unwrap();
        assert!(pty.resize(40, 120).is_ok());
        let size = pty.master.get_size().unwrap();
        assert_eq!((size.rows, size.cols), (40, 120));
    }
}
