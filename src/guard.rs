// Scoped release through custom deleters
use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::ptr::NonNull;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{HandleError, Result};
use crate::handle::ExclusiveHandle;

/// A resource with an explicit open/close protocol. Clones observe the
/// same underlying stream.
#[derive(Debug, Default, Clone)]
pub struct Stream {
    open: Rc<Cell<bool>>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        debug!("stream is opened");
        self.open.set(true);
    }

    pub fn close(&self) {
        debug!("stream is closed");
        self.open.set(false);
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }
}

pub type StreamCloser = fn(NonNull<Stream>);

/// Opens `stream` and returns a guard that closes it when dropped.
pub fn stream_guard(stream: Stream) -> ExclusiveHandle<Stream, StreamCloser> {
    fn close(raw: NonNull<Stream>) {
        // Safety: the pointer came from Box::leak in stream_guard.
        let stream = unsafe { Box::from_raw(raw.as_ptr()) };
        if stream.is_open() {
            stream.close();
        }
    }

    stream.open();
    let raw = NonNull::from(Box::leak(Box::new(stream)));
    // Safety: freshly leaked box, freed only by `close`.
    unsafe { ExclusiveHandle::from_raw_with_deleter(Some(raw), close as StreamCloser) }
}

pub type FileCloser = fn(NonNull<BufWriter<File>>);

/// Creates `path` for writing through a buffer. The buffer is flushed and
/// the file synced and closed when the handle goes away, on every exit path.
pub fn file_handle(path: &Path) -> Result<ExclusiveHandle<BufWriter<File>, FileCloser>> {
    fn close(raw: NonNull<BufWriter<File>>) {
        // Safety: the pointer came from Box::leak in file_handle.
        let mut file = unsafe { Box::from_raw(raw.as_ptr()) };
        if let Err(err) = file.flush() {
            warn!(%err, "flush on close failed");
        } else if let Err(err) = file.get_ref().sync_all() {
            warn!(%err, "sync on close failed");
        }
        debug!("file closed");
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|err| HandleError::io(path, err))?;
    debug!(path = %path.display(), "file opened");

    let raw = NonNull::from(Box::leak(Box::new(BufWriter::new(file))));
    // Safety: freshly leaked box, freed only by `close`.
    Ok(unsafe { ExclusiveHandle::from_raw_with_deleter(Some(raw), close as FileCloser) })
}

/// Writes `text` into a fresh file at `path`, bailing out early if
/// `fail_midway` is set. The file is closed either way.
pub fn write_text(path: &Path, text: &str, fail_midway: bool) -> Result<()> {
    let mut file = file_handle(path)?;
    file.write_all(text.as_bytes())
        .map_err(|err| HandleError::io(path, err))?;

    if fail_midway {
        return Err(HandleError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::Interrupted, "simulated failure"),
        ));
    }
    Ok(())
}
