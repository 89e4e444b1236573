//! File writer that swaps to a new log file at each
//! hour boundary.
use crate::Result;
use futures::FutureExt;
use parking_lot::Mutex;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use time::{format_description, OffsetDateTime};
use time_tz::{OffsetDateTimeExt, Tz};
use tokio::{
    sync::{mpsc, oneshot},
    time::{interval_at, Instant},
};

/// Interval between rotations once the first boundary
/// has been crossed.
const ROTATE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Margin added to the first timer so it never fires just
/// before the hour boundary.
const ROTATE_GUARD: Duration = Duration::from_millis(10);

/// Hour stamp embedded in log file names.
const FILE_STAMP: &str = "[year]-[month]-[day]-[hour]";

/// Handle used to stop the background rotation task.
///
/// Shutting down closes the current log file; writes issued
/// afterwards fail with [std::io::ErrorKind::BrokenPipe].
/// Dropping the handle without calling
/// [shutdown](RotationHandle::shutdown) also stops the task
/// at its next wake up.
pub struct RotationHandle {
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl RotationHandle {
    fn new() -> (Self, mpsc::Receiver<()>, oneshot::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ack_tx, ack_rx) = oneshot::channel::<()>();

        (
            Self {
                shutdown_tx,
                shutdown_rx: ack_rx,
            },
            shutdown_rx,
            ack_tx,
        )
    }

    /// Stop the rotation task and close the current log file.
    ///
    /// Waits for the task to acknowledge so the file is
    /// guaranteed closed when this returns. In-flight writes
    /// holding the lock complete first.
    pub async fn shutdown(self) {
        let res = self.shutdown_tx.send(()).await;
        if let Err(error) = res {
            tracing::warn!(error = ?error);
        }
        let res = self.shutdown_rx.await;
        if let Err(error) = res {
            tracing::warn!(error = ?error);
        }
    }
}

/// Writer that appends to `<prefix>-YYYY-MM-DD-HH.log` and
/// swaps to the next hour's file at each boundary.
///
/// The hour stamp uses local time resolved from the system
/// timezone once at construction. Cloning is cheap and all
/// clones share the single file handle; writes from any
/// number of threads are serialized against each other and
/// against rotation by one lock, so no write is ever split
/// across a rotation boundary.
///
/// Must be opened from within a tokio runtime.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Inner>,
}

impl RotatingFileWriter {
    /// Open the current hour's log file and spawn the
    /// background rotation task.
    ///
    /// Fails when the system timezone cannot be resolved or
    /// the initial file cannot be opened.
    pub fn open(
        prefix: impl AsRef<Path>,
    ) -> Result<(Self, RotationHandle)> {
        let tz = time_tz::system::get_timezone()?;
        let inner = Arc::new(Inner {
            prefix: prefix.as_ref().to_path_buf(),
            tz,
            file: Mutex::new(None),
        });

        let file = inner.open_file(inner.now())?;
        *inner.file.lock() = Some(file);

        let until_boundary = inner.until_next_boundary()?;
        let (handle, shutdown_rx, ack_tx) = RotationHandle::new();

        let task = Arc::clone(&inner);
        tokio::task::spawn(async move {
            task.rotation_loop(until_boundary, shutdown_rx, ack_tx)
                .await;
        });

        Ok((Self { inner }, handle))
    }

    /// Path of the log file for the given instant.
    pub fn path_at(&self, when: OffsetDateTime) -> Result<PathBuf> {
        self.inner.path_at(when)
    }

    /// Path of the current hour's log file.
    pub fn current_path(&self) -> Result<PathBuf> {
        self.inner.path_at(self.inner.now())
    }

    #[cfg(test)]
    pub(crate) fn now(&self) -> OffsetDateTime {
        self.inner.now()
    }

    #[cfg(test)]
    pub(crate) fn rotate_at(&self, when: OffsetDateTime) -> Result<()> {
        self.inner.rotate(when)
    }

    #[cfg(test)]
    pub(crate) fn until_next_boundary(&self) -> Result<Duration> {
        self.inner.until_next_boundary()
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Write for &RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct Inner {
    prefix: PathBuf,
    tz: &'static Tz,
    file: Mutex<Option<File>>,
}

impl Inner {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_timezone(self.tz)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.file.lock();
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Err(closed()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        let mut guard = self.file.lock();
        match guard.as_mut() {
            Some(file) => file.flush(),
            None => Err(closed()),
        }
    }

    fn path_at(&self, when: OffsetDateTime) -> Result<PathBuf> {
        let format = format_description::parse(FILE_STAMP)?;
        let stamp = when.format(&format)?;
        let mut name = self.prefix.as_os_str().to_os_string();
        name.push(format!("-{}.log", stamp));
        Ok(PathBuf::from(name))
    }

    fn open_file(&self, when: OffsetDateTime) -> Result<File> {
        let path = self.path_at(when)?;
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        Ok(options.open(path)?)
    }

    /// Duration until the top of the next hour plus the
    /// guard margin.
    fn until_next_boundary(&self) -> Result<Duration> {
        let now = self.now();
        let boundary = now
            .replace_minute(0)?
            .replace_second(0)?
            .replace_nanosecond(0)?
            + time::Duration::HOUR;
        Ok((boundary - now).unsigned_abs() + ROTATE_GUARD)
    }

    /// Swap in the log file for the given instant.
    ///
    /// The new file is opened before the old handle is given
    /// up; on failure the old handle is kept and writes
    /// continue against it. The old handle is dropped under
    /// the lock so an in-flight write never races the swap.
    fn rotate(&self, when: OffsetDateTime) -> Result<()> {
        let file = self.open_file(when)?;
        *self.file.lock() = Some(file);
        Ok(())
    }

    async fn rotation_loop(
        self: Arc<Self>,
        until_boundary: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
        ack_tx: oneshot::Sender<()>,
    ) {
        let mut interval = interval_at(
            Instant::now() + until_boundary,
            ROTATE_PERIOD,
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv().fuse() => {
                    tracing::debug!("rotating_writer::shutting_down");
                    self.file.lock().take();
                    let _ = ack_tx.send(());
                    break;
                }
                _ = interval.tick() => {
                    tracing::debug!("rotating_writer::rotate");
                    if let Err(error) = self.rotate(self.now()) {
                        tracing::error!(
                            error = ?error,
                            "rotating_writer::reopen"
                        );
                    }
                }
            }
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "log writer is closed")
}
