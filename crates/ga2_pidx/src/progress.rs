//! Progress reporting for long running workspace operations.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Callback receiving human readable progress lines
///
/// Lines may arrive from several worker threads at once.
pub type LogSink<'s> = dyn Fn(&str) + Sync + 's;

/// A sink that discards every line
pub fn silent(_: &str) {}

/// Forwards progress lines to a [`LogSink`] and to `tracing`
#[derive(Clone, Copy)]
pub struct Progress<'a> {
    sink: &'a LogSink<'a>,
}

impl<'a> Progress<'a> {
    /// Wrap a sink
    pub fn new(sink: &'a LogSink<'a>) -> Self {
        Self { sink }
    }

    /// Report a line, returning it for the caller's own records
    pub fn info(&self, line: String) -> String {
        info!("{line}");
        (self.sink)(&line);
        line
    }

    /// Report a failure, returning it for the caller's own records
    pub fn warn(&self, line: String) -> String {
        warn!("{line}");
        (self.sink)(&line);
        line
    }
}

/// Fail with [`Error::Cancelled`] once `cancel` has been raised
pub fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Run `work` on a dedicated pool of `threads` workers, or on the global pool
pub fn run_on_pool<T, F>(threads: Option<usize>, work: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match threads {
        Some(threads) if threads > 0 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            Ok(pool.install(work))
        }
        _ => Ok(work()),
    }
}

#[cfg(test)]
mod test {
    use std::sync::{atomic::AtomicBool, Mutex};

    use pretty_assertions::assert_eq;

    use super::{check_cancelled, run_on_pool, Progress};
    use crate::error::{Error, Result};

    #[test]
    fn progress_forwards_lines() {
        let lines = Mutex::new(Vec::new());
        let sink = |line: &str| lines.lock().unwrap().push(line.to_owned());
        let progress = Progress::new(&sink);

        let returned = progress.info("[PLAN] 3 paths".to_owned());
        progress.warn("[DAT] failed".to_owned());

        assert_eq!(returned, "[PLAN] 3 paths");
        assert_eq!(*lines.lock().unwrap(), ["[PLAN] 3 paths", "[DAT] failed"]);
    }

    #[test]
    fn cancellation() {
        assert!(check_cancelled(None).is_ok());
        assert!(check_cancelled(Some(&AtomicBool::new(false))).is_ok());
        assert!(matches!(
            check_cancelled(Some(&AtomicBool::new(true))),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn dedicated_pool() -> Result<()> {
        let threads = run_on_pool(Some(2), rayon::current_num_threads)?;
        assert_eq!(threads, 2);
        assert_eq!(run_on_pool(None, || 5)?, 5);
        Ok(())
    }
}
