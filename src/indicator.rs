//! Progress indicator shown while waiting for the first response bytes.

use std::io::{self, Write};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";
const ERASE_LINE: &str = "\r\x1b[2K";

const TICK: Duration = Duration::from_secs(1);

/// A running "Loading..." indicator.
///
/// The indicator writes to stderr so that piped output stays clean.  Call
/// [`Indicator::stop`] before printing anything else.
pub struct Indicator {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Indicator {
    /// Start the indicator on stderr.
    pub fn start(use_color: bool) -> Self {
        Self::start_with(Box::new(io::stderr()), use_color, TICK)
    }

    fn start_with(mut out: Box<dyn Write + Send>, use_color: bool, tick: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut drawn = false;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let text = if drawn { "." } else { "Loading" };
                        let _ = if use_color {
                            write!(out, "{ANSI_YELLOW}{text}{ANSI_RESET}")
                        } else {
                            write!(out, "{text}")
                        };
                        let _ = out.flush();
                        drawn = true;
                    }
                }
            }
            if drawn {
                let _ = write!(out, "{ERASE_LINE}");
                let _ = out.flush();
            }
        });
        Self { cancel, handle }
    }

    /// Stop the indicator and wait until its line has been erased.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::debug!(error = %err, "progress indicator task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn prints_loading_then_dots_and_erases() {
        let buffer = SharedBuffer::default();
        let indicator = Indicator::start_with(Box::new(buffer.clone()), false, TICK);
        time::sleep(Duration::from_millis(2500)).await;
        indicator.stop().await;

        let output = buffer.contents();
        assert!(output.starts_with("Loading.."), "{output:?}");
        assert!(output.ends_with(ERASE_LINE));
    }

    #[tokio::test(start_paused = true)]
    async fn colored_output_is_yellow() {
        let buffer = SharedBuffer::default();
        let indicator = Indicator::start_with(Box::new(buffer.clone()), true, TICK);
        time::sleep(Duration::from_millis(100)).await;
        indicator.stop().await;
        assert!(buffer.contents().starts_with("\x1b[33mLoading\x1b[0m"));
    }
}
