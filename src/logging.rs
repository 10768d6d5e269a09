use indicatif::ProgressBar;
use std::env;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GITLAB_STATS_LOG";

/// Log to stderr so stdout carries only the run summary.
/// `GITLAB_STATS_LOG` takes precedence over `verbose`. When a progress bar is
/// given, each event is printed with the bar suspended.
pub fn init(verbose: bool, progress: Option<ProgressBar>) {
    let default = if verbose { "gitlab_stats=debug" } else { "gitlab_stats=info" };
    let filter = env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(BarAwareWriter::new(io::stderr, progress))
        .with_target(false)
        .try_init();
}

/// Buffers each event and emits it in one write, around the progress bar.
pub struct BarAwareWriter<M> {
    inner: M,
    progress: Option<ProgressBar>,
}

impl<M> BarAwareWriter<M> {
    pub fn new(inner: M, progress: Option<ProgressBar>) -> Self {
        Self { inner, progress }
    }
}

impl<'a, M> MakeWriter<'a> for BarAwareWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = EventBuffer<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        EventBuffer {
            buf: Vec::new(),
            out: self.inner.make_writer(),
            progress: self.progress.as_ref(),
        }
    }
}

pub struct EventBuffer<'a, W: Write> {
    buf: Vec<u8>,
    out: W,
    progress: Option<&'a ProgressBar>,
}

impl<W: Write> Write for EventBuffer<'_, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for EventBuffer<'_, W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        let out = &mut self.out;
        let mut emit = || {
            let _ = out.write_all(&buf).and_then(|()| out.flush());
        };
        match self.progress {
            Some(pb) => pb.suspend(emit),
            None => emit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn contents(sink: &Sink) -> String {
        String::from_utf8(sink.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn event_is_emitted_whole_when_buffer_drops() {
        let sink = Sink::default();
        let target = sink.clone();
        let writer = BarAwareWriter::new(move || target.clone(), Some(ProgressBar::hidden()));

        {
            let mut event = writer.make_writer();
            event.write_all(b"WARN Dropped commit ").unwrap();
            event.write_all(b"abc123\n").unwrap();
            assert_eq!(contents(&sink), "");
        }

        assert_eq!(contents(&sink), "WARN Dropped commit abc123\n");
    }

    #[test]
    fn writes_through_without_a_bar() {
        let sink = Sink::default();
        let target = sink.clone();
        let writer = BarAwareWriter::new(move || target.clone(), None);

        writer.make_writer().write_all(b"INFO Authenticated\n").unwrap();
        writer.make_writer().write_all(b"").unwrap();

        assert_eq!(contents(&sink), "INFO Authenticated\n");
    }
}
