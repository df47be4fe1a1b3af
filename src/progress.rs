//! Sweep progress bars and a log writer that prints above them.

use crate::models::EntityKind;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static BARS: OnceLock<MultiProgress> = OnceLock::new();

fn bars() -> &'static MultiProgress {
    BARS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

fn emit(line: &[u8]) {
    let line = String::from_utf8_lossy(line);
    let _ = bars().println(line.trim_end_matches('\r'));
}

/// Bar for one kind's sweep. Its length grows as pages arrive.
pub fn sweep_bar(kind: EntityKind) -> ProgressBar {
    let pb = bars().add(ProgressBar::new(0));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(format!("Syncing {}s", kind));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// `MakeWriter` for the fmt layer; lines go through the progress bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers partial writes until a full line is available
#[derive(Default)]
pub struct LogWriter {
    pending: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);

        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            emit(&line[..end]);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            emit(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_accepts_partial_lines() {
        let mut writer = LogWriter::default();
        assert_eq!(writer.write(b"INFO partial").unwrap(), 12);
        assert_eq!(writer.pending, b"INFO partial");

        writer.write_all(b" line\nWARN next").unwrap();
        assert_eq!(writer.pending, b"WARN next");

        writer.flush().unwrap();
        assert!(writer.pending.is_empty());
    }
}
