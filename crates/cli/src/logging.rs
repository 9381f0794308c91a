//! Console + dated file logging for `chatrelay serve`.
//!
//! Every record goes to stderr and is appended to `<dir>/app-YYYYMMDD.log` (date taken once, at
//! start-up, in local time). Console output is coloured when stderr is a terminal; the file never
//! carries escape codes.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use relay::config::LoggingSettings;
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// File name for the log of `date`, e.g. `app-20240131.log`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("app-{}.log", date.format("%Y%m%d"))
}

/// Remove ANSI CSI sequences (`ESC [ ... final`), e.g. the colour codes env_logger writes.
fn strip_ansi(buf: &[u8]) -> Cow<'_, [u8]> {
    if !buf.contains(&0x1b) {
        return Cow::Borrowed(buf);
    }
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == 0x1b && buf.get(i + 1) == Some(&b'[') {
            i += 2;
            while i < buf.len() && !(0x40..=0x7e).contains(&buf[i]) {
                i += 1;
            }
            i += 1;
        } else {
            out.push(buf[i]);
            i += 1;
        }
    }
    Cow::Owned(out)
}

/// Writes each record to stderr as formatted, and to the log file without colour codes.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // stderr is best-effort; the file write decides success.
        let _ = io::stderr().write_all(buf);
        self.file.write_all(&strip_ansi(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

fn open_log_file(dir: &Path, date: NaiveDate) -> Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let path = dir.join(log_file_name(date));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok((file, path))
}

/// Install the global logger. `RUST_LOG` wins over the configured level. Returns the log file path.
pub fn init_logging(settings: &LoggingSettings) -> Result<PathBuf> {
    let today = chrono::Local::now().date_naive();
    let (file, path) = open_log_file(&settings.directory, today)?;
    // A piped target is uncoloured by default; pick the style from the console instead.
    let style = if io::stderr().is_terminal() {
        env_logger::WriteStyle::Always
    } else {
        env_logger::WriteStyle::Never
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.level.as_str()))
        .write_style(style)
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()
        .context("initializing logger")?;
    Ok(path)
}
