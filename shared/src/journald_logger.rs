//! Journald logger implementation for the `log` interface

use bytes::BufMut;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::os::unix::net::UnixDatagram;

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

#[derive(Debug)]
pub struct JournaldLogger {
    sock: UnixDatagram,
    identifier: &'static str,
    level_filter: LevelFilter,
}

/// Initializes the `log` logger with a [JournaldLogger] tagging all entries with `identifier`
pub fn init(identifier: &'static str, level_filter: LevelFilter) -> anyhow::Result<()> {
    let sock = UnixDatagram::unbound()?;
    sock.connect(JOURNALD_SOCKET)?;

    log::set_boxed_logger(Box::new(JournaldLogger {
        sock,
        identifier,
        level_filter,
    }))?;
    log::set_max_level(level_filter);
    Ok(())
}

impl JournaldLogger {
    /// Builds one datagram in the journald native protocol.
    ///
    /// The message is sent in the binary safe form (field name, newline, little endian length,
    /// data) since log messages may contain newlines.
    fn encode(&self, record: &Record) -> Vec<u8> {
        let msg = record.args().to_string().into_bytes();
        let target = record.target();

        let mut buf = format!(
            "PRIORITY={}\nSYSLOG_IDENTIFIER={}\nTARGET={target}\nMESSAGE\n",
            level_to_priority(record.level()),
            self.identifier,
        )
        .into_bytes();

        buf.reserve(msg.len() + 8 + 1);
        buf.put_u64_le(msg.len() as u64);
        buf.extend(msg);
        buf.push(b'\n');
        buf
    }
}

impl Log for JournaldLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // There is nowhere else to report this to
        if let Err(err) = self.sock.send(&self.encode(record)) {
            eprintln!("Sending log to journald failed: {err}");
        }
    }

    fn flush(&self) {}
}

/// Convert [log::Level] into the corresponding syslog priority
fn level_to_priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}
