//! System log forwarder
//!
//! Sends messages to the platform log service: `syslog(3)` on Unix,
//! `OutputDebugStringW` on Windows. System log services truncate long
//! entries, so messages of [`MAX_ENTRY_LEN`] bytes or more are split into
//! segments of at most [`SEGMENT_LEN`] bytes. Continuation segments start
//! with `"[...] "` and every segment but the last ends with `" [...]"`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Messages this long or longer are split.
pub const MAX_ENTRY_LEN: usize = 1024;

/// Upper bound on the message bytes carried by one segment.
pub const SEGMENT_LEN: usize = 1000;

const CONTINUED_PREFIX: &str = "[...] ";
const CONTINUES_SUFFIX: &str = " [...]";

/// Default identity used by [`log`] until [`init_system_log`] picks another.
pub const DEFAULT_IDENT: &str = "vram-probe";

/// Syslog severities, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// Numeric syslog code (0-7).
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        };
        f.write_str(name)
    }
}

impl TryFrom<i32> for Severity {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, String> {
        Ok(match code {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            7 => Severity::Debug,
            other => return Err(format!("invalid syslog severity {}", other)),
        })
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<i32>() {
            return Severity::try_from(code);
        }
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "emerg" | "emergency" | "panic" => Severity::Emergency,
            "alert" => Severity::Alert,
            "crit" | "critical" => Severity::Critical,
            "err" | "error" => Severity::Error,
            "warn" | "warning" => Severity::Warning,
            "notice" => Severity::Notice,
            "info" => Severity::Info,
            "debug" | "trace" => Severity::Debug,
            other => return Err(format!("unknown severity '{}'", other)),
        })
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::INFO => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

/// Split a message into system-log-sized entries.
///
/// Segment ends are pulled back to a UTF-8 character boundary, so a segment
/// may carry slightly fewer than [`SEGMENT_LEN`] bytes.
pub fn split_message(message: &str) -> Vec<String> {
    let len = message.len();
    if len < MAX_ENTRY_LEN {
        return vec![message.to_string()];
    }

    let mut segments = Vec::with_capacity(len / SEGMENT_LEN + 1);
    let mut pos = 0;
    while pos < len {
        let mut end = (pos + SEGMENT_LEN).min(len);
        while !message.is_char_boundary(end) {
            end -= 1;
        }

        let mut entry =
            String::with_capacity(end - pos + CONTINUED_PREFIX.len() + CONTINUES_SUFFIX.len());
        if pos > 0 {
            entry.push_str(CONTINUED_PREFIX);
        }
        entry.push_str(&message[pos..end]);
        if end < len {
            entry.push_str(CONTINUES_SUFFIX);
        }
        segments.push(entry);
        pos = end;
    }
    segments
}

/// Destination for individual, already split, log entries.
pub trait LogSink: Send + Sync {
    fn write(&self, severity: Severity, entry: &str);
}

/// `syslog(3)` sink. Opens the connection with `LOG_PID` under `LOG_USER`.
#[cfg(unix)]
pub struct SyslogSink {
    // openlog keeps a pointer to the ident, so it lives as long as the sink.
    ident: std::ffi::CString,
}

#[cfg(unix)]
impl SyslogSink {
    pub fn open(ident: &str) -> Self {
        let ident = std::ffi::CString::new(ident.replace('\0', "")).unwrap_or_default();
        // SAFETY: `ident` is NUL-terminated and owned by the sink.
        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_USER) };
        Self { ident }
    }

    pub fn ident(&self) -> &str {
        self.ident.to_str().unwrap_or_default()
    }
}

#[cfg(unix)]
impl LogSink for SyslogSink {
    fn write(&self, severity: Severity, entry: &str) {
        let Ok(entry) = std::ffi::CString::new(entry.replace('\0', "")) else {
            return;
        };
        // SAFETY: fixed "%s" format with one NUL-terminated argument.
        unsafe {
            libc::syslog(
                libc::LOG_USER | severity.code(),
                b"%s\0".as_ptr() as *const libc::c_char,
                entry.as_ptr(),
            )
        };
    }
}

/// Debugger output sink (`OutputDebugStringW`), visible in DebugView and
/// attached debuggers.
#[cfg(windows)]
pub struct DebugOutputSink {
    ident: String,
}

#[cfg(windows)]
impl DebugOutputSink {
    pub fn open(ident: &str) -> Self {
        Self {
            ident: ident.to_string(),
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }
}

#[cfg(windows)]
impl LogSink for DebugOutputSink {
    fn write(&self, severity: Severity, entry: &str) {
        use ::windows::core::PCWSTR;
        use ::windows::Win32::System::Diagnostics::Debug::OutputDebugStringW;

        let line = format!("{} [{}] {}\n", self.ident, severity, entry);
        let wide: Vec<u16> = line
            .encode_utf16()
            .filter(|&c| c != 0)
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        unsafe { OutputDebugStringW(PCWSTR::from_raw(wide.as_ptr())) };
    }
}

/// Standard error sink for targets with no system log service.
#[cfg(not(any(unix, windows)))]
pub struct StderrSink {
    ident: String,
}

#[cfg(not(any(unix, windows)))]
impl StderrSink {
    pub fn open(ident: &str) -> Self {
        Self {
            ident: ident.to_string(),
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }
}

#[cfg(not(any(unix, windows)))]
impl LogSink for StderrSink {
    fn write(&self, severity: Severity, entry: &str) {
        eprintln!("{} [{}] {}", self.ident, severity, entry);
    }
}

/// The sink [`log`] writes to on this platform.
#[cfg(unix)]
pub type PlatformSink = SyslogSink;
#[cfg(windows)]
pub type PlatformSink = DebugOutputSink;
#[cfg(not(any(unix, windows)))]
pub type PlatformSink = StderrSink;

/// Splits messages and writes the pieces to a sink.
pub struct SystemLogger<S: LogSink> {
    sink: S,
}

impl<S: LogSink> SystemLogger<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn log(&self, severity: Severity, message: &str) {
        for entry in split_message(message) {
            self.sink.write(severity, &entry);
        }
    }
}

impl SystemLogger<PlatformSink> {
    /// Logger over this platform's system log, under `ident`.
    pub fn platform(ident: &str) -> Self {
        Self::new(PlatformSink::open(ident))
    }
}

static SYSTEM_LOGGER: OnceLock<Arc<SystemLogger<PlatformSink>>> = OnceLock::new();

/// Open the process-wide system logger under `ident`.
///
/// Only the first call (or the first [`log`]) picks the identity; later
/// calls return the existing logger.
pub fn init_system_log(ident: &str) -> Arc<SystemLogger<PlatformSink>> {
    Arc::clone(SYSTEM_LOGGER.get_or_init(|| Arc::new(SystemLogger::platform(ident))))
}

/// Forward `message` to the system log at `severity`, splitting long
/// messages.
pub fn log(severity: Severity, message: &str) {
    init_system_log(DEFAULT_IDENT).log(severity, message);
}
