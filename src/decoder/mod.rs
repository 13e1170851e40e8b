//! Splits raw serial data into command tokens.


use clap::ValueEnum;
use std::fmt;

use crate::log_debug;

/// Longest record kept; anything longer is discarded up to its delimiter.
pub const MAX_RECORD_BYTES: usize = 4096;

/// How arrivals map onto records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FramingMode {
    /// Every arrival is exactly one line.
    #[default]
    Line,
    /// Arrivals are arbitrary byte runs that may hold several or partial records.
    Burst,
}

impl FramingMode {
    pub fn label(self) -> &'static str {
        match self {
            FramingMode::Line => "line",
            FramingMode::Burst => "burst",
        }
    }
}

/// A trimmed command symbol such as `PLAYPAUSE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandToken(String);

impl CommandToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_delimiter(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

fn token_from(bytes: &[u8]) -> Option<CommandToken> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    (!trimmed.is_empty() && trimmed.len() <= MAX_RECORD_BYTES)
        .then(|| CommandToken::new(trimmed))
}

#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    mode: FramingMode,
    pending: Vec<u8>,
    overflowed: bool,
}

impl FrameDecoder {
    pub fn new(mode: FramingMode) -> Self {
        Self {
            mode,
            pending: Vec::new(),
            overflowed: false,
        }
    }

    /// Undelimited bytes carried over from earlier chunks (burst framing only).
    pub fn pending_tail(&self) -> &[u8] {
        &self.pending
    }

    /// Drop any carried-over partial record.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.overflowed = false;
    }

    /// Decode one arrival into tokens, in arrival order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<CommandToken> {
        match self.mode {
            FramingMode::Line => token_from(chunk).into_iter().collect(),
            FramingMode::Burst => self.decode_burst(chunk),
        }
    }

    fn decode_burst(&mut self, chunk: &[u8]) -> Vec<CommandToken> {
        let Some(last_delimiter) = chunk.iter().rposition(|&b| is_delimiter(b)) else {
            self.carry(chunk);
            return Vec::new();
        };
        let (head, rest) = chunk.split_at(last_delimiter + 1);
        let mut complete = std::mem::take(&mut self.pending);
        if self.overflowed {
            // Skip the remainder of the oversized record.
            let first = head.iter().position(|&b| is_delimiter(b)).unwrap_or(0);
            complete.clear();
            complete.extend_from_slice(head.get(first..).unwrap_or_default());
            self.overflowed = false;
        } else {
            complete.extend_from_slice(head);
        }
        let tokens = complete
            .split(|&b| is_delimiter(b))
            .filter_map(token_from)
            .collect();
        self.carry(rest);
        tokens
    }

    fn carry(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.pending.len() + bytes.len() > MAX_RECORD_BYTES {
            log_debug(&format!(
                "dropping undelimited serial record over {MAX_RECORD_BYTES} bytes"
            ));
            self.pending.clear();
            self.overflowed = true;
            return;
        }
        self.pending.extend_from_slice(bytes);
    }
}
