/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ErrorKind {
    #[error("read past end of buffer at offset {offset}")]
    ReaderEof { offset: usize },
    #[error("tag mismatch at offset {offset}: expected {expected:#04x}, found {found:#04x}")]
    TagMismatch {
        offset: usize,
        expected: u8,
        found: u8,
    },
    #[error("length overflow at offset {offset}: {len}")]
    LengthOverflow { offset: usize, len: usize },
    #[error("unrecognized real preamble {preamble:#04x} at offset {offset}")]
    InvalidPreamble { offset: usize, preamble: u8 },
    #[error("value type mismatch: {expected} slot set with {found} value")]
    ValueTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid frame CRC {crc:#06x}")]
    FramingCrc { crc: u16 },
    #[error("inconsistent packet flags: {0}")]
    FramingReassembly(String),
    #[error("outbound queue is full")]
    QueueFull,
    #[error("not connected")]
    NotConnected,
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("attempt to update different element: {0}")]
    MergeIdentity(String),
    #[error("no live parent for path {path}")]
    MergeDetached { path: String },
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection error: {0}")]
    Connection(String),
}

/// An error plus the code sites it passed through on the way up.
///
/// Layers append their `site!()` via [`Crumb::crumb`] as the error
/// propagates, so the trace reads bottom-up.
#[derive(Debug, Error, Diagnostic)]
#[error("{kind}")]
pub struct EmberError {
    pub kind: ErrorKind,
    trace: Vec<&'static str>,
}

impl EmberError {
    pub fn new(kind: ErrorKind) -> Self {
        EmberError {
            kind,
            trace: Vec::new(),
        }
    }

    pub fn trace(&self) -> &[&'static str] {
        &self.trace
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Multi-line rendering including the crumb trace.
    pub fn verbose(&self) -> String {
        let mut out = self.kind.to_string();
        for site in &self.trace {
            out.push_str("\n    at ");
            out.push_str(site);
        }
        out
    }
}

impl From<ErrorKind> for EmberError {
    fn from(kind: ErrorKind) -> Self {
        EmberError::new(kind)
    }
}

impl From<io::Error> for EmberError {
    fn from(err: io::Error) -> Self {
        EmberError::new(ErrorKind::Io(err))
    }
}

pub type EmberResult<T> = Result<T, EmberError>;

/// The current code site, for [`Crumb::crumb`].
#[macro_export]
macro_rules! site {
    () => {
        concat!(file!(), ":", line!())
    };
}

/// Appends a propagation crumb to an error or the error arm of a result.
pub trait Crumb {
    fn crumb(self, site: &'static str) -> Self;
}

impl Crumb for EmberError {
    fn crumb(mut self, site: &'static str) -> Self {
        self.trace.push(site);
        self
    }
}

impl<T> Crumb for EmberResult<T> {
    fn crumb(self, site: &'static str) -> Self {
        self.map_err(|e| e.crumb(site))
    }
}

/// Wire enums decode from raw integers; this names the offender.
pub fn unknown_enum_value(name: &'static str, value: i32) -> EmberError {
    EmberError::new(ErrorKind::Deserialization(format!(
        "unknown {name} value: {value}"
    )))
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn crumbs_accumulate_in_propagation_order() {
        let inner: EmberResult<()> = Err(EmberError::new(ErrorKind::ReaderEof { offset: 7 }));
        let outer = inner.crumb(site!()).crumb(site!());
        let err = outer.unwrap_err();
        assert_eq!(2, err.trace().len());
        assert!(err.trace()[0].contains("error.rs"));
        assert!(err.verbose().contains("at "));
    }

    #[test]
    fn io_errors_convert() {
        let err: EmberError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err.kind, ErrorKind::Io(_)));
    }
}
