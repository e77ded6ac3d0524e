//! Response bodies and their wire encoding.
//!
//! A response is written in two phases: text lines first, then at most one
//! binary chunk announced by a `binary: <n>` line. The phases never interleave.

use std::fmt::Display;

/// Body of a successful command, without its `OK` terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
    binary: Option<Vec<u8>>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.lines.push(format!("{key}: {value}"));
        self
    }

    pub fn line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    /// Attaches the trailing binary chunk. Only the last call wins.
    pub fn binary(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.binary = Some(bytes);
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_frames(self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self.lines.into_iter().map(Frame::Line).collect();
        if let Some(bytes) = self.binary {
            frames.push(Frame::Line(format!("binary: {}", bytes.len())));
            frames.push(Frame::Binary(bytes));
        }
        frames
    }
}

/// One unit of output on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn ok() -> Self {
        Frame::Line("OK".to_string())
    }

    pub fn list_ok() -> Self {
        Frame::Line("list_OK".to_string())
    }
}

/// Serializes frames for the socket. Control characters are dropped from
/// text lines so that no value can forge an extra line; binary chunks are
/// copied verbatim and followed by a newline.
pub fn encode(frames: &[Frame]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        match frame {
            Frame::Line(line) => {
                out.extend(
                    line.chars()
                        .filter(|c| !c.is_control())
                        .collect::<String>()
                        .as_bytes(),
                );
                out.push(b'\n');
            }
            Frame::Binary(bytes) => {
                out.extend_from_slice(bytes);
                out.push(b'\n');
            }
        }
    }
    out
}
