use super::types::DriverCommand;
use crate::error::{NeuroStrideError, Result};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::trace;

/// Longest accepted input line; a 17-landmark frame is well under 4 KiB
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Source of driver commands, one per call
#[async_trait]
pub trait FrameSource: Send {
    /// Next command, or `Ok(None)` once the source is exhausted.
    ///
    /// `NeuroStrideError::Input` reports a single bad line; the source stays
    /// usable afterwards.
    async fn next_command(&mut self) -> Result<Option<DriverCommand>>;
}

/// Newline-delimited JSON commands read from any async reader
pub struct JsonLinesSource<R> {
    lines: FramedRead<R, LinesCodec>,
    line_number: u64,
}

impl<R: AsyncRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            line_number: 0,
        }
    }

    /// Number of lines consumed so far, blank ones included
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for JsonLinesSource<R> {
    async fn next_command(&mut self) -> Result<Option<DriverCommand>> {
        loop {
            let line = match self.lines.next().await {
                None => return Ok(None),
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::Io(e))) => return Err(NeuroStrideError::Io(e)),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.line_number += 1;
                    return Err(NeuroStrideError::input(
                        self.line_number,
                        format!("line longer than {} bytes", MAX_LINE_LENGTH),
                    ));
                }
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            trace!("Input line {}: {}", self.line_number, line);
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| NeuroStrideError::input(self.line_number, e.to_string()));
        }
    }
}
