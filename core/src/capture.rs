//! Response header capture.
//!
//! An interim `100 Continue` response arrives as its own header block ahead
//! of the final one. `HeaderCapture` drops that block so only the final
//! response's lines are kept, in arrival order.

use crate::transport::HeaderSink;

const CONTINUE_STATUS_LINE: &str = "http/1.1 100 continue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Normal,
    /// Inside the header block of an interim `100 Continue` response.
    ContinueBlock,
}

/// Collects header lines for one exchange.
#[derive(Debug, Clone, Default)]
pub struct HeaderCapture {
    lines: Vec<String>,
    state: CaptureState,
}

impl HeaderCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Feed one line (terminator optional) through the state machine.
    pub fn push(&mut self, raw: &str) {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            self.state = CaptureState::Normal;
        } else if line.eq_ignore_ascii_case(CONTINUE_STATUS_LINE) {
            self.state = CaptureState::ContinueBlock;
        } else if self.state == CaptureState::Normal {
            self.lines.push(line.to_string());
        }
    }
}

impl HeaderSink for HeaderCapture {
    fn header_line(&mut self, line: &[u8]) -> usize {
        self.push(&String::from_utf8_lossy(line));
        line.len()
    }
}
