use thiserror::Error;

/// Delimiter used by newline-delimited JSON streams
pub const NEWLINE: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    #[error("splitter already finished; no more chunks accepted")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterState {
    Open,
    Closed,
}

/// Reassembles delimiter-terminated frames from arbitrarily chunked text.
///
/// Chunks go in through [`feed`](Self::feed), which returns every frame the
/// chunk completed. Text after the last delimiter stays buffered until a
/// later chunk terminates it or [`finish`](Self::finish) flushes it.
///
/// ```
/// use ollama_chat::stream::DelimitedSplitter;
///
/// let mut splitter = DelimitedSplitter::lines();
/// assert!(splitter.feed("part1").unwrap().is_empty());
/// assert_eq!(splitter.feed("part2\n").unwrap(), vec!["part1part2"]);
/// assert!(splitter.feed("part3").unwrap().is_empty());
/// assert_eq!(splitter.finish(), Some("part3".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct DelimitedSplitter {
    delimiter: String,
    buffer: String,
    state: SplitterState,
}

impl DelimitedSplitter {
    pub fn new(delimiter: impl Into<String>) -> Result<Self, SplitError> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(SplitError::EmptyDelimiter);
        }
        Ok(Self { delimiter, buffer: String::new(), state: SplitterState::Open })
    }

    /// Splitter for newline-delimited streams
    pub fn lines() -> Self {
        Self { delimiter: NEWLINE.to_string(), buffer: String::new(), state: SplitterState::Open }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Text received after the last delimiter
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> SplitterState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SplitterState::Closed
    }

    /// Append `chunk` and return the frames it completed, in order.
    ///
    /// Adjacent delimiters yield empty frames. A chunk without a delimiter
    /// yields nothing and only grows the buffer.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<String>, SplitError> {
        if self.is_closed() {
            return Err(SplitError::Closed);
        }
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        self.buffer.push_str(chunk);

        let mut parts: Vec<&str> = self.buffer.split(self.delimiter.as_str()).collect();
        // split always yields at least one part; the last is unterminated
        let rest = parts.pop().unwrap_or_default();
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let frames: Vec<String> = parts.into_iter().map(str::to_string).collect();
        self.buffer = rest.to_string();
        Ok(frames)
    }

    /// End of input: close the splitter and return the buffered tail if it
    /// is non-empty. Calling again returns `None`.
    pub fn finish(&mut self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        self.state = SplitterState::Closed;
        let rest = std::mem::take(&mut self.buffer);
        (!rest.is_empty()).then_some(rest)
    }
}

impl Default for DelimitedSplitter {
    fn default() -> Self {
        Self::lines()
    }
}
