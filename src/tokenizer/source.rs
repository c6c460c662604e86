//! Line-supplying sources for the lexer.

use super::error::TokenizeError;
use std::io::BufRead;

/// Supplies physical lines, each with its terminator if it had one.
///
/// Sources must be `Send`: [`Parser::parse`](crate::parser::runtime::Parser::parse) runs on its own thread.
pub trait LineSource: Send {
    /// The next line, or `None` once the input is exhausted.
    fn next_line(&mut self) -> Result<Option<String>, TokenizeError>;
}

/// Lines of an in-memory buffer.
pub struct StrLines {
    text: String,
    offset: usize,
}

impl StrLines {
    pub fn new(text: impl Into<String>) -> Self {
        StrLines {
            text: text.into(),
            offset: 0,
        }
    }
}

impl LineSource for StrLines {
    fn next_line(&mut self) -> Result<Option<String>, TokenizeError> {
        if self.offset >= self.text.len() {
            return Ok(None);
        }
        let rest = &self.text[self.offset..];
        let len = rest.find('\n').map_or(rest.len(), |idx| idx + 1);
        self.offset += len;
        Ok(Some(rest[..len].to_string()))
    }
}

/// Lines read lazily from any buffered reader.
pub struct ReaderLines<R> {
    reader: R,
}

impl<R: BufRead> ReaderLines<R> {
    pub fn new(reader: R) -> Self {
        ReaderLines { reader }
    }
}

impl<R: BufRead + Send> LineSource for ReaderLines<R> {
    fn next_line(&mut self) -> Result<Option<String>, TokenizeError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(mut source: impl LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_str_lines_keep_terminators() {
        assert_eq!(drain(StrLines::new("a\nb\r\nc")), vec!["a\n", "b\r\n", "c"]);
        assert!(drain(StrLines::new("")).is_empty());
    }

    #[test]
    fn test_reader_lines_match_str_lines() {
        let text = "x = 1\n\n  y\n";
        assert_eq!(
            drain(ReaderLines::new(Cursor::new(text))),
            drain(StrLines::new(text))
        );
    }
}
