use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::IsaError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotePolicy {
    #[default]
    None,
    Char(char),
}

impl QuotePolicy {
    pub fn quote_char(&self) -> Option<char> {
        match self {
            QuotePolicy::None => None,
            QuotePolicy::Char(quote) => Some(*quote),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

pub fn split_line(line: &str, line_no: usize, quote: QuotePolicy) -> Result<Vec<String>, IsaError> {
    let Some(quote) = quote.quote_char() else {
        return Ok(line.split('\t').map(str::to_string).collect());
    };

    let mut cells = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        let mut cell = String::new();
        if chars.peek() == Some(&quote) {
            chars.next();
            loop {
                match chars.next() {
                    None => {
                        return Err(IsaError::UnterminatedQuote {
                            line: line_no,
                            cell: cells.len() + 1,
                        });
                    }
                    Some(ch) if ch == quote => {
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            cell.push(quote);
                        } else {
                            break;
                        }
                    }
                    Some(ch) => cell.push(ch),
                }
            }
            match chars.next() {
                None => {
                    cells.push(cell);
                    return Ok(cells);
                }
                Some('\t') => cells.push(cell),
                Some(_) => {
                    return Err(IsaError::UnterminatedQuote {
                        line: line_no,
                        cell: cells.len() + 1,
                    });
                }
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        cells.push(cell);
                        return Ok(cells);
                    }
                    Some('\t') => {
                        cells.push(cell);
                        break;
                    }
                    Some(ch) => cell.push(ch),
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    quote: QuotePolicy,
    line: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, quote: QuotePolicy) -> Self {
        Self {
            reader,
            quote,
            line: 0,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<Row, IsaError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                Ok(_) => {
                    self.line += 1;
                    let decoded = String::from_utf8_lossy(&self.buf);
                    let mut text = decoded.trim_end_matches(['\n', '\r']);
                    if self.line == 1 {
                        text = text.trim_start_matches('\u{feff}');
                    }
                    if text.trim().is_empty() {
                        continue;
                    }
                    let row = split_line(text, self.line, self.quote).map(|cells| Row {
                        line: self.line,
                        cells,
                    });
                    if row.is_err() {
                        self.done = true;
                    }
                    return Some(row);
                }
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct SheetTokenizer<R> {
    header: Vec<String>,
    lines: LineReader<R>,
    failed: bool,
}

impl<R: BufRead> SheetTokenizer<R> {
    pub fn new(reader: R, quote: QuotePolicy) -> Result<Self, IsaError> {
        let mut lines = LineReader::new(reader, quote);
        let header = lines.next().ok_or(IsaError::EmptySheet)??;
        Ok(Self {
            header: header.cells,
            lines,
            failed: false,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl<R: BufRead> Iterator for SheetTokenizer<R> {
    type Item = Result<Row, IsaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = match self.lines.next()? {
            Ok(row) => row,
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };
        if row.cells.len() != self.header.len() {
            self.failed = true;
            return Some(Err(IsaError::RowLength {
                line: row.line,
                expected: self.header.len(),
                found: row.cells.len(),
            }));
        }
        Some(Ok(row))
    }
}
