//! Splits a migration script into its up and down statement lists.
//!
//! Scripts are plain SQL annotated with directive comments:
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE people (id INT);
//!
//! -- +migrate StatementBegin
//! CREATE TRIGGER people_guard BEFORE DELETE ON people
//! BEGIN
//!     SELECT RAISE(ABORT, 'read only');
//! END;
//! -- +migrate StatementEnd
//!
//! -- +migrate Down
//! DROP TABLE people;
//! ```
//!
//! Outside a `StatementBegin`/`StatementEnd` block a statement ends on the
//! first line whose code ends with `;`. Inside a block everything up to
//! `StatementEnd` is one statement. Text before the first section directive
//! is ignored.

use thiserror::Error;

const DIRECTIVE_PREFIX: &str = "-- +migrate";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No '-- +migrate Up' or '-- +migrate Down' directive found")]
    NoDirectives,

    #[error("Line {line}: StatementBegin is never closed by StatementEnd")]
    UnterminatedBlock { line: usize },

    #[error("Statement starting at line {line} is not terminated by a semicolon")]
    UnterminatedStatement { line: usize },

    #[error("Line {line}: unexpected {directive} directive")]
    UnexpectedDirective { line: usize, directive: String },

    #[error("Line {line}: unknown directive '{directive}'")]
    UnknownDirective { line: usize, directive: String },
}

/// The statements of one migration script, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStatements {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

struct Splitter {
    section: Section,
    result: SplitStatements,
    buffer: String,
    buffer_start: usize,
    block_start: Option<usize>,
    saw_section: bool,
}

impl Splitter {
    fn new() -> Self {
        Self {
            section: Section::Preamble,
            result: SplitStatements::default(),
            buffer: String::new(),
            buffer_start: 0,
            block_start: None,
            saw_section: false,
        }
    }

    fn push_line(&mut self, line_no: usize, line: &str) {
        if self.buffer.is_empty() {
            self.buffer_start = line_no;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    fn flush(&mut self) {
        let statement = self.buffer.trim().to_string();
        self.buffer.clear();
        if statement.is_empty() {
            return;
        }
        match self.section {
            Section::Up => self.result.up.push(statement),
            Section::Down => self.result.down.push(statement),
            Section::Preamble => {}
        }
    }

    fn ensure_no_pending(&self) -> Result<(), ParseError> {
        if let Some(line) = self.block_start {
            return Err(ParseError::UnterminatedBlock { line });
        }
        if !self.buffer.trim().is_empty() {
            return Err(ParseError::UnterminatedStatement {
                line: self.buffer_start,
            });
        }
        Ok(())
    }

    fn directive(&mut self, line_no: usize, command: &str) -> Result<(), ParseError> {
        let unexpected = |directive: &str| ParseError::UnexpectedDirective {
            line: line_no,
            directive: directive.to_string(),
        };

        if command.eq_ignore_ascii_case("Up") || command.eq_ignore_ascii_case("Down") {
            self.ensure_no_pending()?;
            self.section = if command.eq_ignore_ascii_case("Up") {
                Section::Up
            } else {
                Section::Down
            };
            self.saw_section = true;
        } else if command.eq_ignore_ascii_case("StatementBegin") {
            if self.section == Section::Preamble || self.block_start.is_some() {
                return Err(unexpected("StatementBegin"));
            }
            self.ensure_no_pending()?;
            self.block_start = Some(line_no);
        } else if command.eq_ignore_ascii_case("StatementEnd") {
            if self.block_start.take().is_none() {
                return Err(unexpected("StatementEnd"));
            }
            self.flush();
        } else {
            return Err(ParseError::UnknownDirective {
                line: line_no,
                directive: command.to_string(),
            });
        }
        Ok(())
    }

    fn finish(self) -> Result<SplitStatements, ParseError> {
        self.ensure_no_pending()?;
        if !self.saw_section {
            return Err(ParseError::NoDirectives);
        }
        Ok(self.result)
    }
}

/// Split raw script text into ordered up and down statements.
pub fn split_statements(raw: &str) -> Result<SplitStatements, ParseError> {
    let mut splitter = Splitter::new();

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix(DIRECTIVE_PREFIX) {
            let command = rest.split_whitespace().next().unwrap_or("");
            splitter.directive(line_no, command)?;
            continue;
        }

        if splitter.section == Section::Preamble {
            continue;
        }

        if splitter.block_start.is_some() {
            splitter.push_line(line_no, line);
            continue;
        }

        // Blank lines and whole-line comments between statements carry nothing
        if splitter.buffer.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        splitter.push_line(line_no, line);
        if ends_statement(trimmed) {
            splitter.flush();
        }
    }

    splitter.finish()
}

/// True when the last word before a `--` comment ends with `;`.
///
/// Only a word that starts with `--` opens a comment, so `--` inside a
/// literal such as `'a--b'` is kept as code.
fn ends_statement(line: &str) -> bool {
    line.split_whitespace()
        .take_while(|word| !word.starts_with("--"))
        .last()
        .is_some_and(|word| word.ends_with(';'))
}
