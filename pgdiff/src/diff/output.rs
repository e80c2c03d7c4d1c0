use std::fmt;
use std::io::Write;

use crate::error::PgDiffResult;

/// Which merge branch produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeBranch {
    /// The key exists only in the source database.
    Add,
    /// The key exists only in the target database.
    Drop,
    /// The key exists on both sides with differing attributes.
    Change,
}

impl MergeBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeBranch::Add => "Add",
            MergeBranch::Drop => "Drop",
            MergeBranch::Change => "Change",
        }
    }
}

impl fmt::Display for MergeBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated SQL statement, tagged with the branch and key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// SQL text without the trailing semicolon.
    pub sql: String,
    pub branch: MergeBranch,
    /// Sort key of the row the statement was generated from.
    pub key: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, branch: MergeBranch, key: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            branch,
            key,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; -- {}", self.sql, self.branch)
    }
}

/// A line of diff output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Statement(Statement),
    Comment(String),
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLine::Statement(statement) => write!(f, "{statement}"),
            OutputLine::Comment(text) => write!(f, "-- {text}"),
        }
    }
}

/// Receives diff output in merge order.
pub trait StatementSink {
    /// Writes one generated statement.
    fn emit(&mut self, statement: Statement) -> PgDiffResult<()>;

    /// Writes a `-- ` comment line.
    fn comment(&mut self, text: &str) -> PgDiffResult<()>;
}

impl StatementSink for Vec<OutputLine> {
    fn emit(&mut self, statement: Statement) -> PgDiffResult<()> {
        self.push(OutputLine::Statement(statement));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> PgDiffResult<()> {
        self.push(OutputLine::Comment(text.to_string()));
        Ok(())
    }
}

/// Sink writing newline-delimited output to any [`Write`] implementation, e.g. stdout.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn flush(&mut self) -> PgDiffResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatementSink for WriterSink<W> {
    fn emit(&mut self, statement: Statement) -> PgDiffResult<()> {
        writeln!(self.writer, "{statement}")?;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> PgDiffResult<()> {
        writeln!(self.writer, "-- {text}")?;
        Ok(())
    }
}

/// Replays buffered lines into `sink`.
pub fn replay(lines: Vec<OutputLine>, sink: &mut dyn StatementSink) -> PgDiffResult<()> {
    for line in lines {
        match line {
            OutputLine::Statement(statement) => sink.emit(statement)?,
            OutputLine::Comment(text) => sink.comment(&text)?,
        }
    }

    Ok(())
}
