use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Structural failures. Any of these aborts processing of the file at hand;
/// semantic issues are reported as [`crate::warning::Warning`] instead.
#[derive(Debug, Error, Diagnostic)]
pub enum IsaError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sheet has no header line")]
    #[diagnostic(help("study and assay files start with a line of column labels"))]
    EmptySheet,

    #[error("malformed header in column {column} ({label:?}): {reason}")]
    MalformedHeader {
        column: usize,
        label: String,
        reason: String,
    },

    #[error("line {line}: expected {expected} cells, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown column label {0:?}")]
    UnknownLabel(String),

    #[error("line {line}: unterminated quoting in cell {cell}")]
    UnterminatedQuote { line: usize, cell: usize },

    #[error("line {line}: invalid investigation file: {message}")]
    InvalidInvestigation { line: usize, message: String },

    #[error("arc {tail:?} -> {head:?} points outside of the graph")]
    DanglingArc { tail: String, head: String },

    #[error("cannot resolve file path {0}")]
    UnresolvablePath(Utf8PathBuf),

    #[error("cell {0:?} cannot be written without quoting")]
    #[diagnostic(help("pass a quote character to write cells containing tabs or newlines"))]
    UnwritableCell(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("{count} warning(s) of moderate or critical severity in strict mode")]
    StrictViolation { count: usize },
}
