use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line_no}: expected '<name> <version>', found '{line}'")]
    MalformedEntry { line_no: usize, line: String },

    #[error("line {line_no}: expected '<timestamp> <kind> <name> <version>', found '{line}'")]
    MalformedEvent { line_no: usize, line: String },
}

impl ParseError {
    pub fn line_no(&self) -> usize {
        match self {
            Self::MalformedEntry { line_no, .. } | Self::MalformedEvent { line_no, .. } => *line_no,
        }
    }

    pub fn line(&self) -> &str {
        match self {
            Self::MalformedEntry { line, .. } | Self::MalformedEvent { line, .. } => line,
        }
    }
}
