#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ForthError {
    #[error("Stack underflow in '{word}': needs {needed}, found {found}")]
    StackUnderflow {
        word: String,
        needed: usize,
        found: usize,
    },
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("Unterminated definition of '{0}': missing ';'")]
    UnterminatedDefinition(String),
    #[error("Unterminated loop: DO without LOOP")]
    UnterminatedLoop,
    #[error("IF needs a following word")]
    MissingBranch,
    #[error("Invalid word name: {0:?}")]
    InvalidWord(String),
    #[error("Maximum expansion depth of {0} exceeded")]
    ExpansionDepth(usize),
    #[error("Unknown word: {0}")]
    UnknownWord(String),
    #[error("Output failed: {0}")]
    Output(String),
    #[error("Bye")]
    UserQuit,
}

impl ForthError {
    /// True for faults raised while executing a known word or form, as
    /// opposed to a token that could not be resolved at all.
    pub fn is_runtime_fault(&self) -> bool {
        !matches!(self, Self::UnknownWord(_) | Self::UserQuit)
    }
}

impl From<std::io::Error> for ForthError {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err.to_string())
    }
}
