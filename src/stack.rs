use crate::error::ForthError;

pub type Value = i32;

/// The data stack every word reads from and writes to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Fails without touching the stack unless at least `needed` values are present.
    pub fn require(&self, word: &str, needed: usize) -> Result<(), ForthError> {
        if self.values.len() < needed {
            return Err(self.underflow(word, needed));
        }
        Ok(())
    }

    fn underflow(&self, word: &str, needed: usize) -> ForthError {
        ForthError::StackUnderflow {
            word: word.to_string(),
            needed,
            found: self.values.len(),
        }
    }

    pub fn pop1(&mut self, word: &str) -> Result<Value, ForthError> {
        match self.values.pop() {
            Some(value) => Ok(value),
            None => Err(self.underflow(word, 1)),
        }
    }

    /// Pops the top two values, top first.
    pub fn pop2(&mut self, word: &str) -> Result<(Value, Value), ForthError> {
        self.require(word, 2)?;
        match (self.values.pop(), self.values.pop()) {
            (Some(v1), Some(v2)) => Ok((v1, v2)),
            _ => Err(self.underflow(word, 2)),
        }
    }

    /// Value `depth` places below the top, 0 being the top itself.
    pub fn peek(&self, depth: usize) -> Option<Value> {
        let len = self.values.len();
        if depth < len {
            Some(self.values[len - 1 - depth])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bottom to top.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}

impl From<Vec<Value>> for Stack {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}
