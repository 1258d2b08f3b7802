use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub struct Lexeme {
    pub value: String,
    /// Byte offset into the text the lexeme was read from.
    pub offset: usize,
}

impl Lexeme {
    fn new(value: &str, offset: usize) -> Self {
        Lexeme {
            value: value.to_string(),
            offset,
        }
    }
}

/// Reads lexemes out of shared source text, one at a time.
#[derive(Clone, Debug)]
pub struct Cursor {
    source: Rc<str>,
    pos: usize,
}

impl Cursor {
    pub fn new(source: Rc<str>) -> Self {
        Self { source, pos: 0 }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn next_lexeme(&mut self) -> Option<Lexeme> {
        let rest = &self.source[self.pos..];
        let start = match rest.find(|c: char| !c.is_whitespace()) {
            Some(idx) => self.pos + idx,
            None => {
                self.pos = self.source.len();
                return None;
            }
        };
        let end = self.source[start..]
            .find(char::is_whitespace)
            .map_or(self.source.len(), |idx| start + idx);
        self.pos = end;
        Some(Lexeme::new(&self.source[start..end], start))
    }

    /// Raw text of a `."` string: one delimiter character is skipped, then
    /// everything up to the closing quote (consumed, not returned) or to the
    /// end of the source when there is none.
    pub fn take_string(&mut self) -> String {
        let mut start = self.pos;
        if let Some(c) = self.source[start..].chars().next() {
            if c.is_whitespace() {
                start += c.len_utf8();
            }
        }
        match self.source[start..].find('"') {
            Some(idx) => {
                self.pos = start + idx + 1;
                self.source[start..start + idx].to_string()
            }
            None => {
                self.pos = self.source.len();
                self.source[start..].to_string()
            }
        }
    }

    /// Consumes everything up to and including the `close` lexeme and returns
    /// the text in between. Nested `open ... close` pairs and `."` strings are
    /// stepped over. Leaves the cursor where it was when `close` never shows up.
    pub fn take_until(&mut self, open: Option<&str>, close: &str) -> Option<String> {
        let mut probe = self.clone();
        let start = probe.pos;
        let mut depth = 0usize;

        while let Some(lexeme) = probe.next_lexeme() {
            if lexeme.value == close {
                if depth == 0 {
                    let body = self.source[start..lexeme.offset].trim().to_string();
                    *self = probe;
                    return Some(body);
                }
                depth -= 1;
            } else if Some(lexeme.value.as_str()) == open {
                depth += 1;
            } else if lexeme.value == ".\"" {
                probe.take_string();
            }
        }

        None
    }
}

/// Splits text into its whitespace-delimited lexemes.
pub fn lex(source: &str) -> Vec<Lexeme> {
    let mut cursor = Cursor::new(Rc::from(source));
    let mut lexemes = Vec::new();
    while let Some(lexeme) = cursor.next_lexeme() {
        lexemes.push(lexeme);
    }
    lexemes
}
