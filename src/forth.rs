use std::{
    collections::HashMap,
    convert::TryFrom,
    io::{self, Write},
    rc::Rc,
};

use log::{debug, trace};

use crate::builtin::{ForthBuiltin, ForthOperator};
use crate::error::ForthError;
use crate::lexer::{self, Cursor};
use crate::stack::{Stack, Value};

pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// A user defined word.
#[derive(Clone, Debug, PartialEq)]
pub struct Word {
    body: Vec<String>,
    source: Rc<str>,
}

impl Word {
    fn new(source: String) -> Self {
        let body = lexer::lex(&source).into_iter().map(|l| l.value).collect();
        Self {
            body,
            source: Rc::from(source),
        }
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }
}

/// One entry of the call stack: a line, a word body or a loop body.
#[derive(Debug)]
struct Frame {
    cursor: Cursor,
    /// Passes still to run after the current one.
    repeats: u64,
}

impl Frame {
    fn once(source: Rc<str>) -> Self {
        Self::repeated(source, 1)
    }

    fn repeated(source: Rc<str>, times: u64) -> Self {
        Self {
            cursor: Cursor::new(source),
            repeats: times.saturating_sub(1),
        }
    }
}

#[derive(Debug)]
pub struct Forth<W: Write = io::Stdout> {
    stack: Stack,
    words: HashMap<String, Word>,
    output: W,
    max_depth: usize,
}

impl Forth {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<W: Write> Forth<W> {
    pub fn with_output(output: W) -> Self {
        Self {
            stack: Stack::new(),
            words: HashMap::new(),
            output,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on nested word and loop expansions before a line is aborted.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Bottom to top.
    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    pub fn word(&self, name: &str) -> Option<&Word> {
        self.words.get(name)
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Runs one line. `Ok(None)` means the session was asked to end.
    pub fn eval(&mut self, input: &str) -> Result<Option<()>, ForthError> {
        let line = input.trim();
        if line.is_empty() {
            return Ok(Some(()));
        }

        let result = self.run(Rc::from(line));
        self.output.flush()?;
        match result {
            Ok(()) => Ok(Some(())),
            Err(ForthError::UserQuit) => Ok(None),
            Err(err) => {
                debug!("aborted {:?}: {}", line, err);
                Err(err)
            }
        }
    }

    fn run(&mut self, source: Rc<str>) -> Result<(), ForthError> {
        let mut frames = vec![Frame::once(source)];

        while let Some(frame) = frames.last_mut() {
            let lexeme = match frame.cursor.next_lexeme() {
                Some(lexeme) => lexeme,
                None if frame.repeats > 0 => {
                    frame.repeats -= 1;
                    frame.cursor.rewind();
                    continue;
                }
                None => {
                    frames.pop();
                    continue;
                }
            };

            let callee = self.dispatch(&lexeme.value, &mut frame.cursor)?;
            trace!("{:?} Stack: {:?}", lexeme, self.stack.as_slice());
            if let Some(callee) = callee {
                if frames.len() >= self.max_depth {
                    return Err(ForthError::ExpansionDepth(self.max_depth));
                }
                frames.push(callee);
            }
        }

        Ok(())
    }

    /// Executes one token. Forms that need more input read it from `cursor`;
    /// word calls and loops hand back the frame to run next.
    fn dispatch(&mut self, token: &str, cursor: &mut Cursor) -> Result<Option<Frame>, ForthError> {
        if let Ok(num) = token.parse::<Value>() {
            self.stack.push(num);
            return Ok(None);
        }
        if let Ok(operator) = ForthOperator::try_from(token) {
            operator.eval(&mut self.stack)?;
            return Ok(None);
        }
        if let Ok(builtin) = ForthBuiltin::try_from(token) {
            builtin.eval(&mut self.stack, &mut self.output)?;
            return Ok(None);
        }
        if let Some(word) = self.words.get(token) {
            return Ok(Some(Frame::once(word.source.clone())));
        }

        match token {
            ":" => self.define(cursor).map(|_| None),
            "IF" => self.conditional(cursor),
            "DO" => self.counted_loop(cursor),
            ".\"" => {
                let text = cursor.take_string();
                self.output.write_all(text.as_bytes())?;
                Ok(None)
            }
            _ => Err(ForthError::UnknownWord(token.to_string())),
        }
    }

    fn define(&mut self, cursor: &mut Cursor) -> Result<(), ForthError> {
        let name = match cursor.next_lexeme() {
            Some(lexeme) => lexeme.value,
            None => return Err(ForthError::InvalidWord(String::new())),
        };
        // These would always resolve before the dictionary is consulted.
        if name.parse::<Value>().is_ok()
            || ForthOperator::try_from(name.as_str()).is_ok()
            || ForthBuiltin::try_from(name.as_str()).is_ok()
        {
            return Err(ForthError::InvalidWord(name));
        }

        let source = match cursor.take_until(None, ";") {
            Some(source) => source,
            None => return Err(ForthError::UnterminatedDefinition(name)),
        };
        let word = Word::new(source);
        debug!("defined {} as {:?}", name, word.body);
        self.words.insert(name, word);
        Ok(())
    }

    /// `flag IF word`: runs the single next token when the flag is non-zero.
    fn conditional(&mut self, cursor: &mut Cursor) -> Result<Option<Frame>, ForthError> {
        self.stack.require("IF", 1)?;
        let branch = cursor.next_lexeme().ok_or(ForthError::MissingBranch)?;
        if self.stack.pop1("IF")? != 0 {
            self.dispatch(&branch.value, cursor)
        } else {
            Ok(None)
        }
    }

    /// `limit start DO ... LOOP`: runs the body once per index in [start, limit).
    fn counted_loop(&mut self, cursor: &mut Cursor) -> Result<Option<Frame>, ForthError> {
        self.stack.require("DO", 2)?;
        let body = cursor
            .take_until(Some("DO"), "LOOP")
            .ok_or(ForthError::UnterminatedLoop)?;
        let (start, limit) = self.stack.pop2("DO")?;
        if start >= limit || body.is_empty() {
            return Ok(None);
        }

        let times = (i64::from(limit) - i64::from(start)) as u64;
        Ok(Some(Frame::repeated(Rc::from(body), times)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_forth() -> Forth<Vec<u8>> {
        Forth::with_output(Vec::new())
    }

    fn printed(forth: &Forth<Vec<u8>>) -> String {
        String::from_utf8(forth.output().clone()).unwrap()
    }

    #[test]
    fn cannot_parse_letter() {
        let mut forth = new_forth();
        let result = forth.eval("1 a 3 4 5");
        assert_eq!(Err(ForthError::UnknownWord("a".to_string())), result);
        assert_eq!(&[1], forth.stack());
    }

    #[test]
    fn unknown_word_does_not_end_session() {
        let mut forth = new_forth();
        assert!(forth.eval("foo").is_err());
        assert_eq!(Ok(Some(())), forth.eval("2 3 +"));
        assert_eq!(&[5], forth.stack());
    }

    #[test]
    fn parses_numbers() {
        let mut forth = new_forth();
        assert_eq!(Ok(Some(())), forth.eval("1 -2 +3 0"));
        assert_eq!(&[1, -2, 3, 0], forth.stack());
    }

    #[test]
    fn empty_line_is_fine() {
        let mut forth = new_forth();
        assert_eq!(Ok(Some(())), forth.eval("   \n"));
    }

    #[test]
    fn simple_addition_works() {
        let mut forth = new_forth();
        forth.eval("5 6 +").unwrap();
        assert_eq!(&[11], forth.stack());
    }

    #[test]
    fn parses_math_expressions() {
        let mut forth = new_forth();
        forth.eval("10 3 - 2 * 4 / 5 mod").unwrap();
        assert_eq!(&[3], forth.stack());
    }

    #[test]
    fn dup_drop_and_swap_swap_restore() {
        let mut forth = new_forth();
        forth.eval("7 dup drop").unwrap();
        assert_eq!(&[7], forth.stack());
        forth.eval("8 swap swap").unwrap();
        assert_eq!(&[7, 8], forth.stack());
    }

    #[test]
    fn show_leaves_stack_alone() {
        let mut forth = new_forth();
        forth.eval("1 2 3 .s . . .").unwrap();
        assert_eq!("<3> 1 2 3\n3 2 1 ", printed(&forth));
        assert!(forth.stack().is_empty());
    }

    #[test]
    fn output_follows_token_order() {
        let mut forth = new_forth();
        forth.eval("72 emit 105 emit cr 4 . .\" done\" cr").unwrap();
        assert_eq!("Hi\n4 done\n", printed(&forth));
    }

    #[test]
    fn defined_word_matches_inlined_body() {
        let mut forth = new_forth();
        forth.eval(": sq dup * ;").unwrap();
        forth.eval("5 sq 5 dup *").unwrap();
        assert_eq!(&[25, 25], forth.stack());
        assert_eq!(
            &["dup".to_string(), "*".to_string()],
            forth.word("sq").unwrap().body()
        );
    }

    #[test]
    fn words_are_case_sensitive() {
        let mut forth = new_forth();
        forth.eval(": Sq dup * ;").unwrap();
        assert_eq!(
            Err(ForthError::UnknownWord("sq".to_string())),
            forth.eval("3 sq")
        );
    }

    #[test]
    fn redefinition_applies_to_existing_callers() {
        let mut forth = new_forth();
        forth.eval(": one 1 ; : caller one ;").unwrap();
        forth.eval(": one 2 ;").unwrap();
        forth.eval("caller").unwrap();
        assert_eq!(&[2], forth.stack());
    }

    #[test]
    fn words_resolve_at_call_time() {
        let mut forth = new_forth();
        forth.eval(": later soon ;").unwrap();
        assert_eq!(
            Err(ForthError::UnknownWord("soon".to_string())),
            forth.eval("later")
        );
        forth.eval(": soon 9 ;").unwrap();
        forth.eval("later").unwrap();
        assert_eq!(&[9], forth.stack());
    }

    #[test]
    fn definition_needs_terminator() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::UnterminatedDefinition("sq".to_string())),
            forth.eval(": sq dup *")
        );
        assert!(forth.word("sq").is_none());
    }

    #[test]
    fn definition_rejects_unreachable_names() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::InvalidWord("5".to_string())),
            forth.eval(": 5 6 ;")
        );
        assert_eq!(
            Err(ForthError::InvalidWord("dup".to_string())),
            forth.eval(": dup 6 ;")
        );
        assert_eq!(Err(ForthError::InvalidWord(String::new())), forth.eval(":"));
    }

    #[test]
    fn if_runs_next_token_only_when_true() {
        let mut forth = new_forth();
        forth.eval("5 0 IF dup").unwrap();
        assert_eq!(&[5], forth.stack());
        forth.eval("1 IF dup").unwrap();
        assert_eq!(&[5, 5], forth.stack());
        forth.eval("-1 IF drop 7").unwrap();
        assert_eq!(&[5, 7], forth.stack());
    }

    #[test]
    fn if_governs_a_single_token() {
        let mut forth = new_forth();
        forth.eval("0 IF 9 8").unwrap();
        assert_eq!(&[8], forth.stack());
    }

    #[test]
    fn if_with_comparison() {
        let mut forth = new_forth();
        forth.eval(": yes .\" big\" ; : big? 10 > IF yes ;").unwrap();
        forth.eval("20 big? 3 big?").unwrap();
        assert_eq!("big", printed(&forth));
        assert!(forth.stack().is_empty());
    }

    #[test]
    fn false_if_skips_only_the_string_opener() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::UnknownWord("x\"".to_string())),
            forth.eval("0 IF .\" x\"")
        );
    }

    #[test]
    fn if_needs_flag_and_branch() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::StackUnderflow {
                word: "IF".to_string(),
                needed: 1,
                found: 0
            }),
            forth.eval("IF dup")
        );
        assert_eq!(Err(ForthError::MissingBranch), forth.eval("1 IF"));
        assert_eq!(&[1], forth.stack());
    }

    #[test]
    fn loop_runs_limit_minus_start_times() {
        let mut forth = new_forth();
        forth.eval(": star 42 emit ;").unwrap();
        forth.eval("5 0 DO star LOOP").unwrap();
        assert_eq!("*****", printed(&forth));
        forth.eval("0 0 DO star LOOP 3 5 DO star LOOP").unwrap();
        assert_eq!("*****", printed(&forth));
        assert!(forth.stack().is_empty());
    }

    #[test]
    fn loop_body_continues_line_afterwards() {
        let mut forth = new_forth();
        forth.eval("3 0 DO 1 LOOP 2").unwrap();
        assert_eq!(&[1, 1, 1, 2], forth.stack());
    }

    #[test]
    fn loops_nest() {
        let mut forth = new_forth();
        forth.eval("2 0 DO 3 0 DO 1 LOOP LOOP").unwrap();
        assert_eq!(&[1; 6], forth.stack());
    }

    #[test]
    fn loop_inside_definition() {
        let mut forth = new_forth();
        forth.eval(": stars 0 DO 42 emit LOOP ;").unwrap();
        forth.eval("3 stars cr").unwrap();
        assert_eq!("***\n", printed(&forth));
    }

    #[test]
    fn loop_needs_terminator_and_operands() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::UnterminatedLoop),
            forth.eval("5 0 DO 1")
        );
        assert_eq!(&[5, 0], forth.stack());

        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::StackUnderflow {
                word: "DO".to_string(),
                needed: 2,
                found: 1
            }),
            forth.eval("1 DO LOOP")
        );
    }

    #[test]
    fn strings_are_printed_verbatim() {
        let mut forth = new_forth();
        forth.eval(".\"  two  spaces\" 1").unwrap();
        assert_eq!(" two  spaces", printed(&forth));
        assert_eq!(&[1], forth.stack());
    }

    #[test]
    fn unterminated_string_runs_to_end_of_line() {
        let mut forth = new_forth();
        forth.eval(".\" no end 1 2").unwrap();
        assert_eq!("no end 1 2", printed(&forth));
        assert!(forth.stack().is_empty());
    }

    #[test]
    fn strings_inside_words_and_loops() {
        let mut forth = new_forth();
        forth.eval(": hi .\" a ; b\" ;").unwrap();
        forth.eval("hi 2 0 DO .\" LOOP\" LOOP").unwrap();
        assert_eq!("a ; bLOOPLOOP", printed(&forth));
    }

    #[test]
    fn fault_aborts_rest_of_line_only() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::DivisionByZero("/".to_string())),
            forth.eval("1 2 . 0 / 3")
        );
        assert_eq!("2 ", printed(&forth));
        assert_eq!(&[1, 0], forth.stack());
        forth.eval("drop 4 +").unwrap();
        assert_eq!(&[5], forth.stack());
    }

    #[test]
    fn modulo_by_zero_is_a_fault() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::DivisionByZero("mod".to_string())),
            forth.eval("7 0 mod")
        );
        assert_eq!(&[7, 0], forth.stack());
    }

    #[test]
    fn underflow_names_the_word() {
        let mut forth = new_forth();
        assert_eq!(
            Err(ForthError::StackUnderflow {
                word: "+".to_string(),
                needed: 2,
                found: 1
            }),
            forth.eval("1 +")
        );
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let mut forth = new_forth().with_max_depth(8);
        forth.eval(": forever forever ;").unwrap();
        assert_eq!(Err(ForthError::ExpansionDepth(8)), forth.eval("forever"));
        assert_eq!(Ok(Some(())), forth.eval("1 2 +"));
        assert_eq!(&[3], forth.stack());
    }

    #[test]
    fn depth_limit_allows_shallow_nesting() {
        let mut forth = new_forth().with_max_depth(4);
        forth.eval(": a 1 ; : b a ; : c b ;").unwrap();
        forth.eval("c").unwrap();
        assert_eq!(&[1], forth.stack());
        assert_eq!(Err(ForthError::ExpansionDepth(4)), forth.eval(": d c ; d"));
    }

    #[test]
    fn bye_ends_session() {
        let mut forth = new_forth();
        assert_eq!(Ok(None), forth.eval("1 bye 2"));
        assert_eq!(&[1], forth.stack());
    }
}
