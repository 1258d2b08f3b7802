use std::{convert::TryFrom, io::Write};

use crate::error::ForthError;
use crate::stack::{Stack, Value};

pub const TRUE: Value = -1;
pub const FALSE: Value = 0;

fn flag(cond: bool) -> Value {
    if cond {
        TRUE
    } else {
        FALSE
    }
}

/// Binary words: pop `n1` then `n2`, push `n2 OP n1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForthOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Less,
    Greater,
    Equal,
    NotEqual,
    And,
    Or,
}

impl ForthOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "mod",
            Self::Less => "<",
            Self::Greater => ">",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn eval(&self, stack: &mut Stack) -> Result<(), ForthError> {
        stack.require(self.name(), 2)?;
        if matches!(self, Self::Divide | Self::Modulo) && stack.peek(0) == Some(0) {
            return Err(ForthError::DivisionByZero(self.name().to_string()));
        }

        let (op1, op2) = stack.pop2(self.name())?;
        let result = match self {
            Self::Add => op2.wrapping_add(op1),
            Self::Subtract => op2.wrapping_sub(op1),
            Self::Multiply => op2.wrapping_mul(op1),
            Self::Divide => op2.wrapping_div(op1),
            Self::Modulo => op2.wrapping_rem(op1),
            Self::Less => flag(op2 < op1),
            Self::Greater => flag(op2 > op1),
            Self::Equal => flag(op2 == op1),
            Self::NotEqual => flag(op2 != op1),
            Self::And => op2 & op1,
            Self::Or => op2 | op1,
        };
        stack.push(result);
        Ok(())
    }
}

impl TryFrom<&str> for ForthOperator {
    type Error = ForthError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Subtract),
            "*" => Ok(Self::Multiply),
            "/" => Ok(Self::Divide),
            "mod" => Ok(Self::Modulo),
            "<" => Ok(Self::Less),
            ">" => Ok(Self::Greater),
            "=" => Ok(Self::Equal),
            "<>" => Ok(Self::NotEqual),
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            v => Err(ForthError::UnknownWord(v.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForthBuiltin {
    Bye,
    Cr,
    Drop,
    Dup,
    Emit,
    Over,
    Rot,
    Show,
    Swap,
    Take,
}

impl ForthBuiltin {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bye => "bye",
            Self::Cr => "cr",
            Self::Drop => "drop",
            Self::Dup => "dup",
            Self::Emit => "emit",
            Self::Over => "over",
            Self::Rot => "rot",
            Self::Show => ".s",
            Self::Swap => "swap",
            Self::Take => ".",
        }
    }

    pub fn eval(&self, stack: &mut Stack, out: &mut dyn Write) -> Result<(), ForthError> {
        let name = self.name();
        match self {
            Self::Bye => {
                return Err(ForthError::UserQuit);
            }
            Self::Cr => {
                out.write_all(b"\n")?;
            }
            Self::Drop => {
                stack.pop1(name)?;
            }
            Self::Dup => {
                let value = stack.pop1(name)?;
                stack.push(value);
                stack.push(value);
            }
            Self::Emit => {
                let value = stack.pop1(name)?;
                out.write_all(&[value as u8])?;
            }
            Self::Over => {
                let (num1, num2) = stack.pop2(name)?;
                stack.push(num2);
                stack.push(num1);
                stack.push(num2);
            }
            Self::Rot => {
                stack.require(name, 3)?;
                let (n3, n2) = stack.pop2(name)?;
                let n1 = stack.pop1(name)?;
                stack.push(n2);
                stack.push(n3);
                stack.push(n1);
            }
            Self::Show => {
                show_stack(stack, out)?;
            }
            Self::Swap => {
                let (value1, value2) = stack.pop2(name)?;
                stack.push(value1);
                stack.push(value2);
            }
            Self::Take => {
                let value = stack.pop1(name)?;
                write!(out, "{} ", value)?;
            }
        }

        Ok(())
    }
}

impl TryFrom<&str> for ForthBuiltin {
    type Error = ForthError;

    fn try_from(input: &str) -> Result<ForthBuiltin, Self::Error> {
        let builtin = match input {
            "bye" | "quit" => ForthBuiltin::Bye,
            "cr" => ForthBuiltin::Cr,
            "dup" => ForthBuiltin::Dup,
            "drop" => ForthBuiltin::Drop,
            "emit" => ForthBuiltin::Emit,
            "over" => ForthBuiltin::Over,
            "rot" => ForthBuiltin::Rot,
            ".s" => ForthBuiltin::Show,
            "swap" => ForthBuiltin::Swap,
            "." => ForthBuiltin::Take,
            _ => {
                return Err(ForthError::UnknownWord(input.into()));
            }
        };
        Ok(builtin)
    }
}

/// `<depth> v1 v2 ...` bottom to top, as a single write.
fn show_stack(stack: &Stack, out: &mut dyn Write) -> Result<(), ForthError> {
    let mut line = format!("<{}>", stack.len());
    for value in stack.as_slice() {
        line.push_str(&format!(" {}", value));
    }
    line.push('\n');
    out.write_all(line.as_bytes())?;
    Ok(())
}
