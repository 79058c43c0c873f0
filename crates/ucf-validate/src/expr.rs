//! Datatype expression compiler.
//!
//! Expressions name validators with optional parenthesized argument
//! lists, e.g. `range(1,10)`, `or(integer,'auto')`, `list(macaddr)`.
//! A backslash escapes the following character, literals are numbers or
//! quoted strings, and arguments may themselves be validator calls.

use crate::error::CompileError;
use crate::types::Kind;

/// One compiled element: a plain literal or a validator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(f64),
    Text(String),
    Call(Call),
}

impl Arg {
    /// Loose literal comparison used by the combinators: numeric
    /// literals compare against the parsed value, text literals
    /// compare verbatim. Calls never match as literals.
    pub(crate) fn matches(&self, value: &str) -> bool {
        match self {
            Arg::Number(n) => value.trim().parse::<f64>() == Ok(*n),
            Arg::Text(t) => value == t,
            Arg::Call(_) => false,
        }
    }

    pub(crate) fn render(&self) -> String {
        match self {
            Arg::Number(n) => crate::types::fmt_num(*n),
            Arg::Text(t) => format!("'{t}'"),
            Arg::Call(call) => format!("{:?}", call.kind),
        }
    }
}

/// A named validator with its compiled argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: Kind,
    pub args: Vec<Arg>,
}

/// A compiled datatype expression.
///
/// Compilation is pure: the same expression always yields the same
/// program, and a `Validator` may be reused for any number of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    program: Vec<Arg>,
}

impl Validator {
    pub fn compile(expr: &str) -> Result<Self, CompileError> {
        Ok(Self {
            program: compile_program(expr)?,
        })
    }

    /// Checks a single form value, returning the failure message when
    /// the value is rejected. Programs whose first element is a plain
    /// literal carry no predicate and accept everything.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        match self.program.first() {
            Some(Arg::Call(call)) => call.check(value),
            _ => Ok(()),
        }
    }
}

fn compile_program(code: &str) -> Result<Vec<Arg>, CompileError> {
    let chars: Vec<char> = code.chars().chain([',']).collect();
    let mut out: Vec<Arg> = Vec::new();
    let mut pos = 0usize;
    let mut esc = false;
    let mut depth = 0i32;

    for i in 0..chars.len() {
        if esc {
            esc = false;
            continue;
        }
        match chars[i] {
            '\\' => esc = true,
            c @ ('(' | ',') => {
                if depth <= 0 {
                    if pos < i {
                        push_token(&mut out, &unescape(&chars[pos..i]))?;
                    }
                    pos = i + 1;
                }
                if c == '(' {
                    depth += 1;
                }
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(CompileError::UnbalancedParens);
                }
                if depth == 0 {
                    let Some(Arg::Call(call)) = out.last_mut() else {
                        return Err(CompileError::ArgumentListAfterLiteral);
                    };
                    let inner: String = chars[pos..i].iter().collect();
                    call.args = compile_program(&inner)?;
                    pos = i + 1;
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CompileError::UnbalancedParens);
    }
    Ok(out)
}

fn push_token(out: &mut Vec<Arg>, label: &str) -> Result<(), CompileError> {
    let label = label.trim_matches([' ', '\t']);
    if label.is_empty() {
        return Ok(());
    }
    if let Ok(n) = label.parse::<f64>() {
        out.push(Arg::Number(n));
    } else if is_quoted(label) {
        out.push(Arg::Text(label[1..label.len() - 1].to_string()));
    } else if let Some(kind) = Kind::from_name(label) {
        out.push(Arg::Call(Call {
            kind,
            args: Vec::new(),
        }));
    } else {
        return Err(CompileError::UnhandledToken(label.to_string()));
    }
    Ok(())
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut esc = false;
    for &c in chars {
        if esc {
            esc = false;
            out.push(c);
        } else if c == '\\' {
            esc = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn is_quoted(label: &str) -> bool {
    let mut it = label.chars();
    match (it.next(), label.chars().next_back()) {
        (Some(q @ ('\'' | '"')), Some(last)) => label.chars().count() >= 2 && last == q,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_compiles_to_a_call() {
        let v = Validator::compile("integer").unwrap();
        assert!(v.validate("42").is_ok());
    }

    #[test]
    fn arguments_parse_as_numbers_and_strings() {
        let v = Validator::compile("or(5,'auto')").unwrap();
        assert!(v.validate("5").is_ok());
        assert!(v.validate("auto").is_ok());
        assert!(v.validate("manual").is_err());
    }

    #[test]
    fn nested_calls_compile() {
        let v = Validator::compile("or(range(1,10),'none')").unwrap();
        assert!(v.validate("7").is_ok());
        assert!(v.validate("none").is_ok());
        assert!(v.validate("11").is_err());
    }

    #[test]
    fn backslash_escapes_delimiters_inside_quoted_literals() {
        let v = Validator::compile("or('a\\,b','c')").unwrap();
        assert!(v.validate("a,b").is_ok());
        assert!(v.validate("c").is_ok());
        assert!(v.validate("a").is_err());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            Validator::compile("bogus").unwrap_err(),
            CompileError::UnhandledToken("bogus".into())
        );
    }

    #[test]
    fn argument_list_needs_a_validator_before_it() {
        assert_eq!(
            Validator::compile("'text'(1)").unwrap_err(),
            CompileError::ArgumentListAfterLiteral
        );
    }

    #[test]
    fn parenthesis_depth_must_balance() {
        assert_eq!(
            Validator::compile("range(1,10").unwrap_err(),
            CompileError::UnbalancedParens
        );
        assert_eq!(
            Validator::compile("integer)").unwrap_err(),
            CompileError::UnbalancedParens
        );
    }

    #[test]
    fn compilation_is_idempotent() {
        let a = Validator::compile("or(range(1,10),'auto')").unwrap();
        let b = Validator::compile("or(range(1,10),'auto')").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn literal_only_program_accepts_everything() {
        let v = Validator::compile("'anything'").unwrap();
        assert!(v.validate("whatever").is_ok());
    }
}
