//! Compiler for the NameLang instruction language.
//!
//! The grammar is deliberately tiny: a program is one or more
//! expressions, each compiling to exactly one instruction.
//!
//! ```text
//! Code       = Expr+
//! Expr       = Instr | op | PushValue | LookupName
//! Instr      = ident Args?
//! Args       = "(" (Arg ("," Arg)*)? ")"
//! Arg        = number | string | ident
//! op         = "&&" | "||" | "+" | "-" | "*" | "/"
//!            | "==" | "!=" | "<=" | "<" | ">=" | ">"
//! PushValue  = number | string
//! LookupName = "$" ident
//! number     = digit+
//! string     = ("'" | "\"") chars ("'" | "\"")   -- delimiters must match
//! ident      = letter alnum*
//! ```
//!
//! Compilation is single-pass and left-to-right; there are no labels,
//! jumps, or forward references. A failing parse produces an error with
//! position information and no partial program. Unknown instruction
//! names are compile errors, and a string's closing delimiter must
//! match its opening one; both rules are stricter than the layer this
//! language was grown for, on purpose.

use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::instr::{Instr, Program};
use crate::value::Value;

/// A compilation failure. Every variant carries the 1-based source
/// position the parser stopped at.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unexpected character '{ch}' at line {line}, column {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },

    #[error("unterminated string starting at line {line}, column {col}")]
    UnterminatedString { line: usize, col: usize },

    #[error("unexpected '{found}' at line {line}, column {col}")]
    UnexpectedToken {
        found: String,
        line: usize,
        col: usize,
    },

    #[error("unknown instruction '{name}' at line {line}, column {col}")]
    UnknownInstr {
        name: String,
        line: usize,
        col: usize,
    },

    #[error("'{name}' expects {expected} at line {line}, column {col}")]
    BadArity {
        name: String,
        expected: &'static str,
        line: usize,
        col: usize,
    },

    #[error("expected an argument at line {line}, column {col}")]
    ExpectedArg { line: usize, col: usize },

    #[error("unclosed argument list at line {line}, column {col}")]
    UnclosedArgs { line: usize, col: usize },

    #[error("source contains no expressions")]
    EmptyProgram,
}

/// Compiles NameLang source into an instruction sequence.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = lex(source)?;
    let instrs = parse(tokens)?;
    debug!(count = instrs.len(), "compiled program");
    Ok(Program::new(instrs))
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    Dollar,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    line: usize,
    col: usize,
}

const OPS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "+", "-", "*", "/", "<", ">",
];

fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;

    'outer: while i < chars.len() {
        let ch = chars[i];

        if ch == '\n' {
            i += 1;
            line += 1;
            col = 1;
            continue;
        }
        if ch.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }

        let (tok_line, tok_col) = (line, col);
        let tok = |kind| Token {
            kind,
            line: tok_line,
            col: tok_col,
        };

        // Multi-char operators take priority over their prefixes.
        for op in OPS {
            if chars[i..].starts_with(&op.chars().collect::<Vec<_>>()[..]) {
                tokens.push(tok(TokenKind::Op(op)));
                i += op.len();
                col += op.len();
                continue 'outer;
            }
        }

        match ch {
            '$' => {
                tokens.push(tok(TokenKind::Dollar));
                i += 1;
                col += 1;
            }
            '(' => {
                tokens.push(tok(TokenKind::LParen));
                i += 1;
                col += 1;
            }
            ')' => {
                tokens.push(tok(TokenKind::RParen));
                i += 1;
                col += 1;
            }
            ',' => {
                tokens.push(tok(TokenKind::Comma));
                i += 1;
                col += 1;
            }
            '\'' | '"' => {
                // The closing delimiter must match the opening one.
                let quote = ch;
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => {
                            return Err(CompileError::UnterminatedString {
                                line: tok_line,
                                col: tok_col,
                            })
                        }
                        Some(&c) if c == quote => break,
                        Some(&c) => {
                            text.push(c);
                            j += 1;
                        }
                    }
                }
                let consumed = j + 1 - i;
                tokens.push(tok(TokenKind::Str(text)));
                i = j + 1;
                col += consumed;
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                let text: String = chars[i..j].iter().collect();
                // digit+ always parses as a finite f64
                let n = text.parse::<f64>().unwrap_or(f64::NAN);
                tokens.push(tok(TokenKind::Num(n)));
                col += j - i;
                i = j;
            }
            c if c.is_alphabetic() => {
                let mut j = i;
                while j < chars.len() && chars[j].is_alphanumeric() {
                    j += 1;
                }
                let text: String = chars[i..j].iter().collect();
                tokens.push(tok(TokenKind::Ident(text)));
                col += j - i;
                i = j;
            }
            other => {
                return Err(CompileError::UnexpectedChar {
                    ch: other,
                    line: tok_line,
                    col: tok_col,
                })
            }
        }
    }

    Ok(tokens)
}

/// One parsed argument of a named instruction. Bare identifiers are
/// accepted as string arguments, so `bind(k1)` and `bind('k1')` mean
/// the same thing.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Num(f64),
    Str(String),
}

type Args = SmallVec<[Arg; 2]>;

fn parse(tokens: Vec<Token>) -> Result<Vec<Instr>, CompileError> {
    let mut instrs = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Num(n) => instrs.push(Instr::Push(Value::Num(n))),
            TokenKind::Str(s) => instrs.push(Instr::Push(Value::str(s))),
            TokenKind::Op(op) => instrs.push(op_instr(op)),
            TokenKind::Dollar => match iter.next() {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => instrs.push(Instr::Find(name)),
                _ => {
                    return Err(CompileError::UnexpectedToken {
                        found: "$".to_string(),
                        line: token.line,
                        col: token.col,
                    })
                }
            },
            TokenKind::Ident(name) => {
                let args = if matches!(
                    iter.peek(),
                    Some(Token {
                        kind: TokenKind::LParen,
                        ..
                    })
                ) {
                    iter.next();
                    parse_args(&mut iter, token.line, token.col)?
                } else {
                    Args::new()
                };
                instrs.push(named_instr(&name, args, token.line, token.col)?);
            }
            TokenKind::LParen | TokenKind::RParen | TokenKind::Comma => {
                return Err(CompileError::UnexpectedToken {
                    found: token_text(&token.kind),
                    line: token.line,
                    col: token.col,
                })
            }
        }
    }

    if instrs.is_empty() {
        return Err(CompileError::EmptyProgram);
    }
    Ok(instrs)
}

fn parse_args(
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    line: usize,
    col: usize,
) -> Result<Args, CompileError> {
    let mut args = Args::new();

    // Empty argument list.
    if let Some(Token {
        kind: TokenKind::RParen,
        ..
    }) = iter.peek()
    {
        iter.next();
        return Ok(args);
    }

    loop {
        match iter.next() {
            Some(Token {
                kind: TokenKind::Num(n),
                ..
            }) => args.push(Arg::Num(n)),
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            })
            | Some(Token {
                kind: TokenKind::Ident(s),
                ..
            }) => args.push(Arg::Str(s)),
            Some(token) => {
                return Err(CompileError::ExpectedArg {
                    line: token.line,
                    col: token.col,
                })
            }
            None => return Err(CompileError::UnclosedArgs { line, col }),
        }

        match iter.next() {
            Some(Token {
                kind: TokenKind::Comma,
                ..
            }) => continue,
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => return Ok(args),
            Some(token) => {
                return Err(CompileError::UnexpectedToken {
                    found: token_text(&token.kind),
                    line: token.line,
                    col: token.col,
                })
            }
            None => return Err(CompileError::UnclosedArgs { line, col }),
        }
    }
}

fn op_instr(op: &str) -> Instr {
    match op {
        "+" => Instr::Add,
        "-" => Instr::Sub,
        "*" => Instr::Mul,
        "/" => Instr::Div,
        "==" => Instr::Eq,
        "!=" => Instr::NotEq,
        "<" => Instr::Lt,
        "<=" => Instr::Le,
        ">" => Instr::Gt,
        ">=" => Instr::Ge,
        "&&" => Instr::And,
        "||" => Instr::Or,
        other => unreachable!("operator table out of sync: {other}"),
    }
}

/// Maps a named instruction spelling to its instruction. Only the
/// default-`"local"` spellings are reachable from source, with
/// `leaveAt(key)` as the single explicit At-form the grammar knows.
fn named_instr(name: &str, args: Args, line: usize, col: usize) -> Result<Instr, CompileError> {
    let bad_arity = |expected| CompileError::BadArity {
        name: name.to_string(),
        expected,
        line,
        col,
    };

    let no_args = |instr: Instr| {
        if args.is_empty() {
            Ok(instr)
        } else {
            Err(bad_arity("no arguments"))
        }
    };

    let one_name = || match &args[..] {
        [Arg::Str(s)] => Ok(s.clone()),
        _ => Err(bad_arity("one name argument")),
    };

    match name {
        "nop" => no_args(Instr::Nop),
        "pop" => no_args(Instr::Pop),
        "leave" => no_args(Instr::Leave),
        "setFrameTitle" => no_args(Instr::SetFrameTitle),
        "addFrameNote" => no_args(Instr::AddFrameNote),
        "bind" => Ok(Instr::Bind(one_name()?)),
        "rebind" => Ok(Instr::Rebind(one_name()?)),
        "enter" => Ok(Instr::Enter(one_name()?)),
        "find" => Ok(Instr::Find(one_name()?)),
        "leaveAt" => Ok(Instr::LeaveAt(one_name()?)),
        "line" => match &args[..] {
            [Arg::Num(n)] => Ok(Instr::SetProp("l".to_string(), Value::Num(*n))),
            _ => Err(bad_arity("one number argument")),
        },
        _ => Err(CompileError::UnknownInstr {
            name: name.to_string(),
            line,
            col,
        }),
    }
}

fn token_text(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Num(n) => Value::Num(*n).to_string(),
        TokenKind::Str(s) => s.clone(),
        TokenKind::Ident(s) => s.clone(),
        TokenKind::Op(op) => (*op).to_string(),
        TokenKind::Dollar => "$".to_string(),
        TokenKind::LParen => "(".to_string(),
        TokenKind::RParen => ")".to_string(),
        TokenKind::Comma => ",".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    fn instrs(source: &str) -> Vec<Instr> {
        compile(source).unwrap().iter().cloned().collect()
    }

    #[test]
    fn test_arith_program() {
        assert_eq!(
            instrs("10 20 + 1 *"),
            vec![
                Instr::Push(num(10.0)),
                Instr::Push(num(20.0)),
                Instr::Add,
                Instr::Push(num(1.0)),
                Instr::Mul,
            ]
        );
    }

    #[test]
    fn test_all_operators() {
        assert_eq!(
            instrs("+ - * / == != < <= > >= && ||"),
            vec![
                Instr::Add,
                Instr::Sub,
                Instr::Mul,
                Instr::Div,
                Instr::Eq,
                Instr::NotEq,
                Instr::Lt,
                Instr::Le,
                Instr::Gt,
                Instr::Ge,
                Instr::And,
                Instr::Or,
            ]
        );
    }

    #[test]
    fn test_named_instructions() {
        assert_eq!(
            instrs("enter(main) 42 bind(k1) find(k1) leave leaveAt(globals) nop pop"),
            vec![
                Instr::Enter("main".to_string()),
                Instr::Push(num(42.0)),
                Instr::Bind("k1".to_string()),
                Instr::Find("k1".to_string()),
                Instr::Leave,
                Instr::LeaveAt("globals".to_string()),
                Instr::Nop,
                Instr::Pop,
            ]
        );
    }

    #[test]
    fn test_quoted_and_bare_args_agree() {
        assert_eq!(instrs("bind(k1)"), instrs("bind('k1')"));
        assert_eq!(instrs("bind(k1)"), instrs("bind(\"k1\")"));
    }

    #[test]
    fn test_string_literals_push() {
        assert_eq!(
            instrs("'hello' \"world\""),
            vec![
                Instr::Push(Value::str("hello")),
                Instr::Push(Value::str("world")),
            ]
        );
    }

    #[test]
    fn test_lookup_sugar() {
        assert_eq!(instrs("$k1"), vec![Instr::Find("k1".to_string())]);
    }

    #[test]
    fn test_line_marker() {
        assert_eq!(
            instrs("line(3)"),
            vec![Instr::SetProp("l".to_string(), num(3.0))]
        );
    }

    #[test]
    fn test_meta_instructions() {
        assert_eq!(
            instrs("'T' setFrameTitle 'n' addFrameNote"),
            vec![
                Instr::Push(Value::str("T")),
                Instr::SetFrameTitle,
                Instr::Push(Value::str("n")),
                Instr::AddFrameNote,
            ]
        );
    }

    #[test]
    fn test_unknown_instruction_is_an_error() {
        let err = compile("frobnicate(1)").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownInstr {
                name: "frobnicate".to_string(),
                line: 1,
                col: 1,
            }
        );
    }

    #[test]
    fn test_error_positions_track_lines() {
        let err = compile("nop\n  mystery").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownInstr {
                name: "mystery".to_string(),
                line: 2,
                col: 3,
            }
        );
    }

    #[test]
    fn test_mismatched_quotes_are_an_error() {
        // The closing delimiter must match the opening one.
        let err = compile("'abc\"").unwrap_err();
        assert!(matches!(err, CompileError::UnterminatedString { .. }));
    }

    #[test]
    fn test_unterminated_string() {
        let err = compile("'abc").unwrap_err();
        assert_eq!(err, CompileError::UnterminatedString { line: 1, col: 1 });
    }

    #[test]
    fn test_empty_program_is_an_error() {
        assert_eq!(compile("").unwrap_err(), CompileError::EmptyProgram);
        assert_eq!(compile("  \n ").unwrap_err(), CompileError::EmptyProgram);
    }

    #[test]
    fn test_unexpected_character() {
        let err = compile("nop @").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnexpectedChar {
                ch: '@',
                line: 1,
                col: 5,
            }
        );
    }

    #[test]
    fn test_bad_arity() {
        assert!(matches!(
            compile("bind()").unwrap_err(),
            CompileError::BadArity { .. }
        ));
        assert!(matches!(
            compile("bind(a, b)").unwrap_err(),
            CompileError::BadArity { .. }
        ));
        assert!(matches!(
            compile("line('x')").unwrap_err(),
            CompileError::BadArity { .. }
        ));
        assert!(matches!(
            compile("leave(now)").unwrap_err(),
            CompileError::BadArity { .. }
        ));
    }

    #[test]
    fn test_unclosed_args() {
        assert!(matches!(
            compile("bind(k1").unwrap_err(),
            CompileError::UnclosedArgs { .. }
        ));
    }

    #[test]
    fn test_no_partial_program_on_failure() {
        // The valid prefix is discarded when a later expression fails.
        assert!(compile("10 20 + frobnicate").is_err());
    }
}
