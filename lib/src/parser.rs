/*!
This module parses a pattern into a small syntax tree that the compiler in
[`crate::compiler`] lowers into a [`crate::instr::Program`].

The grammar is deliberately small: literal bytes, `.`, bracketed classes
with the `\s \S \d \D \w \W` meta classes, two-hex-digit byte escapes,
capturing groups, alternation, the `* + ?` quantifiers with lazy variants,
and `^`/`$` anchors that are only meaningful as the first/last byte of the
pattern. Group indexes are assigned here, in the order the opening
parentheses appear, starting at 0.
*/

use crate::errors::Error;
use crate::instr::{ClassSet, MetaClass};

#[derive(Debug)]
pub(crate) enum Ast {
    Seq(Vec<Ast>),
    Alt(Vec<Ast>),
    Group { index: u32, body: Box<Ast> },
    Repeat { body: Box<Ast>, min: u32, max: Option<u32>, greedy: bool },
    Class(ClassSet),
    Byte(u8),
    Any,
    Start,
    End,
}

enum Escape {
    Byte(u8),
    Meta(MetaClass),
}

pub(crate) struct Parser<'a> {
    pattern: &'a [u8],
    pos: usize,
    groups: u32,
}

impl<'a> Parser<'a> {
    /// Parses `pattern`, returning the syntax tree and the number of
    /// capturing groups it declares.
    pub fn parse(pattern: &'a [u8]) -> Result<(Ast, u32), Error> {
        let mut parser = Self { pattern, pos: 0, groups: 0 };
        let ast = parser.alternation()?;
        if parser.pos < parser.pattern.len() {
            // alternation() only stops early on a stray `)`.
            return Err(Error::UnbalancedParenthesis(parser.pos));
        }
        Ok((ast, parser.groups))
    }

    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn alternation(&mut self) -> Result<Ast, Error> {
        let mut branches = vec![self.sequence()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            branches.push(self.sequence()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(Ast::Alt(branches))
        }
    }

    fn sequence(&mut self) -> Result<Ast, Error> {
        let mut items: Vec<Ast> = Vec::new();
        while let Some(b) = self.peek() {
            match b {
                b'|' | b')' => break,
                b'(' => {
                    let at = self.pos;
                    self.pos += 1;
                    if self.groups >= u16::MAX as u32 {
                        return Err(Error::TooManyGroups);
                    }
                    let index = self.groups;
                    self.groups += 1;
                    let body = self.alternation()?;
                    if self.bump() != Some(b')') {
                        return Err(Error::UnbalancedParenthesis(at));
                    }
                    items.push(Ast::Group { index, body: Box::new(body) });
                }
                b'[' => items.push(self.class()?),
                b'.' => {
                    self.pos += 1;
                    items.push(Ast::Any);
                }
                b'*' | b'+' | b'?' => self.quantifier(&mut items)?,
                b'^' => {
                    let at = self.pos;
                    self.pos += 1;
                    items.push(if at == 0 { Ast::Start } else { Ast::Byte(b'^') });
                }
                b'$' => {
                    let at = self.pos;
                    self.pos += 1;
                    items.push(if at + 1 == self.pattern.len() {
                        Ast::End
                    } else {
                        Ast::Byte(b'$')
                    });
                }
                b'\\' => {
                    self.pos += 1;
                    items.push(match self.escape()? {
                        Escape::Byte(b) => Ast::Byte(b),
                        Escape::Meta(m) => Ast::Class(ClassSet::from_meta(m)),
                    });
                }
                b => {
                    self.pos += 1;
                    items.push(Ast::Byte(b));
                }
            }
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(Ast::Seq(items))
        }
    }

    /// Wraps the preceding atom in a repetition. Only literals, classes,
    /// `.` and groups are quantifiable; anchors and already quantified
    /// atoms are not.
    fn quantifier(&mut self, items: &mut Vec<Ast>) -> Result<(), Error> {
        let at = self.pos;
        let (min, max) = match self.bump().unwrap() {
            b'*' => (0, None),
            b'+' => (1, None),
            _ => (0, Some(1)),
        };
        let greedy = if self.peek() == Some(b'?') {
            self.pos += 1;
            false
        } else {
            true
        };
        match items.pop() {
            Some(
                body @ (Ast::Byte(_)
                | Ast::Any
                | Ast::Class(_)
                | Ast::Group { .. }),
            ) => {
                items.push(Ast::Repeat {
                    body: Box::new(body),
                    min,
                    max,
                    greedy,
                });
                Ok(())
            }
            _ => Err(Error::DanglingQuantifier(at)),
        }
    }

    fn class(&mut self) -> Result<Ast, Error> {
        let start = self.pos;
        self.pos += 1; // consume the `[`
        let negated = if self.peek() == Some(b'^') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut set = ClassSet::new(negated);
        loop {
            match self.peek() {
                None => return Err(Error::UnterminatedClass(start)),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.escape()? {
                        Escape::Byte(b) => set.add_byte(b),
                        Escape::Meta(m) => set.add_meta(m),
                    }
                }
                Some(b) => {
                    self.pos += 1;
                    set.add_byte(b);
                }
            }
        }
        Ok(Ast::Class(set))
    }

    /// Parses one escape; the backslash has already been consumed.
    ///
    /// A pair of hex digits takes precedence over the named escapes: `\dd`
    /// is the byte 0xDD, while `\d` followed by a non-hex byte is the digit
    /// class. Embedding a literal hex digit right after a meta class
    /// requires spelling it out, as in `\d\64` for digit-then-`d`.
    fn escape(&mut self) -> Result<Escape, Error> {
        let at = self.pos - 1;
        let Some(c) = self.bump() else {
            return Err(Error::InvalidEscape(at));
        };
        if let (Some(hi), Some(lo)) =
            (hex_value(c), self.peek().and_then(hex_value))
        {
            self.pos += 1;
            return Ok(Escape::Byte(hi << 4 | lo));
        }
        Ok(match c {
            b's' => Escape::Meta(MetaClass::Space),
            b'S' => Escape::Meta(MetaClass::NonSpace),
            b'd' => Escape::Meta(MetaClass::Digit),
            b'D' => Escape::Meta(MetaClass::NonDigit),
            b'w' => Escape::Meta(MetaClass::Word),
            b'W' => Escape::Meta(MetaClass::NonWord),
            b'n' => Escape::Byte(b'\n'),
            b'r' => Escape::Byte(b'\r'),
            b't' => Escape::Byte(b'\t'),
            b'0' => Escape::Byte(0),
            b => Escape::Byte(b),
        })
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_indexes_follow_open_order() {
        let (_, groups) = Parser::parse(b"((a)(b))(c)").unwrap();
        assert_eq!(groups, 4);
    }

    #[test]
    fn hex_escapes_win_over_named_escapes() {
        // `\dd` is a hex pair, `\d!` is the digit class.
        let (ast, _) = Parser::parse(b"\\dd").unwrap();
        assert!(matches!(ast, Ast::Byte(0xDD)));
        let (ast, _) = Parser::parse(b"\\d!").unwrap();
        assert!(matches!(ast, Ast::Seq(_)));
    }

    #[test]
    fn malformed_patterns() {
        assert_eq!(
            Parser::parse(b"++??.+*?").unwrap_err(),
            Error::DanglingQuantifier(0)
        );
        assert_eq!(
            Parser::parse(b"(())()(").unwrap_err(),
            Error::UnbalancedParenthesis(6)
        );
        assert_eq!(
            Parser::parse(b"[\\s][").unwrap_err(),
            Error::UnterminatedClass(4)
        );
        assert_eq!(Parser::parse(b"abc\\").unwrap_err(), Error::InvalidEscape(3));
        assert_eq!(
            Parser::parse(b"a)b").unwrap_err(),
            Error::UnbalancedParenthesis(1)
        );
    }
}
