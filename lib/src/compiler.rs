/*!
This module lowers the syntax tree produced by [`crate::parser`] into the
flat instruction arena executed by the matcher.

Alternation compiles to an ordered [`Instr::Split`] whose branches all jump
to a common join point. `?` compiles to a two-way split (body first when
greedy, skip first when lazy). Unbounded quantifiers over one-byte atoms
compile to a single counted repeat instruction, while quantified groups
compile to an [`Instr::EnterLoop`]/[`Instr::LoopAgain`] pair. Forward
targets are unknown while the instruction that needs them is emitted, so
their locations are remembered and patched once the target is known.
*/

use crate::errors::Error;
use crate::instr::{Instr, Program};
use crate::parser::Ast;

#[derive(Default)]
pub(crate) struct Compiler {
    code: Vec<Instr>,
    /// Maximum number of instructions the caller's program can hold, when
    /// compiling into fixed-capacity storage.
    limit: Option<usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler that fails with [`Error::TooLarge`] instead of growing
    /// past `limit` instructions.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self { code: Vec::new(), limit }
    }

    pub fn compile(
        mut self,
        ast: &Ast,
        group_count: u32,
    ) -> Result<Program, Error> {
        self.emit(ast)?;
        self.push(Instr::Match)?;
        Ok(Program::new(self.code, group_count, self.limit))
    }

    fn location(&self) -> u32 {
        self.code.len() as u32
    }

    fn push(&mut self, instr: Instr) -> Result<u32, Error> {
        if let Some(limit) = self.limit {
            if self.code.len() >= limit {
                return Err(Error::TooLarge);
            }
        }
        let location = self.location();
        self.code.push(instr);
        Ok(location)
    }

    fn emit(&mut self, ast: &Ast) -> Result<(), Error> {
        match ast {
            Ast::Byte(b) => {
                self.push(Instr::Byte(*b))?;
            }
            Ast::Any => {
                self.push(Instr::AnyByte)?;
            }
            Ast::Class(set) => {
                self.push(Instr::Class(Box::new(set.clone())))?;
            }
            Ast::Start => {
                self.push(Instr::Start)?;
            }
            Ast::End => {
                self.push(Instr::End)?;
            }
            Ast::Seq(items) => {
                for item in items {
                    self.emit(item)?;
                }
            }
            Ast::Group { index, body } => {
                self.push(Instr::CaptureStart(*index as u16))?;
                self.emit(body)?;
                self.push(Instr::CaptureEnd(*index as u16))?;
            }
            Ast::Alt(branches) => self.emit_alternation(branches)?,
            Ast::Repeat { body, min, max, greedy } => {
                if max.is_some() {
                    self.emit_optional(body, *greedy)?;
                } else if let Some(atom) = one_byte_atom(body) {
                    let atom = Box::new(atom);
                    self.push(if *greedy {
                        Instr::RepeatGreedy { atom, min: *min }
                    } else {
                        Instr::RepeatLazy { atom, min: *min }
                    })?;
                } else {
                    self.emit_loop(body, *min, *greedy)?;
                }
            }
        }
        Ok(())
    }

    /// Branches are tried strictly left to right, first success wins.
    fn emit_alternation(&mut self, branches: &[Ast]) -> Result<(), Error> {
        let split = self.push(Instr::Split(Box::new([])))?;
        let mut starts = Vec::with_capacity(branches.len());
        let mut jumps = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            starts.push(self.location());
            self.emit(branch)?;
            if i + 1 < branches.len() {
                jumps.push(self.push(Instr::Jump(0))?);
            }
        }
        let join = self.location();
        self.code[split as usize] = Instr::Split(starts.into_boxed_slice());
        for jump in jumps {
            self.code[jump as usize] = Instr::Jump(join);
        }
        Ok(())
    }

    /// `x?` and `x??`: a two-way split over the body.
    fn emit_optional(&mut self, body: &Ast, greedy: bool) -> Result<(), Error> {
        let split = self.push(Instr::Split(Box::new([])))?;
        self.emit(body)?;
        let join = self.location();
        let targets = if greedy {
            [split + 1, join]
        } else {
            [join, split + 1]
        };
        self.code[split as usize] = Instr::Split(Box::new(targets));
        Ok(())
    }

    /// Unbounded repetition of a group (or any other sub-pattern that may
    /// match the empty string).
    fn emit_loop(
        &mut self,
        body: &Ast,
        min: u32,
        greedy: bool,
    ) -> Result<(), Error> {
        let enter = self.push(Instr::EnterLoop { exit: 0, min, greedy })?;
        self.emit(body)?;
        self.push(Instr::LoopAgain { head: enter, greedy })?;
        let exit = self.location();
        if let Instr::EnterLoop { exit: e, .. } = &mut self.code[enter as usize]
        {
            *e = exit;
        }
        Ok(())
    }
}

/// The single instruction for a one-byte atom, if `ast` is one.
fn one_byte_atom(ast: &Ast) -> Option<Instr> {
    match ast {
        Ast::Byte(b) => Some(Instr::Byte(*b)),
        Ast::Any => Some(Instr::AnyByte),
        Ast::Class(set) => Some(Instr::Class(Box::new(set.clone()))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Compiler;
    use crate::parser::Parser;

    fn listing(pattern: &str) -> String {
        let (ast, groups) = Parser::parse(pattern.as_bytes()).unwrap();
        Compiler::new().compile(&ast, groups).unwrap().to_string()
    }

    #[test]
    fn code_for_literals_and_anchors() {
        assert_eq!(
            listing("^ab$"),
            r#"
00000: START
00001: LIT 0x61
00002: LIT 0x62
00003: END
00004: MATCH
"#
        );
    }

    #[test]
    fn code_for_alternation() {
        assert_eq!(
            listing("a|b|c"),
            r#"
00000: SPLIT 00001, 00003, 00005
00001: LIT 0x61
00002: JMP 00006
00003: LIT 0x62
00004: JMP 00006
00005: LIT 0x63
00006: MATCH
"#
        );
    }

    #[test]
    fn code_for_quantifiers() {
        assert_eq!(
            listing("a*b+?c??"),
            r#"
00000: REPEAT_GREEDY LIT 0x61, min: 0
00001: REPEAT_LAZY LIT 0x62, min: 1
00002: SPLIT 00004, 00003
00003: LIT 0x63
00004: MATCH
"#
        );
    }

    #[test]
    fn code_for_quantified_group() {
        assert_eq!(
            listing("(ab)*"),
            r#"
00000: ENTER_LOOP exit: 00006, min: 0
00001: OPEN 0
00002: LIT 0x61
00003: LIT 0x62
00004: CLOSE 0
00005: LOOP_AGAIN head: 00000
00006: MATCH
"#
        );
    }
}
