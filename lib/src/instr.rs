/*!
This module defines the instructions that compiled patterns are made of,
and [`Program`], the flat instruction arena produced by the compiler.

A program is an ordered, index-addressed sequence of [`Instr`]. Nested
constructs in the pattern (groups, alternations, quantified groups) are
flattened by the compiler into jumps, ordered splits and loop pairs, so the
matcher can execute the whole program as a single iterative loop with an
explicit choice-point stack, never recursing through native call frames.

A program is immutable once built and holds no per-match state, which is why
any number of concurrent matches can share the same program without locking.
*/

use std::fmt::{Display, Formatter};

use bitmask::bitmask;
use bitvec::array::BitArray;
use bstr::BString;

bitmask! {
    /// Flags for the predefined character classes that can appear inside a
    /// bracketed class or stand alone (`\s`, `\d+`, ...). Negated classes
    /// (`\S`, `\D`, `\W`) get their own flag instead of negating the whole
    /// set, because a class like `[\S\s]` mixes both polarities.
    #[derive(Debug)]
    pub mask MetaClassSet: u8 where flags MetaClass {
        Space    = 0x01,
        NonSpace = 0x02,
        Digit    = 0x04,
        NonDigit = 0x08,
        Word     = 0x10,
        NonWord  = 0x20,
    }
}

/// Returns true if `b` is a whitespace byte (space, `\t`, `\n`, `\v`, `\f`
/// or `\r`).
#[inline]
pub(crate) fn is_space(b: u8) -> bool {
    b == b' ' || (0x09..=0x0D).contains(&b)
}

/// Returns true if `b` is a word byte (alphanumeric or `_`).
#[inline]
pub(crate) fn is_word(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// The set of bytes matched by a bracketed character class like
/// `[ \n\r\0\S\s\d\\TESTREGEX]` or by a standalone meta class like `\w`.
///
/// Explicitly listed bytes are kept in a 256-bit membership bitmap; the
/// predefined classes are kept as [`MetaClassSet`] flags and tested against
/// the byte predicates at match time. The `negated` flag implements `[^...]`.
#[derive(Clone, Debug)]
pub(crate) struct ClassSet {
    bytes: BitArray<[u64; 4]>,
    metas: MetaClassSet,
    negated: bool,
}

impl ClassSet {
    pub fn new(negated: bool) -> Self {
        Self {
            bytes: BitArray::default(),
            metas: MetaClassSet::none(),
            negated,
        }
    }

    /// Creates the class for a standalone meta-class escape like `\s`.
    pub fn from_meta(meta: MetaClass) -> Self {
        let mut class = Self::new(false);
        class.add_meta(meta);
        class
    }

    pub fn add_byte(&mut self, b: u8) {
        self.bytes.set(b as usize, true);
    }

    pub fn add_meta(&mut self, meta: MetaClass) {
        self.metas.set(meta);
    }

    /// Returns true if the class matches the byte `b`.
    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        let found = self.bytes[b as usize]
            || (self.metas.contains(MetaClass::Space) && is_space(b))
            || (self.metas.contains(MetaClass::NonSpace) && !is_space(b))
            || (self.metas.contains(MetaClass::Digit) && b.is_ascii_digit())
            || (self.metas.contains(MetaClass::NonDigit)
                && !b.is_ascii_digit())
            || (self.metas.contains(MetaClass::Word) && is_word(b))
            || (self.metas.contains(MetaClass::NonWord) && !is_word(b));
        found != self.negated
    }
}

impl Display for ClassSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        if self.negated {
            write!(f, "^")?;
        }
        let lits: BString = self.bytes.iter_ones().map(|b| b as u8).collect();
        if !lits.is_empty() {
            write!(f, "{:?}", lits)?;
        }
        for (meta, name) in [
            (MetaClass::Space, "\\s"),
            (MetaClass::NonSpace, "\\S"),
            (MetaClass::Digit, "\\d"),
            (MetaClass::NonDigit, "\\D"),
            (MetaClass::Word, "\\w"),
            (MetaClass::NonWord, "\\W"),
        ] {
            if self.metas.contains(meta) {
                write!(f, "{}", name)?;
            }
        }
        write!(f, "]")
    }
}

/// Instructions supported by the matcher.
///
/// `Split`, `Jump` and the loop pair carry absolute instruction indexes.
/// The repeat instructions implement unbounded quantifiers over single-byte
/// atoms with a repetition count that lives in the matcher's choice-point
/// frames, while `EnterLoop`/`LoopAgain` bracket quantified groups, whose
/// bodies may match the empty string and therefore need a progress check on
/// every iteration.
#[derive(Clone, Debug)]
pub(crate) enum Instr {
    /// Matches a single literal byte.
    Byte(u8),
    /// Matches any byte (including NUL and line breaks).
    AnyByte,
    /// Matches any byte in the class.
    Class(Box<ClassSet>),
    /// Records the start of capture group `n` at the current position.
    CaptureStart(u16),
    /// Records the end of capture group `n` at the current position.
    CaptureEnd(u16),
    /// Continues at the first target; the remaining targets become pending
    /// choice points, tried in order when the preferred path fails.
    Split(Box<[u32]>),
    /// Continues at the target instruction.
    Jump(u32),
    /// Greedy unbounded repetition of a one-byte atom: consumes as many
    /// repetitions as possible, giving repetitions back one at a time on
    /// backtrack, down to `min`.
    RepeatGreedy { atom: Box<Instr>, min: u32 },
    /// Lazy unbounded repetition of a one-byte atom: consumes `min`
    /// repetitions, adding one more on every backtrack.
    RepeatLazy { atom: Box<Instr>, min: u32 },
    /// Enters a quantified group. The body starts at the next instruction
    /// and ends at the matching [`Instr::LoopAgain`]; `exit` is the
    /// instruction right after it. With `min` 0 the zero-iteration path is
    /// offered according to greediness.
    EnterLoop { exit: u32, min: u32, greedy: bool },
    /// Closes one iteration of a quantified group whose
    /// [`Instr::EnterLoop`] sits at `head`. Iterations that consume no
    /// input terminate the loop.
    LoopAgain { head: u32, greedy: bool },
    /// Anchors the match to the start of the subject.
    Start,
    /// Anchors the match to the end of the subject.
    End,
    /// The match is complete.
    Match,
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Byte(b) => write!(f, "LIT {:#04x}", b),
            Instr::AnyByte => write!(f, "ANY"),
            Instr::Class(class) => write!(f, "CLASS {}", class),
            Instr::CaptureStart(n) => write!(f, "OPEN {}", n),
            Instr::CaptureEnd(n) => write!(f, "CLOSE {}", n),
            Instr::Split(targets) => {
                write!(f, "SPLIT ")?;
                for (i, t) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:05}", t)?;
                }
                Ok(())
            }
            Instr::Jump(t) => write!(f, "JMP {:05}", t),
            Instr::RepeatGreedy { atom, min } => {
                write!(f, "REPEAT_GREEDY {}, min: {}", atom, min)
            }
            Instr::RepeatLazy { atom, min } => {
                write!(f, "REPEAT_LAZY {}, min: {}", atom, min)
            }
            Instr::EnterLoop { exit, min, greedy } => write!(
                f,
                "ENTER_LOOP exit: {:05}, min: {}{}",
                exit,
                min,
                if *greedy { "" } else { ", lazy" },
            ),
            Instr::LoopAgain { head, greedy } => write!(
                f,
                "LOOP_AGAIN head: {:05}{}",
                head,
                if *greedy { "" } else { ", lazy" },
            ),
            Instr::Start => write!(f, "START"),
            Instr::End => write!(f, "END"),
            Instr::Match => write!(f, "MATCH"),
        }
    }
}

/// A compiled pattern: a flat sequence of instructions plus the number of
/// capturing groups the pattern declares.
///
/// Programs built by [`crate::compile`] grow as needed; programs built for
/// [`crate::Regex::parse_into`] carry a fixed instruction capacity that
/// compilation may not exceed.
#[derive(Debug, Default)]
pub(crate) struct Program {
    instrs: Vec<Instr>,
    group_count: u32,
    capacity: Option<usize>,
}

impl Program {
    pub fn new(
        instrs: Vec<Instr>,
        group_count: u32,
        capacity: Option<usize>,
    ) -> Self {
        Self { instrs, group_count, capacity }
    }

    /// An empty program that can hold at most `capacity` instructions.
    pub fn fixed(capacity: usize) -> Self {
        Self { instrs: Vec::new(), group_count: 0, capacity: Some(capacity) }
    }

    #[inline]
    pub fn instr(&self, ip: u32) -> Option<&Instr> {
        self.instrs.get(ip as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.instrs.clear();
        self.group_count = 0;
    }

    /// True if the program can only match at the start of the subject.
    pub fn anchored_start(&self) -> bool {
        matches!(self.instrs.first(), Some(Instr::Start))
    }

    /// The literal byte every match must begin with, if there is one.
    /// Capture markers are transparent here: `(TEST)` still starts with `T`.
    pub fn first_literal(&self) -> Option<u8> {
        for instr in self.instrs.iter() {
            match instr {
                Instr::CaptureStart(_) => continue,
                Instr::Byte(b) => return Some(*b),
                _ => return None,
            }
        }
        None
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        for (ip, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "{:05}: {}", ip, instr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_set() {
        let mut class = ClassSet::new(false);
        class.add_byte(b'a');
        class.add_meta(MetaClass::Digit);
        assert!(class.contains(b'a'));
        assert!(class.contains(b'7'));
        assert!(!class.contains(b'b'));

        let mut negated = ClassSet::new(true);
        negated.add_meta(MetaClass::Space);
        assert!(negated.contains(b'x'));
        assert!(!negated.contains(b' '));
        assert!(!negated.contains(b'\t'));
    }

    #[test]
    fn class_set_mixed_polarity() {
        // [\S\s] matches everything, negated it matches nothing.
        let mut class = ClassSet::new(false);
        class.add_meta(MetaClass::Space);
        class.add_meta(MetaClass::NonSpace);
        assert!((0..=255).all(|b| class.contains(b)));

        let mut class = ClassSet::new(true);
        class.add_meta(MetaClass::Space);
        class.add_meta(MetaClass::NonSpace);
        assert!((0..=255).all(|b| !class.contains(b)));
    }
}
