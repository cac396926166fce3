/*! A small backtracking regular expression engine for raw byte strings.

Patterns are compiled into an immutable program of instructions, and a
backtracking matcher runs that program against a subject buffer to decide
match/no-match and to extract capturing-group spans. Subjects are plain
`&[u8]`: NUL bytes and invalid UTF-8 are matched like any other byte.

The supported grammar: literal bytes; `.` for any byte; `[...]` classes
(negatable with a leading `^`) enumerating bytes, two-hex-digit escapes
like `\20`, and the meta classes `\s \S \d \D \w \W`; capturing groups
`(...)` numbered by opening order starting at 0; alternation `|` with
branches tried left to right; the quantifiers `* + ?` and their lazy
variants `*? +? ??`; and `^`/`$` anchors, meaningful only as the first/last
byte of the pattern. Unanchored patterns match as substring searches.

A compiled [`Regex`] is never mutated by matching, so one instance can be
shared freely between threads, each match carrying its own transient state.

# Example

```rust
let regex = bregex::compile(b"^(TEST\\20REGEX)$").unwrap();

assert!(regex.matches(b"TEST REGEX"));
assert!(!regex.matches(b" TEST REGEX"));

let mut captures = [bregex::Capture::default(); 1];
assert!(regex.captures(b"TEST REGEX", &mut captures));
assert_eq!(captures[0].offset, 0);
assert_eq!(captures[0].length, 10);
```

Matching is plain backtracking: greedy quantifiers try the longest
repetition first, lazy ones the shortest, and alternation is
first-success-wins. Pathological pattern/subject combinations can backtrack
exponentially; [`Regex::matches_with_budget`] bounds the work when that
matters.
*/

#![deny(missing_docs)]

pub use errors::Error;

mod backtrack;
mod compiler;
mod errors;
mod instr;
mod parser;


use crate::backtrack::BacktrackVm;
use crate::instr::Program;

/// The span captured by one parenthesized group, as a byte offset and
/// length within the subject.
///
/// Capture arrays are caller-owned: [`Regex::captures`] only overwrites the
/// entries of groups that participated in the match, so entries keep
/// whatever value the caller put there (typically `Capture::default()`)
/// when their group was on an untaken alternation branch or beyond the
/// array's capacity.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capture {
    /// Offset of the first byte of the captured span.
    pub offset: usize,
    /// Length of the captured span, in bytes.
    pub length: usize,
}

/// A compiled pattern.
///
/// Produced by [`compile`] (growable) or [`Regex::with_capacity`] +
/// [`Regex::parse_into`] (fixed capacity). Dropping the value releases
/// everything it owns. Matching never mutates the program, so a `Regex`
/// can be shared across threads without locking.
#[derive(Debug, Default)]
pub struct Regex {
    pub(crate) program: Program,
}

/// Compiles a pattern.
///
/// Compilation is atomic: either a fully built [`Regex`] is returned, or an
/// [`Error`] describing why the pattern is malformed, never anything in
/// between.
pub fn compile(pattern: &[u8]) -> Result<Regex, Error> {
    let (ast, group_count) = parser::Parser::parse(pattern)?;
    let program = compiler::Compiler::new().compile(&ast, group_count)?;
    Ok(Regex { program })
}

impl Regex {
    /// An empty regex backed by storage for at most `capacity`
    /// instructions, to be filled with [`Regex::parse_into`].
    ///
    /// Until parsed, the empty program matches any subject.
    pub fn with_capacity(capacity: usize) -> Regex {
        Regex { program: Program::fixed(capacity) }
    }

    /// Compiles `pattern` into this value in place, under the same
    /// validation rules as [`compile`], plus the value's instruction
    /// capacity when it was created with [`Regex::with_capacity`].
    ///
    /// Returns `true` on success. On failure (malformed pattern, or a
    /// program larger than the capacity) returns `false` and leaves the
    /// value cleared.
    pub fn parse_into(&mut self, pattern: &[u8]) -> bool {
        let capacity = self.program.capacity();
        self.program.clear();
        let compiled =
            parser::Parser::parse(pattern).and_then(|(ast, group_count)| {
                compiler::Compiler::with_limit(capacity)
                    .compile(&ast, group_count)
            });
        match compiled {
            Ok(program) => {
                self.program = program;
                true
            }
            Err(_) => false,
        }
    }

    /// Returns true if the pattern matches `subject`.
    ///
    /// Without a `^` anchor this is a substring search; with one, only a
    /// match starting at offset 0 is accepted.
    pub fn matches(&self, subject: &[u8]) -> bool {
        BacktrackVm::new(&self.program).find(subject, &mut [])
    }

    /// Like [`Regex::matches`], but gives up and reports no match after
    /// executing `steps` instructions, bounding the cost of catastrophic
    /// backtracking.
    pub fn matches_with_budget(&self, subject: &[u8], steps: u64) -> bool {
        BacktrackVm::new(&self.program)
            .step_limit(steps)
            .find(subject, &mut [])
    }

    /// Matches `subject` and, on success, writes the span of each
    /// participating capture group into `captures`, indexed by the order
    /// the groups open in the pattern.
    ///
    /// The array may be smaller than [`Regex::capture_count`]; excess
    /// groups are simply not written. Nothing is written at all unless the
    /// whole match succeeds.
    pub fn captures(
        &self,
        subject: &[u8],
        captures: &mut [Capture],
    ) -> bool {
        BacktrackVm::new(&self.program).find(subject, captures)
    }

    /// Number of capturing groups the pattern declares.
    pub fn capture_count(&self) -> usize {
        self.program.group_count() as usize
    }
}

impl std::fmt::Display for Regex {
    /// Formats the compiled program as an offset-annotated listing, one
    /// instruction per line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)
    }
}
