/*!
This module implements the matcher: a backtracking VM that executes the
code produced by [`crate::compiler::Compiler`] against a subject buffer.

The VM runs the program as a single iterative loop. Whenever an instruction
offers more than one way forward (a split, a repetition) the alternatives
are recorded as choice-point frames on an explicit stack, so repetition and
alternation never recurse through native call frames. When an instruction
cannot proceed the most recent frame is popped and resumed with the next
alternative: the following split target, one repetition fewer for a greedy
repeat, one repetition more for a lazy repeat. A frame is
`{instruction index, subject position, count}` plus a journal watermark.

Every mutation of per-match state (staged capture slots, the loop-entry
stack) is recorded in a journal together with its inverse, and resuming a
frame replays the journal back to the frame's watermark. This restores the
exact state the choice point was created under, no matter how deep the
failed exploration went.

Capture boundaries are staged while instructions execute and are only
committed to the caller's array once the whole match succeeds; a group
whose instructions never ran (an untaken alternation branch) leaves its
entry untouched.

A corrupted program (out-of-range target, bad capture index, malformed
repeat) is never allowed to crash the process: the attempt is abandoned, a
diagnostic is logged, and the match call reports no match.
*/

use log::{error, warn};
use memchr::memchr;

use crate::instr::{Instr, Program};
use crate::Capture;

/// A choice point: the instruction that created it, the subject position to
/// resume from, and the alternative to try next (split target index, or a
/// repetition count). `undo_len` is the journal watermark to replay back to
/// on resume.
#[derive(Clone, Copy, Debug)]
struct Frame {
    ip: u32,
    pos: usize,
    count: usize,
    undo_len: u32,
}

/// One journaled state mutation, stored with enough information to invert
/// it.
#[derive(Debug)]
enum Undo {
    /// A capture slot was overwritten; `old` is its previous value.
    Capture { slot: u32, old: Option<usize> },
    /// A loop entry was pushed.
    LoopPushed,
    /// A loop entry holding `0` was popped.
    LoopPopped(usize),
    /// The innermost loop entry was overwritten; `0` is its previous value.
    LoopTopWas(usize),
}

/// Why a match call was abandoned mid-program.
#[derive(Debug)]
enum Fault {
    BadInstrPointer(u32),
    BadCaptureSlot(u32),
    BadRepeatAtom(u32),
    BadChoicePoint(u32),
    MalformedSplit(u32),
    LoopUnderflow(u32),
    StepLimit,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::BadInstrPointer(ip) => {
                write!(f, "instruction pointer {} out of range", ip)
            }
            Fault::BadCaptureSlot(ip) => {
                write!(f, "capture index out of range at {:05}", ip)
            }
            Fault::BadRepeatAtom(ip) => {
                write!(f, "repeat atom at {:05} is not a one-byte matcher", ip)
            }
            Fault::BadChoicePoint(ip) => {
                write!(f, "choice point at {:05} is not resumable", ip)
            }
            Fault::MalformedSplit(ip) => {
                write!(f, "split at {:05} has no usable target", ip)
            }
            Fault::LoopUnderflow(ip) => {
                write!(f, "loop end at {:05} without an active loop", ip)
            }
            Fault::StepLimit => write!(f, "step budget exhausted"),
        }
    }
}

/// Executes a compiled program against subject buffers.
///
/// The VM owns all per-match state (choice points, staged captures, the
/// journal), so a single [`Program`] can be shared by any number of VMs
/// running in parallel.
pub(crate) struct BacktrackVm<'r> {
    program: &'r Program,
    frames: Vec<Frame>,
    /// Two staged slots per capture group: start offset and end offset.
    slots: Vec<Option<usize>>,
    /// The journal of state mutations, replayed backwards on backtrack.
    undo: Vec<Undo>,
    /// Subject position at the start of the current iteration of each
    /// active quantified-group loop, innermost last. An iteration that
    /// ends where it started terminates its loop.
    loops: Vec<usize>,
    step_limit: Option<u64>,
    steps_left: Option<u64>,
}

impl<'r> BacktrackVm<'r> {
    pub fn new(program: &'r Program) -> Self {
        Self {
            program,
            frames: Vec::new(),
            slots: vec![None; program.group_count() as usize * 2],
            undo: Vec::new(),
            loops: Vec::new(),
            step_limit: None,
            steps_left: None,
        }
    }

    /// Bounds the total number of instructions executed across all start
    /// offsets of one match call. Patterns with catastrophic backtracking
    /// report no match once the budget runs out, instead of running for an
    /// unbounded amount of time. There is no budget by default.
    pub fn step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Matches the subject, filling `captures` on success. Returns whether
    /// the program matched.
    ///
    /// Without a start anchor the program is retried at successive offsets
    /// until it matches or the subject is exhausted; when the program
    /// starts with a known literal byte, candidate offsets are located
    /// with `memchr` instead of being tried one by one.
    pub fn find(&mut self, subject: &[u8], captures: &mut [Capture]) -> bool {
        // A program with no instructions matches anything and stages no
        // captures. This is the value form of the null-program sentinel.
        if self.program.is_empty() {
            return true;
        }

        self.steps_left = self.step_limit;

        let anchored = self.program.anchored_start();
        let prefix =
            if anchored { None } else { self.program.first_literal() };

        let mut start = 0;
        loop {
            if let Some(byte) = prefix {
                match memchr(byte, &subject[start..]) {
                    Some(offset) => start += offset,
                    None => return false,
                }
            }
            match self.run(subject, start) {
                Ok(true) => {
                    self.commit(captures);
                    return true;
                }
                Ok(false) => {
                    if anchored || start >= subject.len() {
                        return false;
                    }
                    start += 1;
                }
                Err(Fault::StepLimit) => {
                    warn!("match aborted: step budget exhausted");
                    return false;
                }
                Err(fault) => {
                    error!("match aborted, corrupted program: {}", fault);
                    return false;
                }
            }
        }
    }

    /// Runs one match attempt starting at `start`.
    fn run(&mut self, subject: &[u8], start: usize) -> Result<bool, Fault> {
        let program = self.program;

        self.frames.clear();
        self.undo.clear();
        self.loops.clear();
        self.slots.fill(None);

        let mut ip: u32 = 0;
        let mut pos = start;

        loop {
            if let Some(steps) = &mut self.steps_left {
                if *steps == 0 {
                    return Err(Fault::StepLimit);
                }
                *steps -= 1;
            }

            let instr =
                program.instr(ip).ok_or(Fault::BadInstrPointer(ip))?;

            let failed = match instr {
                Instr::Byte(b) => {
                    if subject.get(pos) == Some(b) {
                        pos += 1;
                        ip += 1;
                        false
                    } else {
                        true
                    }
                }
                Instr::AnyByte => {
                    if pos < subject.len() {
                        pos += 1;
                        ip += 1;
                        false
                    } else {
                        true
                    }
                }
                Instr::Class(class) => {
                    if subject.get(pos).is_some_and(|b| class.contains(*b)) {
                        pos += 1;
                        ip += 1;
                        false
                    } else {
                        true
                    }
                }
                Instr::CaptureStart(group) => {
                    self.set_slot(*group as u32 * 2, pos, ip)?;
                    ip += 1;
                    false
                }
                Instr::CaptureEnd(group) => {
                    self.set_slot(*group as u32 * 2 + 1, pos, ip)?;
                    ip += 1;
                    false
                }
                Instr::Split(targets) => {
                    let Some(&first) = targets.first() else {
                        return Err(Fault::MalformedSplit(ip));
                    };
                    if targets.len() > 1 {
                        self.push_frame(ip, pos, 1);
                    }
                    ip = first;
                    false
                }
                Instr::Jump(target) => {
                    ip = *target;
                    false
                }
                Instr::RepeatGreedy { atom, min } => {
                    let min = *min as usize;
                    let mut count = 0;
                    while one_byte_match(atom, subject, pos + count, ip)? {
                        count += 1;
                    }
                    if count < min {
                        true
                    } else {
                        if count > min {
                            self.push_frame(ip, pos, count);
                        }
                        pos += count;
                        ip += 1;
                        false
                    }
                }
                Instr::RepeatLazy { atom, min } => {
                    let min = *min as usize;
                    if min == 1 && !one_byte_match(atom, subject, pos, ip)? {
                        true
                    } else {
                        self.push_frame(ip, pos, min);
                        pos += min;
                        ip += 1;
                        false
                    }
                }
                Instr::EnterLoop { exit, min, greedy } => {
                    if *min >= 1 {
                        self.loop_push(pos);
                        ip += 1;
                    } else if *greedy {
                        self.push_frame(ip, pos, 0);
                        self.loop_push(pos);
                        ip += 1;
                    } else {
                        self.push_frame(ip, pos, 0);
                        ip = *exit;
                    }
                    false
                }
                Instr::LoopAgain { head, greedy } => {
                    let Some(&entry) = self.loops.last() else {
                        return Err(Fault::LoopUnderflow(ip));
                    };
                    if pos == entry {
                        // The iteration consumed nothing; a further one
                        // would not either.
                        self.loop_pop();
                        ip += 1;
                    } else {
                        self.push_frame(ip, pos, 0);
                        if *greedy {
                            self.loop_set_top(pos);
                            ip = head + 1;
                        } else {
                            self.loop_pop();
                            ip += 1;
                        }
                    }
                    false
                }
                Instr::Start => {
                    if pos == 0 {
                        ip += 1;
                        false
                    } else {
                        true
                    }
                }
                Instr::End => {
                    if pos == subject.len() {
                        ip += 1;
                        false
                    } else {
                        true
                    }
                }
                Instr::Match => return Ok(true),
            };

            if failed {
                match self.backtrack(subject)? {
                    Some((resume_ip, resume_pos)) => {
                        ip = resume_ip;
                        pos = resume_pos;
                    }
                    None => return Ok(false),
                }
            }
        }
    }

    /// Pops choice points until one yields a runnable state, returning the
    /// instruction and position to resume at, or `None` when the attempt
    /// is exhausted.
    fn backtrack(
        &mut self,
        subject: &[u8],
    ) -> Result<Option<(u32, usize)>, Fault> {
        let program = self.program;
        while let Some(frame) = self.frames.pop() {
            self.unwind(frame.undo_len);
            let instr = program
                .instr(frame.ip)
                .ok_or(Fault::BadChoicePoint(frame.ip))?;
            match instr {
                Instr::Split(targets) => {
                    let Some(&target) = targets.get(frame.count) else {
                        return Err(Fault::MalformedSplit(frame.ip));
                    };
                    if frame.count + 1 < targets.len() {
                        self.frames
                            .push(Frame { count: frame.count + 1, ..frame });
                    }
                    return Ok(Some((target, frame.pos)));
                }
                Instr::RepeatGreedy { min, .. } => {
                    // frame.count > min holds for every pushed frame.
                    let count = frame.count - 1;
                    if count > *min as usize {
                        self.frames.push(Frame { count, ..frame });
                    }
                    return Ok(Some((frame.ip + 1, frame.pos + count)));
                }
                Instr::RepeatLazy { atom, .. } => {
                    let count = frame.count + 1;
                    if one_byte_match(
                        atom,
                        subject,
                        frame.pos + count - 1,
                        frame.ip,
                    )? {
                        self.frames.push(Frame { count, ..frame });
                        return Ok(Some((frame.ip + 1, frame.pos + count)));
                    }
                    // The repetition cannot grow; keep unwinding.
                }
                Instr::EnterLoop { exit, greedy, .. } => {
                    if *greedy {
                        // Give up on the loop: the entry pushed when the
                        // frame was created has been unwound already.
                        return Ok(Some((*exit, frame.pos)));
                    }
                    // Lazy: the zero-iteration path failed, enter the body.
                    self.loop_push(frame.pos);
                    return Ok(Some((frame.ip + 1, frame.pos)));
                }
                Instr::LoopAgain { head, greedy } => {
                    if *greedy {
                        // Give up on further iterations and leave the loop.
                        self.loop_pop_checked(frame.ip)?;
                        return Ok(Some((frame.ip + 1, frame.pos)));
                    }
                    // Lazy: the exit path failed, run one more iteration
                    // starting where the last one ended.
                    self.loop_set_top_checked(frame.pos, frame.ip)?;
                    return Ok(Some((*head + 1, frame.pos)));
                }
                _ => return Err(Fault::BadChoicePoint(frame.ip)),
            }
        }
        Ok(None)
    }

    fn push_frame(&mut self, ip: u32, pos: usize, count: usize) {
        self.frames.push(Frame {
            ip,
            pos,
            count,
            undo_len: self.undo.len() as u32,
        });
    }

    /// Replays the journal back to the watermark, restoring capture slots
    /// and loop entries.
    fn unwind(&mut self, undo_len: u32) {
        while self.undo.len() > undo_len as usize {
            match self.undo.pop().unwrap() {
                Undo::Capture { slot, old } => {
                    self.slots[slot as usize] = old;
                }
                Undo::LoopPushed => {
                    self.loops.pop();
                }
                Undo::LoopPopped(entry) => {
                    self.loops.push(entry);
                }
                Undo::LoopTopWas(entry) => {
                    if let Some(top) = self.loops.last_mut() {
                        *top = entry;
                    }
                }
            }
        }
    }

    fn set_slot(
        &mut self,
        slot: u32,
        pos: usize,
        ip: u32,
    ) -> Result<(), Fault> {
        let Some(&old) = self.slots.get(slot as usize) else {
            return Err(Fault::BadCaptureSlot(ip));
        };
        self.undo.push(Undo::Capture { slot, old });
        self.slots[slot as usize] = Some(pos);
        Ok(())
    }

    fn loop_push(&mut self, entry: usize) {
        self.loops.push(entry);
        self.undo.push(Undo::LoopPushed);
    }

    /// Pops the innermost loop entry. Callers have already checked that
    /// one exists.
    fn loop_pop(&mut self) {
        let entry = self.loops.pop().unwrap();
        self.undo.push(Undo::LoopPopped(entry));
    }

    fn loop_pop_checked(&mut self, ip: u32) -> Result<(), Fault> {
        if self.loops.is_empty() {
            return Err(Fault::LoopUnderflow(ip));
        }
        self.loop_pop();
        Ok(())
    }

    fn loop_set_top(&mut self, entry: usize) {
        let top = self.loops.last_mut().unwrap();
        self.undo.push(Undo::LoopTopWas(*top));
        *top = entry;
    }

    fn loop_set_top_checked(
        &mut self,
        entry: usize,
        ip: u32,
    ) -> Result<(), Fault> {
        if self.loops.is_empty() {
            return Err(Fault::LoopUnderflow(ip));
        }
        self.loop_set_top(entry);
        Ok(())
    }

    /// Writes the staged captures into the caller's array. Groups that
    /// never ran, and groups beyond the array's capacity, are not written.
    fn commit(&self, captures: &mut [Capture]) {
        let groups = self.program.group_count() as usize;
        for (i, capture) in captures.iter_mut().take(groups).enumerate() {
            if let (Some(start), Some(end)) =
                (self.slots[i * 2], self.slots[i * 2 + 1])
            {
                *capture = Capture { offset: start, length: end - start };
            }
        }
    }
}

/// Matches a repeat instruction's atom against the byte at `pos`. Anything
/// but a one-byte matcher in that position means the program is corrupted.
fn one_byte_match(
    atom: &Instr,
    subject: &[u8],
    pos: usize,
    ip: u32,
) -> Result<bool, Fault> {
    match atom {
        Instr::Byte(b) => Ok(subject.get(pos) == Some(b)),
        Instr::AnyByte => Ok(pos < subject.len()),
        Instr::Class(class) => {
            Ok(subject.get(pos).is_some_and(|b| class.contains(*b)))
        }
        _ => Err(Fault::BadRepeatAtom(ip)),
    }
}

#[cfg(test)]
mod tests {
    use super::BacktrackVm;
    use crate::instr::{Instr, Program};

    #[test]
    fn corrupted_split_target_is_not_a_crash() {
        let program = Program::new(
            vec![Instr::Split(Box::new([900, 901])), Instr::Match],
            0,
            None,
        );
        assert!(!BacktrackVm::new(&program).find(b"anything", &mut []));
    }

    #[test]
    fn corrupted_capture_index_is_not_a_crash() {
        let program = Program::new(
            vec![Instr::CaptureStart(7), Instr::Match],
            0,
            None,
        );
        assert!(!BacktrackVm::new(&program).find(b"anything", &mut []));
    }

    #[test]
    fn corrupted_repeat_atom_is_not_a_crash() {
        let program = Program::new(
            vec![
                Instr::RepeatGreedy { atom: Box::new(Instr::Jump(0)), min: 0 },
                Instr::Match,
            ],
            0,
            None,
        );
        assert!(!BacktrackVm::new(&program).find(b"anything", &mut []));
    }

    #[test]
    fn loop_end_without_loop_start_is_not_a_crash() {
        let program = Program::new(
            vec![
                Instr::Byte(b'a'),
                Instr::LoopAgain { head: 0, greedy: true },
                Instr::Match,
            ],
            0,
            None,
        );
        assert!(!BacktrackVm::new(&program).find(b"ab", &mut []));
    }

    #[test]
    fn truncated_program_is_not_a_crash() {
        let program = Program::new(vec![Instr::Byte(b'a')], 0, None);
        assert!(!BacktrackVm::new(&program).find(b"aaa", &mut []));
    }

    #[test]
    fn step_budget_turns_runaway_matches_into_no_match() {
        let program = {
            let (ast, groups) =
                crate::parser::Parser::parse(b"^a+b$").unwrap();
            crate::compiler::Compiler::new().compile(&ast, groups).unwrap()
        };
        let subject = b"aaab";
        assert!(BacktrackVm::new(&program).find(subject, &mut []));
        assert!(!BacktrackVm::new(&program)
            .step_limit(2)
            .find(subject, &mut []));
    }
}
