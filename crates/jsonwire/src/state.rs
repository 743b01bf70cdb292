//! Push-down automaton tracking JSON structure.
//!
//! One frame per nesting level, packed into a `u64`: two type bits plus a
//! monotonically increasing element counter. Each name and each value
//! counts separately, so inside an object an even counter means the next
//! token must be a member name and an odd counter means a value.
//!
//! The same machine drives both directions: the encoder asks it which
//! separator bytes to emit before a token, the decoder which separator to
//! require. Name tracking (for duplicate detection and for JSON Pointer
//! rendering) is kept in a parallel stack of object frames, active only
//! when duplicate names are disallowed.

use std::sync::Arc;

use fxhash::FxHashSet;

use crate::error::SyntaxErrorKind;
use crate::token::Kind;

/// Nesting bound enforced on push. Deep enough for any sane document while
/// keeping the recursive raw-value reformatter off the guard rail.
pub(crate) const MAX_NESTING_DEPTH: usize = 10_000;

const TYPE_OBJECT: u64 = 1 << 63;
const TYPE_ARRAY: u64 = 1 << 62;
const COUNT_MASK: u64 = TYPE_ARRAY - 1;

/// One nesting level: container type bits plus an element counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StateEntry(u64);

impl StateEntry {
    fn top_level() -> StateEntry {
        StateEntry(0)
    }

    fn object() -> StateEntry {
        StateEntry(TYPE_OBJECT)
    }

    fn array() -> StateEntry {
        StateEntry(TYPE_ARRAY)
    }

    pub(crate) fn is_object(self) -> bool {
        self.0 & TYPE_OBJECT != 0
    }

    pub(crate) fn is_array(self) -> bool {
        self.0 & TYPE_ARRAY != 0
    }

    pub(crate) fn is_top_level(self) -> bool {
        self.0 & (TYPE_OBJECT | TYPE_ARRAY) == 0
    }

    /// Number of tokens emitted or consumed at this level; names and
    /// values count separately.
    pub(crate) fn length(self) -> u64 {
        self.0 & COUNT_MASK
    }

    fn increment(&mut self) {
        self.0 += 1;
    }

    /// Whether the next token in an object frame must be a member name.
    pub(crate) fn needs_name(self) -> bool {
        self.is_object() && self.length() % 2 == 0
    }
}

/// Name bookkeeping for one object frame.
#[derive(Clone, Debug, Default)]
struct NameFrame {
    seen: FxHashSet<Arc<str>>,
    last: Option<Arc<str>>,
}

/// The push-down automaton.
#[derive(Clone, Debug)]
pub(crate) struct StateMachine {
    stack: Vec<StateEntry>,
    names: Vec<NameFrame>,
    track_names: bool,
}

impl StateMachine {
    pub(crate) fn new(track_names: bool) -> StateMachine {
        StateMachine { stack: vec![StateEntry::top_level()], names: Vec::new(), track_names }
    }

    /// Stack depth including the top-level frame; never less than 1.
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn last(&self) -> StateEntry {
        *self.stack.last().unwrap_or(&StateEntry(0))
    }

    fn last_mut(&mut self) -> &mut StateEntry {
        let i = self.stack.len() - 1;
        &mut self.stack[i]
    }

    pub(crate) fn track_names(&self) -> bool {
        self.track_names
    }

    /// Answers both questions at once for a prospective next token of
    /// `next` kind: is it grammatically permitted here, and which
    /// separator byte must precede it? `b' '` means "whitespace required"
    /// (between top-level values); `0` means none.
    pub(crate) fn need_delim(&self, next: Kind) -> Result<u8, SyntaxErrorKind> {
        let e = self.last();
        if e.is_top_level() {
            return match next {
                Kind::OBJECT_END | Kind::ARRAY_END => {
                    Err(SyntaxErrorKind::MismatchedDelim(next.as_byte()))
                }
                _ => Ok(if e.length() > 0 { b' ' } else { 0 }),
            };
        }
        if e.is_object() {
            if e.needs_name() {
                return match next {
                    Kind::STRING => Ok(if e.length() > 0 { b',' } else { 0 }),
                    Kind::OBJECT_END => Ok(0),
                    Kind::ARRAY_END => Err(SyntaxErrorKind::MismatchedDelim(b']')),
                    _ => Err(SyntaxErrorKind::UnexpectedKind {
                        kind: next,
                        context: "in object (expecting name or '}')",
                    }),
                };
            }
            // Value position after a member name.
            return match next {
                Kind::OBJECT_END | Kind::ARRAY_END => Err(SyntaxErrorKind::UnexpectedKind {
                    kind: next,
                    context: "after object name (expecting value)",
                }),
                _ => Ok(b':'),
            };
        }
        // Array.
        match next {
            Kind::OBJECT_END => Err(SyntaxErrorKind::MismatchedDelim(b'}')),
            Kind::ARRAY_END => Ok(0),
            _ => Ok(if e.length() > 0 { b',' } else { 0 }),
        }
    }

    /// Records a validated token. `need_delim` must have approved `kind`
    /// first; push/pop failures here are the remaining structural checks.
    pub(crate) fn commit(&mut self, kind: Kind) -> Result<(), SyntaxErrorKind> {
        match kind {
            Kind::OBJECT_START => self.push(StateEntry::object()),
            Kind::ARRAY_START => self.push(StateEntry::array()),
            Kind::OBJECT_END => self.pop(true),
            Kind::ARRAY_END => self.pop(false),
            _ => {
                self.last_mut().increment();
                Ok(())
            }
        }
    }

    /// Records one externally validated element (a whole raw value) at the
    /// current level without descending into it.
    pub(crate) fn commit_element(&mut self) {
        self.last_mut().increment();
    }

    fn push(&mut self, entry: StateEntry) -> Result<(), SyntaxErrorKind> {
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(SyntaxErrorKind::DepthLimit);
        }
        // The container counts as one element of its parent.
        self.last_mut().increment();
        self.stack.push(entry);
        if entry.is_object() && self.track_names {
            self.names.push(NameFrame::default());
        }
        Ok(())
    }

    fn pop(&mut self, object: bool) -> Result<(), SyntaxErrorKind> {
        let e = self.last();
        if e.is_top_level() || (object && !e.is_object()) || (!object && !e.is_array()) {
            return Err(SyntaxErrorKind::MismatchedDelim(if object { b'}' } else { b']' }));
        }
        if object && e.length() % 2 == 1 {
            return Err(SyntaxErrorKind::UnexpectedKind {
                kind: Kind::OBJECT_END,
                context: "after object name (expecting value)",
            });
        }
        self.stack.pop();
        if object && self.track_names {
            self.names.pop();
        }
        Ok(())
    }

    /// Records a member name in the current object frame. Returns `false`
    /// when the name repeats an earlier member of the same object and
    /// duplicate detection is active. The name is also retained for
    /// [`stack_pointer`](crate::pointer) rendering.
    pub(crate) fn record_name(&mut self, name: Arc<str>) -> bool {
        if !self.track_names {
            return true;
        }
        let Some(frame) = self.names.last_mut() else {
            return true;
        };
        frame.last = Some(Arc::clone(&name));
        frame.seen.insert(name)
    }

    /// Per-frame view used by the JSON Pointer renderer; `None` entries
    /// are array frames or objects without a recorded name.
    pub(crate) fn frames(&self) -> impl Iterator<Item = (StateEntry, Option<&str>)> {
        let mut name_idx = 0;
        self.stack.iter().map(move |&e| {
            let name = if e.is_object() && self.track_names {
                let n = self.names.get(name_idx).and_then(|f| f.last.as_deref());
                name_idx += 1;
                n
            } else {
                None
            };
            (e, name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delim(m: &StateMachine, kind: Kind) -> u8 {
        m.need_delim(kind).unwrap()
    }

    fn step(m: &mut StateMachine, kind: Kind) -> u8 {
        let d = delim(m, kind);
        m.commit(kind).unwrap();
        d
    }

    #[test]
    fn object_sequencing() {
        let mut m = StateMachine::new(true);
        assert_eq!(step(&mut m, Kind::OBJECT_START), 0);
        assert_eq!(step(&mut m, Kind::STRING), 0); // name
        assert_eq!(step(&mut m, Kind::NUMBER), b':');
        assert_eq!(step(&mut m, Kind::STRING), b','); // next name
        assert_eq!(step(&mut m, Kind::TRUE), b':');
        assert_eq!(step(&mut m, Kind::OBJECT_END), 0);
        assert_eq!(m.depth(), 1);
        assert_eq!(m.last().length(), 1);
    }

    #[test]
    fn name_position_rejects_values() {
        let mut m = StateMachine::new(true);
        m.commit(Kind::OBJECT_START).unwrap();
        assert!(matches!(
            m.need_delim(Kind::NUMBER),
            Err(SyntaxErrorKind::UnexpectedKind { .. })
        ));
        // A value may not directly follow another value either.
        m.commit(Kind::STRING).unwrap();
        assert!(matches!(m.need_delim(Kind::OBJECT_END), Err(_)));
    }

    #[test]
    fn mismatched_delims() {
        let mut m = StateMachine::new(true);
        m.commit(Kind::ARRAY_START).unwrap();
        assert!(matches!(
            m.need_delim(Kind::OBJECT_END),
            Err(SyntaxErrorKind::MismatchedDelim(b'}'))
        ));
        assert!(m.commit(Kind::OBJECT_END).is_err());
    }

    #[test]
    fn top_level_needs_whitespace_separation() {
        let mut m = StateMachine::new(true);
        assert_eq!(step(&mut m, Kind::NUMBER), 0);
        assert_eq!(delim(&m, Kind::NUMBER), b' ');
        assert!(matches!(
            m.need_delim(Kind::ARRAY_END),
            Err(SyntaxErrorKind::MismatchedDelim(_))
        ));
    }

    #[test]
    fn duplicate_names_detected_per_frame() {
        let mut m = StateMachine::new(true);
        m.commit(Kind::OBJECT_START).unwrap();
        assert!(m.record_name("a".into()));
        m.commit(Kind::STRING).unwrap();
        // Nested object may reuse the name.
        m.commit(Kind::OBJECT_START).unwrap();
        assert!(m.record_name("a".into()));
        m.commit(Kind::STRING).unwrap();
        m.commit(Kind::NUMBER).unwrap();
        m.commit(Kind::OBJECT_END).unwrap();
        assert!(!m.record_name("a".into()));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut m = StateMachine::new(false);
        for _ in 1..MAX_NESTING_DEPTH {
            m.commit(Kind::ARRAY_START).unwrap();
        }
        assert!(matches!(m.commit(Kind::ARRAY_START), Err(SyntaxErrorKind::DepthLimit)));
    }
}
