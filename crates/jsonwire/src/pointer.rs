//! JSON Pointer (RFC 6901) rendering from the state-machine stack.
//!
//! The pointer identifies the most recently handled value. Object frames
//! contribute the current member name when name tracking is on (duplicate
//! detection enabled), else the member index; array frames contribute the
//! element index.

use crate::state::StateMachine;

/// Renders the pointer for the machine's current position.
pub(crate) fn stack_pointer(machine: &StateMachine) -> String {
    let mut out = String::new();
    for (entry, name) in machine.frames() {
        if entry.is_top_level() {
            continue;
        }
        let len = entry.length();
        if len == 0 {
            // An empty container is itself the most recent value.
            break;
        }
        out.push('/');
        if entry.is_object() {
            match name {
                Some(name) => append_escaped(&mut out, name),
                // Member index when names are not tracked.
                None => {
                    let mut buf = itoa::Buffer::new();
                    out.push_str(buf.format((len - 1) / 2));
                }
            }
        } else {
            let mut buf = itoa::Buffer::new();
            out.push_str(buf.format(len - 1));
        }
    }
    out
}

// RFC 6901: '~' escapes to "~0", '/' to "~1".
fn append_escaped(out: &mut String, name: &str) {
    for c in name.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            _ => out.push(c),
        }
    }
}
