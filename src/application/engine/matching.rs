//! Subscriber input against menu transition labels.

use crate::domain::automaton::Transition;

/// Whether `actual` selects the option labelled `expected`.
///
/// Matches the exact label, a numbered label (`"1. Solde"` for `"1"`) or
/// a label ending with the input as its own word (`"Option 2"` for `"2"`).
pub fn input_matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    let actual = actual.trim();
    if expected.is_empty() || actual.is_empty() {
        return false;
    }

    expected == actual
        || expected.starts_with(&format!("{}.", actual))
        || expected.ends_with(&format!(" {}", actual))
}

/// First transition whose `input` label matches.
pub fn find_input_transition<'a>(transitions: &'a [Transition], input: &str) -> Option<&'a Transition> {
    transitions.iter().find(|t| {
        t.input
            .as_deref()
            .is_some_and(|expected| input_matches(expected, input))
    })
}
