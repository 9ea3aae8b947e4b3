//! Name validation for message sets and observables.

/// Characters that may not appear in message-set or observable names.
/// They all carry meaning in the subject namespace the names are
/// embedded into.
const RESERVED: &[char] = &['.', '*', '>'];

/// Returns true when `name` is usable as a message-set or observable
/// name: non-empty and free of subject metacharacters.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(RESERVED)
}
