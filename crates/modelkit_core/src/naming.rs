//! Name rule shared by initializer names and forwarded method names.
//!
//! # Invariants
//! - Any non-empty string is a usable name, including digits, spaces and
//!   punctuation; names are compared byte for byte.

/// Returns whether `value` is usable as an initializer or method name.
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
}
