///
/// # Program Name Encoding
///
/// Program names may contain characters that are not valid in an exported
/// symbol. Encoding maps a name to the symbol looked up in loaded modules:
///
/// - a leading decimal digit gets a `_` prefix
/// - letters, digits and `_` are copied unchanged
/// - `-` becomes `__`
/// - any other byte becomes `_` followed by its two uppercase hex digits
///
/// Case folding is applied afterwards, to the whole encoded string, so hex
/// escapes produced by the first stage are folded along with the name.
///
/// This module also splits a call name into an explicit directory prefix and
/// the bare program name.
///

use crate::settings::normalize_slashes;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Case folding applied to an encoded entry point name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFold {
    #[default]
    None,
    Upper,
    Lower,
}

pub fn encode_program_name(name: &str, fold: CaseFold) -> String {
    let bytes = name.as_bytes();
    let mut out = String::with_capacity(bytes.len() + 4);

    if bytes.first().is_some_and(u8::is_ascii_digit) {
        out.push('_');
    }

    for &b in bytes {
        if b.is_ascii_alphanumeric() || b == b'_' {
            out.push(b as char);
        } else if b == b'-' {
            out.push_str("__");
        } else {
            out.push('_');
            out.push(HEX_DIGITS[usize::from(b >> 4)] as char);
            out.push(HEX_DIGITS[usize::from(b & 0x0F)] as char);
        }
    }

    match fold {
        CaseFold::None => out,
        CaseFold::Upper => out.to_ascii_uppercase(),
        CaseFold::Lower => out.to_ascii_lowercase(),
    }
}

fn last_separator(name: &str) -> Option<usize> {
    name.rfind(['/', '\\'])
}

/// The part of `name` after its last `/` or `\`.
pub fn base_name(name: &str) -> &str {
    match last_separator(name) {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Splits `name` into an explicit directory (everything up to and
/// including the last separator, normalized for the host) and the bare
/// program name.
pub fn split_call_path(name: &str) -> (Option<String>, &str) {
    match last_separator(name) {
        Some(idx) => (Some(normalize_slashes(&name[..=idx])), &name[idx + 1..]),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_symbol_characters_unchanged() {
        assert_eq!(encode_program_name("ABC123", CaseFold::None), "ABC123");
        assert_eq!(encode_program_name("under_score", CaseFold::None), "under_score");
    }

    #[test]
    fn test_leading_digit_prefixed() {
        assert_eq!(encode_program_name("9FOO", CaseFold::None), "_9FOO");
    }

    #[test]
    fn test_hyphen_doubled_underscore() {
        assert_eq!(encode_program_name("A-B", CaseFold::None), "A__B");
    }

    #[test]
    fn test_other_bytes_hex_escaped() {
        assert_eq!(encode_program_name("A*B", CaseFold::None), "A_2AB");
        assert_eq!(encode_program_name("X.Y", CaseFold::None), "X_2EY");
    }

    #[test]
    fn test_fold_applies_after_mangling() {
        // the hex escape of '.' is folded too
        assert_eq!(encode_program_name("a.b", CaseFold::Lower), "a_2eb");
        assert_eq!(encode_program_name("pay-roll", CaseFold::Upper), "PAY__ROLL");
    }

    #[test]
    fn test_split_call_path() {
        let (dir, name) = split_call_path("/x/y/PROG");
        assert_eq!(dir.as_deref(), Some(normalize_slashes("/x/y/").as_str()));
        assert_eq!(name, "PROG");

        let (dir, name) = split_call_path("PROG");
        assert!(dir.is_none());
        assert_eq!(name, "PROG");
    }

    #[test]
    fn test_split_call_path_backslash() {
        let (dir, name) = split_call_path("lib\\sub\\PROG");
        assert_eq!(dir.as_deref(), Some(normalize_slashes("lib/sub/").as_str()));
        assert_eq!(name, "PROG");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/a/b/PROG"), "PROG");
        assert_eq!(base_name("a\\PROG"), "PROG");
        assert_eq!(base_name("PROG"), "PROG");
    }
}
