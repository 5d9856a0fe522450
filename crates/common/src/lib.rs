use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum token overlap for a containment match to count as an alias.
const MIN_TITLE_OVERLAP: f64 = 0.75;

/// Tokens that never count as a title prefix when deciding whether a bare
/// trailing year is a release-year suffix ("Live 1998" is a title).
const YEAR_SUFFIX_EXCLUSIONS: [&str; 2] = ["live", "the"];

const EDITION_NOISE: [&str; 9] = [
    "special edition",
    "bonus tracks",
    "bonus track",
    "deluxe",
    "remastered",
    "remaster",
    "anniversary",
    "expanded",
    "edition",
];

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as i64)
        .unwrap_or(0)
}

/// Projects a title onto the canonical comparison form used for
/// owned/expected album matching. Applied to a fixpoint so the result is
/// stable under re-normalization, no matter how many year suffixes or
/// edition markers the input stacks up.
pub fn normalize_title(value: &str) -> String {
    let mut current = normalize_pass(value);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(value: &str) -> String {
    let stripped = strip_trailing_year_suffix(value);

    let mut decomposed = String::with_capacity(stripped.len());
    for ch in stripped.nfkd() {
        let ch = match ch {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            _ => ch,
        };
        if is_combining_mark(ch) {
            continue;
        }
        decomposed.push(ch);
    }

    let lowered = decomposed.to_lowercase();
    let mut spaced = String::with_capacity(lowered.len() + 8);
    for ch in lowered.chars() {
        match ch {
            '+' | '&' => spaced.push_str(" and "),
            c if c.is_alphanumeric() => spaced.push(c),
            _ => spaced.push(' '),
        }
    }

    collapse_whitespace(&remove_edition_noise(&collapse_whitespace(&spaced)))
}

/// Removes a single trailing release-year suffix: ` (YYYY)`, ` [YYYY]`,
/// ` - YYYY` (ASCII dash, en dash or em dash) or a bare ` YYYY`, with YYYY
/// in 1900..=2099. The bare form is only removed when the remaining title is
/// non-empty and not in the conservative exclusion set.
pub fn strip_trailing_year_suffix(value: &str) -> String {
    let trimmed = value.trim_end();
    if let Some(stripped) = strip_bracketed_year(trimmed, '(', ')')
        .or_else(|| strip_bracketed_year(trimmed, '[', ']'))
        .or_else(|| strip_dashed_year(trimmed))
        .or_else(|| strip_bare_year(trimmed))
    {
        return stripped;
    }
    trimmed.to_string()
}

fn strip_bracketed_year(value: &str, open: char, close: char) -> Option<String> {
    let rest = value.strip_suffix(close)?;
    let (head, digits) = split_last_chars(rest, 4)?;
    if !is_year_in_window(digits) {
        return None;
    }
    let head = head.strip_suffix(open)?;
    let head = head.strip_suffix(' ')?;
    Some(head.trim_end().to_string())
}

fn strip_dashed_year(value: &str) -> Option<String> {
    let (head, digits) = split_last_chars(value, 4)?;
    if !is_year_in_window(digits) {
        return None;
    }
    let head = head.strip_suffix(' ')?;
    let head = head.strip_suffix(|c: char| c == '-' || c == '\u{2013}' || c == '\u{2014}')?;
    let head = head.strip_suffix(' ')?;
    Some(head.trim_end().to_string())
}

fn strip_bare_year(value: &str) -> Option<String> {
    let (head, digits) = split_last_chars(value, 4)?;
    if !is_year_in_window(digits) {
        return None;
    }
    let head = head.strip_suffix(' ')?;
    let prefix = head.trim_end();
    if prefix.is_empty() {
        return None;
    }
    let folded = fold_for_exclusion(prefix);
    if folded.is_empty() || YEAR_SUFFIX_EXCLUSIONS.contains(&folded.as_str()) {
        return None;
    }
    Some(prefix.to_string())
}

/// Splits off the last `count` chars; `None` when the string is shorter.
fn split_last_chars(value: &str, count: usize) -> Option<(&str, &str)> {
    let mut indices = value.char_indices().rev();
    let (idx, _) = indices.nth(count - 1)?;
    Some(value.split_at(idx))
}

fn is_year_in_window(digits: &str) -> bool {
    digits.len() == 4
        && digits.chars().all(|c| c.is_ascii_digit())
        && (1900..=2099).contains(&digits.parse::<i32>().unwrap_or(0))
}

fn fold_for_exclusion(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn remove_edition_noise(value: &str) -> String {
    let mut padded = format!(" {} ", value);
    for token in EDITION_NOISE {
        let needle = format!(" {} ", token);
        while let Some(pos) = padded.find(&needle) {
            padded.replace_range(pos..pos + needle.len(), " ");
        }
    }
    padded.trim().to_string()
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for part in value.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

/// Judges whether two already-normalized titles are close enough to count as
/// aliases of the same release: equal, or one contains the other with at
/// least three tokens on the smaller side and sufficient token overlap.
pub fn is_strong_title_alias_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if !a.contains(b) && !b.contains(a) {
        return false;
    }
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    let (smaller, larger) = if tokens_a.len() <= tokens_b.len() {
        (&tokens_a, &tokens_b)
    } else {
        (&tokens_b, &tokens_a)
    };
    if smaller.len() < 3 {
        return false;
    }
    let overlap = smaller.intersection(larger).count();
    overlap as f64 / smaller.len() as f64 >= MIN_TITLE_OVERLAP
}

/// Filesystem- and URL-safe identifier derived from a display name.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Lowercase hex prefix of the SHA-1 of a string, for short stable handles.
pub fn short_sha1(value: &str, len: usize) -> String {
    let full = sha1_hex(value.as_bytes());
    full[..len.min(full.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        is_strong_title_alias_match, normalize_title, sha1_hex, short_sha1, slugify,
        strip_trailing_year_suffix,
    };

    #[test]
    fn year_suffix_variants_normalize_alike() {
        let expected = normalize_title("Waiting");
        assert_eq!(normalize_title("Waiting (1998)"), expected);
        assert_eq!(normalize_title("Waiting [1998]"), expected);
        assert_eq!(normalize_title("Waiting - 1998"), expected);
        assert_eq!(normalize_title("Waiting \u{2013} 1998"), expected);
        assert_eq!(normalize_title("Waiting 1998"), expected);
    }

    #[test]
    fn bare_year_exclusions_survive() {
        assert_eq!(normalize_title("1984"), "1984");
        assert_eq!(normalize_title("Live 1998"), "live 1998");
        assert_eq!(normalize_title("The 1975"), "the 1975");
    }

    #[test]
    fn strip_trailing_year_examples() {
        assert_eq!(strip_trailing_year_suffix("Waiting (1998)"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting [1998]"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting - 1998"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("Waiting 1998"), "Waiting");
        assert_eq!(strip_trailing_year_suffix("1984"), "1984");
        assert_eq!(strip_trailing_year_suffix("Live 1998"), "Live 1998");
        assert_eq!(strip_trailing_year_suffix("The 1975"), "The 1975");
    }

    #[test]
    fn years_outside_window_are_kept() {
        assert_eq!(strip_trailing_year_suffix("Symphony 1812"), "Symphony 1812");
        assert_eq!(strip_trailing_year_suffix("Odyssey (2101)"), "Odyssey (2101)");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "Waiting (1998)",
            "Sticks & Stones",
            "Mot\u{00f6}rhead + Friends",
            "Greatest Hits [Remaster 1998]",
            "Music 1984 2020",
            "The Album (Deluxe Edition)",
            "1984",
            "Live 1998",
        ];
        for input in inputs {
            let once = normalize_title(input);
            assert_eq!(normalize_title(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn ampersand_and_plus_become_and() {
        assert_eq!(normalize_title("Sticks & Stones"), "sticks and stones");
        assert_eq!(normalize_title("AC+DC"), "ac and dc");
    }

    #[test]
    fn edition_noise_is_dropped() {
        assert_eq!(normalize_title("OK Computer (Deluxe Edition)"), "ok computer");
        assert_eq!(
            normalize_title("Nevermind [Remastered Bonus Tracks]"),
            "nevermind"
        );
        assert_eq!(
            normalize_title("Rumours 30th Anniversary Special Edition"),
            "rumours 30th"
        );
    }

    #[test]
    fn diacritics_and_curly_quotes_fold() {
        assert_eq!(normalize_title("Mot\u{00f6}rhead"), "motorhead");
        assert_eq!(normalize_title("Don\u{2019}t Stop"), "don t stop");
    }

    #[test]
    fn alias_match_requires_containment_and_overlap() {
        assert!(is_strong_title_alias_match("sticks and stones", "sticks and stones"));
        assert!(is_strong_title_alias_match(
            "sticks and stones",
            "sticks and stones special club"
        ));
        // Two tokens only: containment is not enough.
        assert!(!is_strong_title_alias_match("sticks stones", "sticks stones extra"));
        // No containment either way.
        assert!(!is_strong_title_alias_match(
            "sticks and stones",
            "catalyst and stones of sticks"
        ));
        assert!(!is_strong_title_alias_match("", "anything"));
    }

    #[test]
    fn slugify_folds_names() {
        assert_eq!(slugify("New Found Glory"), "new-found-glory");
        assert_eq!(slugify("AC/DC"), "ac-dc");
        assert_eq!(slugify("!!!"), "untitled");
    }

    #[test]
    fn sha1_helpers_are_stable() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(short_sha1("abc", 8), "a9993e36");
        assert_eq!(short_sha1("abc", 80).len(), 40);
    }
}
