//! Natural string ordering for display sorting
//!
//! Strings are split into maximal runs of ASCII digits and non-digits and
//! compared run by run:
//! - digit vs digit: by integer value (leading zeros ignored, arbitrary length);
//!   equal values with more leading zeros sort later
//! - digit vs text: the digit run sorts first
//! - text vs text: bytewise
//!
//! If every shared run ties, the string with fewer runs sorts first, and the
//! final tiebreak is plain byte order. This makes the order total and
//! consistent with `Eq`, so `"protein2" < "protein10"`.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn runs(s: &str) -> impl Iterator<Item = Run<'_>> {
    let bytes = s.as_bytes();
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= bytes.len() {
            return None;
        }
        let digits = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != digits)
            .map_or(bytes.len(), |off| start + off);
        // ASCII digit boundaries are always char boundaries
        let run = &s[start..end];
        start = end;
        Some(if digits {
            Run::Digits(run)
        } else {
            Run::Text(run)
        })
    })
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

fn cmp_run(a: Run<'_>, b: Run<'_>) -> Ordering {
    match (a, b) {
        (Run::Digits(x), Run::Digits(y)) => cmp_digits(x, y),
        (Run::Digits(_), Run::Text(_)) => Ordering::Less,
        (Run::Text(_), Run::Digits(_)) => Ordering::Greater,
        (Run::Text(x), Run::Text(y)) => x.cmp(y),
    }
}

/// Compare two strings in natural order
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = runs(a);
    let mut right = runs(b);
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match cmp_run(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return a.cmp(b),
        }
    }
}

/// Borrowed string wrapper ordered naturally, for use as a sort or map key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey<'a>(pub &'a str);

impl Ord for NaturalKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(self.0, other.0)
    }
}

impl PartialOrd for NaturalKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort items in place by the natural order of a string key.
///
/// Keys borrow from something that outlives the sort, typically the arena
/// the items index into.
pub fn sort_natural<'k, T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &'k str,
{
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}
