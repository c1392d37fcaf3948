//! Id matching for "did you mean" suggestions on unknown action and policy
//! references, and the kebab-case id check.
//!
//! Ids are compared in normalised form: lowercase, with `_`, `.` and spaces
//! folded to `-` and hyphen runs collapsed. Two ids with the same words in a
//! different order (`post-remove` / `remove-post`) are an exact match;
//! otherwise the closest candidate by edit distance wins.

/// Lowercase `id` and fold separators to single hyphens.
pub(crate) fn normalize_id(id: &str) -> String {
    id.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn sorted_words(normalized: &str) -> Vec<&str> {
    let mut words: Vec<&str> = normalized.split('-').collect();
    words.sort_unstable();
    words
}

/// The known id `reference` most likely meant, if any is close enough.
///
/// A candidate is close enough when its edit distance from the normalised
/// reference is at most half the longer of the two.
pub(crate) fn fuzzy_match<'a>(reference: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let wanted = normalize_id(reference);
    let wanted_words = sorted_words(&wanted);

    let scored = candidates.iter().map(|&candidate| {
        let normalized = normalize_id(candidate);
        let distance = if sorted_words(&normalized) == wanted_words {
            0
        } else {
            edit_distance(&wanted, &normalized)
        };
        (candidate, normalized.chars().count(), distance)
    });

    // Ties keep the first candidate.
    let (best, len, distance) = scored.fold(None, |best: Option<(&'a str, usize, usize)>, next| match best {
        Some(current) if current.2 <= next.2 => Some(current),
        _ => Some(next),
    })?;

    (distance <= wanted.chars().count().max(len) / 2).then_some(best)
}

/// Levenshtein distance between `a` and `b`, by character.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    // row[j] is the distance between the prefix of `a` seen so far and b[..j].
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }

    row[b.len()]
}

/// `^[a-z0-9]+(-[a-z0-9]+)*$`
pub(crate) fn is_kebab_case(id: &str) -> bool {
    !id.is_empty()
        && id.split('-').all(|word| {
            !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}
