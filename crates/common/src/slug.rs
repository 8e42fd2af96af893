//! URL-safe identifiers derived from display names.

use std::collections::HashSet;

const SEPARATOR: char = '-';
const FALLBACK: &str = "version";

fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'æ' => "ae",
        'ø' | 'ö' | 'ó' | 'ò' | 'ô' => "o",
        'å' | 'ä' | 'á' | 'à' | 'â' => "a",
        'ü' | 'ú' | 'ù' | 'û' => "u",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ç' => "c",
        'ß' => "ss",
        _ => return None,
    };
    Some(s)
}

/// Lowercase, transliterate the accented letters we know about and collapse
/// every other run of non-alphanumerics into a single `-`.
///
/// `slugify("Mørk 16:9") == "mork-16-9"`
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        let piece: Option<&str> = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            None
        } else if let Some(t) = transliterate(c) {
            Some(t)
        } else {
            pending_sep = true;
            continue;
        };

        if pending_sep && !out.is_empty() {
            out.push(SEPARATOR);
        }
        pending_sep = false;
        match piece {
            Some(t) => out.push_str(t),
            None => out.push(c),
        }
    }
    out
}

/// Slug for `name`, or `"version"` when nothing usable is left.
pub fn slug_candidate(name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() { FALLBACK.to_string() } else { slug }
}

/// Return `candidate` if unused, else the first `candidate-N` (N >= 2) not in `existing`.
pub fn unique_slug<I, S>(candidate: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: HashSet<String> = existing.into_iter().map(|s| s.as_ref().to_string()).collect();
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    // at most taken.len() + 1 probes before a free suffix turns up
    (2..)
        .map(|n| format!("{candidate}{SEPARATOR}{n}"))
        .find(|id| !taken.contains(id))
        .unwrap_or_else(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_transliterates_and_collapses() {
        assert_eq!(slugify("Mørk 16:9"), "mork-16-9");
        assert_eq!(slugify("  Blåbær & Æble!! "), "blabaer-aeble");
        assert_eq!(slugify("Straße--Ünïcode"), "strasse-unicode");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn slugify_is_deterministic() {
        for name in ["Test", "Mørk 16:9", "Ç'est ça", "Årlig / kvartal"] {
            assert_eq!(slugify(name), slugify(name));
        }
    }

    #[test]
    fn candidate_falls_back_when_empty() {
        assert_eq!(slug_candidate("!!!"), "version");
        assert_eq!(slug_candidate("Test"), "test");
    }

    #[test]
    fn unique_slug_appends_first_free_suffix() {
        assert_eq!(unique_slug("test", Vec::<String>::new()), "test");
        assert_eq!(unique_slug("test", ["test"]), "test-2");
        assert_eq!(unique_slug("test", ["test", "test-2", "test-4"]), "test-3");
    }

    #[test]
    fn unique_slug_never_returns_existing_member() {
        let existing: Vec<String> = std::iter::once("x".to_string())
            .chain((2..50).map(|n| format!("x-{n}")))
            .collect();
        let id = unique_slug("x", &existing);
        assert!(!existing.contains(&id));
        assert_eq!(id, "x-50");
    }
}
