use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Valid whitespace regex"));
static ROMAN_THREE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\biii\b").expect("Valid numeral regex"));
static ROMAN_TWO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bii\b").expect("Valid numeral regex"));
static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("Valid hyphen regex"));

const STRIPPED: &[char] = &['-', ':', '\'', '"', '!', '?', '#', ',', '.', '/', '\\'];

/// Turn a title into the site's URL slug.
///
/// `Fantastic Beasts: The Crimes of Grindelwald` becomes
/// `fantastic-beasts-the-crimes-of-grindelwald`, `Rocky III` becomes
/// `rocky-3`. Hyphens in the title are dropped along with the rest of the
/// punctuation, so every hyphen in the slug stands for whitespace. The result
/// is always a single path segment.
pub fn build_slug(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect::<String>()
        .replace('&', " and ");

    normalize_slug(&cleaned)
}

/// Lowercase, hyphenate whitespace, replace `ii`/`iii` and collapse hyphen
/// runs. Applying it to its own output changes nothing.
pub fn normalize_slug(text: &str) -> String {
    let lowered = text.to_lowercase();
    let hyphenated = WHITESPACE.replace_all(lowered.trim(), "-");
    let numbered = ROMAN_THREE.replace_all(&hyphenated, "3");
    let numbered = ROMAN_TWO.replace_all(&numbered, "2");

    HYPHEN_RUNS
        .replace_all(&numbered, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_slug() {
        assert_eq!(
            build_slug("Fantastic Beasts: The Crimes of Grindelwald"),
            "fantastic-beasts-the-crimes-of-grindelwald"
        );
        assert_eq!(build_slug("The Old Guard"), "the-old-guard");
        assert_eq!(build_slug("Who Framed Roger Rabbit?"), "who-framed-roger-rabbit");
        assert_eq!(build_slug("Ocean's Eleven"), "oceans-eleven");
        assert_eq!(build_slug("Mission: Impossible - Fallout"), "mission-impossible-fallout");
        assert_eq!(build_slug("Spider-Man: Far from Home"), "spiderman-far-from-home");
        assert_eq!(build_slug("Mr. & Mrs. Smith"), "mr-and-mrs-smith");
    }

    #[test]
    fn test_roman_numerals() {
        assert_eq!(build_slug("Rocky III"), "rocky-3");
        assert_eq!(build_slug("Blade Runner II"), "blade-runner-2");
        assert_eq!(build_slug("The Godfather: Part II"), "the-godfather-part-2");
        // numerals inside a word are left alone
        assert_eq!(build_slug("Hawaii Five-O"), "hawaii-fiveo");
    }

    #[test]
    fn test_collapses_whitespace_and_hyphens() {
        assert_eq!(build_slug("  Kill   Bill --  Vol 1 "), "kill-bill-vol-1");
        assert_eq!(build_slug("#1 Fan!"), "1-fan");
    }

    #[test]
    fn test_path_separators_are_dropped() {
        assert_eq!(build_slug("AC/DC: Let There Be Rock"), "acdc-let-there-be-rock");
        assert_eq!(build_slug("Face\\Off"), "faceoff");
        assert!(!build_slug("a / b \\ c").contains(['/', '\\']));
    }

    proptest! {
        #[test]
        fn prop_slug_is_a_normalized_segment(title in "[ a-zA-Z0-9:'\"!?#,.&/\\\\-]{0,40}") {
            let slug = build_slug(&title);
            prop_assert!(!slug.contains(['/', '\\']));
            prop_assert!(!slug.contains("--"));
            prop_assert_eq!(normalize_slug(&slug), slug.clone());
        }

        #[test]
        fn prop_build_slug_is_idempotent_without_hyphens(title in "[a-zA-Z0-9:'\"!?#,./]{0,40}") {
            let once = build_slug(&title);
            prop_assert_eq!(build_slug(&once), once);
        }
    }
}
