//! Filename sanitization for converted output files

/// Maximum length (in characters) of a sanitized file name
pub const MAX_FILENAME_LEN: usize = 80;

/// Map a Turkish letter to its closest ASCII letter
fn transliterate(c: char) -> char {
    match c {
        'ı' => 'i',
        'İ' => 'I',
        'ğ' => 'g',
        'Ğ' => 'G',
        'ü' => 'u',
        'Ü' => 'U',
        'ş' => 's',
        'Ş' => 'S',
        'ö' => 'o',
        'Ö' => 'O',
        'ç' => 'c',
        'Ç' => 'C',
        other => other,
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ')
}

/// Produce a file name that is safe on any filesystem
///
/// Transliterates Turkish letters, replaces every character outside
/// `[A-Za-z0-9._- ]` with `_`, then hard-cuts the result to 80 characters.
/// The output is pure ASCII, so `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(transliterate)
        .map(|c| if is_allowed(c) { c } else { '_' })
        .take(MAX_FILENAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_whitelisted(s: &str) {
        assert!(
            s.chars().all(is_allowed),
            "unexpected character in {:?}",
            s
        );
        assert!(s.chars().count() <= MAX_FILENAME_LEN);
    }

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(sanitize("Daft Punk - One More Time"), "Daft Punk - One More Time");
        assert_eq!(sanitize("01.track_name-v2"), "01.track_name-v2");
    }

    #[test]
    fn test_turkish_letters_transliterated() {
        assert_eq!(sanitize("Barış Manço"), "Baris Manco");
        assert_eq!(sanitize("ığüşöçİĞÜŞÖÇ"), "igusocIGUSOC");
    }

    #[test]
    fn test_disallowed_characters_replaced() {
        assert_eq!(sanitize("AC/DC: Back?"), "AC_DC_ Back_");
        assert_eq!(sanitize("La Femme d'Argent"), "La Femme d_Argent");
        assert_eq!(sanitize("tab\there\nnew"), "tab_here_new");
        // One underscore per character, not per byte
        assert_eq!(sanitize("café"), "caf_");
        assert_eq!(sanitize("日本"), "__");
    }

    #[test]
    fn test_truncates_to_80_characters() {
        let long = "a".repeat(200);
        let result = sanitize(&long);
        assert_eq!(result.len(), 80);

        // Hard cut, extension is not preserved
        let long_with_ext = format!("{}.mp3", "b".repeat(90));
        let result = sanitize(&long_with_ext);
        assert_eq!(result, "b".repeat(80));
    }

    #[test]
    fn test_truncation_counts_characters_after_transliteration() {
        let long = "ş".repeat(100);
        assert_eq!(sanitize(&long), "s".repeat(80));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_idempotent_and_total() {
        let long = "x/".repeat(70);
        let samples = [
            "",
            "Waterfall",
            "ığüşöç",
            "\u{0}\u{1}\u{7f}control",
            "emoji 🎵 name",
            long.as_str(),
            "İstanbul'da Bir Gece - Sezen Aksu (Canlı)",
            "   leading and trailing   ",
        ];
        for sample in samples {
            let once = sanitize(sample);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
            assert_whitelisted(&once);
        }
    }
}
