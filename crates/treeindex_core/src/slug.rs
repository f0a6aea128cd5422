use unicode_normalization::UnicodeNormalization;

/// Canonical matching key for a tree name or an image file stem.
///
/// `"Brant's Oak"`, `"Brants_Oak"` and `"BRANTS OAK"` all map to `"brants_oak"`.
/// The key is only used to join images to rows; it is never stored.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.nfkd() {
        if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
            continue;
        }
        if !is_word_char(ch) {
            continue;
        }
        if pending_separator {
            out.push('_');
            pending_separator = false;
        }
        // Compatibility capitals such as `𝐀` only become ASCII after decomposition.
        out.extend(ch.to_lowercase());
    }

    out.trim_matches('_').to_string()
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn apostrophe_case_and_separator_variants_share_a_key() {
        assert_eq!(normalize("Brant's Oak"), "brants_oak");
        assert_eq!(normalize("Brants_Oak"), "brants_oak");
        assert_eq!(normalize("BRANTS OAK"), "brants_oak");
        assert_eq!(normalize("  Brant’s   Oak \t"), "brants_oak");
        assert_eq!(normalize("brants-oak"), "brants_oak");
    }

    #[test]
    fn accents_are_decomposed_and_dropped() {
        assert_eq!(normalize("Érable Champêtre"), "erable_champetre");
        assert_eq!(normalize("Açaí"), "acai");
    }

    #[test]
    fn separator_runs_collapse_and_edges_are_trimmed() {
        assert_eq!(normalize(" -- Aleppo  - Pine -- "), "aleppo_pine");
        assert_eq!(normalize("_Olive_"), "olive");
    }

    #[test]
    fn empty_and_punctuation_only_input_yield_empty_key() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("'?!"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for sample in [
            "Brant's Oak",
            "Érable Champêtre",
            "İstanbul Plane",
            "a _ b",
            "  -Persian-Ironwood- ",
            "Quercus ×hispanica",
            "𝐀sh",
            "ℌolly Oak",
            "ᴬcacia",
        ] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample: {sample}");
            assert!(!once.chars().any(char::is_uppercase), "sample: {sample}");
        }
    }

    #[test]
    fn compatibility_capitals_fold_to_lowercase() {
        assert_eq!(normalize("𝐀sh"), "ash");
        assert_eq!(normalize("ℌolly Oak"), "holly_oak");
        assert_eq!(normalize("ᴬcacia"), "acacia");
    }
}
