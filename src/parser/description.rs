use std::sync::LazyLock;

use regex::Regex;

static MULTI_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

const SOFT_HYPHEN: char = '\u{ad}';

/// Join wrapped description fragments into one string.
///
/// A fragment ending in `-` is glued to the next one without the hyphen
/// ("Förder-" + "programm"); all others are joined with a single space.
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    let mut out = String::new();
    let mut glue_next = false;

    for fragment in fragments {
        let cleaned: String = fragment.as_ref().chars().filter(|&c| c != SOFT_HYPHEN).collect();
        let piece = cleaned.trim();
        if piece.is_empty() {
            continue;
        }
        if !out.is_empty() && !glue_next {
            out.push(' ');
        }
        match piece.strip_suffix('-') {
            Some(stem) => {
                out.push_str(stem);
                glue_next = true;
            }
            None => {
                out.push_str(piece);
                glue_next = false;
            }
        }
    }

    MULTI_WS_RE.replace_all(out.trim(), " ").into_owned()
}
