use serde::Serialize;

use crate::config::ParserConfig;
use crate::parser::lines::is_boundary_marker;

/// Priority / objective / funding / scope metadata shared by every row in a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    pub priority: Option<String>,
    pub objective: Option<String>,
    pub funding_programme: Option<String>,
    pub scope: String,
}

/// Recover the context from the first line of `body` naming the priority marker.
///
/// A line with fewer than three `/`-segments is continued with the next line,
/// unless that line is a table or dimension marker. Never fails: a block
/// without a priority line gets `Context::default()`.
pub fn extract_context(body: &str, config: &ParserConfig) -> Context {
    let lines: Vec<String> = body.lines().map(normalize_spaces).collect();
    let Some(idx) = lines.iter().position(|l| l.contains(&config.priority_marker)) else {
        return Context::default();
    };

    let mut joined = lines[idx].clone();
    if split_segments(&joined).len() < 3 {
        if let Some(next) = lines.get(idx + 1) {
            if !next.trim().is_empty() && !is_boundary_marker(next, config) {
                joined.push(' ');
                joined.push_str(next);
            }
        }
    }

    let segments = split_segments(&joined);
    match segments.len() {
        0 | 1 => Context::default(),
        n => Context {
            priority: priority_value(segments[0], config),
            objective: after_marker(segments[1], &config.objective_marker),
            funding_programme: segments.get(2).map(|s| s.to_string()),
            scope: if n >= 4 { segments[3].to_string() } else { String::new() },
        },
    }
}

fn normalize_spaces(line: &str) -> String {
    line.replace(['\u{a0}', '\u{202f}'], " ")
}

fn split_segments(line: &str) -> Vec<&str> {
    line.split('/').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn priority_value(segment: &str, config: &ParserConfig) -> Option<String> {
    if let Some(caps) = config.priority_value_re.captures(segment) {
        return caps.name("value").map(|m| m.as_str().to_string());
    }
    after_marker(segment, &config.priority_marker)
}

/// Text after `marker` with a leading colon stripped; the whole segment if the marker is absent.
fn after_marker(segment: &str, marker: &str) -> Option<String> {
    let value = match segment.find(marker) {
        Some(pos) => &segment[pos + marker.len()..],
        None => segment,
    };
    let value = value.trim_start_matches([':', ' ']).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(body: &str) -> Context {
        extract_context(body, &ParserConfig::default())
    }

    #[test]
    fn four_segments() {
        let ctx = extract("\nPriorität: 1 / Spezifisches Ziel: RSO1.1 / EFRE / Stärker entwickelte Regionen\n");
        assert_eq!(ctx.priority.as_deref(), Some("1"));
        assert_eq!(ctx.objective.as_deref(), Some("RSO1.1"));
        assert_eq!(ctx.funding_programme.as_deref(), Some("EFRE"));
        assert_eq!(ctx.scope, "Stärker entwickelte Regionen");
    }

    #[test]
    fn three_segments_scope_empty() {
        let ctx = extract("Priorität 2 / Spezifisches Ziel RSO2.4 / JTF");
        assert_eq!(ctx.priority.as_deref(), Some("2"));
        assert_eq!(ctx.objective.as_deref(), Some("RSO2.4"));
        assert_eq!(ctx.funding_programme.as_deref(), Some("JTF"));
        assert_eq!(ctx.scope, "");
    }

    #[test]
    fn continued_on_next_line() {
        let ctx = extract("Priorität 3 / Spezifisches Ziel RSO3.1\n/ EFRE / Übergangsregionen\n");
        assert_eq!(ctx.priority.as_deref(), Some("3"));
        assert_eq!(ctx.funding_programme.as_deref(), Some("EFRE"));
        assert_eq!(ctx.scope, "Übergangsregionen");
    }

    #[test]
    fn marker_line_is_not_a_continuation() {
        let ctx = extract("Priorität 3 / Spezifisches Ziel RSO3.1\nTabelle 4: Dimension 1 – Interventionsbereich\n");
        assert_eq!(ctx.priority.as_deref(), Some("3"));
        assert_eq!(ctx.objective.as_deref(), Some("RSO3.1"));
        assert_eq!(ctx.funding_programme, None);
        assert_eq!(ctx.scope, "");
    }

    #[test]
    fn non_breaking_spaces_normalized() {
        let ctx = extract("Priorität\u{a0}4 / Spezifisches\u{a0}Ziel ESO4.1 / ESF+ / Alle\u{a0}Regionen");
        assert_eq!(ctx.priority.as_deref(), Some("4"));
        assert_eq!(ctx.objective.as_deref(), Some("ESO4.1"));
        assert_eq!(ctx.scope, "Alle Regionen");
    }

    #[test]
    fn single_segment_leaves_fields_unset() {
        let ctx = extract("Priorität 1\n\nTabelle 4: Dimension 1 – Interventionsbereich");
        assert_eq!(ctx, Context::default());
    }

    #[test]
    fn no_priority_line() {
        assert_eq!(extract("Nur Text\n001 Etwas"), Context::default());
    }
}
