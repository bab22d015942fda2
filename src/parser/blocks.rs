use crate::config::{BodyStart, ParserConfig};

/// Text under one recognized section heading, up to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlock<'a> {
    pub section_id: String,
    pub body: &'a str,
}

/// Split document text into section blocks in document order.
///
/// Each block ends where the next heading match starts (or at end of text).
/// No heading match yields an empty Vec.
pub fn split_blocks<'a>(text: &'a str, config: &ParserConfig) -> Vec<SectionBlock<'a>> {
    let headings: Vec<_> = config
        .section_heading_re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.name("id")?;
            Some((whole.start(), whole.end(), id.as_str().to_string()))
        })
        .collect();

    let mut blocks = Vec::with_capacity(headings.len());
    for (i, (start, end, section_id)) in headings.iter().enumerate() {
        let body_start = match config.body_start {
            BodyStart::AfterHeading => *end,
            BodyStart::Heading => *start,
        };
        let body_end = headings.get(i + 1).map_or(text.len(), |next| next.0);
        blocks.push(SectionBlock {
            section_id: section_id.clone(),
            body: &text[body_start..body_end],
        });
    }

    blocks
}
