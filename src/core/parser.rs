/*
 * Parses an llms.txt-style document into a flat, ordered list of sections linked
 * by parent/child ids.
 *
 * The scan is line based. A stack of open ancestors, seeded with a synthetic
 * level-0 root, decides where each heading attaches: a new heading becomes a
 * child of the nearest open ancestor with a strictly smaller level. Text before
 * the first heading goes into a synthetic "(Preface)" section at level 0. The
 * preface is a root and stays open, so every later heading descends from it.
 * Sections are finalised (token counts computed) in document
 * order.
 */
use crate::core::document::{ParsedDocument, Section, SectionId};
use crate::core::token_accounting::TokenAccountant;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#+)\s+(.*)$").unwrap());

/*
 * Splits a heading line into (level, title). Returns `None` for ordinary lines.
 */
pub fn match_heading(line: &str) -> Option<(usize, String)> {
    HEADING_RE
        .captures(line)
        .map(|caps| (caps[1].len(), caps[2].trim().to_string()))
}

/* An entry of the ancestor stack; `id == None` is the synthetic root. */
struct OpenAncestor {
    id: Option<SectionId>,
    level: usize,
}

pub struct DocumentParser<'a> {
    accountant: &'a TokenAccountant<'a>,
}

impl<'a> DocumentParser<'a> {
    pub fn new(accountant: &'a TokenAccountant<'a>) -> Self {
        DocumentParser { accountant }
    }

    pub fn parse(&self, text: &str) -> ParsedDocument {
        log::debug!("DocumentParser: Parsing document of {} bytes.", text.len());
        if text.is_empty() {
            return ParsedDocument::default();
        }

        let mut sections: Vec<Section> = Vec::new();
        let mut positions: HashMap<SectionId, usize> = HashMap::new();
        let mut ancestors = vec![OpenAncestor { id: None, level: 0 }];
        let mut current: Option<Section> = None;
        let mut next_id: u64 = 0;

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if let Some((level, title)) = match_heading(line) {
                self.finalize(current.take(), &mut sections, &mut positions);

                while ancestors.len() > 1 && ancestors[ancestors.len() - 1].level >= level {
                    ancestors.pop();
                }
                let parent_id = ancestors[ancestors.len() - 1].id;

                let id = SectionId(next_id);
                next_id += 1;
                if let Some(parent_id) = parent_id {
                    let position = positions[&parent_id];
                    debug_assert!(sections[position].level < level);
                    sections[position].children_ids.push(id);
                }
                ancestors.push(OpenAncestor {
                    id: Some(id),
                    level,
                });
                current = Some(Section::new(id, level, title, parent_id));
                continue;
            }

            let is_blank = line.trim().is_empty();
            if current.is_none() {
                if is_blank && sections.is_empty() {
                    continue;
                }
                let id = SectionId(next_id);
                next_id += 1;
                ancestors.push(OpenAncestor {
                    id: Some(id),
                    level: 0,
                });
                current = Some(Section::new_preface(id));
            }

            // Leading blank lines of a section are dropped.
            if let Some(section) = current.as_mut() {
                if !is_blank || !section.content.is_empty() {
                    section.content.push(line.to_string());
                }
            }
        }
        self.finalize(current.take(), &mut sections, &mut positions);

        let total = TokenAccountant::compute_totals(&mut sections);
        log::debug!(
            "DocumentParser: Parsed {} sections, {total} tokens in total.",
            sections.len()
        );
        ParsedDocument::new(sections, total)
    }

    fn finalize(
        &self,
        section: Option<Section>,
        sections: &mut Vec<Section>,
        positions: &mut HashMap<SectionId, usize>,
    ) {
        if let Some(mut section) = section {
            section.exclusive_token_count = self.accountant.exclusive_tokens(&section);
            log::trace!(
                "DocumentParser: Finalized {} '{}' (level {}, {} lines, {} tokens).",
                section.id,
                section.title,
                section.level,
                section.content.len(),
                section.exclusive_token_count
            );
            positions.insert(section.id, sections.len());
            sections.push(section);
        }
    }
}
