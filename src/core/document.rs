/*
 * Defines the structural model produced by parsing an llms.txt-style document.
 * Sections live in a flat arena owned by `ParsedDocument`; parent/child links are
 * expressed through `SectionId`s so that subtree operations are plain id lookups
 * and no section holds a reference to another. Selection state is deliberately
 * not part of `Section`; it lives in the selection map owned by the selection
 * engine.
 */
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const PREFACE_TITLE: &str = "(Preface)";

/*
 * Opaque identifier of a section, assigned monotonically during one parse.
 * Identifiers are only meaningful within the `ParsedDocument` that created them.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(pub u64);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section-{}", self.0)
    }
}

impl std::str::FromStr for SectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("section-").unwrap_or(s);
        digits
            .parse::<u64>()
            .map(SectionId)
            .map_err(|_| format!("'{s}' is not a section id (expected e.g. 'section-3')"))
    }
}

/*
 * One node of the parsed document: a heading and the lines that follow it, or the
 * synthetic level-0 preface holding text that precedes the first heading.
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub id: SectionId,
    pub level: usize,
    pub title: String,
    pub content: Vec<String>,
    pub exclusive_token_count: usize,
    pub total_token_count: usize,
    pub parent_id: Option<SectionId>,
    pub children_ids: Vec<SectionId>,
}

impl Section {
    pub fn new(id: SectionId, level: usize, title: String, parent_id: Option<SectionId>) -> Self {
        Section {
            id,
            level,
            title,
            content: Vec::new(),
            exclusive_token_count: 0,
            total_token_count: 0,
            parent_id,
            children_ids: Vec::new(),
        }
    }

    pub fn new_preface(id: SectionId) -> Self {
        Section::new(id, 0, PREFACE_TITLE.to_string(), None)
    }

    pub fn is_preface(&self) -> bool {
        self.level == 0
    }

    pub fn has_children(&self) -> bool {
        !self.children_ids.is_empty()
    }

    /*
     * Reconstructs the markdown heading line, e.g. `## Title`. The preface has no
     * heading and returns `None`.
     */
    pub fn heading_line(&self) -> Option<String> {
        if self.is_preface() {
            None
        } else {
            Some(format!("{} {}", "#".repeat(self.level), self.title))
        }
    }

    pub fn joined_content(&self) -> String {
        self.content.join("\n")
    }
}

/*
 * The result of one full parse: sections in document (pre-order) order, an
 * id-keyed index into that list, and the document-level token total.
 * A `ParsedDocument` is never mutated after construction; a re-parse produces a
 * new one that replaces it wholesale.
 */
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    sections: Vec<Section>,
    index: HashMap<SectionId, usize>,
    total_token_count: usize,
}

impl ParsedDocument {
    pub fn new(sections: Vec<Section>, total_token_count: usize) -> Self {
        let index = sections
            .iter()
            .enumerate()
            .map(|(position, section)| (section.id, position))
            .collect();
        ParsedDocument {
            sections,
            index,
            total_token_count,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.index.get(&id).map(|&position| &self.sections[position])
    }

    pub fn roots(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.parent_id.is_none())
    }

    pub fn children(&self, id: SectionId) -> impl Iterator<Item = &Section> {
        self.get(id)
            .map(|s| s.children_ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|child_id| self.get(*child_id))
    }

    /*
     * Returns the ids of the strict ancestors of `id`, nearest first.
     */
    pub fn ancestors(&self, id: SectionId) -> Vec<SectionId> {
        let mut ancestors = Vec::new();
        let mut current = self.get(id).and_then(|s| s.parent_id);
        while let Some(parent_id) = current {
            ancestors.push(parent_id);
            current = self.get(parent_id).and_then(|s| s.parent_id);
        }
        ancestors
    }

    /*
     * Returns `id` followed by all of its descendants in pre-order.
     */
    pub fn subtree_ids(&self, id: SectionId) -> Vec<SectionId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(section) = self.get(current) else {
                continue;
            };
            ids.push(current);
            for child_id in section.children_ids.iter().rev() {
                stack.push(*child_id);
            }
        }
        ids
    }

    pub fn total_token_count(&self) -> usize {
        self.total_token_count
    }
}
