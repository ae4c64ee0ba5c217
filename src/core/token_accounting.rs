/*
 * Token accounting for parsed sections.
 *
 * The exclusive cost of a section covers its own heading line and content only.
 * Each content line additionally costs `line_break_surcharge` tokens, which
 * compensates for tokenizers that barely weight newlines. Subtree totals are
 * computed once per parse with an explicit post-order traversal.
 */
use crate::core::document::{Section, SectionId};
use crate::core::tokenizer_utils::{ApproximateTokenCounter, TokenCounterOperations};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_LINE_BREAK_SURCHARGE: usize = 1;

pub struct TokenAccountant<'a> {
    token_counter: &'a dyn TokenCounterOperations,
    fallback: ApproximateTokenCounter,
    line_break_surcharge: usize,
}

impl<'a> TokenAccountant<'a> {
    pub fn new(token_counter: &'a dyn TokenCounterOperations, line_break_surcharge: usize) -> Self {
        TokenAccountant {
            token_counter,
            fallback: ApproximateTokenCounter::new(),
            line_break_surcharge,
        }
    }

    /*
     * Counts tokens with the injected counter. A failure only affects this one
     * piece of text: it is logged and replaced by the approximate estimate.
     */
    fn count(&self, text: &str) -> usize {
        match self.token_counter.count_tokens(text) {
            Ok(count) => count,
            Err(e) => {
                let estimate = self.fallback.estimate(text);
                log::warn!(
                    "TokenAccountant: {} failed ({e}); using estimate of {estimate} tokens.",
                    self.token_counter.name()
                );
                estimate
            }
        }
    }

    /*
     * Exclusive cost = tokens(heading) + tokens(content joined by '\n')
     * + surcharge per content line. The preface has no heading line.
     */
    pub fn exclusive_tokens(&self, section: &Section) -> usize {
        let heading_tokens = section
            .heading_line()
            .map(|line| self.count(&line))
            .unwrap_or(0);
        let content_tokens = self.count(&section.joined_content());
        heading_tokens + content_tokens + section.content.len() * self.line_break_surcharge
    }

    /*
     * Fills `total_token_count` on every section and returns the document total
     * (sum over root sections). A section whose total has been finalised is never
     * traversed again.
     */
    pub fn compute_totals(sections: &mut [Section]) -> usize {
        let index: HashMap<SectionId, usize> = sections
            .iter()
            .enumerate()
            .map(|(position, s)| (s.id, position))
            .collect();
        let mut finalized: HashSet<SectionId> = HashSet::with_capacity(sections.len());
        let root_ids: Vec<SectionId> = sections
            .iter()
            .filter(|s| s.parent_id.is_none())
            .map(|s| s.id)
            .collect();

        let mut document_total = 0;
        for root_id in root_ids {
            // (id, children_done)
            let mut stack: Vec<(SectionId, bool)> = vec![(root_id, false)];
            while let Some((id, children_done)) = stack.pop() {
                if finalized.contains(&id) {
                    continue;
                }
                let position = index[&id];
                if children_done {
                    let children_sum: usize = sections[position]
                        .children_ids
                        .iter()
                        .map(|child_id| sections[index[child_id]].total_token_count)
                        .sum();
                    let section = &mut sections[position];
                    section.total_token_count = section.exclusive_token_count + children_sum;
                    finalized.insert(id);
                } else {
                    stack.push((id, true));
                    for child_id in sections[position].children_ids.iter().rev() {
                        debug_assert!(
                            index.contains_key(child_id),
                            "child {child_id} of {id} is not part of the document"
                        );
                        stack.push((*child_id, false));
                    }
                }
            }
            document_total += sections[index[&root_id]].total_token_count;
        }
        log::trace!(
            "TokenAccountant: Computed totals for {} sections, document total {document_total}.",
            finalized.len()
        );
        document_total
    }
}
