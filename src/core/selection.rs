/*
 * The tri-state selection engine.
 *
 * Every section and every duplicate group carries a `SelectionState`. The
 * states live in a `SelectionMap`, kept apart from the immutable parse result, and
 * `SelectionEngine` is a reducer over `(ParsedDocument, duplicate groups,
 * SelectionMap)`. After any operation the map satisfies two rules:
 *
 * - a section with children is `On` if all children are `On`, `Off` if all are
 *   `Off`, and `Mixed` otherwise; a section without children is never `Mixed`;
 * - a duplicate group is `On` if all members are `On`, `Off` if all are `Off`,
 *   and `Mixed` otherwise (a group with no resolvable members is `Off`).
 *
 * Operations on unknown ids or keys leave the map untouched and report a
 * `SelectionError`.
 */
use crate::core::document::{ParsedDocument, Section, SectionId};
use crate::core::duplicates::{DuplicateGroup, DuplicateKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionState {
    On,
    Off,
    Mixed,
}

impl SelectionState {
    /*
     * Derives an aggregate state from the states of children or group members.
     * An empty input yields `Off`.
     */
    pub fn aggregate<I>(states: I) -> SelectionState
    where
        I: IntoIterator<Item = SelectionState>,
    {
        let mut any = false;
        let mut all_on = true;
        let mut all_off = true;
        for state in states {
            any = true;
            match state {
                SelectionState::On => all_off = false,
                SelectionState::Off => all_on = false,
                SelectionState::Mixed => {
                    all_on = false;
                    all_off = false;
                }
            }
        }
        if !any {
            SelectionState::Off
        } else if all_on {
            SelectionState::On
        } else if all_off {
            SelectionState::Off
        } else {
            SelectionState::Mixed
        }
    }
}

/*
 * A decisive user action: checking or unchecking a section or group control.
 * Mixed can only ever be derived, never requested.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
}

impl From<CheckState> for SelectionState {
    fn from(check: CheckState) -> Self {
        match check {
            CheckState::Checked => SelectionState::On,
            CheckState::Unchecked => SelectionState::Off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    UnknownSection(SectionId),
    UnknownGroup(DuplicateKey),
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::UnknownSection(id) => write!(f, "Unknown section id: {id}"),
            SelectionError::UnknownGroup(key) => write!(f, "Unknown duplicate group: {key}"),
        }
    }
}

impl std::error::Error for SelectionError {}

/*
 * Mutable selection state, keyed by section id and duplicate key.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionMap {
    sections: HashMap<SectionId, SelectionState>,
    groups: BTreeMap<DuplicateKey, SelectionState>,
}

impl SelectionMap {
    pub fn section_state(&self, id: SectionId) -> Option<SelectionState> {
        self.sections.get(&id).copied()
    }

    pub fn group_state(&self, key: &DuplicateKey) -> Option<SelectionState> {
        self.groups.get(key).copied()
    }

    pub fn is_on(&self, id: SectionId) -> bool {
        self.section_state(id) == Some(SelectionState::On)
    }
}

pub struct SelectionEngine<'a> {
    document: &'a ParsedDocument,
    groups: &'a [DuplicateGroup],
    group_index: HashMap<&'a DuplicateKey, usize>,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(document: &'a ParsedDocument, groups: &'a [DuplicateGroup]) -> Self {
        let group_index = groups
            .iter()
            .enumerate()
            .map(|(position, group)| (&group.key, position))
            .collect();
        SelectionEngine {
            document,
            groups,
            group_index,
        }
    }

    /*
     * Every section starts selected; group states are derived from their members.
     */
    pub fn initial_selection(&self) -> SelectionMap {
        let mut map = SelectionMap {
            sections: self
                .document
                .sections()
                .iter()
                .map(|s| (s.id, SelectionState::On))
                .collect(),
            groups: BTreeMap::new(),
        };
        for group in self.groups {
            let state = self.group_state_from_members(&map, group);
            map.groups.insert(group.key.clone(), state);
        }
        map
    }

    /*
     * Sets a single section (and its whole subtree) to the requested state, then
     * recomputes every ancestor up to the root and re-syncs every duplicate group
     * whose members were touched.
     */
    pub fn toggle(
        &self,
        map: &mut SelectionMap,
        id: SectionId,
        check: CheckState,
    ) -> Result<(), SelectionError> {
        let Some(section) = self.document.get(id) else {
            log::warn!("SelectionEngine: toggle ignored, unknown section {id}.");
            return Err(SelectionError::UnknownSection(id));
        };
        log::debug!(
            "SelectionEngine: Toggling {id} '{}' to {check:?}.",
            section.title
        );
        self.apply_toggle(map, section, check.into());
        debug_assert!(self.verify_consistency(map).is_ok());
        Ok(())
    }

    /*
     * Applies the requested state to every member of a duplicate group, in
     * document order, then sets the group itself to that state.
     */
    pub fn toggle_group(
        &self,
        map: &mut SelectionMap,
        key: &DuplicateKey,
        check: CheckState,
    ) -> Result<(), SelectionError> {
        let Some(&position) = self.group_index.get(key) else {
            log::warn!("SelectionEngine: group toggle ignored, unknown group {key}.");
            return Err(SelectionError::UnknownGroup(key.clone()));
        };
        let group = &self.groups[position];
        let state = SelectionState::from(check);
        log::debug!(
            "SelectionEngine: Toggling group {key} ({} members) to {check:?}.",
            group.member_ids.len()
        );
        for member_id in &group.member_ids {
            if let Some(member) = self.document.get(*member_id) {
                self.apply_toggle(map, member, state);
            }
        }
        map.groups.insert(group.key.clone(), state);
        debug_assert!(self.verify_consistency(map).is_ok());
        Ok(())
    }

    /*
     * Overwrites every section and group with the same state.
     */
    pub fn select_all(&self, map: &mut SelectionMap, check: CheckState) {
        let state = SelectionState::from(check);
        log::debug!("SelectionEngine: Setting all sections to {state:?}.");
        for section in self.document.sections() {
            map.sections.insert(section.id, state);
        }
        for group in self.groups {
            map.groups.insert(group.key.clone(), state);
        }
    }

    /*
     * Sum of exclusive token counts over sections in state `On`. Mixed
     * ancestors contribute nothing themselves.
     */
    pub fn selected_token_count(&self, map: &SelectionMap) -> usize {
        self.document
            .sections()
            .iter()
            .filter(|s| map.is_on(s.id))
            .map(|s| s.exclusive_token_count)
            .sum()
    }

    pub fn selected_section_count(&self, map: &SelectionMap) -> usize {
        self.document
            .sections()
            .iter()
            .filter(|s| map.is_on(s.id))
            .count()
    }

    fn apply_toggle(&self, map: &mut SelectionMap, section: &Section, state: SelectionState) {
        let mut touched_groups: BTreeSet<&DuplicateKey> = BTreeSet::new();

        // Cascade down. Indeterminate states are never inherited.
        for descendant_id in self.document.subtree_ids(section.id) {
            map.sections.insert(descendant_id, state);
            if let Some(descendant) = self.document.get(descendant_id) {
                if let Some(key) = self.group_key_of(descendant) {
                    touched_groups.insert(key);
                }
            }
        }

        // Propagate up, all the way to the root.
        for ancestor_id in self.document.ancestors(section.id) {
            let Some(ancestor) = self.document.get(ancestor_id) else {
                unreachable!("ancestor {ancestor_id} of {} is not in the document", section.id);
            };
            let recomputed = SelectionState::aggregate(
                ancestor
                    .children_ids
                    .iter()
                    .filter_map(|child_id| map.section_state(*child_id)),
            );
            map.sections.insert(ancestor_id, recomputed);
            if let Some(key) = self.group_key_of(ancestor) {
                self.sync_group(map, key);
            }
        }

        for key in touched_groups {
            self.sync_group(map, key);
        }
    }

    fn group_key_of(&self, section: &Section) -> Option<&'a DuplicateKey> {
        self.group_index
            .get(&DuplicateKey::of(section))
            .map(|&position| &self.groups[position].key)
    }

    fn sync_group(&self, map: &mut SelectionMap, key: &DuplicateKey) {
        if let Some(&position) = self.group_index.get(key) {
            let group = &self.groups[position];
            let state = self.group_state_from_members(map, group);
            map.groups.insert(group.key.clone(), state);
        }
    }

    fn group_state_from_members(&self, map: &SelectionMap, group: &DuplicateGroup) -> SelectionState {
        SelectionState::aggregate(
            group
                .member_ids
                .iter()
                .filter_map(|member_id| map.section_state(*member_id)),
        )
    }

    /*
     * Checks the propagate-up and group rules over the whole map. Returns a
     * description of the first violation found.
     */
    pub fn verify_consistency(&self, map: &SelectionMap) -> Result<(), String> {
        for section in self.document.sections() {
            let Some(state) = map.section_state(section.id) else {
                return Err(format!("{} has no selection state", section.id));
            };
            if section.has_children() {
                let expected = SelectionState::aggregate(
                    section
                        .children_ids
                        .iter()
                        .filter_map(|child_id| map.section_state(*child_id)),
                );
                if state != expected {
                    return Err(format!(
                        "{} is {state:?} but its children imply {expected:?}",
                        section.id
                    ));
                }
            } else if state == SelectionState::Mixed {
                return Err(format!("leaf {} is Mixed", section.id));
            }
        }
        for group in self.groups {
            let expected = self.group_state_from_members(map, group);
            let actual = map.group_state(&group.key);
            if actual != Some(expected) {
                return Err(format!(
                    "group {} is {actual:?} but its members imply {expected:?}",
                    group.key
                ));
            }
        }
        Ok(())
    }
}
