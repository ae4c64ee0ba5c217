/*
 * Detects repeated headings. Sections that share the exact same title and level
 * form a duplicate group, which the selection engine exposes as a single master
 * control. Small groups are not worth surfacing, so only groups with at least
 * `min_group_size` members (3 by default) are reported.
 */
use crate::core::document::{Section, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MIN_DUPLICATE_GROUP_SIZE: usize = 3;

/*
 * Identifies a duplicate group. Ordering is by title, then level, which gives
 * the stable presentation order of the group list.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub title: String,
    pub level: usize,
}

impl DuplicateKey {
    pub fn new(title: impl Into<String>, level: usize) -> Self {
        DuplicateKey {
            title: title.into(),
            level,
        }
    }

    pub fn of(section: &Section) -> Self {
        DuplicateKey::new(section.title.clone(), section.level)
    }
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.title, self.level)
    }
}

/*
 * Parses the `title::level` form produced by `Display`. The level is taken
 * after the last `::` so titles may themselves contain `::`.
 */
impl std::str::FromStr for DuplicateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (title, level) = s
            .rsplit_once("::")
            .ok_or_else(|| format!("'{s}' is not a duplicate key (expected 'Title::level')"))?;
        let level = level
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("'{level}' is not a heading level"))?;
        Ok(DuplicateKey::new(title, level))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub key: DuplicateKey,
    pub member_ids: Vec<SectionId>,
}

/*
 * Groups `sections` by (title, level) and keeps the groups with at least
 * `min_group_size` members. Members stay in document order; groups are sorted by
 * key. This is a pure function of the section list.
 */
pub fn find_duplicates(sections: &[Section], min_group_size: usize) -> Vec<DuplicateGroup> {
    let mut by_key: BTreeMap<DuplicateKey, Vec<SectionId>> = BTreeMap::new();
    for section in sections {
        by_key
            .entry(DuplicateKey::of(section))
            .or_default()
            .push(section.id);
    }

    let groups: Vec<DuplicateGroup> = by_key
        .into_iter()
        .filter(|(_, ids)| ids.len() >= min_group_size)
        .map(|(key, member_ids)| DuplicateGroup { key, member_ids })
        .collect();
    log::debug!(
        "DuplicateDetector: Found {} duplicate groups (min size {min_group_size}).",
        groups.len()
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::parse_with_words;

    #[test]
    fn test_duplicate_key_display_and_parse() {
        let key = DuplicateKey::new("Usage", 2);
        assert_eq!(key.to_string(), "Usage::2");
        assert_eq!("Usage::2".parse::<DuplicateKey>().unwrap(), key);
        assert_eq!(
            "a::b::3".parse::<DuplicateKey>().unwrap(),
            DuplicateKey::new("a::b", 3)
        );
        assert!("Usage".parse::<DuplicateKey>().is_err());
        assert!("Usage::two".parse::<DuplicateKey>().is_err());
    }

    #[test]
    fn test_find_duplicates_requires_three_members() {
        let doc = parse_with_words("# A\n## B\n## B\n# C\n## D\n## D\n## D\n");
        let groups = find_duplicates(doc.sections(), DEFAULT_MIN_DUPLICATE_GROUP_SIZE);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, DuplicateKey::new("D", 2));
        assert_eq!(groups[0].member_ids.len(), 3);
    }

    #[test]
    fn test_find_duplicates_distinguishes_levels() {
        let doc = parse_with_words("# X\n## X\n### X\n# Y\n## X\n### X\n# Z\n### X\n");
        let groups = find_duplicates(doc.sections(), 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, DuplicateKey::new("X", 3));
        assert_eq!(groups[0].key.level, 3);
    }

    #[test]
    fn test_find_duplicates_title_match_is_exact() {
        let doc = parse_with_words("# Notes\n# notes\n# Notes \n# Notes\n");
        // "# Notes " is trimmed to "Notes"; "notes" differs in case.
        let groups = find_duplicates(doc.sections(), 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key.title, "Notes");
        assert_eq!(groups[0].member_ids.len(), 3);
    }

    #[test]
    fn test_find_duplicates_sorted_and_members_in_document_order() {
        let doc = parse_with_words(
            "# b\n## z\n# a\n## z\n# b\n## z\n# a\n# a\n# b\n",
        );
        let groups = find_duplicates(doc.sections(), 3);
        let keys: Vec<String> = groups.iter().map(|g| g.key.to_string()).collect();
        assert_eq!(keys, vec!["a::1", "b::1", "z::2"]);
        for group in &groups {
            assert!(group.member_ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_find_duplicates_empty_input() {
        assert!(find_duplicates(&[], 3).is_empty());
    }
}
