use std::collections::HashSet;

use crate::error::CacheError;
use crate::models::category::{Category, CategoryId};
use crate::models::phrase::{Phrase, PhraseId};

/// The cached hierarchy split into top-level and child categories.
///
/// Built wholesale from one import. Scalar updates patch entries in place;
/// nothing is ever added or dropped between imports.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    top_level: Vec<Category>,
    sub_categories: Vec<Category>,
}

impl Partition {
    /// Splits an imported hierarchy by whether each category has a parent
    pub fn from_import(categories: Vec<Category>) -> Self {
        let (top_level, sub_categories) = categories
            .into_iter()
            .partition(|category| category.is_top_level());
        Self { top_level, sub_categories }
    }

    pub fn top_level(&self) -> &[Category] {
        &self.top_level
    }

    pub fn sub_categories(&self) -> &[Category] {
        &self.sub_categories
    }

    pub fn len(&self) -> usize {
        self.top_level.len() + self.sub_categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children of `parent_id` in cache order
    pub fn children_of(&self, parent_id: &CategoryId) -> impl Iterator<Item = &Category> + '_ {
        let parent_id = parent_id.clone();
        self.sub_categories
            .iter()
            .filter(move |category| category.is_child_of(&parent_id))
    }

    pub fn has_children(&self, parent_id: &CategoryId) -> bool {
        self.children_of(parent_id).next().is_some()
    }

    pub fn top_level_by_id(&self, id: &CategoryId) -> Option<&Category> {
        self.top_level.iter().find(|category| &category.id == id)
    }

    pub fn top_level_by_name(&self, name: &str) -> Option<&Category> {
        self.top_level.iter().find(|category| category.name == name)
    }

    /// Any cached category, top-level or child
    pub fn get(&self, id: &CategoryId) -> Option<&Category> {
        self.top_level
            .iter()
            .chain(self.sub_categories.iter())
            .find(|category| &category.id == id)
    }

    pub fn get_mut(&mut self, id: &CategoryId) -> Option<&mut Category> {
        self.top_level
            .iter_mut()
            .chain(self.sub_categories.iter_mut())
            .find(|category| &category.id == id)
    }

    /// Moves `id` to the end of the sequence its parent field now implies.
    /// Returns true when the entry changed sides.
    pub fn relocate(&mut self, id: &CategoryId) -> bool {
        if let Some(index) = self
            .top_level
            .iter()
            .position(|category| &category.id == id && !category.is_top_level())
        {
            let moved = self.top_level.remove(index);
            self.sub_categories.push(moved);
            return true;
        }
        if let Some(index) = self
            .sub_categories
            .iter()
            .position(|category| &category.id == id && category.is_top_level())
        {
            let moved = self.sub_categories.remove(index);
            self.top_level.push(moved);
            return true;
        }
        false
    }

    /// Sets `order` to the sequence position, independently for both
    /// sequences. Returns the categories whose order changed.
    pub fn reorder(&mut self) -> Vec<Category> {
        let mut changed = Vec::new();
        for sequence in [&mut self.top_level, &mut self.sub_categories] {
            for (index, category) in sequence.iter_mut().enumerate() {
                let order = index as i64;
                if category.order != order {
                    category.order = order;
                    category.update_timestamp();
                    changed.push(category.clone());
                }
            }
        }
        changed
    }

    /// Sub-categories that break the two-level rule: a parent that is not
    /// cached at all, or a parent that is itself a sub-category.
    pub fn inconsistencies(&self) -> Vec<CacheError> {
        self.sub_categories
            .iter()
            .filter_map(|category| {
                let parent_id = category.parent_category_id.as_ref()?;
                if self.top_level_by_id(parent_id).is_some() {
                    return None;
                }
                let reason = if self.sub_categories.iter().any(|c| &c.id == parent_id) {
                    "is itself a sub-category"
                } else {
                    "does not exist"
                };
                Some(CacheError::InconsistentState(format!(
                    "sub-category {} ('{}') has parent {} which {}",
                    category.id, category.name, parent_id, reason
                )))
            })
            .collect()
    }
}

/// Phrases seen across all categories, deduplicated by id
#[derive(Debug, Clone, Default)]
pub struct PhraseSet {
    phrases: Vec<Phrase>,
    ids: HashSet<PhraseId>,
}

impl PhraseSet {
    /// Appends phrases whose id is not known yet; returns how many were new
    pub fn merge(&mut self, phrases: impl IntoIterator<Item = Phrase>) -> usize {
        let mut added = 0;
        for phrase in phrases {
            if self.ids.insert(phrase.id.clone()) {
                self.phrases.push(phrase);
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, id: &PhraseId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn as_slice(&self) -> &[Phrase] {
        &self.phrases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, parent: &str) -> Category {
        let mut category = Category::new(format!("cat-{}", id));
        category.id = id.into();
        if !parent.is_empty() {
            category.parent_category_id = Some(parent.into());
        }
        category
    }

    fn phrase(id: &str, category_id: &str) -> Phrase {
        let mut phrase = Phrase::new(format!("phrase-{}", id), category_id.into());
        phrase.id = id.into();
        phrase
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let imported = vec![
            category("1", ""),
            category("3", "1"),
            category("2", ""),
            category("4", "2"),
            category("5", "1"),
        ];
        let partition = Partition::from_import(imported.clone());

        assert_eq!(partition.len(), imported.len());
        assert!(partition.top_level().iter().all(|c| c.is_top_level()));
        assert!(partition.sub_categories().iter().all(|c| !c.is_top_level()));
        for c in &imported {
            let in_top = partition.top_level().iter().any(|t| t.id == c.id);
            let in_sub = partition.sub_categories().iter().any(|s| s.id == c.id);
            assert!(in_top ^ in_sub, "{} must be in exactly one sequence", c.id);
        }
    }

    #[test]
    fn test_partition_keeps_import_order() {
        let partition = Partition::from_import(vec![
            category("2", ""),
            category("5", "1"),
            category("1", ""),
            category("3", "1"),
        ]);

        let top: Vec<_> = partition.top_level().iter().map(|c| c.id.0.as_str()).collect();
        let children: Vec<_> = partition.children_of(&"1".into()).map(|c| c.id.0.as_str()).collect();
        assert_eq!(top, vec!["2", "1"]);
        assert_eq!(children, vec!["5", "3"]);
    }

    #[test]
    fn test_reorder_assigns_positions_independently() {
        let mut partition = Partition::from_import(vec![
            category("1", "").with_order(9),
            category("3", "1").with_order(4),
            category("2", "").with_order(1),
            category("4", "2").with_order(1),
        ]);

        let changed = partition.reorder();

        let top: Vec<_> = partition.top_level().iter().map(|c| c.order).collect();
        let sub: Vec<_> = partition.sub_categories().iter().map(|c| c.order).collect();
        assert_eq!(top, vec![0, 1]);
        assert_eq!(sub, vec![0, 1]);
        let changed_ids: Vec<_> = changed.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(changed_ids, vec!["1", "3"]);
    }

    #[test]
    fn test_reorder_twice_changes_nothing() {
        let mut partition = Partition::from_import(vec![category("1", ""), category("2", "")]);
        partition.reorder();
        assert!(partition.reorder().is_empty());
    }

    #[test]
    fn test_inconsistencies_report_orphans_and_grandchildren() {
        let partition = Partition::from_import(vec![
            category("1", ""),
            category("3", "1"),
            category("6", "3"),
            category("7", "404"),
        ]);

        let problems = partition.inconsistencies();
        assert_eq!(problems.len(), 2);
        assert!(problems
            .iter()
            .all(|e| matches!(e, CacheError::InconsistentState(_))));
        assert!(problems[0].to_string().contains("is itself a sub-category"));
        assert!(problems[1].to_string().contains("does not exist"));
        // Still kept, so the partition matches the import
        assert_eq!(partition.sub_categories().len(), 3);
    }

    #[test]
    fn test_relocate_after_parent_change() {
        let mut partition = Partition::from_import(vec![category("1", ""), category("2", "")]);

        partition.get_mut(&"2".into()).unwrap().parent_category_id = Some("1".into());
        assert!(partition.relocate(&"2".into()));
        assert_eq!(partition.top_level().len(), 1);
        assert_eq!(partition.children_of(&"1".into()).count(), 1);

        assert!(!partition.relocate(&"2".into()));
    }

    #[test]
    fn test_children_outlive_the_lookup_key() {
        let partition = Partition::from_import(vec![
            category("1", ""),
            category("3", "1"),
            category("4", "1"),
        ]);

        let children: Vec<&Category> = partition.children_of(&CategoryId::from("1")).collect();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cat-3", "cat-4"]);
        assert!(partition.has_children(&"1".into()));
        assert!(!partition.has_children(&"3".into()));
    }

    #[test]
    fn test_phrase_merge_is_idempotent() {
        let mut set = PhraseSet::default();

        assert_eq!(set.merge(vec![phrase("p1", "1"), phrase("p2", "1")]), 2);
        assert_eq!(set.merge(vec![phrase("p1", "1")]), 0);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&"p2".into()));
    }

    #[test]
    fn test_phrase_merge_dedups_within_batch() {
        let mut set = PhraseSet::default();
        assert_eq!(set.merge(vec![phrase("p1", "1"), phrase("p1", "2")]), 1);
        assert_eq!(set.as_slice()[0].category_id, CategoryId::from("1"));
    }
}
