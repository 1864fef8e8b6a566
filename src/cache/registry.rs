//! Bidirectional tag registry.
//!
//! Tracks which cached queries provide which tags so invalidation can find
//! every affected entry without the mutation knowing any query key.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::util::lock::{rw_read, rw_write};

use super::keys::{QueryKey, Tag};

const SOURCE: &str = "cache::registry";

pub struct CacheRegistry {
    tag_to_keys: RwLock<HashMap<Tag, HashSet<QueryKey>>>,
    key_to_tags: RwLock<HashMap<QueryKey, HashSet<Tag>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Record the tags `key` provides, replacing any earlier registration.
    pub fn register(&self, key: QueryKey, tags: HashSet<Tag>) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register.key_to_tags");

        if let Some(previous) = k2t.remove(&key) {
            detach(&mut t2k, &key, previous);
        }
        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.clone());
        }
        k2t.insert(key, tags);
    }

    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<QueryKey> {
        rw_read(&self.tag_to_keys, SOURCE, "keys_for_tag")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &QueryKey) -> HashSet<Tag> {
        rw_read(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget an evicted entry.
    pub fn unregister(&self, key: &QueryKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister.key_to_tags");

        if let Some(tags) = k2t.remove(key) {
            detach(&mut t2k, key, tags);
        }
    }

    pub fn clear(&self) {
        rw_write(&self.tag_to_keys, SOURCE, "clear.tag_to_keys").clear();
        rw_write(&self.key_to_tags, SOURCE, "clear.key_to_tags").clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(t2k: &mut HashMap<Tag, HashSet<QueryKey>>, key: &QueryKey, tags: HashSet<Tag>) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str) -> QueryKey {
        QueryKey::CourseInfo {
            course_id: id.to_string(),
        }
    }

    fn reports(id: &str, page: u32) -> QueryKey {
        QueryKey::CourseReports {
            course_id: id.to_string(),
            page,
        }
    }

    #[test]
    fn register_and_lookup_both_ways() {
        let registry = CacheRegistry::new();
        let tag = Tag::Course("1".into());
        registry.register(course("1"), HashSet::from([tag.clone()]));

        assert!(registry.keys_for_tag(&tag).contains(&course("1")));
        assert!(registry.tags_for_key(&course("1")).contains(&tag));
    }

    #[test]
    fn one_tag_many_keys() {
        let registry = CacheRegistry::new();
        let tag = Tag::Course("1".into());
        registry.register(course("1"), HashSet::from([tag.clone()]));
        registry.register(reports("1", 1), HashSet::from([tag.clone()]));
        registry.register(reports("1", 2), HashSet::from([tag.clone()]));

        assert_eq!(registry.keys_for_tag(&tag).len(), 3);
        assert_eq!(registry.tag_count(), 1);
    }

    #[test]
    fn unregister_cleans_up_mappings() {
        let registry = CacheRegistry::new();
        let tag = Tag::Course("1".into());
        registry.register(course("1"), HashSet::from([tag.clone()]));

        registry.unregister(&course("1"));
        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.tag_count(), 0);
        assert!(registry.keys_for_tag(&tag).is_empty());
    }

    #[test]
    fn re_registering_replaces_tags() {
        let registry = CacheRegistry::new();
        let key = QueryKey::Questionnaire { id: 3 };
        registry.register(key.clone(), HashSet::from([Tag::Questionnaire(3)]));
        registry.register(key.clone(), HashSet::from([Tag::Question(8)]));

        assert!(registry.keys_for_tag(&Tag::Questionnaire(3)).is_empty());
        assert!(registry.keys_for_tag(&Tag::Question(8)).contains(&key));
    }

    #[test]
    fn clear_removes_all_mappings() {
        let registry = CacheRegistry::new();
        registry.register(course("1"), HashSet::from([Tag::Course("1".into())]));
        registry.clear();
        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.tag_count(), 0);
    }
}
