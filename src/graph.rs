//! Relation graph traversal for relationship-based evaluation.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;

use crate::check::CheckRequest;
use crate::error::{Error, Result};
use crate::relation::RelationStore;

/// Traverses the relation graph looking for a path from the resource to
/// the subject.
///
/// The request's action name is used as the relation name at the root;
/// this ties the permission vocabulary of requests to the relation
/// vocabulary of the store. `Ok(Some(path))` carries a human-readable
/// description of the matching path.
#[async_trait]
pub trait GraphWalker: Send + Sync {
    /// Walks the graph. Returns the match path, `None` when the queue
    /// drains without a match, or [`Error::GraphDepthExceeded`] when the
    /// depth bound is hit.
    async fn walk(
        &self,
        store: &(dyn RelationStore + Sync),
        tenant_id: &str,
        req: &CheckRequest,
    ) -> Result<Option<String>>;
}

/// Breadth-first graph walker with a depth bound.
///
/// Cycles are broken by a visited set keyed on the full
/// `(type, id, relation)` tuple: a node reachable over two different
/// relations is explored once per relation.
#[derive(Clone, Copy, Debug)]
pub struct BfsGraphWalker {
    max_depth: usize,
}

impl BfsGraphWalker {
    /// Creates a walker with the given depth bound; 0 selects the default
    /// of 10.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: if max_depth == 0 { 10 } else { max_depth },
        }
    }
}

impl Default for BfsGraphWalker {
    fn default() -> Self {
        Self::new(10)
    }
}

struct WalkNode {
    object_type: String,
    object_id: String,
    relation: String,
    depth: usize,
    path: Vec<String>,
}

fn node_key(object_type: &str, object_id: &str, relation: &str) -> String {
    format!("{object_type}:{object_id}#{relation}")
}

#[async_trait]
impl GraphWalker for BfsGraphWalker {
    async fn walk(
        &self,
        store: &(dyn RelationStore + Sync),
        tenant_id: &str,
        req: &CheckRequest,
    ) -> Result<Option<String>> {
        let target_type = req.subject.kind.as_str();
        let target_id = req.subject.id.as_str();

        // Start from the resource side.
        let root = node_key(&req.resource.kind, &req.resource.id, &req.action.name);
        let mut queue = VecDeque::new();
        queue.push_back(WalkNode {
            object_type: req.resource.kind.clone(),
            object_id: req.resource.id.clone(),
            relation: req.action.name.clone(),
            depth: 0,
            path: vec![root],
        });

        let mut visited: HashSet<String> = HashSet::new();

        while let Some(node) = queue.pop_front() {
            if node.depth > self.max_depth {
                return Err(Error::GraphDepthExceeded {
                    max_depth: self.max_depth,
                });
            }

            let key = node_key(&node.object_type, &node.object_id, &node.relation);
            if !visited.insert(key) {
                continue;
            }

            let tuples = store
                .list_relation_subjects(
                    tenant_id,
                    &node.object_type,
                    &node.object_id,
                    &node.relation,
                )
                .await?;

            for tuple in tuples {
                // Direct hit: the subject we are looking for.
                if tuple.subject_type == target_type && tuple.subject_id == target_id {
                    let mut path = node.path.clone();
                    path.push(format!("{}:{}", tuple.subject_type, tuple.subject_id));
                    return Ok(Some(path.join(" -> ")));
                }

                if !tuple.subject_relation.is_empty() {
                    // Subject set: follow the subject's own relation.
                    let mut path = node.path.clone();
                    path.push(node_key(
                        &tuple.subject_type,
                        &tuple.subject_id,
                        &tuple.subject_relation,
                    ));
                    queue.push_back(WalkNode {
                        object_type: tuple.subject_type,
                        object_id: tuple.subject_id,
                        relation: tuple.subject_relation,
                        depth: node.depth + 1,
                        path,
                    });
                } else {
                    // Intermediate object: follow the same relation.
                    let mut path = node.path.clone();
                    path.push(format!("{}:{}", tuple.subject_type, tuple.subject_id));
                    queue.push_back(WalkNode {
                        object_type: tuple.subject_type,
                        object_id: tuple.subject_id,
                        relation: node.relation.clone(),
                        depth: node.depth + 1,
                        path,
                    });
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::SubjectKind;
    use crate::error::{StoreError, StoreResult};
    use crate::id::Id;
    use crate::relation::{RelationFilter, RelationTuple};
    use chrono::Utc;
    use futures::executor::block_on;
    use std::sync::Mutex;

    /// Relation store stub backed by a flat tuple list.
    #[derive(Default)]
    struct TupleStore {
        tuples: Vec<RelationTuple>,
        calls: Mutex<usize>,
    }

    impl TupleStore {
        fn with(edges: &[(&str, &str, &str, &str, &str, &str)]) -> Self {
            let tuples = edges
                .iter()
                .map(
                    |(object_type, object_id, relation, subject_type, subject_id, subject_rel)| {
                        RelationTuple {
                            id: Id::new_relation(),
                            tenant_id: "t1".to_string(),
                            app_id: String::new(),
                            object_type: object_type.to_string(),
                            object_id: object_id.to_string(),
                            relation: relation.to_string(),
                            subject_type: subject_type.to_string(),
                            subject_id: subject_id.to_string(),
                            subject_relation: subject_rel.to_string(),
                            metadata: Default::default(),
                            created_at: Utc::now(),
                        }
                    },
                )
                .collect();
            Self {
                tuples,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl RelationStore for TupleStore {
        async fn create_relation(&self, _tuple: &RelationTuple) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_relation(&self, _relation_id: Id) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_relation_tuple(
            &self,
            _tenant_id: &str,
            _object_type: &str,
            _object_id: &str,
            _relation: &str,
            _subject_type: &str,
            _subject_id: &str,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        async fn list_relations(
            &self,
            _filter: &RelationFilter,
        ) -> StoreResult<Vec<RelationTuple>> {
            unimplemented!()
        }

        async fn count_relations(&self, _filter: &RelationFilter) -> StoreResult<u64> {
            unimplemented!()
        }

        async fn list_relation_subjects(
            &self,
            tenant_id: &str,
            object_type: &str,
            object_id: &str,
            relation: &str,
        ) -> StoreResult<Vec<RelationTuple>> {
            *self.calls.lock().expect("poisoned lock") += 1;
            Ok(self
                .tuples
                .iter()
                .filter(|t| {
                    t.tenant_id == tenant_id
                        && t.object_type == object_type
                        && t.object_id == object_id
                        && t.relation == relation
                })
                .cloned()
                .collect())
        }

        async fn list_relation_objects(
            &self,
            _tenant_id: &str,
            _subject_type: &str,
            _subject_id: &str,
            _relation: &str,
        ) -> StoreResult<Vec<RelationTuple>> {
            unimplemented!()
        }

        async fn check_direct_relation(
            &self,
            _tenant_id: &str,
            _object_type: &str,
            _object_id: &str,
            _relation: &str,
            _subject_type: &str,
            _subject_id: &str,
        ) -> StoreResult<bool> {
            Ok(false)
        }

        async fn delete_relations_by_object(
            &self,
            _tenant_id: &str,
            _object_type: &str,
            _object_id: &str,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_relations_by_subject(
            &self,
            _tenant_id: &str,
            _subject_type: &str,
            _subject_id: &str,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_relations_by_tenant(&self, _tenant_id: &str) -> StoreResult<()> {
            unimplemented!()
        }
    }

    fn walk(store: &TupleStore, req: &CheckRequest, max_depth: usize) -> Result<Option<String>> {
        block_on(BfsGraphWalker::new(max_depth).walk(store, "t1", req))
    }

    #[test]
    fn walk_should_find_direct_tuple() {
        let store = TupleStore::with(&[("document", "doc1", "read", "user", "u1", "")]);
        let req = CheckRequest::new(SubjectKind::User, "u1", "read", "document", "doc1");

        let path = walk(&store, &req, 10).unwrap().unwrap();
        assert_eq!(path, "document:doc1#read -> user:u1");
    }

    #[test]
    fn walk_should_follow_subject_sets() {
        let store = TupleStore::with(&[
            ("document", "doc2", "read", "folder", "engineering", "read"),
            ("folder", "engineering", "read", "user", "bob", ""),
        ]);
        let req = CheckRequest::new(SubjectKind::User, "bob", "read", "document", "doc2");

        let path = walk(&store, &req, 10).unwrap().unwrap();
        assert!(path.contains("folder:engineering#read"), "path: {path}");
        assert!(path.ends_with("user:bob"), "path: {path}");
    }

    #[test]
    fn walk_should_follow_same_relation_through_intermediates() {
        let store = TupleStore::with(&[
            ("document", "doc3", "read", "group", "g1", ""),
            ("group", "g1", "read", "user", "carol", ""),
        ]);
        let req = CheckRequest::new(SubjectKind::User, "carol", "read", "document", "doc3");

        assert!(walk(&store, &req, 10).unwrap().is_some());
    }

    #[test]
    fn walk_should_deny_when_queue_drains() {
        let store = TupleStore::with(&[("document", "doc1", "read", "user", "u1", "")]);
        let req = CheckRequest::new(SubjectKind::User, "stranger", "read", "document", "doc1");

        assert_eq!(walk(&store, &req, 10).unwrap(), None);
    }

    #[test]
    fn walk_should_terminate_on_cycles() {
        let store = TupleStore::with(&[
            ("document", "doc1", "read", "group", "g1", "read"),
            ("group", "g1", "read", "group", "g2", "read"),
            ("group", "g2", "read", "group", "g1", "read"),
        ]);
        let req = CheckRequest::new(SubjectKind::User, "nobody", "read", "document", "doc1");

        assert_eq!(walk(&store, &req, 10).unwrap(), None);
        // Each (type, id, relation) node is fetched at most once.
        assert!(*store.calls.lock().expect("poisoned lock") <= 3);
    }

    #[test]
    fn walk_should_error_past_max_depth() {
        let store = TupleStore::with(&[
            ("document", "doc1", "read", "group", "g1", "read"),
            ("group", "g1", "read", "group", "g2", "read"),
            ("group", "g2", "read", "group", "g3", "read"),
            ("group", "g3", "read", "user", "deep", ""),
        ]);
        let req = CheckRequest::new(SubjectKind::User, "deep", "read", "document", "doc1");

        let err = walk(&store, &req, 2).unwrap_err();
        assert!(matches!(err, Error::GraphDepthExceeded { max_depth: 2 }));
    }

    #[test]
    fn new_should_default_zero_to_ten() {
        assert_eq!(BfsGraphWalker::new(0).max_depth, 10);
        assert_eq!(BfsGraphWalker::new(3).max_depth, 3);
    }
}
