//! Dense zero-based ordering for project columns and task cards.
//!
//! Every mutation of an ordered list is planned here as a pure list
//! transformation: the result carries the new id order plus the minimal set of
//! `(id, order_index)` writes to persist. The full list is logically re-indexed
//! to `0..len` on every change, so the dense-permutation invariant holds after
//! each successful mutation; only rows whose index actually changed are written.

/// A single persisted index update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderWrite {
    pub id: String,
    pub order_index: i64,
}

/// Outcome of planning one ordered-list mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    /// The full id list in its new order.
    pub order: Vec<String>,
    /// Entries whose index changed. Empty means the mutation was a no-op and
    /// the caller must skip persistence and the snapshot refresh entirely.
    pub writes: Vec<OrderWrite>,
}

/// Move `entity_id` to `to_index` within `order`. The target index is clamped
/// to the list bounds after removal. Returns `None` when the entity is not in
/// the list (stale caller state).
pub fn plan_move(order: &[String], entity_id: &str, to_index: usize) -> Option<OrderPlan> {
    let from = order.iter().position(|id| id == entity_id)?;

    let mut next: Vec<String> = order.to_vec();
    let entity = next.remove(from);
    let clamped = to_index.min(next.len());
    next.insert(clamped, entity);

    Some(OrderPlan {
        writes: changed_writes(order, &next),
        order: next,
    })
}

/// Remove `entity_id` from `order`, closing the gap it leaves. Returns `None`
/// when the entity is not in the list.
pub fn plan_remove(order: &[String], entity_id: &str) -> Option<OrderPlan> {
    let from = order.iter().position(|id| id == entity_id)?;

    let mut next: Vec<String> = order.to_vec();
    next.remove(from);

    Some(OrderPlan {
        writes: changed_writes(order, &next),
        order: next,
    })
}

/// Insert `entity_id` into `order` at `to_index` (clamped to the list end).
/// The inserted entity always receives a write.
pub fn plan_insert(order: &[String], entity_id: &str, to_index: usize) -> OrderPlan {
    let mut next: Vec<String> = order.to_vec();
    let clamped = to_index.min(next.len());
    next.insert(clamped, entity_id.to_string());

    OrderPlan {
        writes: changed_writes(order, &next),
        order: next,
    }
}

/// Diff two orderings of (almost) the same ids into the write set restoring
/// density. Ids absent from `old` (fresh inserts) always get a write.
fn changed_writes(old: &[String], new: &[String]) -> Vec<OrderWrite> {
    new.iter()
        .enumerate()
        .filter(|(index, id)| old.get(*index).map(|o| o == *id) != Some(true))
        .map(|(index, id)| OrderWrite {
            id: id.clone(),
            order_index: index as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn assert_dense(plan: &OrderPlan) {
        for write in &plan.writes {
            let pos = plan.order.iter().position(|id| *id == write.id).unwrap();
            assert_eq!(pos as i64, write.order_index);
        }
    }

    #[test]
    fn move_project_to_front() {
        // [P1(0), P2(1)] with P2 -> 0 becomes [P2(0), P1(1)]
        let plan = plan_move(&ids(&["P1", "P2"]), "P2", 0).unwrap();
        assert_eq!(plan.order, ids(&["P2", "P1"]));
        assert_eq!(
            plan.writes,
            vec![
                OrderWrite {
                    id: "P2".into(),
                    order_index: 0
                },
                OrderWrite {
                    id: "P1".into(),
                    order_index: 1
                },
            ]
        );
    }

    #[test]
    fn move_task_to_end() {
        // [T1(0), T2(1), T3(2)] with T1 -> 2 becomes [T2(0), T3(1), T1(2)]
        let plan = plan_move(&ids(&["T1", "T2", "T3"]), "T1", 2).unwrap();
        assert_eq!(plan.order, ids(&["T2", "T3", "T1"]));
        assert_eq!(plan.writes.len(), 3);
        assert_dense(&plan);
    }

    #[test]
    fn move_to_current_index_is_noop() {
        let order = ids(&["A", "B", "C"]);
        let plan = plan_move(&order, "B", 1).unwrap();
        assert_eq!(plan.order, order);
        assert!(plan.writes.is_empty());
    }

    #[test]
    fn move_clamps_past_end() {
        let plan = plan_move(&ids(&["A", "B", "C"]), "A", 99).unwrap();
        assert_eq!(plan.order, ids(&["B", "C", "A"]));
        assert_dense(&plan);
    }

    #[test]
    fn move_unknown_entity_is_none() {
        assert!(plan_move(&ids(&["A", "B"]), "Z", 0).is_none());
    }

    #[test]
    fn move_only_writes_shifted_range() {
        // Moving D before B leaves A and E untouched
        let plan = plan_move(&ids(&["A", "B", "C", "D", "E"]), "D", 1).unwrap();
        assert_eq!(plan.order, ids(&["A", "D", "B", "C", "E"]));
        let written: Vec<&str> = plan.writes.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(written, vec!["D", "B", "C"]);
    }

    #[test]
    fn remove_reindexes_trailing_entries() {
        let plan = plan_remove(&ids(&["A", "B", "C"]), "A").unwrap();
        assert_eq!(plan.order, ids(&["B", "C"]));
        assert_eq!(
            plan.writes,
            vec![
                OrderWrite {
                    id: "B".into(),
                    order_index: 0
                },
                OrderWrite {
                    id: "C".into(),
                    order_index: 1
                },
            ]
        );
    }

    #[test]
    fn remove_last_entry_writes_nothing() {
        let plan = plan_remove(&ids(&["A", "B", "C"]), "C").unwrap();
        assert_eq!(plan.order, ids(&["A", "B"]));
        assert!(plan.writes.is_empty());
    }

    #[test]
    fn insert_into_empty_list() {
        let plan = plan_insert(&[], "T", 0);
        assert_eq!(plan.order, ids(&["T"]));
        assert_eq!(
            plan.writes,
            vec![OrderWrite {
                id: "T".into(),
                order_index: 0
            }]
        );
    }

    #[test]
    fn insert_shifts_following_entries() {
        let plan = plan_insert(&ids(&["A", "B"]), "T", 1);
        assert_eq!(plan.order, ids(&["A", "T", "B"]));
        let written: Vec<&str> = plan.writes.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(written, vec!["T", "B"]);
        assert_dense(&plan);
    }

    #[test]
    fn insert_clamps_past_end() {
        let plan = plan_insert(&ids(&["A"]), "T", 7);
        assert_eq!(plan.order, ids(&["A", "T"]));
        assert_dense(&plan);
    }

    #[test]
    fn sequence_of_moves_keeps_dense_permutation() {
        let mut order = ids(&["A", "B", "C", "D"]);
        for (entity, target) in [("C", 0), ("A", 3), ("D", 1), ("B", 2)] {
            let plan = plan_move(&order, entity, target).unwrap();
            assert_dense(&plan);
            order = plan.order;
        }
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, ids(&["A", "B", "C", "D"]));
    }
}
