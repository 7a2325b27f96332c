//! Fractional order keys.
//!
//! A task's position in the list is its `order` value (falling back to
//! `created_at`). Moving one task computes a single new key between its new
//! neighbors, so no other row is rewritten. Repeated inserts into the same gap
//! halve it each time; when a computed key no longer lands strictly between
//! its neighbors the move falls back to renumbering the whole list.

use crate::types::{Task, TaskId, effective_order};
use serde::{Deserialize, Serialize};

/// Gap added after the current last task when moving to the end.
pub const DEFAULT_TAIL_GAP: f64 = 1000.0;

/// Spacing between keys after a full renumbering.
pub const DEFAULT_REBALANCE_STEP: f64 = 1000.0;

/// Tunables for order assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderPolicy {
    pub tail_gap: f64,
    pub rebalance_step: f64,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            tail_gap: DEFAULT_TAIL_GAP,
            rebalance_step: DEFAULT_REBALANCE_STEP,
        }
    }
}

/// One `order` value to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub id: TaskId,
    pub order: f64,
}

/// Result of planning a move.
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderPlan {
    /// Only the moved task changes.
    Single(OrderPatch),
    /// Keys were exhausted; every listed task gets a fresh evenly spaced key.
    Rebalance(Vec<OrderPatch>),
}

impl ReorderPlan {
    pub fn patches(&self) -> Vec<OrderPatch> {
        match self {
            ReorderPlan::Single(patch) => vec![patch.clone()],
            ReorderPlan::Rebalance(patches) => patches.clone(),
        }
    }
}

/// Midpoint key for moving the task at `old_index` to `new_index`.
///
/// `tasks` is the visible list in display order, still containing the moved
/// task at its old slot. Returns `None` when nothing moves or an index is out
/// of range.
pub fn new_order_for_move(
    tasks: &[Task],
    old_index: usize,
    new_index: usize,
    tail_gap: f64,
) -> Option<f64> {
    let len = tasks.len();
    if old_index >= len || new_index >= len || old_index == new_index {
        return None;
    }

    let key = |i: usize| effective_order(&tasks[i]);

    let order = if new_index == 0 {
        key(0) / 2.0
    } else if new_index == len - 1 {
        key(len - 1) + tail_gap
    } else if old_index < new_index {
        // Moving down: lands between the target and the one after it
        (key(new_index) + key(new_index + 1)) / 2.0
    } else {
        // Moving up: lands between the one before the target and the target
        (key(new_index - 1) + key(new_index)) / 2.0
    };
    Some(order)
}

/// Plan moving `task_id` to `new_index` within `tasks` (display order).
pub fn plan_move(
    tasks: &[Task],
    task_id: &str,
    new_index: usize,
    policy: &OrderPolicy,
) -> Option<ReorderPlan> {
    let old_index = tasks.iter().position(|t| t.id == task_id)?;
    let order = new_order_for_move(tasks, old_index, new_index, policy.tail_gap)?;

    let mut remaining: Vec<&Task> = tasks.iter().collect();
    let moved = remaining.remove(old_index);

    let lower = new_index
        .checked_sub(1)
        .and_then(|i| remaining.get(i))
        .map(|t| effective_order(t));
    let upper = remaining.get(new_index).map(|t| effective_order(t));

    let fits = order.is_finite()
        && lower.is_none_or(|lo| order > lo)
        && upper.is_none_or(|hi| order < hi);

    if fits {
        return Some(ReorderPlan::Single(OrderPatch {
            id: moved.id.clone(),
            order,
        }));
    }

    remaining.insert(new_index, moved);
    let arranged: Vec<Task> = remaining.into_iter().cloned().collect();
    Some(ReorderPlan::Rebalance(rebalance(&arranged, policy.rebalance_step)))
}

/// Evenly spaced keys `step, 2*step, ...` for `tasks` in the given order.
///
/// Tasks that already hold the right key are left out of the result.
pub fn rebalance(tasks: &[Task], step: f64) -> Vec<OrderPatch> {
    tasks
        .iter()
        .enumerate()
        .filter_map(|(i, task)| {
            let order = step * (i as f64 + 1.0);
            (task.order != Some(order)).then(|| OrderPatch {
                id: task.id.clone(),
                order,
            })
        })
        .collect()
}

/// Assign keys to tasks that have none.
///
/// Order-less tasks, taken in `(created_at, id)` order, get
/// `created_at + k` where `k` is their rank among the order-less tasks. That
/// keeps several legacy tasks sharing a timestamp in a stable relative order.
/// Running it again on the result yields no patches.
pub fn backfill(mut tasks: Vec<Task>) -> (Vec<Task>, Vec<OrderPatch>) {
    let mut missing: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.order.is_none())
        .map(|(i, _)| i)
        .collect();

    missing.sort_by(|&a, &b| {
        tasks[a]
            .created_at
            .cmp(&tasks[b].created_at)
            .then_with(|| tasks[a].id.cmp(&tasks[b].id))
    });

    let mut patches = Vec::with_capacity(missing.len());
    for (rank, idx) in missing.into_iter().enumerate() {
        let order = (tasks[idx].created_at + rank as i64) as f64;
        tasks[idx].order = Some(order);
        patches.push(OrderPatch {
            id: tasks[idx].id.clone(),
            order,
        });
    }

    (tasks, patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sort_tasks;

    fn task(id: &str, order: f64) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            completed: false,
            created_at: 0,
            order: Some(order),
        }
    }

    fn legacy(id: &str, created_at: i64) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            completed: false,
            created_at,
            order: None,
        }
    }

    fn abc() -> Vec<Task> {
        vec![task("A", 10.0), task("B", 20.0), task("C", 30.0)]
    }

    /// Apply a plan and return ids in display order.
    fn apply(tasks: &[Task], plan: &ReorderPlan) -> Vec<String> {
        let mut tasks = tasks.to_vec();
        for patch in plan.patches() {
            if let Some(t) = tasks.iter_mut().find(|t| t.id == patch.id) {
                t.order = Some(patch.order);
            }
        }
        sort_tasks(&mut tasks);
        tasks.into_iter().map(|t| t.id).collect()
    }

    #[test]
    fn move_last_to_first_halves_first_key() {
        let tasks = abc();
        let plan = plan_move(&tasks, "C", 0, &OrderPolicy::default()).unwrap();
        assert_eq!(
            plan,
            ReorderPlan::Single(OrderPatch {
                id: "C".into(),
                order: 5.0
            })
        );
        assert_eq!(apply(&tasks, &plan), vec!["C", "A", "B"]);
    }

    #[test]
    fn move_first_to_last_adds_tail_gap() {
        let tasks = abc();
        assert_eq!(new_order_for_move(&tasks, 0, 2, DEFAULT_TAIL_GAP), Some(1030.0));
    }

    #[test]
    fn move_down_uses_target_and_next() {
        let tasks = vec![task("A", 10.0), task("B", 20.0), task("C", 30.0), task("D", 40.0)];
        assert_eq!(new_order_for_move(&tasks, 0, 1, DEFAULT_TAIL_GAP), Some(25.0));
        let plan = plan_move(&tasks, "A", 1, &OrderPolicy::default()).unwrap();
        assert_eq!(apply(&tasks, &plan), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn move_up_uses_previous_and_target() {
        let tasks = vec![task("A", 10.0), task("B", 20.0), task("C", 30.0), task("D", 40.0)];
        assert_eq!(new_order_for_move(&tasks, 3, 1, DEFAULT_TAIL_GAP), Some(15.0));
        let plan = plan_move(&tasks, "D", 1, &OrderPolicy::default()).unwrap();
        assert_eq!(apply(&tasks, &plan), vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn every_move_lands_at_target_index() {
        let tasks: Vec<Task> = (0..6).map(|i| task(&format!("t{i}"), (i as f64 + 1.0) * 10.0)).collect();
        let policy = OrderPolicy::default();
        for from in 0..tasks.len() {
            for to in 0..tasks.len() {
                let id = tasks[from].id.clone();
                let Some(plan) = plan_move(&tasks, &id, to, &policy) else {
                    assert_eq!(from, to);
                    continue;
                };
                let result = apply(&tasks, &plan);
                assert_eq!(result[to], id, "moving {from} -> {to}");

                let others: Vec<_> = result.iter().filter(|x| **x != id).cloned().collect();
                let expected: Vec<_> = tasks
                    .iter()
                    .map(|t| t.id.clone())
                    .filter(|x| *x != id)
                    .collect();
                assert_eq!(others, expected);
            }
        }
    }

    #[test]
    fn same_index_or_unknown_id_is_noop() {
        let tasks = abc();
        assert!(plan_move(&tasks, "B", 1, &OrderPolicy::default()).is_none());
        assert!(plan_move(&tasks, "Z", 0, &OrderPolicy::default()).is_none());
        assert!(plan_move(&tasks, "A", 3, &OrderPolicy::default()).is_none());
    }

    #[test]
    fn zero_first_key_falls_back_to_rebalance() {
        let tasks = vec![task("A", 0.0), task("B", 20.0), task("C", 30.0)];
        let plan = plan_move(&tasks, "C", 0, &OrderPolicy::default()).unwrap();
        assert!(matches!(plan, ReorderPlan::Rebalance(_)));
        assert_eq!(apply(&tasks, &plan), vec!["C", "A", "B"]);
    }

    #[test]
    fn exhausted_gap_falls_back_to_rebalance() {
        let lo = 1.0_f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        let tasks = vec![task("A", lo), task("B", hi), task("C", 30.0)];
        let plan = plan_move(&tasks, "C", 1, &OrderPolicy::default()).unwrap();
        match &plan {
            ReorderPlan::Rebalance(patches) => {
                assert!(patches.iter().any(|p| p.id == "C" && p.order == 2000.0));
            }
            other => panic!("expected rebalance, got {other:?}"),
        }
        assert_eq!(apply(&tasks, &plan), vec!["A", "C", "B"]);
    }

    #[test]
    fn rebalance_skips_tasks_already_in_place() {
        let tasks = vec![task("A", 1000.0), task("B", 5.0)];
        let patches = rebalance(&tasks, 1000.0);
        assert_eq!(
            patches,
            vec![OrderPatch {
                id: "B".into(),
                order: 2000.0
            }]
        );
    }

    #[test]
    fn backfill_preserves_created_at_order() {
        let tasks = vec![legacy("c", 300), legacy("a", 100), legacy("b", 100), task("x", 50.0)];
        let (patched, patches) = backfill(tasks);

        assert_eq!(patches.len(), 3);
        assert!(patched.iter().all(|t| t.order.is_some()));

        let mut sorted = patched.clone();
        sort_tasks(&mut sorted);
        let ids: Vec<_> = sorted.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "a", "b", "c"]);

        let by_id = |id: &str| patches.iter().find(|p| p.id == id).unwrap().order;
        assert_eq!(by_id("a"), 100.0);
        assert_eq!(by_id("b"), 101.0);
        assert_eq!(by_id("c"), 302.0);

        let (_, again) = backfill(patched);
        assert!(again.is_empty());
    }
}
