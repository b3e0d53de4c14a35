//! Quadratic node split.

use super::node::{ChildRef, LeafEntry};
use crate::bounding_box::BoundingBox;

/// Anything a node can hold.
pub(crate) trait Bounded {
    fn bbox(&self) -> &BoundingBox;
}

impl Bounded for LeafEntry {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

impl Bounded for ChildRef {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// Splits an overflowing set of items into two groups of at least `min_fill`.
///
/// Seeds are the pair wasting the most area when boxed together. Remaining
/// items are taken in order of strongest preference and join the group whose
/// box grows least (ties: smaller box, then fewer items, then the first group).
/// Once a group needs every remaining item to reach `min_fill`, it gets them.
pub(crate) fn quadratic_split<T: Bounded>(items: Vec<T>, min_fill: usize) -> (Vec<T>, Vec<T>) {
    debug_assert!(items.len() >= 2, "cannot split fewer than two items");
    debug_assert!(items.len() >= 2 * min_fill, "not enough items for two legal groups");

    let (seed_a, seed_b) = pick_seeds(&items);

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut group_a = Vec::with_capacity(slots.len());
    let mut group_b = Vec::with_capacity(slots.len());

    let mut bbox_a = BoundingBox::empty();
    let mut bbox_b = BoundingBox::empty();
    if let Some(item) = slots[seed_a].take() {
        bbox_a = *item.bbox();
        group_a.push(item);
    }
    if let Some(item) = slots[seed_b].take() {
        bbox_b = *item.bbox();
        group_b.push(item);
    }

    let mut remaining: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].is_some()).collect();

    while !remaining.is_empty() {
        if group_a.len() + remaining.len() == min_fill {
            group_a.extend(remaining.drain(..).filter_map(|i| slots[i].take()));
            break;
        }
        if group_b.len() + remaining.len() == min_fill {
            group_b.extend(remaining.drain(..).filter_map(|i| slots[i].take()));
            break;
        }

        let (pos, cost_a, cost_b) = pick_next(&slots, &remaining, &bbox_a, &bbox_b);
        let idx = remaining.remove(pos);
        let Some(item) = slots[idx].take() else {
            continue;
        };

        let to_a = if cost_a != cost_b {
            cost_a < cost_b
        } else if bbox_a.area() != bbox_b.area() {
            bbox_a.area() < bbox_b.area()
        } else {
            group_a.len() <= group_b.len()
        };

        if to_a {
            bbox_a.expand(item.bbox());
            group_a.push(item);
        } else {
            bbox_b.expand(item.bbox());
            group_b.push(item);
        }
    }

    (group_a, group_b)
}

/// The pair whose combined box wastes the most area.
fn pick_seeds<T: Bounded>(items: &[T]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut worst_waste = f64::NEG_INFINITY;

    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let a = items[i].bbox();
            let b = items[j].bbox();
            let waste = a.union(b).area() - a.area() - b.area();
            if waste > worst_waste {
                worst_waste = waste;
                best = (i, j);
            }
        }
    }

    best
}

/// The remaining item with the largest difference in enlargement cost,
/// returned as (position in `remaining`, cost for group A, cost for group B).
fn pick_next<T: Bounded>(
    slots: &[Option<T>],
    remaining: &[usize],
    bbox_a: &BoundingBox,
    bbox_b: &BoundingBox,
) -> (usize, f64, f64) {
    let mut best = (0, 0.0, 0.0);
    let mut best_diff = f64::NEG_INFINITY;

    for (pos, &idx) in remaining.iter().enumerate() {
        if let Some(item) = &slots[idx] {
            let cost_a = bbox_a.enlargement(item.bbox());
            let cost_b = bbox_b.enlargement(item.bbox());
            let diff = (cost_a - cost_b).abs();
            if diff > best_diff {
                best_diff = diff;
                best = (pos, cost_a, cost_b);
            }
        }
    }

    best
}
