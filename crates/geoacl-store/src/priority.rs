//! Priority sequence bookkeeping shared by both stores.
//!
//! Priorities are unique per store. Inserting at an occupied priority pushes
//! the occupant and everything after it down by one, so relative order of the
//! existing rules never changes.
use crate::{StoreError, StoreResult};
use geoacl_authz::{AdminRule, Rule};
use std::collections::BTreeMap;

/// Where a newly created rule lands in the priority sequence.
///
/// The rule's own `priority` field is interpreted according to the position:
/// - `Fixed`: the exact priority to use.
/// - `FromStart`: a 0-based index into the ascending sequence; the new rule
///   takes the priority currently held at that index, or goes last when the
///   index is past the end.
/// - `FromEnd`: a count of rules to stay after the new one; `0` appends, and a
///   count past the start puts the new rule first.
///
/// An empty store resolves both relative positions to priority `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertPosition {
    #[default]
    Fixed,
    FromStart,
    FromEnd,
}

pub(crate) trait Prioritized {
    fn priority(&self) -> i64;
    fn set_priority(&mut self, priority: i64);
}

impl Prioritized for Rule {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn set_priority(&mut self, priority: i64) {
        self.priority = priority;
    }
}

impl Prioritized for AdminRule {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn set_priority(&mut self, priority: i64) {
        self.priority = priority;
    }
}

/// Priority a new entry should take. `requested` must be non-negative.
pub(crate) fn resolve_insert<'a, T, I>(existing: I, requested: i64, position: InsertPosition) -> i64
where
    T: Prioritized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if position == InsertPosition::Fixed {
        return requested;
    }
    let mut priorities: Vec<i64> = existing.into_iter().map(|entry| entry.priority()).collect();
    priorities.sort_unstable();
    let (Some(first), Some(last)) = (priorities.first(), priorities.last()) else {
        return 0;
    };
    let after_last = last.saturating_add(1);
    let offset = usize::try_from(requested).unwrap_or(usize::MAX);
    match position {
        InsertPosition::Fixed => requested,
        InsertPosition::FromStart => priorities.get(offset).copied().unwrap_or(after_last),
        InsertPosition::FromEnd => {
            if offset == 0 {
                after_last
            } else if offset >= priorities.len() {
                *first
            } else {
                priorities[priorities.len() - offset]
            }
        }
    }
}

/// Frees `target` by shifting it and every later entry down by one.
///
/// `exclude` names an entry that is about to be moved onto `target` and must
/// not count as its occupant. Returns how many entries moved.
pub(crate) fn make_room<K, T>(
    entries: &mut BTreeMap<K, T>,
    target: i64,
    exclude: Option<K>,
) -> StoreResult<usize>
where
    K: Ord + Copy,
    T: Prioritized,
{
    let occupied = entries
        .iter()
        .any(|(key, entry)| Some(*key) != exclude && entry.priority() == target);
    if !occupied {
        return Ok(0);
    }
    Ok(shift_entries(entries, target, 1, exclude)?.len())
}

/// Adds `offset` to every entry at or after `start`; returns the moved keys.
pub(crate) fn shift_from<K, T>(
    entries: &mut BTreeMap<K, T>,
    start: i64,
    offset: i64,
) -> StoreResult<Vec<K>>
where
    K: Ord + Copy,
    T: Prioritized,
{
    shift_entries(entries, start, offset, None)
}

/// Nothing moves unless every shifted priority fits in an `i64`.
fn shift_entries<K, T>(
    entries: &mut BTreeMap<K, T>,
    start: i64,
    offset: i64,
    exclude: Option<K>,
) -> StoreResult<Vec<K>>
where
    K: Ord + Copy,
    T: Prioritized,
{
    let affected = |key: &K, entry: &T| Some(*key) != exclude && entry.priority() >= start;
    let mut shifted = Vec::new();
    for (key, entry) in entries.iter() {
        if !affected(key, entry) {
            continue;
        }
        let priority = entry.priority().checked_add(offset).ok_or_else(|| {
            StoreError::Validation(format!(
                "shifting priority {} by {offset} overflows",
                entry.priority()
            ))
        })?;
        shifted.push((*key, priority));
    }
    let mut moved = Vec::with_capacity(shifted.len());
    for (key, priority) in shifted {
        if let Some(entry) = entries.get_mut(&key) {
            entry.set_priority(priority);
            moved.push(key);
        }
    }
    Ok(moved)
}

/// Entries sharing `priority`, in key order.
pub(crate) fn at_priority<K, T>(entries: &BTreeMap<K, T>, priority: i64) -> Vec<&T>
where
    T: Prioritized,
{
    entries
        .values()
        .filter(|entry| entry.priority() == priority)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(priorities: &[i64]) -> BTreeMap<u64, Rule> {
        priorities
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx as u64, Rule::allow().with_priority(*p)))
            .collect()
    }

    fn sorted(entries: &BTreeMap<u64, Rule>) -> Vec<i64> {
        let mut out: Vec<i64> = entries.values().map(|r| r.priority).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn fixed_uses_requested_priority() {
        let t = table(&[10, 20]);
        assert_eq!(resolve_insert(t.values(), 15, InsertPosition::Fixed), 15);
    }

    #[test]
    fn from_start_takes_indexed_slot() {
        let t = table(&[10, 20, 30]);
        assert_eq!(resolve_insert(t.values(), 0, InsertPosition::FromStart), 10);
        assert_eq!(resolve_insert(t.values(), 2, InsertPosition::FromStart), 30);
        assert_eq!(resolve_insert(t.values(), 3, InsertPosition::FromStart), 31);
    }

    #[test]
    fn from_end_counts_backwards() {
        let t = table(&[10, 20, 30]);
        assert_eq!(resolve_insert(t.values(), 0, InsertPosition::FromEnd), 31);
        assert_eq!(resolve_insert(t.values(), 1, InsertPosition::FromEnd), 30);
        assert_eq!(resolve_insert(t.values(), 3, InsertPosition::FromEnd), 10);
        assert_eq!(resolve_insert(t.values(), 9, InsertPosition::FromEnd), 10);
    }

    #[test]
    fn relative_positions_on_empty_store() {
        let t = table(&[]);
        assert_eq!(resolve_insert(t.values(), 5, InsertPosition::FromStart), 0);
        assert_eq!(resolve_insert(t.values(), 5, InsertPosition::FromEnd), 0);
    }

    #[test]
    fn make_room_shifts_only_when_occupied() {
        let mut t = table(&[1, 2, 5]);
        assert_eq!(make_room(&mut t, 3, None), Ok(0));
        assert_eq!(sorted(&t), vec![1, 2, 5]);

        assert_eq!(make_room(&mut t, 2, None), Ok(2));
        assert_eq!(sorted(&t), vec![1, 3, 6]);
    }

    #[test]
    fn make_room_ignores_excluded_occupant() {
        let mut t = table(&[1, 2]);
        assert_eq!(make_room(&mut t, 2, Some(1)), Ok(0));
        assert_eq!(make_room(&mut t, 2, Some(0)), Ok(1));
    }

    #[test]
    fn shift_reports_moved_keys() {
        let mut t = table(&[1, 5, 9]);
        assert_eq!(shift_from(&mut t, 5, 10), Ok(vec![1, 2]));
        assert_eq!(sorted(&t), vec![1, 15, 19]);
        assert_eq!(shift_from(&mut t, 100, 1), Ok(vec![]));
        assert_eq!(at_priority(&t, 15).len(), 1);
    }

    #[test]
    fn overflowing_shift_moves_nothing() {
        let mut t = table(&[1, 2]);
        assert!(matches!(
            shift_from(&mut t, 0, i64::MAX),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(sorted(&t), vec![1, 2]);

        let mut t = table(&[5, i64::MAX]);
        assert!(matches!(
            make_room(&mut t, 5, None),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(sorted(&t), vec![5, i64::MAX]);
    }

    #[test]
    fn excluded_entry_never_overflows() {
        let mut t = table(&[3, i64::MAX]);
        assert_eq!(make_room(&mut t, 3, Some(1)), Ok(1));
        assert_eq!(sorted(&t), vec![4, i64::MAX]);
    }
}
