//! Grouping primitives shared by the sales rules.
//!
//! Groups are kept in a `BTreeMap`, so every rule sees its groups in
//! ascending key order and tie lists come out in that same order.

use crate::dataset::SalesRecord;
use std::collections::BTreeMap;

/// Running sum and row count for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupStats {
    pub sum: f64,
    pub count: usize,
}

impl GroupStats {
    /// Unknown (NaN) values count towards neither the sum nor the count.
    fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.sum += value;
        self.count += 1;
    }

    /// NaN for a group without any known value.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Group `rows` by `key`, accumulating `value` per group.
///
/// Rows whose key is missing do not form a group.
pub fn group_by<'a, K, V>(
    rows: impl IntoIterator<Item = &'a SalesRecord>,
    key: K,
    value: V,
) -> BTreeMap<&'a str, GroupStats>
where
    K: Fn(&'a SalesRecord) -> Option<&'a str>,
    V: Fn(&SalesRecord) -> f64,
{
    let mut groups: BTreeMap<&'a str, GroupStats> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(value(row));
        }
    }
    groups
}

/// First key holding the maximum value. Later equal values do not replace it.
pub fn first_max<'a, T>(values: impl IntoIterator<Item = (&'a str, T)>) -> Option<(&'a str, T)>
where
    T: PartialOrd + Copy,
{
    let mut best: Option<(&'a str, T)> = None;
    for (key, value) in values {
        // unordered values (NaN) never win
        if value.partial_cmp(&value).is_none() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((key, value)),
        }
    }
    best
}

/// Every key whose value equals the maximum, in iteration order.
pub fn all_max<'a, T>(values: impl IntoIterator<Item = (&'a str, T)>) -> Vec<&'a str>
where
    T: PartialOrd + Copy,
{
    let values: Vec<(&'a str, T)> = values.into_iter().collect();
    let Some((_, max)) = first_max(values.iter().copied()) else {
        return Vec::new();
    };

    values
        .into_iter()
        .filter(|(_, value)| *value == max)
        .map(|(key, _)| key)
        .collect()
}
