//! Query execution, the second pass.
//!
//! WHERE is evaluated into a [`ResultSet`] of record positions, so AND, OR
//! and NOT become intersection, union and complement. TRANSFORMATIONS then
//! group and aggregate the matching records, and OPTIONS projects and orders
//! what is left. The record store is only ever read.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

// used for internal result sets
use roaring::RoaringTreemap;
use tracing::debug;

use crate::error::{InsightError, Result};
use crate::query::{ApplyRule, ApplyToken, Direction, Filter, Options, Order, Transformations, ValidatedQuery};
use crate::store::{Dataset, RecordStore};
use crate::value::{Decimal, FieldHasher, Record, ResultRow, Value};

/// The largest number of records a query may produce.
pub const DEFAULT_RESULT_CAP: usize = 5000;

// separates group values in composite keys so ("ab", "c") and ("a", "bc") differ
const GROUP_KEY_SEPARATOR: char = '\u{1f}';

// ------------- ResultSet -------------
/// Positions of matching records within one dataset, iterated in dataset order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    positions: RoaringTreemap,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }
    /// Every position of a dataset holding `len` records.
    pub fn full(len: usize) -> Self {
        let mut positions = RoaringTreemap::new();
        positions.insert_range(0..len as u64);
        Self { positions }
    }
    pub fn push(&mut self, position: usize) {
        self.positions.insert(position as u64);
    }
    pub fn intersect_with(&mut self, other: &ResultSet) {
        self.positions &= &other.positions;
    }
    pub fn union_with(&mut self, other: &ResultSet) {
        self.positions |= &other.positions;
    }
    /// The positions of a dataset holding `len` records that are not in this set.
    pub fn complement(&self, len: usize) -> ResultSet {
        let mut complement = ResultSet::full(len);
        complement.positions -= &self.positions;
        complement
    }
    pub fn contains(&self, position: usize) -> bool {
        self.positions.contains(position as u64)
    }
    pub fn len(&self) -> usize {
        self.positions.len() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().map(|position| position as usize)
    }
}

impl FromIterator<usize> for ResultSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = ResultSet::new();
        for position in iter {
            set.push(position);
        }
        set
    }
}

// ------------- QueryExecutor -------------
pub struct QueryExecutor<'s> {
    store: &'s RecordStore,
    cap: usize,
}

impl<'s> QueryExecutor<'s> {
    pub fn new(store: &'s RecordStore) -> Self {
        Self {
            store,
            cap: DEFAULT_RESULT_CAP,
        }
    }
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }
    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn execute(&self, validated: &ValidatedQuery) -> Result<Vec<ResultRow>> {
        // the dataset may have been removed since validation
        let dataset = self
            .store
            .get(&validated.dataset)
            .filter(|dataset| dataset.kind() == validated.kind)
            .ok_or_else(|| {
                InsightError::invalid_query(format!("dataset '{}' is no longer loaded", validated.dataset))
            })?;
        let query = &validated.query;

        let matching = self.find_matching_where(&dataset, query.filter.as_ref());
        debug!(dataset = dataset.id(), matched = matching.len(), "WHERE evaluated");

        let candidates: Vec<Cow<'_, Record>> = match &query.transformations {
            Some(transformations) => self
                .find_transformations(&dataset, &matching, transformations)?
                .into_iter()
                .map(Cow::Owned)
                .collect(),
            None => matching
                .iter()
                .filter_map(|position| dataset.record(position))
                .map(Cow::Borrowed)
                .collect(),
        };

        if candidates.len() > self.cap {
            return Err(InsightError::ResultTooLarge {
                count: candidates.len(),
                cap: self.cap,
            });
        }
        self.find_matching_options(&query.options, &candidates)
    }

    // ------------- WHERE -------------
    pub fn find_matching_where(&self, dataset: &Dataset, filter: Option<&Filter>) -> ResultSet {
        match filter {
            Some(filter) => self.find_matching_filter(dataset, filter),
            None => ResultSet::full(dataset.len()),
        }
    }

    fn find_matching_filter(&self, dataset: &Dataset, filter: &Filter) -> ResultSet {
        match filter {
            Filter::And(children) => {
                let mut children = children.iter();
                let mut result = match children.next() {
                    Some(first) => self.find_matching_filter(dataset, first),
                    None => ResultSet::full(dataset.len()),
                };
                for child in children {
                    if result.is_empty() {
                        break;
                    }
                    result.intersect_with(&self.find_matching_filter(dataset, child));
                }
                result
            }
            Filter::Or(children) => {
                let mut result = ResultSet::new();
                for child in children {
                    result.union_with(&self.find_matching_filter(dataset, child));
                }
                result
            }
            Filter::Not(child) => self.find_matching_filter(dataset, child).complement(dataset.len()),
            Filter::Gt(c) => scan(dataset, |record| number(record, &c.key).is_some_and(|n| n > c.value)),
            Filter::Lt(c) => scan(dataset, |record| number(record, &c.key).is_some_and(|n| n < c.value)),
            Filter::Eq(c) => scan(dataset, |record| number(record, &c.key).is_some_and(|n| n == c.value)),
            Filter::Is(m) => scan(dataset, |record| {
                record
                    .get(&m.key)
                    .and_then(Value::as_text)
                    .is_some_and(|s| m.pattern.matches(s))
            }),
        }
    }

    // ------------- TRANSFORMATIONS -------------
    /// Groups the matching records by their GROUP values, in order of first
    /// appearance, and emits one record per group.
    pub fn find_transformations(
        &self,
        dataset: &Dataset,
        matching: &ResultSet,
        transformations: &Transformations,
    ) -> Result<Vec<Record>> {
        let mut index: HashMap<String, usize, FieldHasher> = HashMap::default();
        let mut groups: Vec<Vec<&Record>> = Vec::new();
        for position in matching.iter() {
            let record = dataset.record(position).ok_or_else(|| {
                InsightError::invalid_query(format!("record {} vanished from '{}'", position, dataset.id()))
            })?;
            match index.entry(group_key(record, &transformations.group)?) {
                Entry::Occupied(e) => groups[*e.get()].push(record),
                Entry::Vacant(e) => {
                    e.insert(groups.len());
                    groups.push(vec![record]);
                }
            }
        }
        debug!(dataset = dataset.id(), groups = groups.len(), "records grouped");
        groups
            .iter()
            .map(|members| summarize(members, transformations))
            .collect()
    }

    // ------------- OPTIONS -------------
    /// Projects every candidate onto COLUMNS, then applies ORDER.
    pub fn find_matching_options(&self, options: &Options, candidates: &[Cow<'_, Record>]) -> Result<Vec<ResultRow>> {
        let mut rows = candidates
            .iter()
            .map(|record| project(record, &options.columns))
            .collect::<Result<Vec<_>>>()?;
        if let Some(order) = &options.order {
            let (direction, keys) = match order {
                Order::Key(key) => (Direction::Up, std::slice::from_ref(key)),
                Order::Keys { direction, keys } => (*direction, keys.as_slice()),
            };
            let indices = keys
                .iter()
                .map(|key| {
                    options.columns.iter().position(|column| column == key).ok_or_else(|| {
                        InsightError::invalid_query(format!("ORDER key '{}' is not in COLUMNS", key))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            // sort_by is stable, equal rows keep their relative order
            rows.sort_by(|a, b| {
                let ordering = compare_rows(a, b, &indices);
                match direction {
                    Direction::Up => ordering,
                    Direction::Down => ordering.reverse(),
                }
            });
        }
        Ok(rows)
    }
}

fn scan(dataset: &Dataset, predicate: impl Fn(&Record) -> bool) -> ResultSet {
    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| predicate(*record))
        .map(|(position, _)| position)
        .collect()
}

fn number(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_number)
}

fn group_key(record: &Record, group: &[String]) -> Result<String> {
    let mut key = String::new();
    for (i, field) in group.iter().enumerate() {
        let value = record
            .get(field)
            .ok_or_else(|| InsightError::invalid_query(format!("record has no '{}' to group by", field)))?;
        if i > 0 {
            key.push(GROUP_KEY_SEPARATOR);
        }
        key += &value.to_string();
    }
    Ok(key)
}

fn summarize(members: &[&Record], transformations: &Transformations) -> Result<Record> {
    let mut summary = Record::default();
    // GROUP values are equal across the group, any member represents it
    if let Some(representative) = members.first() {
        for field in &transformations.group {
            if let Some(value) = representative.get(field) {
                summary.insert(field.clone(), value.clone());
            }
        }
    }
    for rule in &transformations.apply {
        summary.insert(rule.name.clone(), Value::Number(aggregate(members, rule)?));
    }
    Ok(summary)
}

fn aggregate(members: &[&Record], rule: &ApplyRule) -> Result<f64> {
    if rule.token == ApplyToken::Count {
        return Ok(members.len() as f64);
    }
    let numbers = members
        .iter()
        .map(|record| {
            number(record, &rule.key).ok_or_else(|| {
                InsightError::invalid_query(format!("{} needs a number in '{}'", rule.token, rule.key))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    let value = match rule.token {
        ApplyToken::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ApplyToken::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        ApplyToken::Sum => decimal_to_f64(decimal_sum(&numbers)?.round_to(2))?,
        ApplyToken::Avg => {
            let mean = decimal_sum(&numbers)? / Decimal::from_count(numbers.len().max(1));
            decimal_to_f64(mean.round_to(2))?
        }
        ApplyToken::Count => members.len() as f64,
    };
    Ok(value)
}

fn decimal_sum(numbers: &[f64]) -> Result<Decimal> {
    numbers.iter().try_fold(Decimal::default(), |sum, n| {
        Decimal::from_f64(*n)
            .map(|n| sum + n)
            .ok_or_else(|| InsightError::invalid_query(format!("cannot accumulate {}", n)))
    })
}

fn decimal_to_f64(decimal: Decimal) -> Result<f64> {
    decimal
        .to_f64()
        .ok_or_else(|| InsightError::invalid_query(format!("cannot represent {} as a number", decimal)))
}

fn project(record: &Record, columns: &[String]) -> Result<ResultRow> {
    let mut row = ResultRow::new();
    for column in columns {
        let value = record
            .get(column)
            .ok_or_else(|| InsightError::invalid_query(format!("record has no '{}' to project", column)))?;
        row.push(column.clone(), value.clone());
    }
    Ok(row)
}

fn compare_rows(a: &ResultRow, b: &ResultRow, indices: &[usize]) -> Ordering {
    for &i in indices {
        let ordering = match (a.columns().get(i), b.columns().get(i)) {
            (Some((_, x)), Some((_, y))) => x.compare(y),
            _ => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_with_empty_set_is_empty() {
        let mut left: ResultSet = [0, 1, 2].into_iter().collect();
        left.intersect_with(&ResultSet::new());
        assert!(left.is_empty());
    }

    #[test]
    fn union_collapses_duplicates() {
        let mut left: ResultSet = [0, 2].into_iter().collect();
        let right: ResultSet = [2, 3].into_iter().collect();
        left.union_with(&right);
        assert_eq!(left.iter().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn complement_is_relative_to_dataset_length() {
        let set: ResultSet = [1, 3].into_iter().collect();
        assert_eq!(set.complement(5).iter().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(ResultSet::new().complement(0).len(), 0);
    }

    #[test]
    fn full_set_covers_every_position() {
        let full = ResultSet::full(4);
        assert_eq!(full.len(), 4);
        assert!(full.contains(3));
        assert!(!full.contains(4));
    }
}
