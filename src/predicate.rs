// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Tuple-domain predicates for pruning stripes and row groups using column statistics.
//!
//! A [`TupleDomain`] is a conjunction of per-column [`Domain`]s. Given a set of
//! [`ColumnStatistics`], the predicate decides whether a block (stripe or row
//! group) *might* contain a matching row. A `false` result is a proof that no
//! row in the block can match; `true` means "maybe" and the block must still
//! be scanned. This makes the engine sound (no false rejections) but not
//! necessarily complete (it may keep blocks that don't actually match).

use std::collections::HashMap;
use std::ops::Bound;

use crate::statistics::{ColumnStatistics, TypeStatistics};

/// One side of a range: inclusive/exclusive/unbounded, ordered so that
/// `Bound::Unbounded` on the low side means -infinity and on the high side
/// means +infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub low: Bound<Value>,
    pub high: Bound<Value>,
}

impl Range {
    pub fn all() -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Unbounded,
        }
    }

    pub fn equal(value: Value) -> Self {
        Self {
            low: Bound::Included(value.clone()),
            high: Bound::Included(value),
        }
    }

    /// Whether this range has any overlap with `other`. Comparisons are only
    /// defined between values of the same variant; mismatched variants are
    /// treated as non-overlapping (never used to reject, since the caller
    /// only builds ranges from a column's own statistics type).
    fn overlaps(&self, other: &Range) -> bool {
        let low_ok = match (&self.high, &other.low) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Included(a), Bound::Included(b)) => a >= b,
            (Bound::Included(a), Bound::Excluded(b)) => a > b,
            (Bound::Excluded(a), Bound::Included(b)) => a > b,
            (Bound::Excluded(a), Bound::Excluded(b)) => a > b,
        };
        let high_ok = match (&other.high, &self.low) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Included(a), Bound::Included(b)) => a >= b,
            (Bound::Included(a), Bound::Excluded(b)) => a > b,
            (Bound::Excluded(a), Bound::Included(b)) => a > b,
            (Bound::Excluded(a), Bound::Excluded(b)) => a > b,
        };
        low_ok && high_ok
    }
}

/// A scalar value bound, covering the families of column statistics the
/// reader understands. Ordering between different variants is not
/// meaningful; [`Domain::intersects`] only ever compares values produced
/// from the same column's statistics.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Integer(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Date(i32),
    TimestampUtcMillis(i64),
}

/// The set of values a column is allowed to take under a predicate: a union
/// of [`Range`]s, plus whether `NULL` satisfies the predicate.
#[derive(Debug, Clone)]
pub struct Domain {
    ranges: Vec<Range>,
    null_allowed: bool,
}

impl Domain {
    pub fn new(ranges: Vec<Range>, null_allowed: bool) -> Self {
        Self {
            ranges,
            null_allowed,
        }
    }

    pub fn equal(value: Value) -> Self {
        Self {
            ranges: vec![Range::equal(value)],
            null_allowed: false,
        }
    }

    pub fn is_null() -> Self {
        Self {
            ranges: vec![],
            null_allowed: true,
        }
    }

    fn all() -> Self {
        Self {
            ranges: vec![Range::all()],
            null_allowed: true,
        }
    }

    /// True if this domain has any overlap with `stats_domain`, i.e. there
    /// could exist a row satisfying both.
    fn intersects(&self, stats_domain: &Domain) -> bool {
        if self.null_allowed && stats_domain.null_allowed {
            return true;
        }
        self.ranges
            .iter()
            .any(|a| stats_domain.ranges.iter().any(|b| a.overlaps(b)))
    }
}

/// A conjunction of per-column domains: `AND` of `column IN domain`.
/// Columns absent from the map are unconstrained ("any value").
#[derive(Debug, Clone, Default)]
pub struct TupleDomain {
    domains: HashMap<u32, Domain>,
}

impl TupleDomain {
    pub fn all() -> Self {
        Self {
            domains: HashMap::new(),
        }
    }

    pub fn new(domains: HashMap<u32, Domain>) -> Self {
        Self { domains }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Returns `false` only if this predicate can *prove* that no row of a
    /// block with these statistics can match. Returns `true` ("maybe
    /// matches") when any constrained column either has no statistics, is
    /// not present in the predicate, or whose statistics domain overlaps the
    /// predicate's domain.
    pub fn may_match(&self, stats: &HashMap<u32, ColumnStatistics>) -> bool {
        for (column_id, domain) in &self.domains {
            let Some(column_stats) = stats.get(column_id) else {
                // No statistics at all for this column: treat as "any value".
                continue;
            };
            let stats_domain = domain_from_statistics(column_stats);
            if !domain.intersects(&stats_domain) {
                return false;
            }
        }
        true
    }
}

/// Builds the domain implied by a column's statistics: `[min, max]` plus
/// "null allowed" from the null count. Absent type statistics (e.g. all
/// values null, or a type with no recorded stats) widen to "any value"
/// rather than narrowing, keeping the engine sound.
fn domain_from_statistics(stats: &ColumnStatistics) -> Domain {
    let null_allowed = stats.has_null();
    let Some(type_stats) = stats.type_statistics() else {
        return Domain {
            ranges: Domain::all().ranges,
            null_allowed,
        };
    };
    let range = match type_stats {
        TypeStatistics::Integer { min, max, .. } => Some(Range {
            low: Bound::Included(Value::Integer(*min)),
            high: Bound::Included(Value::Integer(*max)),
        }),
        TypeStatistics::Double { min, max, .. } => Some(Range {
            low: Bound::Included(Value::Double(*min)),
            high: Bound::Included(Value::Double(*max)),
        }),
        TypeStatistics::String { min, max, .. } => Some(Range {
            low: Bound::Included(Value::String(min.clone())),
            high: Bound::Included(Value::String(max.clone())),
        }),
        TypeStatistics::Bucket { true_count } => {
            // Bucket stats only carry a true-count, not a false-count: if
            // there's at least one true we must allow true, and we can
            // never disprove the presence of false from this alone.
            let low = if *true_count > 0 {
                Value::Boolean(false)
            } else {
                Value::Boolean(true)
            };
            Some(Range {
                low: Bound::Included(low),
                high: Bound::Included(Value::Boolean(true)),
            })
        }
        TypeStatistics::Date { min, max } => Some(Range {
            low: Bound::Included(Value::Date(*min)),
            high: Bound::Included(Value::Date(*max)),
        }),
        TypeStatistics::Timestamp {
            min_utc, max_utc, ..
        } => Some(Range {
            low: Bound::Included(Value::TimestampUtcMillis(*min_utc)),
            high: Bound::Included(Value::TimestampUtcMillis(*max_utc)),
        }),
        // Decimal, Binary and Collection statistics carry no orderable
        // min/max the predicate engine understands: widen to "any value".
        TypeStatistics::Decimal { .. }
        | TypeStatistics::Binary { .. }
        | TypeStatistics::Collection { .. } => None,
    };
    match range {
        Some(range) => Domain {
            ranges: vec![range],
            null_allowed,
        },
        None => Domain {
            ranges: Domain::all().ranges,
            null_allowed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_predicate_matches_everything() {
        let predicate = TupleDomain::all();
        assert!(predicate.may_match(&HashMap::new()));
    }

    #[test]
    fn range_overlap() {
        let a = Range {
            low: Bound::Included(Value::Integer(10)),
            high: Bound::Included(Value::Integer(20)),
        };
        let b = Range {
            low: Bound::Included(Value::Integer(5)),
            high: Bound::Included(Value::Integer(5)),
        };
        assert!(!a.overlaps(&b));

        let c = Range {
            low: Bound::Included(Value::Integer(15)),
            high: Bound::Included(Value::Integer(15)),
        };
        assert!(a.overlaps(&c));
    }

    #[test]
    fn domain_equal_does_not_intersect_disjoint_range() {
        let predicate_domain = Domain::equal(Value::Integer(5));
        let stats_domain = Domain {
            ranges: vec![Range {
                low: Bound::Included(Value::Integer(10)),
                high: Bound::Included(Value::Integer(20)),
            }],
            null_allowed: false,
        };
        assert!(!predicate_domain.intersects(&stats_domain));
    }

    #[test]
    fn unknown_column_in_predicate_is_ignored() {
        let mut domains = HashMap::new();
        domains.insert(99, Domain::equal(Value::Integer(5)));
        let predicate = TupleDomain::new(domains);
        // No statistics recorded for column 99 at all: must not reject.
        assert!(predicate.may_match(&HashMap::new()));
    }

    #[test]
    fn stripe_rejected_when_stats_outside_predicate_range() {
        // Scenario: predicate col=5, stripe integer stats [10, 20].
        let mut domains = HashMap::new();
        domains.insert(0, Domain::equal(Value::Integer(5)));
        let predicate = TupleDomain::new(domains);

        let mut stats = HashMap::new();
        stats.insert(
            0,
            ColumnStatistics::new(
                100,
                false,
                Some(TypeStatistics::Integer {
                    min: 10,
                    max: 20,
                    sum: Some(1500),
                }),
            ),
        );
        assert!(!predicate.may_match(&stats));
    }

    #[test]
    fn stripe_kept_when_stats_overlap_predicate_range() {
        let mut domains = HashMap::new();
        domains.insert(0, Domain::equal(Value::Integer(15)));
        let predicate = TupleDomain::new(domains);

        let mut stats = HashMap::new();
        stats.insert(
            0,
            ColumnStatistics::new(
                100,
                false,
                Some(TypeStatistics::Integer {
                    min: 10,
                    max: 20,
                    sum: Some(1500),
                }),
            ),
        );
        assert!(predicate.may_match(&stats));
    }

    #[test]
    fn absent_statistics_never_rejects() {
        let mut domains = HashMap::new();
        domains.insert(0, Domain::equal(Value::Integer(5)));
        let predicate = TupleDomain::new(domains);

        let mut stats = HashMap::new();
        stats.insert(0, ColumnStatistics::new(0, true, None));
        assert!(predicate.may_match(&stats));
    }
}
