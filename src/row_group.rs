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

//! Row-group indexes: per-stride statistics and stream seek positions,
//! used to prune row groups within a stripe that already survived
//! per-stripe pruning.

use std::collections::HashMap;

use prost::Message;
use snafu::ResultExt;

use crate::error::{self, Result};
use crate::predicate::TupleDomain;
use crate::proto;
use crate::statistics::ColumnStatistics;

/// One row group's worth of bookkeeping for a single column: the decoder
/// seek position for every stream that column reads, plus this row
/// group's statistics (absent for DWRF, where stride statistics are not
/// recorded at all).
#[derive(Debug, Clone)]
pub struct RowGroupIndexEntry {
    /// Per-stream seek position vector, in stripe stream declaration order.
    /// Each inner vector is `(compressed_offset, uncompressed_offset, ..decoder-internal offsets)`.
    positions: Vec<u64>,
    statistics: Option<ColumnStatistics>,
}

impl RowGroupIndexEntry {
    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    pub fn statistics(&self) -> Option<&ColumnStatistics> {
        self.statistics.as_ref()
    }
}

/// The decoded `ROW_INDEX` stream for one column: one entry per stride.
#[derive(Debug, Clone, Default)]
pub struct RowGroupIndex {
    entries: Vec<RowGroupIndexEntry>,
}

impl RowGroupIndex {
    pub fn entries(&self) -> &[RowGroupIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn parse_row_index(bytes: &[u8]) -> Result<RowGroupIndex> {
    let proto_index = proto::RowIndex::decode(bytes).context(error::DecodeProtoSnafu)?;
    let entries = proto_index
        .entry
        .iter()
        .map(|entry| {
            let statistics = entry
                .statistics
                .as_ref()
                .map(ColumnStatistics::try_from)
                .transpose()?;
            Ok(RowGroupIndexEntry {
                positions: entry.positions.clone(),
                statistics,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RowGroupIndex { entries })
}

/// Decides, for every row-group index in a stripe, whether it may contain
/// a matching row. `indexes` maps column id to that column's parsed row
/// index; columns absent from the map (e.g. composite columns with no
/// own statistics) do not constrain any row group.
///
/// Mirrors [`TupleDomain::may_match`] but per-stride rather than
/// per-stripe: a row group is kept unless some constrained column's
/// statistics at that stride prove the predicate can't be satisfied.
pub fn surviving_row_groups(
    predicate: &TupleDomain,
    indexes: &HashMap<u32, RowGroupIndex>,
    stride_count: usize,
) -> Vec<bool> {
    let mut keep = vec![true; stride_count];
    if predicate.is_empty() {
        return keep;
    }
    for (column_id, index) in indexes {
        for (i, entry) in index.entries().iter().enumerate().take(stride_count) {
            if !keep[i] {
                continue;
            }
            let Some(stats) = entry.statistics() else {
                // No stride statistics recorded for this column (always the
                // case for DWRF): never used to reject.
                continue;
            };
            let mut single = HashMap::with_capacity(1);
            single.insert(*column_id, stats.clone());
            if !predicate.may_match(&single) {
                keep[i] = false;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Domain, Value};
    use crate::statistics::TypeStatistics;

    #[test]
    fn row_group_with_matching_range_kept_others_dropped() {
        let mut domains = HashMap::new();
        domains.insert(0, Domain::equal(Value::Integer(5)));
        let predicate = TupleDomain::new(domains);

        let entries = vec![
            RowGroupIndexEntry {
                positions: vec![],
                statistics: Some(ColumnStatistics::new(
                    100,
                    false,
                    Some(TypeStatistics::Integer {
                        min: 10,
                        max: 20,
                        sum: None,
                    }),
                )),
            },
            RowGroupIndexEntry {
                positions: vec![],
                statistics: Some(ColumnStatistics::new(
                    100,
                    false,
                    Some(TypeStatistics::Integer {
                        min: 0,
                        max: 5,
                        sum: None,
                    }),
                )),
            },
        ];
        let mut indexes = HashMap::new();
        indexes.insert(0, RowGroupIndex { entries });

        let keep = surviving_row_groups(&predicate, &indexes, 2);
        assert_eq!(keep, vec![false, true]);
    }

    #[test]
    fn empty_predicate_keeps_everything() {
        let predicate = TupleDomain::all();
        let indexes = HashMap::new();
        let keep = surviving_row_groups(&predicate, &indexes, 3);
        assert_eq!(keep, vec![true, true, true]);
    }
}
