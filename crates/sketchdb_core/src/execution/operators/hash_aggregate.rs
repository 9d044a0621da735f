use ahash::RandomState;
use hashbrown::HashMap;
use rayon::prelude::*;
use sketchdb_error::{DbError, Result};
use tracing::{debug, trace};

use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::expr::aggregate_expr::AggregateExpr;
use crate::functions::aggregate::AggregationState;

/// State used for hashing group keys.
pub const HASH_RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

/// A single output row of a hash aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// Values of the group by expressions for this group.
    pub keys: Vec<ScalarValue>,
    /// One value per aggregate, in the order the aggregates were provided.
    pub aggregates: Vec<ScalarValue>,
}

/// Groups rows by a set of expressions and computes aggregates per group.
///
/// Input is split into contiguous partitions which are aggregated in
/// parallel. Partial states are then combined in partition order so groups
/// are emitted in the order they were first seen.
#[derive(Debug)]
pub struct HashAggregate {
    group_by: Vec<Expression>,
    aggregates: Vec<AggregateExpr>,
    partitions: usize,
}

impl HashAggregate {
    pub fn new(
        group_by: Vec<Expression>,
        aggregates: Vec<AggregateExpr>,
        config: &ExecutionConfig,
    ) -> Self {
        HashAggregate {
            group_by,
            aggregates,
            partitions: usize::max(config.partitions as usize, 1),
        }
    }

    pub fn aggregates(&self) -> &[AggregateExpr] {
        &self.aggregates
    }

    /// Aggregate all rows.
    ///
    /// Without any group by expressions this always produces exactly one
    /// row, even for empty input.
    pub fn execute(&self, rows: &[Row]) -> Result<Vec<GroupRow>> {
        let chunk_size = usize::max(rows.len().div_ceil(self.partitions), 1);
        debug!(
            rows = rows.len(),
            partitions = self.partitions,
            chunk_size,
            "executing hash aggregate"
        );

        let partials = rows
            .par_chunks(chunk_size)
            .map(|chunk| self.aggregate_partition(chunk))
            .collect::<Result<Vec<_>>>()?;

        let mut table = GroupTable::default();
        for partial in partials {
            trace!(groups = partial.groups.len(), "combining partial aggregate");
            for group in partial.groups {
                table.combine_group(&self.aggregates, group)?;
            }
        }

        if self.group_by.is_empty() && table.groups.is_empty() {
            table.get_or_insert(&self.aggregates, Vec::new())?;
        }

        debug!(groups = table.groups.len(), "finished hash aggregate");

        table
            .groups
            .iter()
            .map(|group| {
                let aggregates = self
                    .aggregates
                    .iter()
                    .zip(&group.states)
                    .map(|(agg, state)| agg.result(state))
                    .collect::<Result<Vec<_>>>()?;

                Ok(GroupRow {
                    keys: group.keys.clone(),
                    aggregates,
                })
            })
            .collect()
    }

    fn aggregate_partition(&self, rows: &[Row]) -> Result<GroupTable> {
        let mut table = GroupTable::default();

        for row in rows {
            let keys = self
                .group_by
                .iter()
                .map(|expr| expr.eval(row))
                .collect::<Result<Vec<_>>>()?;

            let group = table.get_or_insert(&self.aggregates, keys)?;
            for (agg, state) in self.aggregates.iter().zip(&mut group.states) {
                agg.update(row, state)?;
            }
        }

        Ok(table)
    }
}

#[derive(Debug)]
struct Group {
    keys: Vec<ScalarValue>,
    /// Encoded form of `keys`.
    encoded: Vec<u8>,
    states: Vec<AggregationState>,
}

#[derive(Debug)]
struct GroupTable {
    /// Encoded group keys to index in `groups`.
    index: HashMap<Vec<u8>, usize, RandomState>,
    /// Groups in insertion order.
    groups: Vec<Group>,
}

impl Default for GroupTable {
    fn default() -> Self {
        GroupTable {
            index: HashMap::with_hasher(HASH_RANDOM_STATE),
            groups: Vec::new(),
        }
    }
}

impl GroupTable {
    fn get_or_insert(
        &mut self,
        aggregates: &[AggregateExpr],
        keys: Vec<ScalarValue>,
    ) -> Result<&mut Group> {
        let mut encoded = Vec::new();
        encode_group_key(&keys, &mut encoded)?;

        let idx = match self.index.get(&encoded) {
            Some(&idx) => idx,
            None => {
                let states = aggregates
                    .iter()
                    .map(|agg| agg.create())
                    .collect::<Result<Vec<_>>>()?;
                let idx = self.groups.len();
                self.index.insert(encoded.clone(), idx);
                self.groups.push(Group {
                    keys,
                    encoded,
                    states,
                });
                idx
            }
        };

        Ok(&mut self.groups[idx])
    }

    /// Combine a group from another table into this one.
    fn combine_group(&mut self, aggregates: &[AggregateExpr], group: Group) -> Result<()> {
        match self.index.get(&group.encoded) {
            Some(&idx) => {
                let target = &mut self.groups[idx];
                for ((agg, target), source) in aggregates
                    .iter()
                    .zip(&mut target.states)
                    .zip(group.states)
                {
                    agg.combine(target, source)?;
                }
            }
            None => {
                self.index.insert(group.encoded.clone(), self.groups.len());
                self.groups.push(group);
            }
        }
        Ok(())
    }
}

/// Encode group key values into a byte buffer such that two keys produce the
/// same bytes if and only if they're the same group.
fn encode_group_key(values: &[ScalarValue], buf: &mut Vec<u8>) -> Result<()> {
    for value in values {
        encode_value(value, buf)?;
    }
    Ok(())
}

fn encode_value(value: &ScalarValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ScalarValue::Null => buf.push(0),
        ScalarValue::Missing => buf.push(1),
        ScalarValue::Boolean(v) => {
            buf.push(2);
            buf.push(*v as u8);
        }
        // Numerics group by numeric value regardless of width.
        ScalarValue::Int8(_)
        | ScalarValue::Int16(_)
        | ScalarValue::Int32(_)
        | ScalarValue::Int64(_) => {
            buf.push(3);
            buf.extend_from_slice(&value.try_as_i64()?.to_le_bytes());
        }
        ScalarValue::Float32(_) | ScalarValue::Float64(_) => {
            let v = value.try_as_f64()?;
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                buf.push(3);
                buf.extend_from_slice(&(v as i64).to_le_bytes());
            } else {
                // All NaNs are the same group.
                let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
                buf.push(4);
                buf.extend_from_slice(&bits.to_le_bytes());
            }
        }
        ScalarValue::Utf8(v) => {
            buf.push(5);
            encode_len(v.len(), buf)?;
            buf.extend_from_slice(v.as_bytes());
        }
        ScalarValue::Struct(fields) => {
            buf.push(6);
            encode_len(fields.len(), buf)?;
            for (name, value) in fields {
                encode_len(name.len(), buf)?;
                buf.extend_from_slice(name.as_bytes());
                encode_value(value, buf)?;
            }
        }
        ScalarValue::List(values) => {
            buf.push(7);
            encode_len(values.len(), buf)?;
            for value in values {
                encode_value(value, buf)?;
            }
        }
    }
    Ok(())
}

fn encode_len(len: usize, buf: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| DbError::new("Group key value too large").with_field("len", len))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}
