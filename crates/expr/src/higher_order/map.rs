use std::cmp::Ordering;

use indexmap::IndexMap;

use ketchsql_common::types::coercion::cmp_values;
use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result, Row};

use crate::expr::Expr;

use super::{
    bound_lambda, check_boolean_body, map_entry_types, predicate_matches, take_lambda,
    HigherOrderFunction, LambdaBinder, TypeCheckResult,
};

/// Upper bound on the distinct-key count a zipped map may reach.
pub const MAX_MAP_KEYS: usize = i32::MAX as usize - 15;

/// `map_filter(map, (k, v) -> pred)`: keeps the entries the predicate
/// accepts, in map order. Duplicate keys pass through untouched; this
/// operator never constructs new keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFilter {
    argument: Box<Expr>,
    function: Box<Expr>,
}

impl MapFilter {
    pub fn new(argument: Expr, function: Expr) -> Self {
        Self {
            argument: Box::new(argument),
            function: Box::new(function),
        }
    }

    pub fn argument(&self) -> &Expr {
        &self.argument
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: Box::new(f(*self.argument)?),
            function: self.function,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: self.argument,
            function: Box::new(f(*self.function)?),
        })
    }
}

impl HigherOrderFunction for MapFilter {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.argument]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.function]
    }

    fn data_type(&self) -> DataType {
        self.argument.data_type()
    }

    fn nullable(&self) -> bool {
        self.argument.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (key, value, value_contains_null) = map_entry_types(&self.argument, 0)?;
        let lambda = take_lambda(*self.function, 1)?;
        // Keys are never null inside a map.
        let bound = binder(lambda, &[(key, false), (value, value_contains_null)])?;
        Ok(Self {
            argument: self.argument,
            function: Box::new(Expr::Lambda(bound)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        match self.argument.data_type() {
            DataType::Map { .. } => check_boolean_body(&self.function),
            other => TypeCheckResult::Failure(Error::argument_type_mismatch(
                0,
                "MAP",
                other.to_string(),
            )),
        }
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let lambda = bound_lambda(&self.function, "map_filter")?;
        let value = self.argument.eval(row)?;
        let Some(map) = value.as_map() else {
            return Ok(Value::Null);
        };
        let [key_var, value_var] = lambda.params() else {
            return Err(Error::internal("map_filter lambda takes two arguments"));
        };
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for (k, v) in map.entries() {
            key_var.set(k.clone());
            value_var.set(v.clone());
            if predicate_matches(lambda, row)? {
                keys.push(k.clone());
                values.push(v.clone());
            }
        }
        Ok(Value::map(keys, values))
    }
}

/// `map_zip_with(map1, map2, (k, v1, v2) -> ...)`: merges two maps over
/// the union of their keys. Keys appear in left-then-right insertion
/// order; on each side only the first occurrence of a duplicated key
/// contributes. A key absent from one side presents null to that side's
/// value parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct MapZipWith {
    left: Box<Expr>,
    right: Box<Expr>,
    function: Box<Expr>,
}

impl MapZipWith {
    pub fn new(left: Expr, right: Expr, function: Expr) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            function: Box::new(function),
        }
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> &Expr {
        &self.right
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    fn common_key_type(&self) -> Option<DataType> {
        match (self.left.data_type(), self.right.data_type()) {
            (DataType::Map { key: left, .. }, DataType::Map { key: right, .. }) => {
                left.merge_relaxing_null_flags(&right)
            }
            _ => None,
        }
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            left: Box::new(f(*self.left)?),
            right: Box::new(f(*self.right)?),
            function: self.function,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            left: self.left,
            right: self.right,
            function: Box::new(f(*self.function)?),
        })
    }
}

impl HigherOrderFunction for MapZipWith {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.left, &self.right]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.function]
    }

    fn data_type(&self) -> DataType {
        DataType::map(
            self.common_key_type().unwrap_or(DataType::Unknown),
            self.function.data_type(),
            self.function.nullable(),
        )
    }

    fn nullable(&self) -> bool {
        self.left.nullable() || self.right.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (left_key, left_value, _) = map_entry_types(&self.left, 0)?;
        let (right_key, right_value, _) = map_entry_types(&self.right, 1)?;
        let key = left_key
            .merge_relaxing_null_flags(&right_key)
            .ok_or_else(|| Error::MapKeyTypeMismatch {
                left: left_key.to_string(),
                right: right_key.to_string(),
            })?;
        let lambda = take_lambda(*self.function, 2)?;
        // A key can be absent on either side, so both value parameters
        // are nullable regardless of the source maps' flags.
        let bound = binder(lambda, &[(key, false), (left_value, true), (right_value, true)])?;
        Ok(Self {
            left: self.left,
            right: self.right,
            function: Box::new(Expr::Lambda(bound)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        let left_key = match self.left.data_type() {
            DataType::Map { key, .. } => *key,
            other => {
                return TypeCheckResult::Failure(Error::argument_type_mismatch(
                    0,
                    "MAP",
                    other.to_string(),
                ))
            }
        };
        let right_key = match self.right.data_type() {
            DataType::Map { key, .. } => *key,
            other => {
                return TypeCheckResult::Failure(Error::argument_type_mismatch(
                    1,
                    "MAP",
                    other.to_string(),
                ))
            }
        };
        if !left_key.same_type(&right_key) {
            return TypeCheckResult::Failure(Error::MapKeyTypeMismatch {
                left: left_key.to_string(),
                right: right_key.to_string(),
            });
        }
        if !left_key.is_hashable_key() && !left_key.is_orderable() {
            return TypeCheckResult::Failure(Error::MapKeyNotOrderable(left_key.to_string()));
        }
        TypeCheckResult::Success
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let lambda = bound_lambda(&self.function, "map_zip_with")?;
        let left_value = self.left.eval(row)?;
        let Some(left_map) = left_value.as_map() else {
            return Ok(Value::Null);
        };
        let right_value = self.right.eval(row)?;
        let Some(right_map) = right_value.as_map() else {
            return Ok(Value::Null);
        };

        let key_type = self
            .common_key_type()
            .ok_or_else(|| Error::internal("map_zip_with arguments are not compatible maps"))?;
        let mut index = KeyIndex::for_key(&key_type);
        for (i, key) in left_map.keys().iter().enumerate() {
            index.insert(key, Side::Left, i);
        }
        for (i, key) in right_map.keys().iter().enumerate() {
            index.insert(key, Side::Right, i);
        }
        if index.len() > MAX_MAP_KEYS {
            return Err(Error::MapSizeExceeded {
                size: index.len(),
                max: MAX_MAP_KEYS,
            });
        }

        let [key_var, left_var, right_var] = lambda.params() else {
            return Err(Error::internal("map_zip_with lambda takes three arguments"));
        };
        let mut keys = Vec::with_capacity(index.len());
        let mut values = Vec::with_capacity(index.len());
        for (key, (left_at, right_at)) in index.into_entries() {
            key_var.set(key.clone());
            left_var.set(match left_at {
                Some(i) => left_map.values()[i].clone(),
                None => Value::Null,
            });
            right_var.set(match right_at {
                Some(i) => right_map.values()[i].clone(),
                None => Value::Null,
            });
            values.push(lambda.eval(row)?);
            keys.push(key);
        }
        Ok(Value::map(keys, values))
    }
}

enum Side {
    Left,
    Right,
}

type SidePair = (Option<usize>, Option<usize>);

/// Insertion-ordered key-union index. Hashable keys use an `IndexMap`;
/// merely-orderable keys (bytes, arrays) fall back to a linear probe,
/// quadratic in the number of distinct keys.
enum KeyIndex {
    Hashed(IndexMap<Value, SidePair>),
    Ordered(Vec<(Value, SidePair)>),
}

impl KeyIndex {
    fn for_key(key_type: &DataType) -> Self {
        if key_type.is_hashable_key() {
            KeyIndex::Hashed(IndexMap::new())
        } else {
            KeyIndex::Ordered(Vec::new())
        }
    }

    fn insert(&mut self, key: &Value, side: Side, position: usize) {
        match self {
            KeyIndex::Hashed(map) => {
                let pair = map.entry(key.clone()).or_insert((None, None));
                fill_first(pair, side, position);
            }
            KeyIndex::Ordered(entries) => {
                let found = entries
                    .iter_mut()
                    .find(|(k, _)| cmp_values(k, key) == Some(Ordering::Equal));
                match found {
                    Some((_, pair)) => fill_first(pair, side, position),
                    None => {
                        let mut pair = (None, None);
                        fill_first(&mut pair, side, position);
                        entries.push((key.clone(), pair));
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            KeyIndex::Hashed(map) => map.len(),
            KeyIndex::Ordered(entries) => entries.len(),
        }
    }

    fn into_entries(self) -> Vec<(Value, SidePair)> {
        match self {
            KeyIndex::Hashed(map) => map.into_iter().collect(),
            KeyIndex::Ordered(entries) => entries,
        }
    }
}

/// First occurrence wins: later duplicates on the same side are dropped.
fn fill_first(pair: &mut SidePair, side: Side, position: usize) {
    let slot = match side {
        Side::Left => &mut pair.0,
        Side::Right => &mut pair.1,
    };
    if slot.is_none() {
        *slot = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_index_first_wins_per_side() {
        let mut index = KeyIndex::for_key(&DataType::Int64);
        index.insert(&Value::int64(1), Side::Left, 0);
        index.insert(&Value::int64(1), Side::Left, 5);
        index.insert(&Value::int64(1), Side::Right, 2);
        let entries = index.into_entries();
        assert_eq!(entries, vec![(Value::int64(1), (Some(0), Some(2)))]);
    }

    #[test]
    fn test_key_index_preserves_insertion_order() {
        let mut index = KeyIndex::for_key(&DataType::Int64);
        index.insert(&Value::int64(2), Side::Left, 0);
        index.insert(&Value::int64(1), Side::Right, 0);
        index.insert(&Value::int64(3), Side::Right, 1);
        let keys: Vec<Value> = index.into_entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Value::int64(2), Value::int64(1), Value::int64(3)]);
    }

    #[test]
    fn test_ordered_path_matches_bytes_by_content() {
        let mut index = KeyIndex::for_key(&DataType::Bytes);
        assert!(matches!(index, KeyIndex::Ordered(_)));
        index.insert(&Value::bytes(vec![1, 2]), Side::Left, 0);
        index.insert(&Value::bytes(vec![1, 2]), Side::Right, 1);
        index.insert(&Value::bytes(vec![9]), Side::Right, 0);
        let entries = index.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (Value::bytes(vec![1, 2]), (Some(0), Some(1))));
        assert_eq!(entries[1], (Value::bytes(vec![9]), (None, Some(0))));
    }
}
