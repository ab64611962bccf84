//! Builtin function implementations.
//!
//! Aggregates reduce a collected list of values; scalar functions map one
//! value at a time. Neither ever fails: unusable input yields NULL.

mod aggregate;
mod scalar;

use crate::query::FunctionType;
use crate::value::Value;

/// Container for builtin function implementations.
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    /// Reduce `values` with an aggregate function. Nulls are ignored.
    pub fn aggregate(function: FunctionType, values: &[Value]) -> Value {
        aggregate::call(function, values)
    }

    /// Apply a scalar function with its extra parameters to one value.
    pub fn scalar(function: FunctionType, parameters: &[Value], value: &Value) -> Value {
        scalar::call(function, parameters, value)
    }
}
