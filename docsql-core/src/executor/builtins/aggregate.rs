use std::cmp::Ordering;

use crate::query::FunctionType;
use crate::value::Value;

pub fn call(function: FunctionType, values: &[Value]) -> Value {
    let mut present = values.iter().filter(|v| !v.is_null());
    match function {
        FunctionType::Count => Value::Integer(present.count() as i64),
        FunctionType::Sum => sum(present),
        FunctionType::Avg => average(present),
        FunctionType::Min => present
            .min_by(|a, b| a.compare(b))
            .cloned()
            .unwrap_or(Value::Null),
        FunctionType::Max => present
            // max_by keeps the last of equal elements; fold keeps the first
            .fold(None::<&Value>, |best, v| match best {
                Some(b) if b.compare(v) != Ordering::Less => Some(b),
                _ => Some(v),
            })
            .cloned()
            .unwrap_or(Value::Null),
        FunctionType::First => present.next().cloned().unwrap_or(Value::Null),
        FunctionType::Last => present.last().cloned().unwrap_or(Value::Null),
        other => {
            tracing::warn!("{} is not an aggregate function", other);
            Value::Null
        }
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let mut integral: Option<i64> = Some(0);
    let mut total = 0.0;
    for value in values {
        let Some(number) = value.to_number() else {
            continue;
        };
        integral = match (integral, &number) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            _ => None,
        };
        total += number.as_f64().unwrap_or(0.0);
    }
    match integral {
        Some(i) => Value::Integer(i),
        None => Value::Float(total),
    }
}

fn average<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let numbers: Vec<f64> = values
        .filter_map(|v| v.to_number().and_then(|n| n.as_f64()))
        .collect();
    if numbers.is_empty() {
        return Value::Null;
    }
    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[Value]) -> Vec<Value> {
        items.to_vec()
    }

    #[test]
    fn test_count_ignores_nulls() {
        let input = values(&[Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(call(FunctionType::Count, &input), Value::from(2));
        assert_eq!(call(FunctionType::Count, &[]), Value::from(0));
    }

    #[test]
    fn test_sum() {
        let ints = values(&[Value::from(1), Value::from(2), Value::Null]);
        assert!(matches!(call(FunctionType::Sum, &ints), Value::Integer(3)));

        let mixed = values(&[Value::from(1), Value::from(2.5)]);
        assert_eq!(call(FunctionType::Sum, &mixed), Value::from(3.5));
        assert_eq!(call(FunctionType::Sum, &[]), Value::from(0));
    }

    #[test]
    fn test_avg() {
        let input = values(&[Value::from(1), Value::from(2), Value::Null]);
        assert_eq!(call(FunctionType::Avg, &input), Value::from(1.5));
        assert_eq!(call(FunctionType::Avg, &[]), Value::Null);
    }

    #[test]
    fn test_min_max_first_last() {
        let input = values(&[Value::Null, Value::from("b"), Value::from("a"), Value::from("c")]);
        assert_eq!(call(FunctionType::Min, &input), Value::from("a"));
        assert_eq!(call(FunctionType::Max, &input), Value::from("c"));
        assert_eq!(call(FunctionType::First, &input), Value::from("b"));
        assert_eq!(call(FunctionType::Last, &input), Value::from("c"));
        assert_eq!(call(FunctionType::Max, &[Value::Null]), Value::Null);
    }
}
