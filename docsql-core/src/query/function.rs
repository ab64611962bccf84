//! Function types that may wrap a select item.

use std::fmt;

/// Aggregate and scalar functions known to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionType {
    // Aggregates
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    // Scalar functions
    ToString,
    ToNumber,
    ToDate,
    ToBoolean,
    MapValue,
    Substring,
}

impl FunctionType {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionType::Count => "COUNT",
            FunctionType::Sum => "SUM",
            FunctionType::Avg => "AVG",
            FunctionType::Min => "MIN",
            FunctionType::Max => "MAX",
            FunctionType::First => "FIRST",
            FunctionType::Last => "LAST",
            FunctionType::ToString => "TO_STRING",
            FunctionType::ToNumber => "TO_NUMBER",
            FunctionType::ToDate => "TO_DATE",
            FunctionType::ToBoolean => "TO_BOOLEAN",
            FunctionType::MapValue => "MAP_VALUE",
            FunctionType::Substring => "SUBSTRING",
        }
    }

    /// Case-insensitive lookup by SQL name.
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name.trim().to_ascii_uppercase().as_str() {
            "COUNT" => FunctionType::Count,
            "SUM" => FunctionType::Sum,
            "AVG" | "AVERAGE" => FunctionType::Avg,
            "MIN" => FunctionType::Min,
            "MAX" => FunctionType::Max,
            "FIRST" => FunctionType::First,
            "LAST" => FunctionType::Last,
            "TO_STRING" => FunctionType::ToString,
            "TO_NUMBER" => FunctionType::ToNumber,
            "TO_DATE" => FunctionType::ToDate,
            "TO_BOOLEAN" => FunctionType::ToBoolean,
            "MAP_VALUE" => FunctionType::MapValue,
            "SUBSTRING" | "SUBSTR" => FunctionType::Substring,
            _ => return None,
        };
        Some(function)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            FunctionType::Count
                | FunctionType::Sum
                | FunctionType::Avg
                | FunctionType::Min
                | FunctionType::Max
                | FunctionType::First
                | FunctionType::Last
        )
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_aggregate()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(FunctionType::from_name("count"), Some(FunctionType::Count));
        assert_eq!(FunctionType::from_name("To_Number"), Some(FunctionType::ToNumber));
        assert_eq!(FunctionType::from_name("substr"), Some(FunctionType::Substring));
        assert_eq!(FunctionType::from_name("upper_case"), None);
    }

    #[test]
    fn test_kinds() {
        assert!(FunctionType::Max.is_aggregate());
        assert!(FunctionType::MapValue.is_scalar());
        assert_eq!(FunctionType::Avg.to_string(), "AVG");
    }
}
