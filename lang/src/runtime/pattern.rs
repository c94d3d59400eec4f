use crate::runtime::Value::{
    self, BoolValue, FloatValue, IntValue, ListValue, NoneValue, StringValue,
};
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;

/// Expected shape of the value a suspended capability is resumed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePattern {
    Any,
    None,
    Bool,
    Int,
    Float,
    Number,
    String,
    List,
}

impl MessagePattern {
    pub fn from_name(name: &str) -> Option<MessagePattern> {
        match name {
            "any" => Some(MessagePattern::Any),
            "none" => Some(MessagePattern::None),
            "bool" => Some(MessagePattern::Bool),
            "int" => Some(MessagePattern::Int),
            "float" => Some(MessagePattern::Float),
            "number" => Some(MessagePattern::Number),
            "string" | "str" => Some(MessagePattern::String),
            "list" => Some(MessagePattern::List),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessagePattern::Any => "any",
            MessagePattern::None => "none",
            MessagePattern::Bool => "bool",
            MessagePattern::Int => "int",
            MessagePattern::Float => "float",
            MessagePattern::Number => "number",
            MessagePattern::String => "string",
            MessagePattern::List => "list",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (MessagePattern::Any, _) => true,
            (MessagePattern::None, NoneValue) => true,
            (MessagePattern::Bool, BoolValue(_)) => true,
            (MessagePattern::Int, IntValue(_)) => true,
            (MessagePattern::Float, FloatValue(_)) => true,
            (MessagePattern::Number, IntValue(_)) | (MessagePattern::Number, FloatValue(_)) => true,
            (MessagePattern::String, StringValue(_)) => true,
            (MessagePattern::List, ListValue(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MessagePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_shapes() {
        assert!(MessagePattern::Any.matches(&NoneValue));
        assert!(MessagePattern::Number.matches(&IntValue(1)));
        assert!(MessagePattern::Number.matches(&FloatValue(1.5)));
        assert!(!MessagePattern::Int.matches(&FloatValue(1.0)));
        assert!(MessagePattern::String.matches(&StringValue("x".into())));
        assert!(!MessagePattern::List.matches(&StringValue("x".into())));
    }

    #[test]
    fn test_names_roundtrip() {
        for pattern in &[
            MessagePattern::Any,
            MessagePattern::None,
            MessagePattern::Bool,
            MessagePattern::Int,
            MessagePattern::Float,
            MessagePattern::Number,
            MessagePattern::String,
            MessagePattern::List,
        ] {
            assert_eq!(MessagePattern::from_name(pattern.name()), Some(*pattern));
        }
        assert_eq!(MessagePattern::from_name("dict"), None);
    }
}
