//! Tagged parameter values.
//!
//! The original system pushed whatever JSON happened to encode through
//! an untyped channel. parmirror names the four shapes it actually
//! carries and makes coercion between them an explicit step at the
//! value-store boundary instead of duck typing at the receiver.

use serde::{Deserialize, Serialize};

/// One parameter value on the wire.
///
/// Untagged: the wire representation is the plain JSON value
/// (bool / number / string / array of numbers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// On/off switch.
    Toggle(bool),
    /// Scalar numeric parameter. Integers arrive as whole floats.
    Number(f64),
    /// Free-form text (also menu selections).
    Text(String),
    /// Multi-component numeric parameter (XY pads, colors).
    Tuple(Vec<f64>),
}

/// The declared kind of a parameter, used for validation and coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Toggle,
    Number,
    Text,
    Tuple,
}

impl ValueKind {
    /// Human-readable kind name for log and error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Toggle => "toggle",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Tuple => "tuple",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ParamValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ParamValue::Toggle(_) => ValueKind::Toggle,
            ParamValue::Number(_) => ValueKind::Number,
            ParamValue::Text(_) => ValueKind::Text,
            ParamValue::Tuple(_) => ValueKind::Tuple,
        }
    }

    /// Coerce this value to `kind`, if a lossless-enough conversion exists.
    ///
    /// Allowed conversions: number↔toggle (zero/nonzero), toggle→number,
    /// number→text, and single-element tuple↔number. Everything else is
    /// `None` and should be rejected by the caller.
    pub fn coerce(&self, kind: ValueKind) -> Option<ParamValue> {
        if self.kind() == kind {
            return Some(self.clone());
        }
        match (self, kind) {
            (ParamValue::Number(n), ValueKind::Toggle) => Some(ParamValue::Toggle(*n != 0.0)),
            (ParamValue::Toggle(b), ValueKind::Number) => {
                Some(ParamValue::Number(if *b { 1.0 } else { 0.0 }))
            }
            (ParamValue::Number(n), ValueKind::Text) => Some(ParamValue::Text(n.to_string())),
            (ParamValue::Number(n), ValueKind::Tuple) => Some(ParamValue::Tuple(vec![*n])),
            (ParamValue::Tuple(t), ValueKind::Number) if t.len() == 1 => {
                Some(ParamValue::Number(t[0]))
            }
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Toggle(b)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(t: Vec<f64>) -> Self {
        ParamValue::Tuple(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_representation_is_plain_json() {
        assert_eq!(
            serde_json::to_string(&ParamValue::Number(4.0)).unwrap(),
            "4.0"
        );
        assert_eq!(
            serde_json::to_string(&ParamValue::Toggle(true)).unwrap(),
            "true"
        );
        assert_eq!(
            serde_json::to_string(&ParamValue::Text("beam".into())).unwrap(),
            "\"beam\""
        );
        assert_eq!(
            serde_json::to_string(&ParamValue::Tuple(vec![0.5, 0.5])).unwrap(),
            "[0.5,0.5]"
        );
    }

    #[test]
    fn integers_decode_as_numbers() {
        let v: ParamValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, ParamValue::Number(3.0));
    }

    #[test]
    fn bool_decodes_as_toggle_not_number() {
        let v: ParamValue = serde_json::from_str("false").unwrap();
        assert_eq!(v, ParamValue::Toggle(false));
    }

    #[test]
    fn coerce_number_to_toggle() {
        assert_eq!(
            ParamValue::Number(1.0).coerce(ValueKind::Toggle),
            Some(ParamValue::Toggle(true))
        );
        assert_eq!(
            ParamValue::Number(0.0).coerce(ValueKind::Toggle),
            Some(ParamValue::Toggle(false))
        );
    }

    #[test]
    fn coerce_single_tuple_to_number() {
        assert_eq!(
            ParamValue::Tuple(vec![7.5]).coerce(ValueKind::Number),
            Some(ParamValue::Number(7.5))
        );
        assert_eq!(ParamValue::Tuple(vec![1.0, 2.0]).coerce(ValueKind::Number), None);
    }

    #[test]
    fn incompatible_coercion_is_rejected() {
        assert_eq!(ParamValue::Text("on".into()).coerce(ValueKind::Toggle), None);
        assert_eq!(ParamValue::Tuple(vec![1.0, 2.0]).coerce(ValueKind::Toggle), None);
    }

    #[test]
    fn same_kind_coercion_is_identity() {
        let v = ParamValue::Tuple(vec![0.1, 0.2]);
        assert_eq!(v.coerce(ValueKind::Tuple), Some(v.clone()));
    }
}
