//! The result of evaluating an expression.
use crate::error::UnitError;
use crate::units::CompoundUnit;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Operand/result kind used to key the operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Percent,
    Boolean,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Number => "number",
            ValueKind::Percent => "percent",
            ValueKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A magnitude with an optional unit and a kind tag.
///
/// `unit` is `None` exactly when the value is dimensionless. Percentages keep
/// their written magnitude (`10%` has magnitude `10`); booleans are `1`/`0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    magnitude: f64,
    unit: Option<CompoundUnit>,
    kind: ValueKind,
}

impl Value {
    pub fn new(magnitude: f64, unit: Option<CompoundUnit>, kind: ValueKind) -> Self {
        match unit {
            Some(unit) if unit.is_dimensionless() => {
                // `km/m` and friends: fold the scale into the magnitude.
                let simplified = unit.simplify();
                Self { magnitude: magnitude * simplified.multiplier, unit: None, kind }
            }
            unit => Self { magnitude, unit, kind },
        }
    }

    pub fn number(magnitude: f64) -> Self {
        Self::new(magnitude, None, ValueKind::Number)
    }

    pub fn with_unit(magnitude: f64, unit: CompoundUnit) -> Self {
        Self::new(magnitude, Some(unit), ValueKind::Number)
    }

    pub fn percent(magnitude: f64) -> Self {
        Self::new(magnitude, None, ValueKind::Percent)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(if value { 1.0 } else { 0.0 }, None, ValueKind::Boolean)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> Option<&CompoundUnit> {
        self.unit.as_ref()
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_none()
    }

    pub fn as_bool(&self) -> bool {
        self.magnitude != 0.0
    }

    /// The same quantity expressed in `unit`.
    pub fn convert_to(&self, unit: &CompoundUnit) -> Result<Value, UnitError> {
        match &self.unit {
            Some(own) => {
                let magnitude = own.convert(self.magnitude, unit)?;
                Ok(Value::new(magnitude, Some(unit.clone()), self.kind))
            }
            None if unit.is_dimensionless() => Ok(Value::new(self.magnitude, Some(unit.clone()), self.kind)),
            None => Err(UnitError::DimensionMismatch {
                from: String::new(),
                to: unit.to_string(),
                from_dimension: "Dimensionless".to_string(),
                to_dimension: unit.dimension().to_string(),
            }),
        }
    }
}

/// Renders a magnitude without floating-point noise in the last digits.
pub fn format_magnitude(magnitude: f64) -> String {
    if !magnitude.is_finite() {
        return magnitude.to_string();
    }
    if magnitude != 0.0 && (magnitude.abs() >= 1e15 || magnitude.abs() < 1e-6) {
        return format!("{:e}", magnitude);
    }
    let text = format!("{:.10}", magnitude);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Boolean => write!(f, "{}", self.as_bool()),
            ValueKind::Percent => write!(f, "{}%", format_magnitude(self.magnitude)),
            ValueKind::Number => match &self.unit {
                Some(unit) => write!(f, "{} {}", format_magnitude(self.magnitude), unit),
                None => write!(f, "{}", format_magnitude(self.magnitude)),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Value", 3)?;
        state.serialize_field("magnitude", &self.magnitude)?;
        state.serialize_field("unit", &self.unit.as_ref().map(|u| u.to_string()))?;
        state.serialize_field("kind", &self.kind)?;
        state.end()
    }
}
