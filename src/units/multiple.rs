//! Rational conversion factors between units.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A conversion factor kept as `top / bottom`.
///
/// Chained conversions multiply tops and bottoms separately and only divide
/// once, in [`Multiple::value`], which keeps round trips like `km -> mile -> km`
/// closer to exact than repeated floating-point division.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multiple {
    pub top: f64,
    pub bottom: f64,
}

impl Multiple {
    pub const fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub const fn one() -> Self {
        Self { top: 1.0, bottom: 1.0 }
    }

    pub const fn from_value(value: f64) -> Self {
        Self { top: value, bottom: 1.0 }
    }

    pub fn value(&self) -> f64 {
        self.top / self.bottom
    }

    pub fn times(&self, other: &Multiple) -> Multiple {
        Multiple::new(self.top * other.top, self.bottom * other.bottom)
    }

    pub fn divide(&self, other: &Multiple) -> Multiple {
        Multiple::new(self.top * other.bottom, self.bottom * other.top)
    }

    pub fn inverse(&self) -> Multiple {
        Multiple::new(self.bottom, self.top)
    }

    pub fn pow(&self, n: i32) -> Multiple {
        let base = if n < 0 { self.inverse() } else { *self };
        let n = i32::try_from(n.unsigned_abs()).unwrap_or(i32::MAX);
        Multiple::new(base.top.powi(n), base.bottom.powi(n))
    }

    pub fn is_one(&self) -> bool {
        self.top == self.bottom
    }
}

impl Default for Multiple {
    fn default() -> Self {
        Self::one()
    }
}

impl fmt::Display for Multiple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bottom == 1.0 {
            write!(f, "{}", self.top)
        } else {
            write!(f, "{}/{}", self.top, self.bottom)
        }
    }
}
