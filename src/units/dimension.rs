//! Dimension vectors: sparse maps from base-dimension name to exponent.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The physical "shape" of a unit, independent of its scale.
///
/// Zero exponents are never stored, so two dimensions are equal exactly when
/// their non-zero exponent maps match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimension {
    exponents: BTreeMap<String, i32>,
}

impl Dimension {
    pub fn dimensionless() -> Self {
        Self::default()
    }

    /// A single base dimension with exponent 1, e.g. `Length`.
    pub fn base(name: impl Into<String>) -> Self {
        let mut exponents = BTreeMap::new();
        exponents.insert(name.into(), 1);
        Self { exponents }
    }

    pub fn from_exponents<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let mut dim = Self::default();
        for (name, exp) in pairs {
            dim.add(name.into(), exp);
        }
        dim
    }

    fn add(&mut self, name: String, exp: i32) {
        if exp == 0 {
            return;
        }
        let entry = self.exponents.entry(name).or_insert(0);
        *entry += exp;
        if *entry == 0 {
            self.exponents.retain(|_, e| *e != 0);
        }
    }

    pub fn exponent(&self, name: &str) -> i32 {
        self.exponents.get(name).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.exponents.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn by(&self, other: &Dimension) -> Dimension {
        let mut out = self.clone();
        for (name, exp) in &other.exponents {
            out.add(name.clone(), *exp);
        }
        out
    }

    pub fn per(&self, other: &Dimension) -> Dimension {
        let mut out = self.clone();
        for (name, exp) in &other.exponents {
            out.add(name.clone(), -*exp);
        }
        out
    }

    pub fn pow(&self, n: i32) -> Dimension {
        if n == 0 {
            return Dimension::dimensionless();
        }
        Dimension {
            exponents: self.exponents.iter().map(|(k, v)| (k.clone(), v * n)).collect(),
        }
    }

    /// `pow`, or `None` when an exponent would exceed `limit` in magnitude.
    pub fn checked_pow(&self, n: i32, limit: u32) -> Option<Dimension> {
        let mut exponents = BTreeMap::new();
        for (name, exp) in &self.exponents {
            let raised = exp.checked_mul(n).filter(|e| e.unsigned_abs() <= limit)?;
            if raised != 0 {
                exponents.insert(name.clone(), raised);
            }
        }
        Some(Dimension { exponents })
    }

    /// The `n`th root, if every exponent divides evenly by `n`.
    pub fn root(&self, n: i32) -> Option<Dimension> {
        if n == 0 {
            return None;
        }
        if self.exponents.values().any(|e| e % n != 0) {
            return None;
        }
        Some(Dimension {
            exponents: self.exponents.iter().map(|(k, v)| (k.clone(), v / n)).collect(),
        })
    }

    /// True when `other` could be divided out of `self` without flipping the
    /// sign of any exponent: same sign and no larger magnitude, per dimension.
    pub fn contains(&self, other: &Dimension) -> bool {
        other.exponents.iter().all(|(name, &theirs)| {
            let ours = self.exponent(name);
            ours.signum() == theirs.signum() && theirs.abs() <= ours.abs()
        })
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exponents.is_empty()
    }

    pub fn is_simple(&self) -> bool {
        self.exponents.len() == 1 && self.exponents.values().all(|e| e.abs() == 1)
    }

    /// The single base dimension name of a dimension like `Length` (exponent +1).
    pub fn simple_name(&self) -> Option<&str> {
        match self.exponents.iter().next() {
            Some((name, 1)) if self.exponents.len() == 1 => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn cardinality(&self) -> u32 {
        if self.is_simple() {
            return 1;
        }
        self.exponents.values().map(|e| e.unsigned_abs()).sum()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "Dimensionless");
        }
        let term = |(name, exp): (&String, &i32)| {
            if exp.abs() == 1 { name.clone() } else { format!("{}^{}", name, exp.abs()) }
        };
        let top: Vec<_> = self.exponents.iter().filter(|(_, e)| **e > 0).map(term).collect();
        let bottom: Vec<_> = self.exponents.iter().filter(|(_, e)| **e < 0).map(term).collect();
        let top = if top.is_empty() { "1".to_string() } else { top.join(" ") };
        if bottom.is_empty() {
            write!(f, "{}", top)
        } else {
            write!(f, "{}/{}", top, bottom.join(" "))
        }
    }
}
