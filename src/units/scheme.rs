//! Unit schemes: named groups of preferred units ("Metric", "Imperial").
use super::{CompoundUnit, Dimension, NamedUnit};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct UnitSchemeHelper {
    schemes: BTreeMap<String, Vec<Arc<NamedUnit>>>,
}

impl UnitSchemeHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags `unit` with `scheme`. Re-tagging a unit of the same name replaces it.
    pub fn add(&mut self, scheme: &str, unit: Arc<NamedUnit>) {
        let units = self.schemes.entry(scheme.to_string()).or_default();
        units.retain(|u| u.name() != unit.name());
        units.push(unit);
    }

    pub fn merge(&mut self, other: &UnitSchemeHelper) {
        for (scheme, units) in &other.schemes {
            for unit in units {
                self.add(scheme, unit.clone());
            }
        }
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> + '_ {
        self.schemes.keys().map(String::as_str)
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes.contains_key(scheme)
    }

    pub fn contains(&self, scheme: &str, unit_name: &str) -> bool {
        self.schemes
            .get(scheme)
            .is_some_and(|units| units.iter().any(|u| u.name() == unit_name))
    }

    pub fn schemes_of(&self, unit_name: &str) -> Vec<&str> {
        self.schemes
            .iter()
            .filter(|(_, units)| units.iter().any(|u| u.name() == unit_name))
            .map(|(scheme, _)| scheme.as_str())
            .collect()
    }

    /// Units of `scheme` with exactly `dimension`, in declaration order.
    pub fn units_for(&self, scheme: &str, dimension: &Dimension) -> Vec<&Arc<NamedUnit>> {
        self.schemes
            .get(scheme)
            .map(|units| units.iter().filter(|u| u.dimension() == dimension).collect())
            .unwrap_or_default()
    }

    /// The first simple unit of `scheme` measuring the base dimension `name`.
    pub fn preferred_for(&self, scheme: &str, dimension_name: &str) -> Option<&Arc<NamedUnit>> {
        let dimension = Dimension::base(dimension_name);
        self.units_for(scheme, &dimension).into_iter().find(|u| !u.is_compound())
    }

    /// Picks the scheme unit that displays `magnitude unit` most naturally:
    /// the smallest converted magnitude that is still at least 1, otherwise the
    /// largest one. Only simple-dimension units are considered.
    pub fn nearest(&self, scheme: &str, magnitude: f64, unit: &CompoundUnit) -> Option<(CompoundUnit, f64)> {
        if !unit.dimension().is_simple() {
            return None;
        }
        let mut best: Option<(CompoundUnit, f64)> = None;
        for candidate in self.units_for(scheme, unit.dimension()) {
            let candidate = CompoundUnit::named(candidate.clone());
            let Ok(converted) = unit.convert(magnitude, &candidate) else { continue };
            let better = match &best {
                None => true,
                Some((_, current)) => {
                    let (c, b) = (converted.abs(), current.abs());
                    match (c >= 1.0, b >= 1.0) {
                        (true, true) => c < b,
                        (true, false) => true,
                        (false, true) => false,
                        (false, false) => c > b,
                    }
                }
            };
            if better {
                best = Some((candidate, converted));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::compound::tests::fixture;

    #[test]
    fn test_nearest_prefers_smallest_magnitude_above_one() {
        let fx = fixture();
        let mut helper = UnitSchemeHelper::new();
        for unit in [&fx.cm, &fx.m, &fx.km] {
            helper.add("Metric", unit.clone());
        }
        helper.add("Imperial", fx.mile.clone());

        let (unit, value) = helper.nearest("Metric", 2500.0, &CompoundUnit::named(fx.m.clone())).unwrap();
        assert_eq!(unit.name(), Some("km"));
        assert!((value - 2.5).abs() < 1e-12);

        let (unit, value) = helper.nearest("Metric", 0.5, &CompoundUnit::named(fx.m.clone())).unwrap();
        assert_eq!(unit.name(), Some("cm"));
        assert!((value - 50.0).abs() < 1e-9);

        let (unit, _) = helper.nearest("Imperial", 10.0, &CompoundUnit::named(fx.km.clone())).unwrap();
        assert_eq!(unit.name(), Some("mile"));
        assert!(helper.nearest("Nautical", 1.0, &CompoundUnit::named(fx.km.clone())).is_none());
    }

    #[test]
    fn test_scheme_membership() {
        let fx = fixture();
        let mut helper = UnitSchemeHelper::new();
        helper.add("Metric", fx.km.clone());
        helper.add("Metric", fx.kph.clone());
        assert!(helper.contains("Metric", "kph"));
        assert_eq!(helper.schemes_of("km"), vec!["Metric"]);
        assert_eq!(helper.preferred_for("Metric", "Length").map(|u| u.name()), Some("km"));
        assert_eq!(helper.units_for("Metric", fx.kph.dimension()).len(), 1);
    }
}
