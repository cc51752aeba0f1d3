//! Re-expressing a unit with the named compound units a reader would expect
//! (`kg m/s^2` as `N`, `m/s` in `kph` under a scheme, ...).
use super::{CompoundUnit, Dimension, NamedUnit, UnitSchemeHelper};
use crate::error::UnitError;
use std::sync::Arc;
use tracing::warn;

/// Every unit and scheme visible from one scope, nearest scope first.
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    units: Vec<Arc<NamedUnit>>,
    schemes: UnitSchemeHelper,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds units unless an entry of the same name is already present
    /// (an inner scope shadows outer definitions).
    pub fn extend<'a>(&mut self, units: impl IntoIterator<Item = &'a Arc<NamedUnit>>, schemes: &UnitSchemeHelper) {
        for unit in units {
            if !self.units.iter().any(|u| u.name() == unit.name()) {
                self.units.push(unit.clone());
            }
        }
        self.schemes.merge(schemes);
    }

    pub fn units(&self) -> &[Arc<NamedUnit>] {
        &self.units
    }

    pub fn schemes(&self) -> &UnitSchemeHelper {
        &self.schemes
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NamedUnit>> {
        self.units.iter().find(|u| u.name() == name)
    }

    /// Named compounds usable for factoring, in declaration order.
    fn compound_candidates(&self, scheme: Option<&str>) -> Vec<&Arc<NamedUnit>> {
        let mut out: Vec<_> = self
            .units
            .iter()
            .filter(|u| u.is_compound() && !u.dimension().is_dimensionless())
            .filter(|u| scheme.map_or(true, |s| self.schemes.contains(s, u.name())))
            .collect();
        out.sort_by_key(|u| u.ordinal());
        out
    }

    /// The simple unit used for one base dimension of a residual.
    fn simple_unit_for(&self, dimension_name: &str, scheme: Option<&str>, fallback: &CompoundUnit) -> Option<Arc<NamedUnit>> {
        if let Some(scheme) = scheme {
            return self.schemes.preferred_for(scheme, dimension_name).cloned();
        }
        fallback
            .terms()
            .iter()
            .find(|t| !t.unit.is_compound() && t.unit.dimension().simple_name() == Some(dimension_name))
            .map(|t| t.unit.clone())
            .or_else(|| {
                self.units
                    .iter()
                    .filter(|u| !u.is_compound() && u.dimension().simple_name() == Some(dimension_name))
                    .min_by_key(|u| u.ordinal())
                    .cloned()
            })
    }

    /// Expresses `dimension` purely in simple units; `None` if some base
    /// dimension has no unit available.
    fn simple_expression(&self, dimension: &Dimension, scheme: Option<&str>, fallback: &CompoundUnit) -> Option<CompoundUnit> {
        let mut terms = Vec::new();
        for (name, exponent) in dimension.iter() {
            terms.push((self.simple_unit_for(name, scheme, fallback)?, exponent));
        }
        Some(CompoundUnit::from_terms(terms))
    }
}

/// `quantity original == value unit`, with `multiplier` the per-unit factor.
#[derive(Debug, Clone)]
pub struct Refactored {
    pub multiplier: f64,
    pub value: f64,
    pub unit: Option<CompoundUnit>,
}

/// One way of covering a dimension: compound units plus a simple-unit residual.
#[derive(Debug, Clone, PartialEq)]
pub struct Factorisation {
    pub compounds: Vec<Arc<NamedUnit>>,
    pub residual: Dimension,
}

impl Factorisation {
    /// Unit count of the rendered expression.
    pub fn cardinality(&self) -> u32 {
        self.compounds.len() as u32 + self.residual.cardinality()
    }
}

struct Search<'a> {
    candidates: Vec<&'a Arc<NamedUnit>>,
    best_cost: u32,
    best: Vec<Vec<usize>>,
}

impl Search<'_> {
    fn run(&mut self, residual: &Dimension, start: usize, chosen: &mut Vec<usize>) {
        if !chosen.is_empty() {
            let cost = chosen.len() as u32 + residual.cardinality();
            if cost < self.best_cost {
                self.best_cost = cost;
                self.best = vec![chosen.clone()];
            } else if cost == self.best_cost {
                self.best.push(chosen.clone());
            }
        }
        for i in start..self.candidates.len() {
            let dimension = self.candidates[i].dimension();
            if residual.contains(dimension) {
                chosen.push(i);
                // Each step strictly shrinks the residual, so this terminates.
                self.run(&residual.per(dimension), i, chosen);
                chosen.pop();
            }
        }
    }
}

/// All lowest-cardinality factorisations of `dimension` that use at least one
/// compound unit and beat the plain simple-unit expression.
pub fn factorisations(dimension: &Dimension, catalog: &UnitCatalog, scheme: Option<&str>) -> Vec<Factorisation> {
    let mut search = Search {
        candidates: catalog.compound_candidates(scheme),
        best_cost: dimension.cardinality(),
        best: Vec::new(),
    };
    search.run(dimension, 0, &mut Vec::new());

    search
        .best
        .into_iter()
        .map(|chosen| {
            let compounds: Vec<_> = chosen.iter().map(|&i| search.candidates[i].clone()).collect();
            let residual = compounds.iter().fold(dimension.clone(), |acc, c| acc.per(c.dimension()));
            Factorisation { compounds, residual }
        })
        .collect()
}

impl CompoundUnit {
    /// Chooses a human-friendly re-expression of `quantity self`.
    ///
    /// Prefers the lowest-cardinality factorisation using named compounds of
    /// `scheme` (first of any ties), then the scheme's simple units, then the
    /// unit itself.
    pub fn refactored(
        &self,
        quantity: f64,
        scheme: Option<&str>,
        simple_only: bool,
        catalog: &UnitCatalog,
    ) -> Result<Refactored, UnitError> {
        let simplified = self.simplify();
        if simplified.unit.is_empty() {
            return Ok(Refactored {
                multiplier: simplified.multiplier,
                value: quantity * simplified.multiplier,
                unit: None,
            });
        }
        let target = simplified.unit.dimension().clone();

        if !simple_only {
            if let Some(best) = factorisations(&target, catalog, scheme).into_iter().next() {
                let residual = catalog.simple_expression(&best.residual, scheme, &simplified.unit);
                if let Some(residual) = residual {
                    let unit = best
                        .compounds
                        .iter()
                        .fold(residual, |acc, c| CompoundUnit::named(c.clone()).by(&acc));
                    return self.rebase(quantity, unit);
                }
            }
        }

        if let Some(unit) = catalog.simple_expression(&target, scheme, &simplified.unit) {
            if let (Some(scheme), true) = (scheme, target.is_simple()) {
                if let Some((nearest, _)) = catalog.schemes().nearest(scheme, quantity, self) {
                    return self.rebase(quantity, nearest);
                }
            }
            return self.rebase(quantity, unit);
        }

        if scheme.is_some() {
            warn!(unit = %self, ?scheme, "No scheme translation available, keeping original unit");
        }
        if self.is_empty() {
            return Err(UnitError::CannotFactor(self.to_string()));
        }
        Ok(Refactored { multiplier: 1.0, value: quantity, unit: Some(self.clone()) })
    }

    fn rebase(&self, quantity: f64, unit: CompoundUnit) -> Result<Refactored, UnitError> {
        let multiplier = self.conversion_multiple(&unit)?.value();
        Ok(Refactored { multiplier, value: quantity * multiplier, unit: Some(unit) })
    }
}
