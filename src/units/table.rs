//! The per-scope registry of named units.
use super::{CompoundUnit, Multiple, NamedUnit, UnitOrdinals, UnitSchemeHelper};
use std::collections::HashMap;
use std::sync::Arc;

/// Alternative spellings of a unit, used by renderers and completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitAliases {
    pub singular: Option<String>,
    pub plural: Option<String>,
    pub alternatives: Vec<String>,
}

impl UnitAliases {
    /// `[singular, plural, other...]`, the order used by unit definitions.
    pub fn from_names(names: &[String]) -> Self {
        let mut names = names.iter().cloned();
        Self {
            singular: names.next(),
            plural: names.next(),
            alternatives: names.collect(),
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &str> + '_ {
        self.singular
            .iter()
            .chain(self.plural.iter())
            .chain(self.alternatives.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitsTable {
    /// Declaration order; a redefinition replaces the earlier entry in place.
    units: Vec<Arc<NamedUnit>>,
    /// Canonical names and aliases, resolved to an index into `units`.
    by_name: HashMap<String, usize>,
    aliases: HashMap<String, UnitAliases>,
    schemes: UnitSchemeHelper,
    ordinals: UnitOrdinals,
}

impl UnitsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table numbering its units from a shared counter.
    pub fn with_ordinals(ordinals: UnitOrdinals) -> Self {
        Self { ordinals, ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn insert(&mut self, unit: Arc<NamedUnit>) -> Arc<NamedUnit> {
        match self.units.iter().position(|u| u.name() == unit.name()) {
            Some(idx) => self.units[idx] = unit.clone(),
            None => {
                self.by_name.insert(unit.name().to_string(), self.units.len());
                self.units.push(unit.clone());
            }
        }
        unit
    }

    /// `unit m: Length`
    pub fn add_base_unit(&mut self, name: &str, dimension_name: &str) -> Arc<NamedUnit> {
        let unit = NamedUnit::base_unit(name, dimension_name, self.ordinals.issue());
        self.insert(unit)
    }

    /// `unit km: 1000 m`, `unit kph: km/h`, `unit L: 0.001 m^3`.
    ///
    /// A multiple of a single simple unit becomes a simple unit that converts
    /// directly; anything else becomes a named compound over `base`.
    pub fn add_derived_unit(&mut self, name: &str, multiple: Multiple, base: &CompoundUnit) -> Arc<NamedUnit> {
        let ordinal = self.ordinals.issue();
        let unit = match base.as_named() {
            Some(simple) if !simple.is_compound() && simple.dimension().is_simple() => {
                NamedUnit::scaled(name, multiple, simple, ordinal)
            }
            _ => NamedUnit::compound(name, base.clone(), multiple, ordinal),
        };
        self.insert(unit)
    }

    pub fn add_aliases(&mut self, canonical: &str, aliases: UnitAliases) {
        let Some(&idx) = self.by_name.get(canonical) else { return };
        for alias in aliases.all() {
            self.by_name.insert(alias.to_string(), idx);
        }
        self.aliases.insert(canonical.to_string(), aliases);
    }

    pub fn aliases(&self, canonical: &str) -> Option<&UnitAliases> {
        self.aliases.get(canonical)
    }

    pub fn add_to_scheme(&mut self, scheme: &str, name: &str) -> bool {
        match self.get(name) {
            Some(unit) => {
                self.schemes.add(scheme, unit);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<NamedUnit>> {
        self.by_name.get(name).map(|&idx| self.units[idx].clone())
    }

    pub fn get_unit(&self, name: &str) -> Option<CompoundUnit> {
        self.get(name).map(CompoundUnit::named)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn units(&self) -> impl Iterator<Item = &Arc<NamedUnit>> + '_ {
        self.units.iter()
    }

    /// The first declared simple unit measuring `dimension_name`.
    pub fn root_unit_for(&self, dimension_name: &str) -> Option<&Arc<NamedUnit>> {
        self.units
            .iter()
            .find(|u| !u.is_compound() && u.dimension().simple_name() == Some(dimension_name))
    }

    pub fn schemes(&self) -> &UnitSchemeHelper {
        &self.schemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_units_choose_representation() {
        let mut table = UnitsTable::new();
        let m = table.add_base_unit("m", "Length");
        let s = table.add_base_unit("s", "Time");
        let km = table.add_derived_unit("km", Multiple::from_value(1000.0), &CompoundUnit::named(m.clone()));
        assert!(!km.is_compound());
        assert_eq!(km.multiple_to(&m), Some(Multiple::from_value(1000.0)));

        let per_s = CompoundUnit::named(km.clone()).per(&CompoundUnit::named(s));
        let kps = table.add_derived_unit("kps", Multiple::one(), &per_s);
        assert!(kps.is_compound());

        let litre = table.add_derived_unit("L", Multiple::new(1.0, 1000.0), &CompoundUnit::named(m).pow(3));
        assert!(litre.is_compound());
        assert_eq!(table.len(), 5);
        assert_eq!(table.root_unit_for("Length").map(|u| u.name()), Some("m"));
    }

    #[test]
    fn test_aliases_resolve_to_canonical_unit() {
        let mut table = UnitsTable::new();
        table.add_base_unit("m", "Length");
        table.add_aliases("m", UnitAliases::from_names(&["meter".into(), "meters".into(), "metre".into()]));
        assert_eq!(table.get("meters").map(|u| u.name().to_string()), Some("m".to_string()));
        assert_eq!(table.get("metre").map(|u| u.name().to_string()), Some("m".to_string()));
        assert_eq!(table.aliases("m").and_then(|a| a.plural.clone()), Some("meters".to_string()));
        assert!(!table.contains("foot"));
    }

    #[test]
    fn test_shared_ordinals_number_units_across_tables() {
        let ordinals = UnitOrdinals::default();
        let mut outer = UnitsTable::with_ordinals(ordinals.clone());
        let mut inner = UnitsTable::with_ordinals(ordinals);
        let m = outer.add_base_unit("m", "Length");
        let furlong = inner.add_derived_unit("furlong", Multiple::from_value(201.168), &CompoundUnit::named(m.clone()));
        let s = outer.add_base_unit("s", "Time");
        assert_eq!((m.ordinal(), furlong.ordinal(), s.ordinal()), (0, 1, 2));

        // A separate table starts its own sequence.
        let mut other = UnitsTable::new();
        assert_eq!(other.add_base_unit("m", "Length").ordinal(), 0);
    }

    #[test]
    fn test_redefinition_replaces_in_place() {
        let mut table = UnitsTable::new();
        let m = table.add_base_unit("m", "Length");
        table.add_derived_unit("km", Multiple::from_value(1000.0), &CompoundUnit::named(m.clone()));
        table.add_derived_unit("km", Multiple::from_value(1001.0), &CompoundUnit::named(m.clone()));
        assert_eq!(table.len(), 2);
        let km = table.get("km").unwrap();
        assert_eq!(km.multiple_to(&m).map(|x| x.value()), Some(1001.0));
    }
}
