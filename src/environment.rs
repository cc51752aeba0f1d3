//! Per-session state handed to the parser, evaluator and document model.
use crate::ast::NodeIdAllocator;
use crate::config::Prefs;
use crate::operators::OperatorTable;
use crate::prelude;
use crate::scope::ScopeRegistry;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Environment {
    pub prefs: Prefs,
    pub scopes: ScopeRegistry,
    pub operators: OperatorTable,
    pub node_ids: NodeIdAllocator,
}

impl Environment {
    /// Builds a session with the standard operator table, loading the
    /// prelude into the root scope when `prefs.load_prelude` is set.
    pub fn new(prefs: Prefs) -> Self {
        let load_prelude = prefs.load_prelude;
        let mut env = Self {
            prefs,
            scopes: ScopeRegistry::new(),
            operators: OperatorTable::standard(),
            node_ids: NodeIdAllocator::default(),
        };
        if load_prelude {
            let root = env.scopes.root();
            match prelude::load(&mut env, root) {
                Ok(count) => debug!(statements = count, "Loaded prelude"),
                Err(e) => error!(error = %e, "Failed to load prelude"),
            }
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_is_optional() {
        let env = Environment::new(Prefs { load_prelude: false, ..Prefs::default() });
        assert!(env.scopes.get(env.scopes.root()).units().is_empty());
        assert!(!env.operators.is_empty());

        let env = Environment::new(Prefs::default());
        assert!(env.scopes.find_unit(env.scopes.root(), "km").is_some());
    }
}
