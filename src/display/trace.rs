//! Text rendering of a statement's dependency tree, for debugging documents.
use crate::document::{BindingId, DocumentModel, EdgeKind, GraphKey, StatementId};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the statements `target` depends on, through the bindings it
/// references, down to the statements defining them. Shadowed definitions are
/// listed but not expanded; a statement reached twice is printed once and
/// referred back to by line.
pub fn format_trace(model: &DocumentModel, target: &StatementId) -> String {
    let mut tracer = Tracer {
        model,
        visited_statements: HashMap::new(),
        output: String::new(),
    };

    if model.statement(target).is_some() {
        let _ = writeln!(tracer.output, "TRACE for statement '{}' in '{}':", target, model.id());
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_statement(target, "", false);
    } else {
        let _ = writeln!(tracer.output, "Error: unknown statement '{}'", target);
    }
    tracer.output
}

enum Child {
    Statement { id: StatementId, obsolete: bool },
    Binding(BindingId),
}

struct Tracer<'a> {
    model: &'a DocumentModel,
    visited_statements: HashMap<StatementId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_statement(&mut self, id: &StatementId, prefix: &str, obsolete: bool) {
        let Some(statement) = self.model.statement(id) else {
            let _ = writeln!(self.output, "{}{} (removed)", prefix, id);
            return;
        };
        let line = statement.position.line_first;
        if let Some(&first_seen) = self.visited_statements.get(id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_statements.insert(id.clone(), line);

        let marker = if obsolete { " (obsolete)" } else { "" };
        let value = self.format_value(id);
        let _ = writeln!(self.output, "{}[L{}] {} {}{}", prefix, line, statement.node(), value, marker);
        if obsolete {
            return;
        }

        let children = self
            .model
            .graph()
            .navigation
            .outgoing(&GraphKey::from(id.clone()), &[EdgeKind::References])
            .into_iter()
            .filter_map(|k| k.as_binding().cloned())
            .map(Child::Binding)
            .collect();
        self.recurse_children(prefix, children);
    }

    fn trace_binding(&mut self, binding: &BindingId, prefix: &str) {
        let _ = writeln!(self.output, "{}{} ({})", prefix, binding.identifier, binding);

        let model = self.model;
        let navigation = &model.graph().navigation;
        let key = GraphKey::from(binding.clone());
        let mut children = Vec::new();
        for (kind, obsolete) in [(EdgeKind::Defines, false), (EdgeKind::Obsolete, true)] {
            children.extend(
                navigation
                    .outgoing(&key, &[kind])
                    .into_iter()
                    .filter_map(|k| k.as_statement().cloned())
                    .map(|id| Child::Statement { id, obsolete }),
            );
        }
        children.extend(
            navigation
                .outgoing(&key, &[EdgeKind::Inherits])
                .into_iter()
                .filter_map(|k| k.as_binding().cloned())
                .map(Child::Binding),
        );
        self.recurse_children(prefix, children);
    }

    fn recurse_children(&mut self, prefix: &str, children: Vec<Child>) {
        let stem = self.build_child_stem(prefix);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let connector = if i + 1 == count { "`-- " } else { "|-- " };
            let full_prefix = format!("{}{}", stem, connector);
            match child {
                Child::Statement { id, obsolete } => self.trace_statement(&id, &full_prefix, obsolete),
                Child::Binding(binding) => self.trace_binding(&binding, &full_prefix),
            }
        }
    }

    fn format_value(&self, id: &StatementId) -> String {
        let Some(statement) = self.model.statement(id) else {
            return "[?]".to_string();
        };
        if !statement.is_parseable() {
            return "[Err: unparsed]".to_string();
        }
        match statement.evaluation() {
            Some(evaluation) if evaluation.has_errors() => {
                let codes: Vec<&str> = evaluation.errors.iter().map(|e| e.code.as_str()).collect();
                format!("[Err: {}]", codes.join(", "))
            }
            Some(evaluation) => match &evaluation.value {
                Some(value) => format!("[{}]", value),
                None => "[-]".to_string(),
            },
            None => "[?]".to_string(),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`-- ", "    ").replace("|-- ", "|   ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prefs;
    use crate::environment::Environment;

    #[test]
    fn test_trace_shows_active_and_obsolete_definitions() {
        let mut env = Environment::new(Prefs::default());
        let mut doc = DocumentModel::new(&mut env, "doc");
        doc.load_text(&mut env, "p = 1\np = 2\nq = p * p");
        let q = doc.ids()[2].clone();
        let trace = format_trace(&doc, &q);
        let scope = doc.scope();
        let expected = format!(
            "TRACE for statement '{q}' in 'doc':\n\
             --------------------------------------------------\n\
             [L3] q = p * p [4]\n\
             `-- p (variable:{scope}/p)\n    \
             |-- [L2] p = 2 [2]\n    \
             `-- [L1] p = 1 [1] (obsolete)\n"
        );
        assert_eq!(trace, expected);
    }

    #[test]
    fn test_trace_follows_inherited_bindings_and_repeats() {
        let mut env = Environment::new(Prefs::default());
        let mut doc = DocumentModel::new(&mut env, "doc");
        doc.load_text(&mut env, "r = 2\narea = pi * r^2\narea + r");
        let last = doc.ids()[2].clone();
        let trace = format_trace(&doc, &last);
        assert!(trace.contains("pi (variable:0/pi)"));
        assert!(trace.contains("-> (Ref to L1)"));
        assert!(trace.contains("[L2] area = pi * r ^ 2 [12.5663706144]"));
    }

    #[test]
    fn test_trace_reports_errors_and_unknown_statements() {
        let mut env = Environment::new(Prefs::default());
        let mut doc = DocumentModel::new(&mut env, "doc");
        doc.load_text(&mut env, "1 m + 1 s");
        let trace = format_trace(&doc, &doc.ids()[0].clone());
        assert!(trace.contains("[Err: DIMENSION_MISMATCH, DIMENSION_MISMATCH]"));
        assert!(format_trace(&doc, &StatementId::from("nope")).starts_with("Error: unknown statement"));
    }
}
