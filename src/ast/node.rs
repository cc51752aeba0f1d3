//! The immutable statement AST.
//!
//! Nodes are shared as `Arc<Node>` between statements and scope variable
//! tables. Evaluation never writes to them; per-evaluation annotations live
//! in a side table keyed by [`NodeId`].
use crate::error::ParseError;
use crate::scope::ScopeId;
use crate::units::{CompoundUnit, Multiple};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Hands out node ids, unique within one environment.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionTarget {
    Unit(CompoundUnit),
    Scheme(String),
    /// `to scheme`: the session's preferred scheme.
    DefaultScheme,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitBody {
    /// `unit m: Length`
    Dimension(String),
    /// `unit km: 1000 m`
    Derived { multiple: Multiple, unit: CompoundUnit },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Number {
        value: f64,
        unit_literal: Option<CompoundUnit>,
    },
    Boolean(bool),
    Identifier {
        name: String,
        scope: ScopeId,
    },
    Binary {
        left: Arc<Node>,
        right: Arc<Node>,
        literal: String,
    },
    Unary {
        inner: Arc<Node>,
        literal: String,
        is_prefix: bool,
    },
    Parens {
        inner: Arc<Node>,
        unit_literal: Option<CompoundUnit>,
    },
    UnitConversion {
        inner: Arc<Node>,
        target: ConversionTarget,
    },
    VariableDefinition {
        identifier: String,
        defining_scope: ScopeId,
        ast: Arc<Node>,
    },
    UnitDefinition {
        /// Canonical name first, then singular, plural and other aliases.
        names: Vec<String>,
        schemes: Vec<String>,
        body: UnitBody,
        scope: ScopeId,
    },
    /// Text the grammar could not interpret.
    Unparsed {
        text: String,
        error: ParseError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    pub fn is_parseable(&self) -> bool {
        !matches!(self.kind, NodeKind::Unparsed { .. })
    }

    pub fn defined_variable(&self) -> Option<(&str, ScopeId)> {
        match &self.kind {
            NodeKind::VariableDefinition { identifier, defining_scope, .. } => {
                Some((identifier.as_str(), *defining_scope))
            }
            _ => None,
        }
    }

    pub fn defined_unit(&self) -> Option<(&str, ScopeId)> {
        match &self.kind {
            NodeKind::UnitDefinition { names, scope, .. } => names.first().map(|n| (n.as_str(), *scope)),
            _ => None,
        }
    }

    /// Children in evaluation order.
    pub fn children(&self) -> Vec<&Arc<Node>> {
        match &self.kind {
            NodeKind::Binary { left, right, .. } => vec![left, right],
            NodeKind::Unary { inner, .. }
            | NodeKind::Parens { inner, .. }
            | NodeKind::UnitConversion { inner, .. } => vec![inner],
            NodeKind::VariableDefinition { ast, .. } => vec![ast],
            _ => Vec::new(),
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Variable references `(name, use-site scope)` in source order.
    pub fn identifiers(&self) -> Vec<(&str, ScopeId)> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let NodeKind::Identifier { name, scope } = &node.kind {
                out.push((name.as_str(), *scope));
            }
        });
        out
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        let mut found = None;
        self.walk(&mut |node| {
            if node.id == id {
                found = Some(node);
            }
        });
        found
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_unit = |f: &mut fmt::Formatter<'_>, unit: &Option<CompoundUnit>| match unit {
            Some(unit) => write!(f, " {}", unit),
            None => Ok(()),
        };
        match &self.kind {
            NodeKind::Number { value, unit_literal } => {
                write!(f, "{}", value)?;
                with_unit(f, unit_literal)
            }
            NodeKind::Boolean(b) => write!(f, "{}", b),
            NodeKind::Identifier { name, .. } => f.write_str(name),
            NodeKind::Binary { left, right, literal } => write!(f, "{} {} {}", left, literal, right),
            NodeKind::Unary { inner, literal, is_prefix: true } => {
                if literal.chars().all(char::is_alphabetic) {
                    write!(f, "{} {}", literal, inner)
                } else {
                    write!(f, "{}{}", literal, inner)
                }
            }
            NodeKind::Unary { inner, literal, is_prefix: false } => write!(f, "{}{}", inner, literal),
            NodeKind::Parens { inner, unit_literal } => {
                write!(f, "({})", inner)?;
                with_unit(f, unit_literal)
            }
            NodeKind::UnitConversion { inner, target } => match target {
                ConversionTarget::Unit(unit) => write!(f, "{} in {}", inner, unit),
                ConversionTarget::Scheme(scheme) => write!(f, "{} in {}", inner, scheme),
                ConversionTarget::DefaultScheme => write!(f, "{} to scheme", inner),
            },
            NodeKind::VariableDefinition { identifier, ast, .. } => write!(f, "{} = {}", identifier, ast),
            NodeKind::UnitDefinition { names, schemes, body, .. } => {
                f.write_str("unit ")?;
                if !schemes.is_empty() {
                    write!(f, "({}) ", schemes.join(", "))?;
                }
                write!(f, "{}: ", names.join(" "))?;
                match body {
                    UnitBody::Dimension(name) => f.write_str(name),
                    UnitBody::Derived { multiple, unit } => write!(f, "{} {}", multiple, unit),
                }
            }
            NodeKind::Unparsed { text, .. } => f.write_str(text),
        }
    }
}
