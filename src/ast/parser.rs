//! Pratt parser for statements.
//!
//! ```text
//! statement  := "unit" ["(" scheme {"," scheme} ")"] name {name} ":" unit-body
//!             | ident "=" expr
//!             | expr
//! unit-body  := Dimension | [number ["/" number]] ["/"] unit-expr
//! ```
//!
//! Binding powers, loosest first: `to`/`in`, `or`, `and`, `not`, comparisons,
//! `+ -`, `* / of`, prefix `-` and functions, `^` (right associative),
//! postfix `%` and `!`. A number or parenthesised expression followed by known
//! unit names takes a unit literal: `2 m/s^2`.
use super::lexer::{tokenize, Token, TokenKind};
use super::node::{ConversionTarget, Node, NodeKind, UnitBody};
use crate::environment::Environment;
use crate::error::ParseError;
use crate::scope::ScopeId;
use crate::units::{CompoundUnit, Multiple, UnitAliases};
use std::sync::Arc;
use tracing::trace;

const KEYWORDS: [&str; 9] = ["to", "in", "of", "and", "or", "not", "true", "false", "unit"];

const CONVERSION_BP: u8 = 2;
const NOT_BP: u8 = 8;
const PREFIX_BP: u8 = 16;
const POSTFIX_BP: u8 = 20;

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// `(literal, left bp, right bp)` for infix operators.
fn infix_binding(token: &Token) -> Option<(String, u8, u8)> {
    let (literal, l, r) = match &token.kind {
        TokenKind::Ident(s) if s == "or" => ("or", 4, 5),
        TokenKind::Ident(s) if s == "and" => ("and", 6, 7),
        TokenKind::Ident(s) if s == "of" => ("of", 14, 15),
        TokenKind::Symbol(s @ ("<" | "<=" | ">" | ">=" | "==" | "!=")) => (*s, 10, 11),
        TokenKind::Symbol(s @ ("+" | "-")) => (*s, 12, 13),
        TokenKind::Symbol(s @ ("*" | "/")) => (*s, 14, 15),
        TokenKind::Symbol("^") => ("^", 19, 18),
        _ => return None,
    };
    Some((literal.to_string(), l, r))
}

/// One parsed line of a document.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub node: Arc<Node>,
    pub text: String,
    /// 1-based line number.
    pub line: usize,
    /// Byte range of the line within the document text.
    pub offset_first: usize,
    pub offset_last: usize,
}

pub struct Parser<'e> {
    env: &'e mut Environment,
    scope: ScopeId,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'e> Parser<'e> {
    pub fn new(env: &'e mut Environment, scope: ScopeId) -> Self {
        Self { env, scope, tokens: Vec::new(), pos: 0 }
    }

    /// Parses one statement. Unit definitions are registered into the
    /// parser's scope as soon as they parse.
    pub fn parse_statement(&mut self, text: &str) -> Result<Arc<Node>, ParseError> {
        self.tokens = tokenize(text)?;
        self.pos = 0;
        let node = self.statement()?;
        trace!(statement = %node, "Parsed statement");
        Ok(node)
    }

    /// Wraps text the grammar rejected so it can still occupy a document line.
    pub fn unparsed(&mut self, text: &str, error: ParseError) -> Arc<Node> {
        self.node(NodeKind::Unparsed { text: text.to_string(), error })
    }

    fn node(&mut self, kind: NodeKind) -> Arc<Node> {
        Arc::new(Node::new(self.env.node_ids.next_id(), kind))
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &[&str]) -> ParseError {
        ParseError::new(expected.iter().copied(), self.peek().start)
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), ParseError> {
        if self.peek().is_symbol(symbol) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&[symbol]))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            _ => Err(self.error(&["operator", "end of input"])),
        }
    }

    fn statement(&mut self) -> Result<Arc<Node>, ParseError> {
        if self.peek().is_ident("unit")
            && matches!(self.peek_at(1).kind, TokenKind::Ident(_) | TokenKind::Symbol("("))
        {
            return self.unit_definition();
        }
        if let TokenKind::Ident(name) = &self.peek().kind {
            if !is_keyword(name) && self.peek_at(1).is_symbol("=") {
                let identifier = name.clone();
                self.advance();
                self.advance();
                let ast = self.expression(0)?;
                self.expect_end()?;
                let defining_scope = self.scope;
                return Ok(self.node(NodeKind::VariableDefinition { identifier, defining_scope, ast }));
            }
        }
        let expr = self.expression(0)?;
        self.expect_end()?;
        Ok(expr)
    }

    fn expression(&mut self, min_bp: u8) -> Result<Arc<Node>, ParseError> {
        let mut lhs = self.prefix()?;
        loop {
            let token = self.peek().clone();
            if token.is_symbol("%") || token.is_symbol("!") {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.advance();
                let literal = token.describe();
                lhs = self.node(NodeKind::Unary { inner: lhs, literal, is_prefix: false });
                continue;
            }
            if token.is_ident("to") || token.is_ident("in") {
                if CONVERSION_BP < min_bp {
                    break;
                }
                self.advance();
                let target = self.conversion_target()?;
                lhs = self.node(NodeKind::UnitConversion { inner: lhs, target });
                continue;
            }
            let Some((literal, l_bp, r_bp)) = infix_binding(&token) else { break };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.expression(r_bp)?;
            lhs = self.node(NodeKind::Binary { left: lhs, right: rhs, literal });
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Arc<Node>, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(value) => {
                self.advance();
                let unit_literal = self.unit_literal()?;
                Ok(self.node(NodeKind::Number { value: *value, unit_literal }))
            }
            TokenKind::Symbol("(") => {
                self.advance();
                let inner = self.expression(0)?;
                self.expect_symbol(")")?;
                let unit_literal = self.unit_literal()?;
                Ok(self.node(NodeKind::Parens { inner, unit_literal }))
            }
            TokenKind::Symbol("-") => {
                self.advance();
                let inner = self.expression(PREFIX_BP)?;
                Ok(self.node(NodeKind::Unary { inner, literal: "-".to_string(), is_prefix: true }))
            }
            TokenKind::Ident(name) if name == "true" || name == "false" => {
                self.advance();
                Ok(self.node(NodeKind::Boolean(name == "true")))
            }
            TokenKind::Ident(name) if name == "not" => {
                self.advance();
                let inner = self.expression(NOT_BP)?;
                Ok(self.node(NodeKind::Unary { inner, literal: "not".to_string(), is_prefix: true }))
            }
            TokenKind::Ident(name) if !is_keyword(name) => {
                self.advance();
                if self.env.operators.is_function(name) && self.starts_operand() {
                    let inner = self.expression(PREFIX_BP)?;
                    return Ok(self.node(NodeKind::Unary { inner, literal: name.clone(), is_prefix: true }));
                }
                let scope = self.scope;
                Ok(self.node(NodeKind::Identifier { name: name.clone(), scope }))
            }
            _ => Err(self.error(&["number", "identifier", "("])),
        }
    }

    fn starts_operand(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Number(_) => true,
            TokenKind::Symbol(s) => *s == "(" || *s == "-",
            TokenKind::Ident(name) => !is_keyword(name) || name == "true" || name == "false" || name == "not",
            TokenKind::Eof => false,
        }
    }

    fn is_unit_at(&self, ahead: usize) -> bool {
        match &self.peek_at(ahead).kind {
            TokenKind::Ident(name) => !is_keyword(name) && self.env.scopes.find_unit(self.scope, name).is_some(),
            _ => false,
        }
    }

    /// A run of unit names, optionally with integer powers and `*`/`/`
    /// between them. Returns `None` when no unit name follows.
    fn unit_literal(&mut self) -> Result<Option<CompoundUnit>, ParseError> {
        if !self.is_unit_at(0) {
            return Ok(None);
        }
        let mut unit = CompoundUnit::empty();
        let mut denominator = false;
        loop {
            if self.is_unit_at(0) {
                let term = self.unit_term()?;
                unit = if denominator { unit.per(&term) } else { unit.by(&term) };
            } else if (self.peek().is_symbol("/") || self.peek().is_symbol("*")) && self.is_unit_at(1) {
                denominator = self.peek().is_symbol("/");
                self.advance();
            } else {
                break;
            }
        }
        Ok(Some(unit))
    }

    fn unit_term(&mut self) -> Result<CompoundUnit, ParseError> {
        let token = self.advance();
        let TokenKind::Ident(name) = &token.kind else {
            return Err(ParseError::new(["unit"], token.start));
        };
        let unit = self
            .env
            .scopes
            .find_unit(self.scope, name)
            .ok_or_else(|| ParseError::new(["unit"], token.start))?;
        let unit = CompoundUnit::named(unit);
        if !self.peek().is_symbol("^") {
            return Ok(unit);
        }
        self.advance();
        let negative = self.peek().is_symbol("-");
        if negative {
            self.advance();
        }
        match self.peek().kind {
            TokenKind::Number(n) if n.fract() == 0.0 => {
                self.advance();
                let power = if negative { -(n as i32) } else { n as i32 };
                Ok(unit.pow(power))
            }
            _ => Err(self.error(&["integer"])),
        }
    }

    fn conversion_target(&mut self) -> Result<ConversionTarget, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            if name == "scheme" && !self.is_unit_at(0) {
                self.advance();
                return Ok(ConversionTarget::DefaultScheme);
            }
            if self.env.scopes.catalog(self.scope).schemes().has_scheme(name) {
                let scheme = name.clone();
                self.advance();
                return Ok(ConversionTarget::Scheme(scheme));
            }
        }
        match self.unit_literal()? {
            Some(unit) => Ok(ConversionTarget::Unit(unit)),
            None => Err(self.error(&["unit", "scheme"])),
        }
    }

    fn unit_definition(&mut self) -> Result<Arc<Node>, ParseError> {
        self.advance();
        let mut schemes = Vec::new();
        if self.peek().is_symbol("(") {
            self.advance();
            loop {
                match self.advance().kind {
                    TokenKind::Ident(name) => schemes.push(name),
                    _ => return Err(ParseError::new(["scheme name"], self.peek().start)),
                }
                if self.peek().is_symbol(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_symbol(")")?;
        }

        let mut names = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Ident(name) if !is_keyword(name) => {
                    names.push(name.clone());
                    self.advance();
                }
                TokenKind::Symbol(",") if !names.is_empty() => {
                    self.advance();
                }
                _ => break,
            }
        }
        if names.is_empty() {
            return Err(self.error(&["unit name"]));
        }
        self.expect_symbol(":")?;

        let body = self.unit_body()?;
        self.expect_end()?;
        self.register_unit(&names, &schemes, &body)?;

        let scope = self.scope;
        Ok(self.node(NodeKind::UnitDefinition { names, schemes, body, scope }))
    }

    fn unit_body(&mut self) -> Result<UnitBody, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            if !self.is_unit_at(0) && matches!(self.peek_at(1).kind, TokenKind::Eof) {
                let dimension = name.clone();
                self.advance();
                return Ok(UnitBody::Dimension(dimension));
            }
        }
        let mut top = 1.0;
        let mut bottom = 1.0;
        if let TokenKind::Number(n) = self.peek().kind {
            top = n;
            self.advance();
            if self.peek().is_symbol("/") {
                if let TokenKind::Number(d) = self.peek_at(1).kind {
                    bottom = d;
                    self.advance();
                    self.advance();
                }
            }
        }
        let per = self.peek().is_symbol("/");
        if per {
            self.advance();
        }
        let unit = self.unit_literal()?.ok_or_else(|| self.error(&["unit", "Dimension"]))?;
        let unit = if per { CompoundUnit::empty().per(&unit) } else { unit };
        Ok(UnitBody::Derived { multiple: Multiple::new(top, bottom), unit })
    }

    fn register_unit(&mut self, names: &[String], schemes: &[String], body: &UnitBody) -> Result<(), ParseError> {
        if matches!(body, UnitBody::Derived { unit, .. } if unit.is_empty()) {
            return Err(self.error(&["unit"]));
        }
        let canonical = &names[0];
        let table = self.env.scopes.units_mut(self.scope);
        match body {
            UnitBody::Dimension(dimension) => {
                table.add_base_unit(canonical, dimension);
            }
            UnitBody::Derived { multiple, unit } => {
                table.add_derived_unit(canonical, *multiple, unit);
            }
        }
        if names.len() > 1 {
            table.add_aliases(canonical, UnitAliases::from_names(&names[1..]));
        }
        for scheme in schemes {
            table.add_to_scheme(scheme, canonical);
        }
        Ok(())
    }
}

/// Parses every non-blank line of `text` into `scope`, in order, so units
/// defined on earlier lines are known to later ones. Lines that fail to parse
/// become `Unparsed` nodes.
pub fn parse_document(env: &mut Environment, scope: ScopeId, text: &str) -> Vec<ParsedLine> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let first = offset;
        offset += raw.len();
        let content = raw.trim_end_matches(|c| c == '\n' || c == '\r');
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let mut parser = Parser::new(env, scope);
        let node = match parser.parse_statement(content) {
            Ok(node) => node,
            Err(error) => parser.unparsed(content, error),
        };
        lines.push(ParsedLine {
            node,
            text: content.to_string(),
            line: idx + 1,
            offset_first: first,
            offset_last: first + content.len(),
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prefs;
    use rstest::rstest;

    fn env() -> (Environment, ScopeId) {
        let mut env = Environment::new(Prefs::default());
        let root = env.scopes.root();
        let scope = env.scopes.new_scope(root, Some("doc"));
        (env, scope)
    }

    fn render(env: &mut Environment, scope: ScopeId, text: &str) -> String {
        Parser::new(env, scope).parse_statement(text).unwrap().to_string()
    }

    fn shape(node: &Node) -> String {
        match &node.kind {
            NodeKind::Binary { left, right, literal } => format!("({} {} {})", shape(left), literal, shape(right)),
            NodeKind::Unary { inner, literal, is_prefix: true } => format!("({} {})", literal, shape(inner)),
            NodeKind::Unary { inner, literal, is_prefix: false } => format!("({} {})", shape(inner), literal),
            NodeKind::Parens { inner, .. } => shape(inner),
            NodeKind::UnitConversion { inner, .. } => format!("({} in ..)", shape(inner)),
            NodeKind::VariableDefinition { identifier, ast, .. } => format!("{} = {}", identifier, shape(ast)),
            _ => node.to_string(),
        }
    }

    #[rstest]
    #[case("1 + 2 * 3", "(1 + (2 * 3))")]
    #[case("2 ^ 3 ^ 2", "(2 ^ (3 ^ 2))")]
    #[case("-2 ^ 2", "(- (2 ^ 2))")]
    #[case("10% of 150", "((10 %) of 150)")]
    #[case("150 + 10%", "(150 + (10 %))")]
    #[case("3! * 2", "((3 !) * 2)")]
    #[case("not a and b", "((not a) and b)")]
    #[case("a < b or c", "((a < b) or c)")]
    #[case("1 + 2 in m", "((1 + 2) in ..)")]
    #[case("sqrt 16 * 2", "((sqrt 16) * 2)")]
    #[case("x = y - 1", "x = (y - 1)")]
    fn test_precedence(#[case] text: &str, #[case] expected: &str) {
        let (mut env, scope) = env();
        let node = Parser::new(&mut env, scope).parse_statement(text).unwrap();
        assert_eq!(shape(&node), expected);
    }

    #[test]
    fn test_unit_literals() {
        let (mut env, scope) = env();
        assert_eq!(render(&mut env, scope, "2 m/s^2"), "2 m/s^2");
        assert_eq!(render(&mut env, scope, "3 kg m/s^2"), "3 kg m/s^2");
        // `/` followed by a number is division, not part of the unit.
        assert_eq!(render(&mut env, scope, "4 m / 2"), "4 m / 2");
        assert_eq!(render(&mut env, scope, "(1 + 1) km"), "(1 + 1) km");
        assert_eq!(render(&mut env, scope, "2 meters"), "2 m");
    }

    #[test]
    fn test_unit_definition_registers_immediately() {
        let (mut env, scope) = env();
        let node = Parser::new(&mut env, scope).parse_statement("unit (Silly) smoot smoots: 1.7018 m").unwrap();
        assert_eq!(node.defined_unit(), Some(("smoot", scope)));
        assert!(env.scopes.find_unit(scope, "smoots").is_some());
        assert!(env.scopes.catalog(scope).schemes().contains("Silly", "smoot"));
        assert_eq!(render(&mut env, scope, "2 smoot"), "2 smoot");
        assert!(env.scopes.find_unit(env.scopes.root(), "smoot").is_none());

        Parser::new(&mut env, scope).parse_statement("unit bit: Information").unwrap();
        let bit = env.scopes.find_unit(scope, "bit").unwrap();
        assert_eq!(bit.dimension().simple_name(), Some("Information"));

        Parser::new(&mut env, scope).parse_statement("unit bps: /s").unwrap();
        let bps = env.scopes.find_unit(scope, "bps").unwrap();
        assert_eq!(bps.dimension().to_string(), "1/Time");
    }

    #[test]
    fn test_conversion_targets() {
        let (mut env, scope) = env();
        let node = Parser::new(&mut env, scope).parse_statement("2000 m in km").unwrap();
        assert!(matches!(&node.kind, NodeKind::UnitConversion { target: ConversionTarget::Unit(u), .. } if u.name() == Some("km")));
        let node = Parser::new(&mut env, scope).parse_statement("5 km to Imperial").unwrap();
        assert!(matches!(&node.kind, NodeKind::UnitConversion { target: ConversionTarget::Scheme(s), .. } if s == "Imperial"));
        let node = Parser::new(&mut env, scope).parse_statement("5 km to scheme").unwrap();
        assert!(matches!(&node.kind, NodeKind::UnitConversion { target: ConversionTarget::DefaultScheme, .. }));
    }

    #[rstest]
    #[case("1 +", 3)]
    #[case("(1 + 2", 6)]
    #[case("2 in parsecs", 5)]
    #[case("x = ", 4)]
    fn test_errors_carry_offsets(#[case] text: &str, #[case] offset: usize) {
        let (mut env, scope) = env();
        let err = Parser::new(&mut env, scope).parse_statement(text).unwrap_err();
        assert_eq!(err.offset, offset);
        assert!(!err.expected.is_empty());
    }

    #[test]
    fn test_parse_document_tracks_lines() {
        let (mut env, scope) = env();
        let text = "unit smoot: 1.7018 m\n\n// comment\nx = 2 smoot\n1 +\n";
        let lines = parse_document(&mut env, scope, text);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].line, 4);
        assert_eq!(lines[1].offset_first, 33);
        assert_eq!(&text[lines[1].offset_first..lines[1].offset_last], "x = 2 smoot");
        assert!(lines[1].node.is_parseable());
        assert!(!lines[2].node.is_parseable());
    }
}
