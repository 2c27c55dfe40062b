//! Query text parser
//!
//! Grammar:
//!
//! ```text
//! query   := or
//! or      := and ( "OR" and )*
//! and     := unary ( ["AND"] unary )*
//! unary   := "-" unary | "NOT" unary | primary
//! primary := "(" or ")" | field ":" value
//! value   := bare | '"' quoted '"' | "{" braced "}"
//! ```
//!
//! Adjacent terms are ANDed. Everything after the first colon of a term is
//! its value, so `ref:refs/heads/a:b` has value `refs/heads/a:b`.

use crate::predicate::Predicate;

use super::builder::ChangeQueryBuilder;
use super::errors::{QueryError, QueryResult};

/// Nesting deeper than this is rejected before recursion gets expensive
const MAX_DEPTH: usize = 100;

pub(crate) fn parse(builder: &ChangeQueryBuilder, query: &str) -> QueryResult<Predicate> {
    let mut parser = Parser {
        builder,
        chars: query.chars().collect(),
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(QueryError::parse("empty query"));
    }
    let predicate = parser.parse_or()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(QueryError::parse_at("unexpected", parser.fragment_from(parser.pos)));
    }
    Ok(predicate)
}

struct Parser<'a> {
    builder: &'a ChangeQueryBuilder,
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> QueryResult<Predicate> {
        let mut children = vec![self.parse_and()?];
        loop {
            self.skip_whitespace();
            if !self.peek_keyword("OR") {
                break;
            }
            self.pos += 2;
            self.expect_operand("OR")?;
            children.push(self.parse_and()?);
        }
        Ok(Predicate::or(children))
    }

    fn parse_and(&mut self) -> QueryResult<Predicate> {
        let mut children = vec![self.parse_unary()?];
        loop {
            self.skip_whitespace();
            if self.at_end() || self.peek() == Some(')') || self.peek_keyword("OR") {
                break;
            }
            if self.peek_keyword("AND") {
                self.pos += 3;
                self.expect_operand("AND")?;
            }
            children.push(self.parse_unary()?);
        }
        Ok(Predicate::and(children))
    }

    fn parse_unary(&mut self) -> QueryResult<Predicate> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(QueryError::parse("unexpected end of query")),
            Some('-') => {
                self.pos += 1;
                self.expect_operand("-")?;
                Ok(Predicate::not(self.nested(Self::parse_unary)?))
            }
            Some('(') => {
                let start = self.pos;
                self.pos += 1;
                let inner = self.nested(Self::parse_or)?;
                self.skip_whitespace();
                if self.peek() != Some(')') {
                    return Err(QueryError::parse_at(
                        "unbalanced parenthesis",
                        self.fragment_from(start),
                    ));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(')') => Err(QueryError::parse_at("unexpected", ")")),
            Some(_) if self.peek_keyword("NOT") => {
                self.pos += 3;
                self.expect_operand("NOT")?;
                Ok(Predicate::not(self.nested(Self::parse_unary)?))
            }
            Some(_) if self.peek_keyword("OR") => Err(QueryError::parse_at("dangling operator", "OR")),
            Some(_) if self.peek_keyword("AND") => {
                Err(QueryError::parse_at("dangling operator", "AND"))
            }
            Some(_) => self.parse_term(),
        }
    }

    fn parse_term(&mut self) -> QueryResult<Predicate> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        if self.peek() != Some(':') {
            let word = self.read_bare();
            let token = format!("{}{}", name, word);
            if name.is_empty() {
                return Err(QueryError::parse_at("unexpected character", token));
            }
            return Err(QueryError::parse_at("expected field:value", token));
        }
        self.pos += 1;

        let value = match self.peek() {
            Some('"') => self.read_quoted()?,
            Some('{') => self.read_braced()?,
            Some(c) if !c.is_whitespace() && c != ')' => self.read_bare(),
            _ => return Err(QueryError::parse_at("missing value", format!("{}:", name))),
        };
        self.builder.build_operator(&name, &value)
    }

    /// Runs a recursive production with the depth guard applied
    fn nested(
        &mut self,
        production: fn(&mut Self) -> QueryResult<Predicate>,
    ) -> QueryResult<Predicate> {
        if self.depth >= MAX_DEPTH {
            return Err(QueryError::parse("query nesting too deep"));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn read_bare(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ')' {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_quoted(&mut self) -> QueryResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(QueryError::parse_at(
                        "unterminated quoted phrase",
                        self.fragment_from(start),
                    ))
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => {
                            return Err(QueryError::parse_at(
                                "unterminated quoted phrase",
                                self.fragment_from(start),
                            ))
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_braced(&mut self) -> QueryResult<String> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        while let Some(c) = self.peek() {
            if c == '}' {
                let body = self.chars[body_start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(body);
            }
            self.pos += 1;
        }
        Err(QueryError::parse_at(
            "unterminated brace phrase",
            self.fragment_from(start),
        ))
    }

    /// Fails when a prefix operator is not followed by anything
    fn expect_operand(&mut self, operator: &str) -> QueryResult<()> {
        self.skip_whitespace();
        if self.at_end() || self.peek() == Some(')') {
            return Err(QueryError::parse_at("dangling operator", operator));
        }
        Ok(())
    }

    /// True if `kw` starts at the cursor and ends at a term boundary
    fn peek_keyword(&self, kw: &str) -> bool {
        let len = kw.chars().count();
        if self.pos + len > self.chars.len() {
            return false;
        }
        let matches = self.chars[self.pos..self.pos + len]
            .iter()
            .copied()
            .eq(kw.chars());
        if !matches {
            return false;
        }
        match self.chars.get(self.pos + len) {
            None => true,
            Some(c) => c.is_whitespace() || *c == '(' || *c == ')' || *c == '-',
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn fragment_from(&self, start: usize) -> String {
        self.chars[start.min(self.chars.len())..].iter().collect()
    }
}
