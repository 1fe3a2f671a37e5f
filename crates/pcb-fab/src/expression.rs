//! Arithmetic expressions used in aperture macro bodies.
//!
//! Gerber macro expressions combine operators strictly in source order:
//! `1+2x3` is `(1+2)x3`. Only parentheses group. Multiplication is written
//! `x` because `*` terminates Gerber statements.

use std::collections::HashMap;

use crate::error::FabError;

/// Index of a node in an [`Expression`] arena.
pub type NodeId = usize;

/// Macro variable bindings, `$n` → value.
pub type Variables = HashMap<u32, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            'x' | 'X' => Some(BinaryOp::Mul),
            '/' => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Literal(f64),
    /// `$n` reference.
    Variable(u32),
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
}

/// A parsed expression: a flat node arena plus the index of its root.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    nodes: Vec<Node>,
    root: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lexeme {
    Number(f64),
    Variable(u32),
    Operator(char),
    Open,
    Close,
}

/// Working item during reduction: either a finished subtree or an operator
/// still waiting for its operands.
#[derive(Debug, Clone, Copy)]
enum Item {
    Node(NodeId),
    Operator(char),
}

impl Expression {
    pub fn parse(source: &str) -> Result<Expression, FabError> {
        let lexemes = tokenize(source)?;
        let mut nodes = Vec::new();
        let root = reduce(&lexemes, &mut nodes, source)?;
        Ok(Expression { nodes, root })
    }

    /// Expression consisting of a single constant.
    pub fn literal(value: f64) -> Expression {
        Expression {
            nodes: vec![Node::Literal(value)],
            root: 0,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Evaluate against `vars`. Unbound variables read as 0. Division by zero
    /// yields an infinity or NaN rather than an error.
    pub fn eval(&self, vars: &Variables) -> f64 {
        self.eval_node(self.root, vars)
    }

    fn eval_node(&self, id: NodeId, vars: &Variables) -> f64 {
        match self.nodes[id] {
            Node::Literal(v) => v,
            Node::Variable(idx) => vars.get(&idx).copied().unwrap_or(0.0),
            Node::Unary(UnaryOp::Plus, operand) => self.eval_node(operand, vars),
            Node::Unary(UnaryOp::Minus, operand) => -self.eval_node(operand, vars),
            Node::Binary(op, lhs, rhs) => {
                let a = self.eval_node(lhs, vars);
                let b = self.eval_node(rhs, vars);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                }
            }
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Lexeme>, FabError> {
    let mut lexemes = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '+' | '-' | 'x' | 'X' | '/' => {
                chars.next();
                lexemes.push(Lexeme::Operator(ch));
            }
            '(' => {
                chars.next();
                lexemes.push(Lexeme::Open);
            }
            ')' => {
                chars.next();
                lexemes.push(Lexeme::Close);
            }
            '$' => {
                chars.next();
                let mut end = start + 1;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                let idx: u32 = source[start + 1..end].parse().map_err(|_| {
                    FabError::MalformedExpression(format!("bad variable in {source:?}"))
                })?;
                lexemes.push(Lexeme::Variable(idx));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || c == '.') {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                let value: f64 = source[start..end].parse().map_err(|_| {
                    FabError::MalformedExpression(format!(
                        "bad number {:?} in {source:?}",
                        &source[start..end]
                    ))
                })?;
                lexemes.push(Lexeme::Number(value));
            }
            _ => {
                return Err(FabError::MalformedExpression(format!(
                    "unexpected {ch:?} in {source:?}"
                )));
            }
        }
    }

    Ok(lexemes)
}

fn reduce(lexemes: &[Lexeme], nodes: &mut Vec<Node>, source: &str) -> Result<NodeId, FabError> {
    let malformed = || FabError::MalformedExpression(source.to_string());
    let push = |nodes: &mut Vec<Node>, node: Node| {
        nodes.push(node);
        nodes.len() - 1
    };

    // Parenthesized groups first, each reduced to a single node.
    let mut items = Vec::with_capacity(lexemes.len());
    let mut i = 0;
    while i < lexemes.len() {
        match lexemes[i] {
            Lexeme::Number(v) => items.push(Item::Node(push(nodes, Node::Literal(v)))),
            Lexeme::Variable(idx) => items.push(Item::Node(push(nodes, Node::Variable(idx)))),
            Lexeme::Operator(op) => items.push(Item::Operator(op)),
            Lexeme::Close => return Err(malformed()),
            Lexeme::Open => {
                let mut depth = 0usize;
                let mut close = None;
                for (j, lexeme) in lexemes.iter().enumerate().skip(i) {
                    match lexeme {
                        Lexeme::Open => depth += 1,
                        Lexeme::Close => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let close = close.ok_or_else(malformed)?;
                let inner = reduce(&lexemes[i + 1..close], nodes, source)?;
                items.push(Item::Node(inner));
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }

    // Sign prefixes, right to left so that `--1` nests.
    let mut k = items.len();
    while k > 0 {
        k -= 1;
        let Item::Operator(op @ ('+' | '-')) = items[k] else {
            continue;
        };
        let in_prefix_position = k == 0 || matches!(items[k - 1], Item::Operator(_));
        if !in_prefix_position {
            continue;
        }
        if let Some(&Item::Node(operand)) = items.get(k + 1) {
            let unary = if op == '-' { UnaryOp::Minus } else { UnaryOp::Plus };
            items[k] = Item::Node(push(nodes, Node::Unary(unary, operand)));
            items.remove(k + 1);
        }
    }

    // Binary operators in source order, no precedence.
    while items.len() > 1 {
        let (Item::Node(lhs), Item::Operator(op), Some(&Item::Node(rhs))) =
            (items[0], items[1], items.get(2))
        else {
            return Err(malformed());
        };
        let op = BinaryOp::from_char(op).ok_or_else(malformed)?;
        let id = push(nodes, Node::Binary(op, lhs, rhs));
        items.drain(0..2);
        items[0] = Item::Node(id);
    }

    match items.as_slice() {
        [Item::Node(id)] => Ok(*id),
        _ => Err(malformed()),
    }
}
