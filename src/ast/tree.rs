//! AST nodes for an interpreter block. Nodes are owned by their parent, the
//! root by the script that parsed it, so the whole tree lives exactly as long
//! as its script. Literal nodes carry their constant value, computed once at
//! parse time.

use crate::ast::lexer::Token;
use crate::global::termination::SourceSpan;
use crate::values::ops::{ArithmeticOperator, ComparisonOperator};
use crate::values::ValueRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The top-level statement sequence.
    InterpreterBlock,

    // Statements
    Compound,
    EmptyStatement,
    If,
    While,
    DoWhile,
    For,
    Next,
    Break,
    Return,

    // Expressions
    Assignment,
    Ternary,
    LogicalOr,
    LogicalAnd,
    Arithmetic(ArithmeticOperator),
    Comparison(ComparisonOperator),
    Unary(UnaryOperator),
    Sequence,
    Subscript,
    MemberAccess,
    Call,
    NamedArgument,
    Identifier,
    Literal,
}

/// Child layout by kind:
/// - `If`: condition, then-statement, optional else-statement
/// - `While`: condition, body; `DoWhile`: body, condition
/// - `For`: induction identifier, range expression, body
/// - `Return`: optional value expression
/// - `Assignment`: target, value; `Ternary`: condition, yes, no
/// - `Subscript`: operand, index; `MemberAccess`: operand, member identifier
/// - `Call`: callee, then arguments (`NamedArgument` wraps name + value)
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub token: Token,
    pub children: Vec<AstNode>,
    pub cached_value: Option<ValueRef>,
}

impl AstNode {
    pub fn new(kind: NodeKind, token: Token) -> Self {
        AstNode {
            kind,
            token,
            children: Vec::new(),
            cached_value: None,
        }
    }

    pub fn with_children(kind: NodeKind, token: Token, children: Vec<AstNode>) -> Self {
        AstNode {
            kind,
            token,
            children,
            cached_value: None,
        }
    }

    pub fn literal(token: Token, value: ValueRef) -> Self {
        AstNode {
            kind: NodeKind::Literal,
            token,
            children: Vec::new(),
            cached_value: Some(value),
        }
    }

    pub fn span(&self) -> &SourceSpan {
        &self.token.span
    }

    /// Span covering this node and all of its children.
    pub fn full_span(&self) -> SourceSpan {
        self.children
            .iter()
            .fold(self.token.span.clone(), |acc, child| {
                acc.join(&child.full_span())
            })
    }

    /// The spelled name of an identifier node.
    pub fn identifier_name(&self) -> Option<&str> {
        match (&self.kind, &self.token.kind) {
            (NodeKind::Identifier, crate::ast::lexer::TokenKind::Identifier(name)) => Some(name),
            _ => None,
        }
    }
}
