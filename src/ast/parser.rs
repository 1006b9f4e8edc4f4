//! Recursive-descent parser producing the AST for an interpreter block.
//!
//! Precedence, tightest first: postfix (`[]` `.` `()`), `^` (right), unary
//! `+`/`-`, `*`/`/`/`%`, `+`/`-`, `:`, comparisons, `!`, `&`, `|`, ternary
//! `? else`, assignment (right).

use crate::ast::lexer::{Token, TokenKind};
use crate::ast::tree::{AstNode, NodeKind, UnaryOperator};
use crate::global::termination::{EidosError, EidosResult};
use crate::values::ops::{ArithmeticOperator, ComparisonOperator};
use crate::values::EidosValue;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    final_semicolon_optional: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], final_semicolon_optional: bool) -> Self {
        Parser {
            tokens,
            pos: 0,
            final_semicolon_optional,
        }
    }

    /// Parses the whole token stream into an interpreter-block node.
    pub fn parse_interpreter_block(mut self) -> EidosResult<AstNode> {
        let mut block = AstNode::new(NodeKind::InterpreterBlock, self.peek().clone());
        while self.peek().kind != TokenKind::Eof {
            block.children.push(self.parse_statement()?);
        }
        Ok(block)
    }

    // ---- token plumbing ---------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_second(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> EidosResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> EidosError {
        let token = self.peek();
        EidosError::parse(
            "parse",
            format!("unexpected token {}; expected {expected}", token.kind),
        )
        .with_span(token.span.clone())
    }

    /// A statement terminator is `;`, except that the final statement of the
    /// block may omit it when the script allows.
    fn expect_statement_terminator(&mut self) -> EidosResult<()> {
        if self.consume(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.final_semicolon_optional && self.check(&TokenKind::Eof) {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    // ---- statements -------------------------------------------------------

    fn parse_statement(&mut self) -> EidosResult<AstNode> {
        match self.peek().kind {
            TokenKind::LeftBrace => self.parse_compound_statement(),
            TokenKind::Semicolon => Ok(AstNode::new(NodeKind::EmptyStatement, self.advance())),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Next => {
                let node = AstNode::new(NodeKind::Next, self.advance());
                self.expect_statement_terminator()?;
                Ok(node)
            }
            TokenKind::Break => {
                let node = AstNode::new(NodeKind::Break, self.advance());
                self.expect_statement_terminator()?;
                Ok(node)
            }
            TokenKind::Return => {
                let token = self.advance();
                let mut node = AstNode::new(NodeKind::Return, token);
                if !self.check(&TokenKind::Semicolon) && !self.check(&TokenKind::Eof) {
                    node.children.push(self.parse_expression()?);
                }
                self.expect_statement_terminator()?;
                Ok(node)
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect_statement_terminator()?;
                Ok(expression)
            }
        }
    }

    fn parse_compound_statement(&mut self) -> EidosResult<AstNode> {
        let token = self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut node = AstNode::new(NodeKind::Compound, token);
        while !self.check(&TokenKind::RightBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            node.children.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(node)
    }

    fn parse_if_statement(&mut self) -> EidosResult<AstNode> {
        let token = self.expect(&TokenKind::If, "'if'")?;
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        let then_statement = self.parse_statement()?;
        let mut children = vec![condition, then_statement];
        if self.consume(&TokenKind::Else) {
            children.push(self.parse_statement()?);
        }
        Ok(AstNode::with_children(NodeKind::If, token, children))
    }

    fn parse_while_statement(&mut self) -> EidosResult<AstNode> {
        let token = self.expect(&TokenKind::While, "'while'")?;
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        let body = self.parse_statement()?;
        Ok(AstNode::with_children(
            NodeKind::While,
            token,
            vec![condition, body],
        ))
    }

    fn parse_do_while_statement(&mut self) -> EidosResult<AstNode> {
        let token = self.expect(&TokenKind::Do, "'do'")?;
        let body = self.parse_statement()?;
        self.expect(&TokenKind::While, "'while'")?;
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        self.expect_statement_terminator()?;
        Ok(AstNode::with_children(
            NodeKind::DoWhile,
            token,
            vec![body, condition],
        ))
    }

    fn parse_for_statement(&mut self) -> EidosResult<AstNode> {
        let token = self.expect(&TokenKind::For, "'for'")?;
        self.expect(&TokenKind::LeftParen, "'('")?;
        let induction = self.parse_identifier()?;
        self.expect(&TokenKind::In, "'in'")?;
        let range = self.parse_expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        let body = self.parse_statement()?;
        Ok(AstNode::with_children(
            NodeKind::For,
            token,
            vec![induction, range, body],
        ))
    }

    fn parse_identifier(&mut self) -> EidosResult<AstNode> {
        if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            Ok(AstNode::new(NodeKind::Identifier, self.advance()))
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    // ---- expressions ------------------------------------------------------

    fn parse_expression(&mut self) -> EidosResult<AstNode> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> EidosResult<AstNode> {
        let target = self.parse_ternary()?;
        if self.check(&TokenKind::Assign) {
            let token = self.advance();
            let value = self.parse_assignment()?;
            return Ok(AstNode::with_children(
                NodeKind::Assignment,
                token,
                vec![target, value],
            ));
        }
        Ok(target)
    }

    fn parse_ternary(&mut self) -> EidosResult<AstNode> {
        let condition = self.parse_logical_or()?;
        if self.check(&TokenKind::Question) {
            let token = self.advance();
            let yes = self.parse_ternary()?;
            self.expect(&TokenKind::Else, "'else'")?;
            let no = self.parse_ternary()?;
            return Ok(AstNode::with_children(
                NodeKind::Ternary,
                token,
                vec![condition, yes, no],
            ));
        }
        Ok(condition)
    }

    fn parse_logical_or(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_logical_and()?;
        while self.check(&TokenKind::Pipe) {
            let token = self.advance();
            let rhs = self.parse_logical_and()?;
            lhs = AstNode::with_children(NodeKind::LogicalOr, token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_logical_not()?;
        while self.check(&TokenKind::Ampersand) {
            let token = self.advance();
            let rhs = self.parse_logical_not()?;
            lhs = AstNode::with_children(NodeKind::LogicalAnd, token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_logical_not(&mut self) -> EidosResult<AstNode> {
        if self.check(&TokenKind::Not) {
            let token = self.advance();
            let operand = self.parse_logical_not()?;
            return Ok(AstNode::with_children(
                NodeKind::Unary(UnaryOperator::Not),
                token,
                vec![operand],
            ));
        }
        self.parse_comparison()
    }

    fn comparison_operator(&self) -> Option<ComparisonOperator> {
        match self.peek().kind {
            TokenKind::Equal => Some(ComparisonOperator::Equal),
            TokenKind::NotEqual => Some(ComparisonOperator::NotEqual),
            TokenKind::Less => Some(ComparisonOperator::Less),
            TokenKind::LessEqual => Some(ComparisonOperator::LessEqual),
            TokenKind::Greater => Some(ComparisonOperator::Greater),
            TokenKind::GreaterEqual => Some(ComparisonOperator::GreaterEqual),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_range()?;
        while let Some(op) = self.comparison_operator() {
            let token = self.advance();
            let rhs = self.parse_range()?;
            lhs = AstNode::with_children(NodeKind::Comparison(op), token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_range(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_additive()?;
        while self.check(&TokenKind::Colon) {
            let token = self.advance();
            let rhs = self.parse_additive()?;
            lhs = AstNode::with_children(NodeKind::Sequence, token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ArithmeticOperator::Add,
                TokenKind::Minus => ArithmeticOperator::Subtract,
                _ => break,
            };
            let token = self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = AstNode::with_children(NodeKind::Arithmetic(op), token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> EidosResult<AstNode> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => ArithmeticOperator::Multiply,
                TokenKind::Slash => ArithmeticOperator::Divide,
                TokenKind::Percent => ArithmeticOperator::Modulo,
                _ => break,
            };
            let token = self.advance();
            let rhs = self.parse_unary()?;
            lhs = AstNode::with_children(NodeKind::Arithmetic(op), token, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> EidosResult<AstNode> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            _ => None,
        };
        if let Some(op) = op {
            let token = self.advance();
            let operand = self.parse_unary()?;
            return Ok(AstNode::with_children(
                NodeKind::Unary(op),
                token,
                vec![operand],
            ));
        }
        self.parse_exponential()
    }

    fn parse_exponential(&mut self) -> EidosResult<AstNode> {
        let base = self.parse_postfix()?;
        if self.check(&TokenKind::Caret) {
            let token = self.advance();
            // right-associative, and the exponent may carry a unary sign
            let exponent = self.parse_unary()?;
            return Ok(AstNode::with_children(
                NodeKind::Arithmetic(ArithmeticOperator::Power),
                token,
                vec![base, exponent],
            ));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> EidosResult<AstNode> {
        let mut expression = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LeftBracket => {
                    let token = self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket, "']'")?;
                    expression = AstNode::with_children(
                        NodeKind::Subscript,
                        token,
                        vec![expression, index],
                    );
                }
                TokenKind::Dot => {
                    let token = self.advance();
                    let member = self.parse_identifier()?;
                    expression = AstNode::with_children(
                        NodeKind::MemberAccess,
                        token,
                        vec![expression, member],
                    );
                }
                TokenKind::LeftParen => {
                    let token = self.advance();
                    let mut children = vec![expression];
                    if !self.check(&TokenKind::RightParen) {
                        loop {
                            children.push(self.parse_argument()?);
                            if !self.consume(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RightParen, "')'")?;
                    expression = AstNode::with_children(NodeKind::Call, token, children);
                }
                _ => break,
            }
        }
        Ok(expression)
    }

    fn parse_argument(&mut self) -> EidosResult<AstNode> {
        if matches!(self.peek().kind, TokenKind::Identifier(_))
            && self.peek_second().kind == TokenKind::Assign
        {
            let name = self.advance();
            self.expect(&TokenKind::Assign, "'='")?;
            let value = self.parse_ternary()?;
            return Ok(AstNode::with_children(
                NodeKind::NamedArgument,
                name,
                vec![value],
            ));
        }
        self.parse_ternary()
    }

    fn parse_primary(&mut self) -> EidosResult<AstNode> {
        match self.peek().kind.clone() {
            TokenKind::IntegerLiteral(x) => {
                let token = self.advance();
                Ok(AstNode::literal(token, EidosValue::integer(x)))
            }
            TokenKind::FloatLiteral(x) => {
                let token = self.advance();
                Ok(AstNode::literal(token, EidosValue::float(x)))
            }
            TokenKind::StringLiteral(s) => {
                let token = self.advance();
                Ok(AstNode::literal(token, EidosValue::string(s)))
            }
            TokenKind::Identifier(_) => self.parse_identifier(),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::lexer::tokenize;

    fn parse(source: &str) -> AstNode {
        let tokens = tokenize(source).unwrap();
        Parser::new(&tokens, true).parse_interpreter_block().unwrap()
    }

    fn parse_err(source: &str) -> EidosError {
        let tokens = tokenize(source).unwrap();
        Parser::new(&tokens, true)
            .parse_interpreter_block()
            .unwrap_err()
    }

    #[test]
    fn statement_sequence() {
        let block = parse("x = 1; y = 2;");
        assert_eq!(block.kind, NodeKind::InterpreterBlock);
        assert_eq!(block.children.len(), 2);
        assert_eq!(block.children[0].kind, NodeKind::Assignment);
    }

    #[test]
    fn precedence_of_arithmetic() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let block = parse("1 + 2 * 3;");
        let add = &block.children[0];
        assert_eq!(add.kind, NodeKind::Arithmetic(ArithmeticOperator::Add));
        assert_eq!(
            add.children[1].kind,
            NodeKind::Arithmetic(ArithmeticOperator::Multiply)
        );
    }

    #[test]
    fn power_is_right_associative_and_tighter_than_unary() {
        // -2^2 parses as -(2^2)
        let block = parse("-2^2;");
        let negate = &block.children[0];
        assert_eq!(negate.kind, NodeKind::Unary(UnaryOperator::Minus));
        assert_eq!(
            negate.children[0].kind,
            NodeKind::Arithmetic(ArithmeticOperator::Power)
        );

        // 2^3^4 parses as 2^(3^4)
        let block = parse("2^3^4;");
        let outer = &block.children[0];
        assert_eq!(
            outer.children[1].kind,
            NodeKind::Arithmetic(ArithmeticOperator::Power)
        );
    }

    #[test]
    fn sequence_binds_tighter_than_comparison() {
        // 1:3 == 2 parses as (1:3) == 2
        let block = parse("1:3 == 2;");
        let comparison = &block.children[0];
        assert_eq!(
            comparison.kind,
            NodeKind::Comparison(ComparisonOperator::Equal)
        );
        assert_eq!(comparison.children[0].kind, NodeKind::Sequence);
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        // !a == b parses as !(a == b)
        let block = parse("!a == b;");
        let not = &block.children[0];
        assert_eq!(not.kind, NodeKind::Unary(UnaryOperator::Not));
        assert_eq!(
            not.children[0].kind,
            NodeKind::Comparison(ComparisonOperator::Equal)
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let block = parse("a = b = 1;");
        let outer = &block.children[0];
        assert_eq!(outer.kind, NodeKind::Assignment);
        assert_eq!(outer.children[1].kind, NodeKind::Assignment);
    }

    #[test]
    fn ternary_uses_else() {
        let block = parse("x ? 1 else 2;");
        let ternary = &block.children[0];
        assert_eq!(ternary.kind, NodeKind::Ternary);
        assert_eq!(ternary.children.len(), 3);
    }

    #[test]
    fn postfix_chain() {
        let block = parse("x[0].p(1, n=2);");
        let call = &block.children[0];
        assert_eq!(call.kind, NodeKind::Call);
        let callee = &call.children[0];
        assert_eq!(callee.kind, NodeKind::MemberAccess);
        assert_eq!(callee.children[0].kind, NodeKind::Subscript);
        assert_eq!(call.children[2].kind, NodeKind::NamedArgument);
    }

    #[test]
    fn control_flow_statements() {
        let block = parse("for (i in 1:3) { if (i == 2) next; else x = i; } while (F) break;");
        assert_eq!(block.children[0].kind, NodeKind::For);
        assert_eq!(block.children[1].kind, NodeKind::While);
    }

    #[test]
    fn do_while_statement() {
        let block = parse("do x = x + 1; while (x < 3);");
        let do_while = &block.children[0];
        assert_eq!(do_while.kind, NodeKind::DoWhile);
        assert_eq!(do_while.children[0].kind, NodeKind::Assignment);
    }

    #[test]
    fn literals_carry_cached_values() {
        let block = parse("42;");
        let literal = &block.children[0];
        assert_eq!(literal.kind, NodeKind::Literal);
        assert_eq!(
            *literal.cached_value.as_ref().unwrap().clone(),
            EidosValue::integer_singleton(42)
        );
    }

    #[test]
    fn missing_operand_points_at_the_offending_token() {
        let err = parse_err("x = 1 + ;");
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Parse);
        // caret belongs under the ';' at byte 8
        assert_eq!(err.span.unwrap().bytes, 8..9);
    }

    #[test]
    fn missing_final_semicolon_respects_the_option() {
        let tokens = tokenize("x = 1").unwrap();
        assert!(Parser::new(&tokens, true).parse_interpreter_block().is_ok());
        let tokens = tokenize("x = 1").unwrap();
        assert!(Parser::new(&tokens, false).parse_interpreter_block().is_err());
    }

    #[test]
    fn function_keyword_is_not_an_expression() {
        let err = parse_err("function foo() 1;");
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Parse);
    }
}
