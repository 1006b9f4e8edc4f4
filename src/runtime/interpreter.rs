//! The tree-walking interpreter. Walks a parsed interpreter block against a
//! variables scope and a function map, producing a value or raising through
//! the termination channel. In-place mutation happens only on uniquely owned
//! values; everything else copies first.

use core::any::Any;
use std::rc::Rc;

use log::trace;

use crate::ast::tree::{AstNode, NodeKind, UnaryOperator};
use crate::ast::EidosScript;
use crate::global::termination::{
    pop_error_position, push_error_position, register_script_source, terminate, EidosError,
    EidosResult,
};
use crate::runtime::builtins;
use crate::runtime::functions::{FunctionImpl, FunctionMap, FunctionSignature};
use crate::runtime::symbol_table::{ScopeKind, ScopeRef};
use crate::utils::interner::SymbolId;
use crate::values::{ops, EidosType, EidosValue, ValueData, ValueRef};

/// Statement outcome: normal completion with a value, a loop jump, or a
/// pending return unwinding the block.
enum Flow {
    Normal(ValueRef),
    Next,
    Break,
    Return(ValueRef),
}

pub struct Interpreter {
    script: Rc<EidosScript>,
    scope: ScopeRef,
    functions: Rc<FunctionMap>,
    host: Option<Rc<dyn Any>>,
    output: String,
}

impl Interpreter {
    /// Builds an interpreter over a tokenized and parsed script. The scope
    /// must be a variables scope.
    pub fn new(
        script: EidosScript,
        scope: ScopeRef,
        functions: Rc<FunctionMap>,
        host: Option<Rc<dyn Any>>,
    ) -> EidosResult<Self> {
        if script.root().is_none() {
            return Err(terminate(EidosError::internal(
                "Interpreter",
                "script has no parsed interpreter block",
            )));
        }
        if scope.borrow().kind() != ScopeKind::Variables {
            return Err(terminate(EidosError::internal(
                "Interpreter",
                "interpreter requires a variables scope",
            )));
        }
        Ok(Interpreter {
            script: Rc::new(script),
            scope,
            functions,
            host,
            output: String::new(),
        })
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    pub fn functions(&self) -> &Rc<FunctionMap> {
        &self.functions
    }

    pub fn host(&self) -> Option<&Rc<dyn Any>> {
        self.host.as_ref()
    }

    /// Text produced by `print`/`cat`/`str` and the top-level result echo.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        core::mem::take(&mut self.output)
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Evaluates the interpreter block. Returns the value of the last
    /// expression statement (NULL when there is none, or when a bare
    /// `return` ended the block); with `print_last_result`, a visible result
    /// is echoed to the output stream.
    pub fn evaluate_interpreter_block(
        &mut self,
        print_last_result: bool,
    ) -> EidosResult<ValueRef> {
        register_script_source(self.script.name(), self.script.source());
        let script = self.script.clone();
        let root = script.root().expect("checked at construction");
        let mut result = EidosValue::null_invisible();
        for statement in &root.children {
            push_error_position(statement.full_span());
            match self.evaluate_statement(statement).map_err(terminate)? {
                Flow::Normal(value) => result = value,
                Flow::Return(value) => {
                    pop_error_position();
                    result = value;
                    break;
                }
                Flow::Next | Flow::Break => {
                    return Err(terminate(
                        EidosError::parse(
                            "EvaluateInterpreterBlock",
                            "a loop jump statement was encountered outside of a loop",
                        )
                        .with_span(statement.full_span()),
                    ));
                }
            }
            pop_error_position();
        }
        if print_last_result && !result.is_invisible() {
            let mut line = String::new();
            let _ = result.stream_to(&mut line);
            line.push('\n');
            self.write_output(&line);
        }
        trace!("interpreter block evaluated; result type {}", result.value_type());
        Ok(result)
    }

    // ---- statements -------------------------------------------------------

    fn evaluate_statement(&mut self, node: &AstNode) -> EidosResult<Flow> {
        match &node.kind {
            NodeKind::EmptyStatement => Ok(Flow::Normal(EidosValue::null_invisible())),
            NodeKind::Compound => {
                let mut result = EidosValue::null_invisible();
                for child in &node.children {
                    match self.evaluate_statement(child)? {
                        Flow::Normal(value) => result = value,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal(result))
            }
            NodeKind::If => {
                if self.evaluate_condition(&node.children[0])? {
                    self.evaluate_statement(&node.children[1])
                } else if let Some(else_statement) = node.children.get(2) {
                    self.evaluate_statement(else_statement)
                } else {
                    Ok(Flow::Normal(EidosValue::null_invisible()))
                }
            }
            NodeKind::While => {
                while self.evaluate_condition(&node.children[0])? {
                    match self.evaluate_statement(&node.children[1])? {
                        Flow::Break => break,
                        Flow::Next | Flow::Normal(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(EidosValue::null_invisible()))
            }
            NodeKind::DoWhile => {
                loop {
                    match self.evaluate_statement(&node.children[0])? {
                        Flow::Break => break,
                        Flow::Next | Flow::Normal(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if !self.evaluate_condition(&node.children[1])? {
                        break;
                    }
                }
                Ok(Flow::Normal(EidosValue::null_invisible()))
            }
            NodeKind::For => self.evaluate_for_statement(node),
            NodeKind::Next => Ok(Flow::Next),
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Return => {
                let value = match node.children.first() {
                    Some(expression) => self.evaluate_expression(expression)?,
                    None => EidosValue::null_invisible(),
                };
                Ok(Flow::Return(value))
            }
            _ => Ok(Flow::Normal(self.evaluate_expression(node)?)),
        }
    }

    fn evaluate_for_statement(&mut self, node: &AstNode) -> EidosResult<Flow> {
        let induction = &node.children[0];
        let name = SymbolId::new(
            induction
                .identifier_name()
                .ok_or_else(|| EidosError::internal("Evaluate_For", "malformed for statement"))?,
        );
        let range = self.evaluate_expression(&node.children[1])?;
        for index in 0..range.count() {
            let element = range.value_at_index(index)?;
            // hot path: the induction variable is rebound without copying
            self.scope
                .borrow_mut()
                .set_value_no_copy(name, element)
                .map_err(|err| self.with_node_span(err, induction))?;
            match self.evaluate_statement(&node.children[2])? {
                Flow::Break => break,
                Flow::Next | Flow::Normal(_) => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(EidosValue::null_invisible()))
    }

    fn evaluate_condition(&mut self, node: &AstNode) -> EidosResult<bool> {
        let value = self.evaluate_expression(node)?;
        if value.count() != 1 {
            return Err(self.with_node_span(
                EidosError::type_error(
                    "EvaluateCondition",
                    format!(
                        "condition must be a singleton logical, got length {}",
                        value.count()
                    ),
                ),
                node,
            ));
        }
        value
            .logical_at(0)
            .map_err(|err| self.with_node_span(err, node))
    }

    // ---- expressions ------------------------------------------------------

    fn with_node_span(&self, mut err: EidosError, node: &AstNode) -> EidosError {
        if err.span.is_none() {
            err.span = Some(node.full_span());
        }
        err
    }

    fn evaluate_expression(&mut self, node: &AstNode) -> EidosResult<ValueRef> {
        match &node.kind {
            NodeKind::Literal => Ok(node
                .cached_value
                .clone()
                .expect("literal nodes carry their value")),
            NodeKind::Identifier => {
                let name = SymbolId::new(node.identifier_name().expect("identifier node"));
                self.scope
                    .borrow()
                    .get_value(name)
                    .map_err(|mut err| {
                        err.site = "Evaluate_Identifier";
                        self.with_node_span(err, node)
                    })
            }
            NodeKind::Assignment => {
                let value = self.evaluate_expression(&node.children[1])?;
                // an assignment expression yields an invisible copy; the
                // stored value keeps its unique ownership where it has it
                let mut result = value.copy_values();
                result.invert_invisibility();
                self.assign(&node.children[0], value)?;
                Ok(Rc::new(result))
            }
            NodeKind::Ternary => {
                if self.evaluate_condition(&node.children[0])? {
                    self.evaluate_expression(&node.children[1])
                } else {
                    self.evaluate_expression(&node.children[2])
                }
            }
            NodeKind::LogicalAnd => {
                let lhs = self.evaluate_expression(&node.children[0])?;
                let rhs = self.evaluate_expression(&node.children[1])?;
                ops::logical_and(&lhs, &rhs)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::LogicalOr => {
                let lhs = self.evaluate_expression(&node.children[0])?;
                let rhs = self.evaluate_expression(&node.children[1])?;
                ops::logical_or(&lhs, &rhs)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Unary(operator) => {
                let operand = self.evaluate_expression(&node.children[0])?;
                let result = match operator {
                    UnaryOperator::Minus => ops::negate(&operand),
                    UnaryOperator::Plus => ops::unary_plus(&operand),
                    UnaryOperator::Not => ops::logical_not(&operand),
                };
                result.map(Rc::new).map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Arithmetic(operator) => {
                let lhs = self.evaluate_expression(&node.children[0])?;
                let rhs = self.evaluate_expression(&node.children[1])?;
                ops::arithmetic(*operator, &lhs, &rhs)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Comparison(operator) => {
                let lhs = self.evaluate_expression(&node.children[0])?;
                let rhs = self.evaluate_expression(&node.children[1])?;
                ops::compare(*operator, &lhs, &rhs)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Sequence => {
                let from = self.evaluate_expression(&node.children[0])?;
                let to = self.evaluate_expression(&node.children[1])?;
                ops::sequence(&from, &to)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Subscript => {
                let operand = self.evaluate_expression(&node.children[0])?;
                let index = self.evaluate_expression(&node.children[1])?;
                let indices = self
                    .subscript_indices(&operand, &index)
                    .map_err(|err| self.with_node_span(err, node))?;
                ops::select("Evaluate_Subscript", &operand, &indices)
                    .map(Rc::new)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::MemberAccess => {
                let operand = self.evaluate_expression(&node.children[0])?;
                let member = SymbolId::new(
                    node.children[1]
                        .identifier_name()
                        .expect("member node holds an identifier"),
                );
                let ValueData::Object(object) = operand.data() else {
                    return Err(self.with_node_span(
                        EidosError::type_error(
                            "Evaluate_MemberAccess",
                            format!(
                                "operator . may only be used on object values, not {}",
                                operand.value_type()
                            ),
                        ),
                        node,
                    ));
                };
                object
                    .get_property(member)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::Call => self.evaluate_call(node),
            NodeKind::NamedArgument => Err(self.with_node_span(
                EidosError::internal(
                    "Evaluate_Expression",
                    "named argument outside of a call",
                ),
                node,
            )),
            _ => Err(self.with_node_span(
                EidosError::internal(
                    "Evaluate_Expression",
                    format!("unexpected statement node {:?} in expression position", node.kind),
                ),
                node,
            )),
        }
    }

    // ---- calls ------------------------------------------------------------

    fn evaluate_call(&mut self, node: &AstNode) -> EidosResult<ValueRef> {
        let callee = &node.children[0];
        let mut positional = Vec::new();
        let mut named = Vec::new();
        for argument in &node.children[1..] {
            if argument.kind == NodeKind::NamedArgument {
                let crate::ast::lexer::TokenKind::Identifier(name) = &argument.token.kind else {
                    return Err(EidosError::internal("Evaluate_Call", "malformed named argument"));
                };
                let value = self.evaluate_expression(&argument.children[0])?;
                named.push((SymbolId::new(name), value));
            } else {
                positional.push(self.evaluate_expression(argument)?);
            }
        }

        match &callee.kind {
            NodeKind::Identifier => {
                let name = SymbolId::new(callee.identifier_name().expect("identifier node"));
                let Some(signature) = self.functions.lookup(name) else {
                    return Err(self.with_node_span(
                        EidosError::undefined_identifier("Evaluate_Call", name),
                        callee,
                    ));
                };
                let arguments = signature
                    .match_arguments(positional, named)
                    .map_err(|err| self.with_node_span(err, node))?;
                self.invoke(&signature, None, &arguments)
                    .map_err(|err| self.with_node_span(err, node))
            }
            NodeKind::MemberAccess => {
                let receiver = self.evaluate_expression(&callee.children[0])?;
                let method = SymbolId::new(
                    callee.children[1]
                        .identifier_name()
                        .expect("member node holds an identifier"),
                );
                let ValueData::Object(object) = receiver.data() else {
                    return Err(self.with_node_span(
                        EidosError::type_error(
                            "Evaluate_Call",
                            format!(
                                "method calls require an object receiver, not {}",
                                receiver.value_type()
                            ),
                        ),
                        callee,
                    ));
                };
                let Some(signature) = object.class().method(method).cloned() else {
                    return Err(self.with_node_span(
                        EidosError::type_error(
                            "Evaluate_Call",
                            format!(
                                "method \"{method}\" is not defined for object<{}>",
                                object.class().name()
                            ),
                        ),
                        callee,
                    ));
                };
                let arguments = signature
                    .match_arguments(positional, named)
                    .map_err(|err| self.with_node_span(err, node))?;
                let object = object.clone();
                self.invoke(&signature, Some(&object), &arguments)
                    .map_err(|err| self.with_node_span(err, node))
            }
            _ => Err(self.with_node_span(
                EidosError::type_error(
                    "Evaluate_Call",
                    "call target must be a function name or an object method",
                ),
                callee,
            )),
        }
    }

    fn invoke(
        &mut self,
        signature: &FunctionSignature,
        receiver: Option<&crate::values::object::ObjectVec>,
        arguments: &[ValueRef],
    ) -> EidosResult<ValueRef> {
        let result = match (&signature.imp, receiver) {
            (FunctionImpl::Builtin(tag), _) => builtins::dispatch(*tag, self, arguments)?,
            (FunctionImpl::Delegate(delegate), _) => delegate.as_ref()(self, arguments)?,
            (FunctionImpl::Method(method), Some(receiver)) => method(receiver, arguments)?,
            (FunctionImpl::Method(_), None) => {
                return Err(EidosError::internal(
                    "Evaluate_Call",
                    format!("method {}() invoked without a receiver", signature.name),
                ));
            }
        };
        if !signature.return_mask.admits(result.value_type()) {
            return Err(EidosError::internal(
                "Evaluate_Call",
                format!(
                    "function {}() returned a {} value outside its mask {}",
                    signature.name,
                    result.value_type(),
                    signature.return_mask
                ),
            ));
        }
        Ok(result)
    }

    // ---- assignment -------------------------------------------------------

    fn assign(&mut self, target: &AstNode, value: ValueRef) -> EidosResult<()> {
        match &target.kind {
            NodeKind::Identifier => {
                let name = SymbolId::new(target.identifier_name().expect("identifier node"));
                self.scope
                    .borrow_mut()
                    .set_value(name, value)
                    .map_err(|mut err| {
                        err.site = "Evaluate_Assign";
                        self.with_node_span(err, target)
                    })
            }
            NodeKind::Subscript => self.assign_subscript(target, value),
            NodeKind::MemberAccess => {
                let operand = self.evaluate_expression(&target.children[0])?;
                let member = SymbolId::new(
                    target.children[1]
                        .identifier_name()
                        .expect("member node holds an identifier"),
                );
                let ValueData::Object(object) = operand.data() else {
                    return Err(self.with_node_span(
                        EidosError::type_error(
                            "Evaluate_Assign",
                            format!(
                                "operator . may only be used on object values, not {}",
                                operand.value_type()
                            ),
                        ),
                        target,
                    ));
                };
                object
                    .set_property(member, &value)
                    .map_err(|err| self.with_node_span(err, target))
            }
            _ => Err(self.with_node_span(
                EidosError::invalid_assignment_target("Evaluate_Assign"),
                target,
            )),
        }
    }

    /// `x[i] = v`: reifies a uniquely owned copy of `x` into the symbol slot
    /// (the second caller of the no-copy setter) and mutates it in place.
    fn assign_subscript(&mut self, target: &AstNode, value: ValueRef) -> EidosResult<()> {
        const SITE: &str = "Evaluate_Assign";
        let operand = &target.children[0];
        let NodeKind::Identifier = operand.kind else {
            return Err(self.with_node_span(
                EidosError::invalid_assignment_target(SITE),
                target,
            ));
        };
        let name = SymbolId::new(operand.identifier_name().expect("identifier node"));
        // constant targets fail before any mutation happens
        let (_, is_constant) = self
            .scope
            .borrow()
            .get_value_with_constness(name)
            .map_err(|mut err| {
                err.site = SITE;
                self.with_node_span(err, operand)
            })?;
        if is_constant {
            return Err(self.with_node_span(
                EidosError::constant_redefinition(SITE, name),
                target,
            ));
        }

        let index = self.evaluate_expression(&target.children[1])?;
        let mut working = self
            .scope
            .borrow_mut()
            .take_for_mutation(name)
            .map_err(|err| self.with_node_span(err, target))?;
        let result = (|| -> EidosResult<()> {
            let indices = self.subscript_indices(&working, &index)?;
            if value.count() == 1 {
                for &i in &indices {
                    working.set_value_at_index(i, &value)?;
                }
            } else if value.count() == indices.len() {
                for (position, &i) in indices.iter().enumerate() {
                    let element = value.value_at_index(position)?;
                    working.set_value_at_index(i, &element)?;
                }
            } else {
                return Err(EidosError::length_mismatch(
                    SITE,
                    format!(
                        "cannot assign {} elements into {} selected positions",
                        value.count(),
                        indices.len()
                    ),
                ));
            }
            Ok(())
        })();
        // the binding is restored even when the element write failed
        self.scope
            .borrow_mut()
            .set_value_no_copy(name, Rc::new(working))
            .map_err(|err| self.with_node_span(err, target))?;
        result.map_err(|err| self.with_node_span(err, target))
    }

    /// Resolves a subscript index value into element positions: a logical
    /// index selects where true and must match the operand length; an
    /// integer index selects positions, 0-based and non-negative.
    fn subscript_indices(
        &self,
        operand: &EidosValue,
        index: &EidosValue,
    ) -> EidosResult<Vec<usize>> {
        const SITE: &str = "Evaluate_Subscript";
        match index.value_type() {
            EidosType::Null => Ok(Vec::new()),
            EidosType::Logical => {
                if index.count() != operand.count() {
                    return Err(EidosError::index_out_of_range(
                        SITE,
                        format!(
                            "logical index of length {} does not match operand length {}",
                            index.count(),
                            operand.count()
                        ),
                    ));
                }
                let mut indices = Vec::new();
                for i in 0..index.count() {
                    if index.logical_at(i)? {
                        indices.push(i);
                    }
                }
                Ok(indices)
            }
            EidosType::Integer | EidosType::Float => {
                let mut indices = Vec::with_capacity(index.count());
                for i in 0..index.count() {
                    let position = index.integer_at(i)?;
                    if position < 0 {
                        return Err(EidosError::index_out_of_range(
                            SITE,
                            format!("subscript index {position} is negative"),
                        ));
                    }
                    if position as usize >= operand.count() {
                        return Err(EidosError::index_out_of_range(
                            SITE,
                            format!(
                                "subscript index {position} is out of range for a value of length {}",
                                operand.count()
                            ),
                        ));
                    }
                    indices.push(position as usize);
                }
                Ok(indices)
            }
            other => Err(EidosError::type_error(
                SITE,
                format!("subscript index may not be of type {other}"),
            )),
        }
    }
}
