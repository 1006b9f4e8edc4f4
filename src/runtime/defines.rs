//! Command-line constant definitions: `name=expr` strings handed over by the
//! host at startup. The left side must be a fresh, legal identifier; the
//! right side is evaluated in an ephemeral variables scope and the result is
//! installed as a defined constant.

use std::rc::Rc;

use log::debug;

use crate::ast::lexer::TokenKind;
use crate::ast::EidosScript;
use crate::global::context;
use crate::global::termination::{terminate, EidosError, EidosResult};
use crate::runtime::functions::FunctionMap;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::symbol_table::{ScopeRef, SymbolScope};
use crate::utils::interner::SymbolId;
use crate::values::ValueRef;

fn is_legal_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn malformed(definition: &str, reason: impl core::fmt::Display) -> EidosError {
    terminate(EidosError::parse(
        "DefineCommandLineConstant",
        format!("malformed command-line constant definition \"{definition}\": {reason}"),
    ))
}

fn evaluate_definition(
    expression: &str,
    functions: &Rc<FunctionMap>,
) -> EidosResult<ValueRef> {
    let mut script = EidosScript::new(expression).with_name("<command line>");
    script.set_final_semicolon_optional(true);
    script.tokenize()?;
    script.parse_interpreter_block()?;
    let ephemeral = SymbolScope::new_variables(Some(context::intrinsic_constants_scope()))?;
    let mut interpreter = Interpreter::new(script, ephemeral, functions.clone(), None)?;
    interpreter.evaluate_interpreter_block(false)
}

/// Parses and installs each `name=expr` definition as a defined constant in
/// `scope`'s chain. `is_host_reserved` lets the host reject identifier
/// patterns it reserves for itself (e.g. simulation element names).
pub fn define_command_line_constants(
    scope: &ScopeRef,
    functions: &Rc<FunctionMap>,
    definitions: &[String],
    is_host_reserved: impl Fn(&str) -> bool,
) -> EidosResult<()> {
    for definition in definitions {
        let Some((name, expression)) = definition.split_once('=') else {
            return Err(malformed(definition, "expected name=expr"));
        };
        let name = name.trim();
        if !is_legal_identifier(name) {
            return Err(malformed(
                definition,
                format!("\"{name}\" is not a legal identifier"),
            ));
        }
        if TokenKind::is_keyword(name) {
            return Err(malformed(
                definition,
                format!("\"{name}\" is a reserved word"),
            ));
        }
        let id = SymbolId::new(name);
        if context::intrinsic_constants_scope().borrow().contains_symbol(id) {
            return Err(malformed(
                definition,
                format!("\"{name}\" is an intrinsic constant"),
            ));
        }
        if is_host_reserved(name) {
            return Err(malformed(
                definition,
                format!("\"{name}\" is reserved by the host"),
            ));
        }
        let value = evaluate_definition(expression, functions)
            .map_err(|err| malformed(definition, err.message))?;
        scope
            .borrow_mut()
            .define_constant(id, value)
            .map_err(terminate)?;
        debug!("defined command-line constant {name}");
    }
    Ok(())
}
