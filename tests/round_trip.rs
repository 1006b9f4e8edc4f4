//! The canonical stream form of a literal value re-lexes and re-parses to an
//! equal value (logical, integer, non-NaN float, string).

use eidos_core::global::context::{builtin_function_map, intrinsic_constants_scope};
use eidos_core::global::termination::{
    capture_termination_stream, set_termination_mode, TerminationMode,
};
use eidos_core::logger::init_logger_debug;
use eidos_core::runtime::symbol_table::SymbolScope;
use eidos_core::values::EidosValue;
use eidos_core::{warmup, EidosScript, Interpreter, ValueRef};

fn evaluate(source: &str) -> ValueRef {
    init_logger_debug();
    warmup();
    set_termination_mode(TerminationMode::Throw);
    let _ = capture_termination_stream();
    let mut script = EidosScript::new(source);
    script.set_final_semicolon_optional(true);
    script.tokenize().unwrap();
    script.parse_interpreter_block().unwrap();
    let scope = SymbolScope::new_variables(Some(intrinsic_constants_scope())).unwrap();
    let mut interpreter =
        Interpreter::new(script, scope, builtin_function_map(), None).unwrap();
    interpreter.evaluate_interpreter_block(false).unwrap()
}

fn round_trip(value: &EidosValue) {
    let mut streamed = String::new();
    value.stream_to(&mut streamed).unwrap();
    let reparsed = evaluate(&format!("{streamed};"));
    assert_eq!(
        *reparsed, *value,
        "stream form {streamed:?} did not round-trip"
    );
}

#[test]
fn logical_singletons_round_trip() {
    round_trip(&EidosValue::logical_singleton(true));
    round_trip(&EidosValue::logical_singleton(false));
}

#[test]
fn integers_round_trip() {
    round_trip(&EidosValue::integer_singleton(0));
    round_trip(&EidosValue::integer_singleton(42));
    round_trip(&EidosValue::integer_singleton(-7));
    round_trip(&EidosValue::integer_singleton(i64::MAX));
}

#[test]
fn floats_round_trip() {
    round_trip(&EidosValue::float_singleton(0.0));
    round_trip(&EidosValue::float_singleton(1.0));
    round_trip(&EidosValue::float_singleton(-2.5));
    round_trip(&EidosValue::float_singleton(0.1));
    round_trip(&EidosValue::float_singleton(1e-7));
    round_trip(&EidosValue::float_singleton(6.02214076e23));
    round_trip(&EidosValue::float_singleton(f64::INFINITY));
    round_trip(&EidosValue::float_singleton(f64::NEG_INFINITY));
}

#[test]
fn strings_round_trip() {
    round_trip(&EidosValue::string_singleton("plain"));
    round_trip(&EidosValue::string_singleton(""));
    round_trip(&EidosValue::string_singleton("with \"quotes\""));
    round_trip(&EidosValue::string_singleton("tab\tand\nnewline"));
    round_trip(&EidosValue::string_singleton("backslash \\ done"));
}

#[test]
fn null_streams_as_its_constant_name() {
    let mut streamed = String::new();
    EidosValue::null_singleton().stream_to(&mut streamed).unwrap();
    assert_eq!(streamed, "NULL");
    let reparsed = evaluate("NULL;");
    assert_eq!(reparsed.count(), 0);
}
