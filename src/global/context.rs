//! Process-wide state with one-shot initialization: the static value set,
//! the value pool, the intrinsic-constants scope, and the built-in function
//! map. All of it is thread-local because the core is single-threaded by
//! contract.

use std::cell::OnceCell;
use std::rc::Rc;

use log::debug;

use crate::runtime::builtins::builtin_signatures;
use crate::runtime::functions::FunctionMap;
use crate::runtime::symbol_table::{ScopeKind, ScopeRef, SymbolScope};
use crate::utils::interner::SymbolId;
use crate::values::{pool, statics, EidosValue};

thread_local! {
    static INTRINSIC_SCOPE: OnceCell<ScopeRef> = const { OnceCell::new() };
    static BUILTIN_FUNCTIONS: OnceCell<Rc<FunctionMap>> = const { OnceCell::new() };
}

/// The shared intrinsic-constants scope, pre-populated with the language
/// constants `T`, `F`, `NULL`, `PI`, `E`, `INF`, and `NAN`.
pub fn intrinsic_constants_scope() -> ScopeRef {
    INTRINSIC_SCOPE.with(|cell| {
        cell.get_or_init(|| {
            let scope = SymbolScope::new(ScopeKind::IntrinsicConstants, None)
                .expect("root scope construction cannot fail");
            {
                let mut scope = scope.borrow_mut();
                scope.insert_binding(SymbolId::new("T"), statics::logical_true());
                scope.insert_binding(SymbolId::new("F"), statics::logical_false());
                scope.insert_binding(SymbolId::new("NULL"), statics::null());
                scope.insert_binding(
                    SymbolId::new("PI"),
                    Rc::new(EidosValue::float_singleton(core::f64::consts::PI)),
                );
                scope.insert_binding(
                    SymbolId::new("E"),
                    Rc::new(EidosValue::float_singleton(core::f64::consts::E)),
                );
                scope.insert_binding(SymbolId::new("INF"), statics::float_infinity());
                scope.insert_binding(
                    SymbolId::new("NAN"),
                    Rc::new(EidosValue::float_singleton(f64::NAN)),
                );
            }
            debug!("intrinsic constants scope initialized");
            scope
        })
        .clone()
    })
}

/// The shared immutable built-in function map.
pub fn builtin_function_map() -> Rc<FunctionMap> {
    BUILTIN_FUNCTIONS.with(|cell| {
        cell.get_or_init(|| {
            let map = FunctionMap::from_signatures(builtin_signatures());
            debug!("built-in function map initialized ({} entries)", map.names().len());
            Rc::new(map)
        })
        .clone()
    })
}

/// One-shot warmup of all process-wide state. Idempotent; hosts call this
/// once before running scripts.
pub fn warmup() {
    statics::warmup();
    pool::warmup();
    let _ = intrinsic_constants_scope();
    let _ = builtin_function_map();
    debug!("warmup complete");
}

/// Releases pooled storage. The interner, statics, and intrinsic scope live
/// for the rest of the process. Idempotent.
pub fn teardown() {
    pool::teardown();
    debug!("teardown complete");
}
