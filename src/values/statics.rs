//! Process-wide static value instances. These are shared `Rc` singletons held
//! for the life of the process; because the holder here keeps a reference,
//! their strong count never reaches 1 and the copy-on-write discipline copies
//! them before any mutation. Releasing one never frees anything.

use std::rc::Rc;

use crate::values::{EidosType, EidosValue, ValueRef};

struct StaticValues {
    null: ValueRef,
    null_invisible: ValueRef,
    logical_true: ValueRef,
    logical_false: ValueRef,
    integer_zero: ValueRef,
    integer_one: ValueRef,
    float_zero: ValueRef,
    float_half: ValueRef,
    float_one: ValueRef,
    float_infinity: ValueRef,
    empty_logical: ValueRef,
    empty_integer: ValueRef,
    empty_float: ValueRef,
    empty_string: ValueRef,
}

impl StaticValues {
    fn build() -> Self {
        let mut null_invisible = EidosValue::null_singleton();
        null_invisible.invert_invisibility();
        StaticValues {
            null: Rc::new(EidosValue::null_singleton()),
            null_invisible: Rc::new(null_invisible),
            logical_true: Rc::new(EidosValue::logical_singleton(true)),
            logical_false: Rc::new(EidosValue::logical_singleton(false)),
            integer_zero: Rc::new(EidosValue::integer_singleton(0)),
            integer_one: Rc::new(EidosValue::integer_singleton(1)),
            float_zero: Rc::new(EidosValue::float_singleton(0.0)),
            float_half: Rc::new(EidosValue::float_singleton(0.5)),
            float_one: Rc::new(EidosValue::float_singleton(1.0)),
            float_infinity: Rc::new(EidosValue::float_singleton(f64::INFINITY)),
            empty_logical: Rc::new(EidosValue::logical_vector(Vec::new())),
            empty_integer: Rc::new(EidosValue::integer_vector(Vec::new())),
            empty_float: Rc::new(EidosValue::float_vector(Vec::new())),
            empty_string: Rc::new(EidosValue::string_vector(Vec::new())),
        }
    }
}

thread_local! {
    static STATICS: StaticValues = StaticValues::build();
}

pub fn null() -> ValueRef {
    STATICS.with(|s| s.null.clone())
}

pub fn null_invisible() -> ValueRef {
    STATICS.with(|s| s.null_invisible.clone())
}

pub fn logical_true() -> ValueRef {
    STATICS.with(|s| s.logical_true.clone())
}

pub fn logical_false() -> ValueRef {
    STATICS.with(|s| s.logical_false.clone())
}

pub fn integer_zero() -> ValueRef {
    STATICS.with(|s| s.integer_zero.clone())
}

pub fn integer_one() -> ValueRef {
    STATICS.with(|s| s.integer_one.clone())
}

pub fn float_zero() -> ValueRef {
    STATICS.with(|s| s.float_zero.clone())
}

pub fn float_half() -> ValueRef {
    STATICS.with(|s| s.float_half.clone())
}

pub fn float_one() -> ValueRef {
    STATICS.with(|s| s.float_one.clone())
}

pub fn float_infinity() -> ValueRef {
    STATICS.with(|s| s.float_infinity.clone())
}

/// Shared empty vector for the given element type; NULL for `Null`.
pub fn empty(element_type: EidosType) -> ValueRef {
    STATICS.with(|s| match element_type {
        EidosType::Logical => s.empty_logical.clone(),
        EidosType::Integer => s.empty_integer.clone(),
        EidosType::Float => s.empty_float.clone(),
        EidosType::String => s.empty_string.clone(),
        _ => s.null.clone(),
    })
}

/// Touches the static set so warmup cost is not paid mid-script.
pub fn warmup() {
    STATICS.with(|_| {});
}
