//! Built-in function implementations. Each is identified by a closed dispatch
//! tag; the signatures installed at warmup declare the masks and defaults the
//! registry enforces before dispatch ever runs.

use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::global::termination::{EidosError, EidosResult};
use crate::runtime::functions::{FunctionSignature, ParamSpec};
use crate::runtime::interpreter::Interpreter;
use crate::utils::interner::SymbolId;
use crate::values::{ops, statics, EidosType, EidosValue, TypeMask, ValueData, ValueRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTag {
    Print,
    Cat,
    Concat,
    Exists,
    Length,
    Str,
    Rev,
    Sum,
    Abs,
    Rep,
    Seq,
    Sort,
    Which,
    AsInteger,
    AsFloat,
    AsLogical,
    AsString,
    Type,
    DefineConstant,
    Rm,
}

/// The immutable built-in signature set, computed once at warmup.
pub fn builtin_signatures() -> Vec<FunctionSignature> {
    use BuiltinTag::*;
    let any = TypeMask::ANY;
    vec![
        FunctionSignature::builtin("print", TypeMask::NULL, Print)
            .with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("cat", TypeMask::NULL, Cat)
            .with_param(ParamSpec::optional(
                "sep",
                TypeMask::STRING,
                EidosValue::string(" "),
            ))
            .variadic(any),
        FunctionSignature::builtin("c", any, Concat).variadic(any),
        FunctionSignature::builtin("exists", TypeMask::LOGICAL, Exists)
            .with_param(ParamSpec::required("symbolName", TypeMask::STRING)),
        FunctionSignature::builtin("length", TypeMask::INTEGER, Length)
            .with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("size", TypeMask::INTEGER, Length)
            .with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("str", TypeMask::NULL, Str)
            .with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("rev", any, Rev).with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("sum", TypeMask::INTEGER.union(TypeMask::FLOAT), Sum)
            .with_param(ParamSpec::required("x", TypeMask::NUMERIC)),
        FunctionSignature::builtin("abs", TypeMask::INTEGER.union(TypeMask::FLOAT), Abs)
            .with_param(ParamSpec::required(
                "x",
                TypeMask::INTEGER.union(TypeMask::FLOAT),
            )),
        FunctionSignature::builtin("rep", any, Rep)
            .with_param(ParamSpec::required("x", any))
            .with_param(ParamSpec::required("count", TypeMask::INTEGER)),
        FunctionSignature::builtin("seq", TypeMask::INTEGER.union(TypeMask::FLOAT), Seq)
            .with_param(ParamSpec::required("from", TypeMask::NUMERIC))
            .with_param(ParamSpec::required("to", TypeMask::NUMERIC))
            .with_param(ParamSpec::optional(
                "by",
                TypeMask::NUMERIC.union(TypeMask::NULL),
                EidosValue::null(),
            )),
        FunctionSignature::builtin(
            "sort",
            TypeMask::LOGICAL
                .union(TypeMask::INTEGER)
                .union(TypeMask::FLOAT)
                .union(TypeMask::STRING),
            Sort,
        )
        .with_param(ParamSpec::required(
            "x",
            TypeMask::LOGICAL
                .union(TypeMask::INTEGER)
                .union(TypeMask::FLOAT)
                .union(TypeMask::STRING),
        ))
        .with_param(ParamSpec::optional(
            "ascending",
            TypeMask::LOGICAL,
            EidosValue::logical(true),
        )),
        FunctionSignature::builtin("which", TypeMask::INTEGER, Which)
            .with_param(ParamSpec::required("x", TypeMask::LOGICAL)),
        FunctionSignature::builtin("asInteger", TypeMask::INTEGER, AsInteger)
            .with_param(ParamSpec::required("x", TypeMask::NUMERIC.union(TypeMask::NULL))),
        FunctionSignature::builtin("asFloat", TypeMask::FLOAT, AsFloat)
            .with_param(ParamSpec::required("x", TypeMask::NUMERIC.union(TypeMask::NULL))),
        FunctionSignature::builtin("asLogical", TypeMask::LOGICAL, AsLogical)
            .with_param(ParamSpec::required("x", TypeMask::NUMERIC.union(TypeMask::NULL))),
        FunctionSignature::builtin("asString", TypeMask::STRING, AsString).with_param(
            ParamSpec::required(
                "x",
                TypeMask::NUMERIC.union(TypeMask::STRING).union(TypeMask::NULL),
            ),
        ),
        FunctionSignature::builtin("type", TypeMask::STRING, Type)
            .with_param(ParamSpec::required("x", any)),
        FunctionSignature::builtin("defineConstant", TypeMask::NULL, DefineConstant)
            .with_param(ParamSpec::required("symbol", TypeMask::STRING))
            .with_param(ParamSpec::required("value", any)),
        FunctionSignature::builtin("rm", TypeMask::NULL, Rm)
            .with_param(ParamSpec::required("variableNames", TypeMask::STRING)),
    ]
}

pub fn dispatch(
    tag: BuiltinTag,
    interpreter: &mut Interpreter,
    arguments: &[ValueRef],
) -> EidosResult<ValueRef> {
    match tag {
        BuiltinTag::Print => {
            let mut line = String::new();
            arguments[0]
                .stream_to(&mut line)
                .map_err(|_| EidosError::internal("print", "formatting failed"))?;
            line.push('\n');
            interpreter.write_output(&line);
            Ok(EidosValue::null_invisible())
        }
        BuiltinTag::Cat => {
            // sep is the named parameter; the variadic tail holds the values
            let sep = arguments[0].string_at(0)?;
            let mut text = String::new();
            let mut first = true;
            for value in &arguments[1..] {
                for i in 0..value.count() {
                    if !first {
                        text.push_str(&sep);
                    }
                    first = false;
                    text.push_str(&value.string_at(i)?);
                }
            }
            interpreter.write_output(&text);
            Ok(EidosValue::null_invisible())
        }
        BuiltinTag::Concat => Ok(Rc::new(ops::concatenate("c", arguments)?)),
        BuiltinTag::Exists => {
            let names = &arguments[0];
            let scope = interpreter.scope().clone();
            if names.count() == 1 {
                let name = SymbolId::new(&names.string_at(0)?);
                return Ok(EidosValue::logical(scope.borrow().contains_symbol(name)));
            }
            let mut out = Vec::with_capacity(names.count());
            for i in 0..names.count() {
                let name = SymbolId::new(&names.string_at(i)?);
                out.push(scope.borrow().contains_symbol(name));
            }
            Ok(Rc::new(EidosValue::logical_vector(out)))
        }
        BuiltinTag::Length => Ok(EidosValue::integer(arguments[0].count() as i64)),
        BuiltinTag::Str => {
            let x = &arguments[0];
            let mut line = format!("({}) ", x.value_type());
            x.stream_to(&mut line)
                .map_err(|_| EidosError::internal("str", "formatting failed"))?;
            line.push('\n');
            interpreter.write_output(&line);
            Ok(EidosValue::null_invisible())
        }
        BuiltinTag::Rev => {
            let x = &arguments[0];
            let indices: Vec<usize> = (0..x.count()).rev().collect();
            Ok(Rc::new(ops::select("rev", x, &indices)?))
        }
        BuiltinTag::Sum => sum(&arguments[0]),
        BuiltinTag::Abs => abs(&arguments[0]),
        BuiltinTag::Rep => {
            let x = &arguments[0];
            let count = arguments[1].integer_at(0)?;
            if count < 0 {
                return Err(EidosError::type_error(
                    "rep",
                    format!("count must be non-negative, got {count}"),
                ));
            }
            let parts: Vec<ValueRef> = (0..count).map(|_| x.clone()).collect();
            if parts.is_empty() {
                return Ok(statics::empty(x.value_type()));
            }
            Ok(Rc::new(ops::concatenate("rep", &parts)?))
        }
        BuiltinTag::Seq => seq(&arguments[0], &arguments[1], &arguments[2]),
        BuiltinTag::Sort => sort(&arguments[0], arguments[1].logical_at(0)?),
        BuiltinTag::Which => {
            let x = &arguments[0];
            let ValueData::Logical(flags) = x.data() else {
                return Err(EidosError::type_error("which", "operand must be logical"));
            };
            let out: Vec<i64> = flags
                .as_slice()
                .iter()
                .enumerate()
                .filter_map(|(i, &flag)| flag.then_some(i as i64))
                .collect();
            Ok(Rc::new(EidosValue::integer_vector(out)))
        }
        BuiltinTag::AsInteger => {
            let x = &arguments[0];
            if x.count() == 1 {
                return Ok(EidosValue::integer(x.integer_at(0)?));
            }
            let mut out = Vec::with_capacity(x.count());
            for i in 0..x.count() {
                out.push(x.integer_at(i)?);
            }
            Ok(Rc::new(EidosValue::integer_vector(out)))
        }
        BuiltinTag::AsFloat => {
            let x = &arguments[0];
            if x.count() == 1 {
                return Ok(EidosValue::float(x.float_at(0)?));
            }
            let mut out = Vec::with_capacity(x.count());
            for i in 0..x.count() {
                out.push(x.float_at(i)?);
            }
            Ok(Rc::new(EidosValue::float_vector(out)))
        }
        BuiltinTag::AsLogical => {
            let x = &arguments[0];
            if x.count() == 1 {
                return Ok(EidosValue::logical(x.logical_at(0)?));
            }
            let mut out = Vec::with_capacity(x.count());
            for i in 0..x.count() {
                out.push(x.logical_at(i)?);
            }
            Ok(Rc::new(EidosValue::logical_vector(out)))
        }
        BuiltinTag::AsString => {
            let x = &arguments[0];
            if x.count() == 1 {
                return Ok(EidosValue::string(x.string_at(0)?));
            }
            let mut out = Vec::with_capacity(x.count());
            for i in 0..x.count() {
                out.push(x.string_at(i)?);
            }
            Ok(Rc::new(EidosValue::string_vector(out)))
        }
        BuiltinTag::Type => Ok(EidosValue::string(arguments[0].value_type().to_string())),
        BuiltinTag::DefineConstant => {
            let name = SymbolId::new(&arguments[0].string_at(0)?);
            let scope = interpreter.scope().clone();
            scope
                .borrow_mut()
                .define_constant(name, arguments[1].clone())?;
            Ok(EidosValue::null_invisible())
        }
        BuiltinTag::Rm => {
            let names = &arguments[0];
            let scope = interpreter.scope().clone();
            for i in 0..names.count() {
                let name = SymbolId::new(&names.string_at(i)?);
                scope.borrow_mut().remove_symbol(name, false)?;
            }
            Ok(EidosValue::null_invisible())
        }
    }
}

fn sum(x: &ValueRef) -> EidosResult<ValueRef> {
    match x.data() {
        ValueData::Float(v) => Ok(EidosValue::float(v.as_slice().iter().sum())),
        _ => {
            let mut total: i64 = 0;
            for i in 0..x.count() {
                let term = x.integer_at(i)?;
                total = total.checked_add(term).ok_or_else(|| {
                    EidosError::type_error("sum", "integer overflow while summing")
                })?;
            }
            Ok(EidosValue::integer(total))
        }
    }
}

fn abs(x: &ValueRef) -> EidosResult<ValueRef> {
    match x.data() {
        ValueData::Integer(v) => {
            let mut out = Vec::with_capacity(v.len());
            for &value in v.as_slice() {
                let magnitude = value.checked_abs().ok_or_else(|| {
                    EidosError::type_error("abs", format!("integer overflow taking abs of {value}"))
                })?;
                out.push(magnitude);
            }
            if out.len() == 1 {
                return Ok(EidosValue::integer(out[0]));
            }
            Ok(Rc::new(EidosValue::integer_vector(out)))
        }
        ValueData::Float(v) => {
            let out: Vec<f64> = v.as_slice().iter().map(|x| x.abs()).collect();
            if out.len() == 1 {
                return Ok(EidosValue::float(out[0]));
            }
            Ok(Rc::new(EidosValue::float_vector(out)))
        }
        _ => Err(EidosError::type_error(
            "abs",
            format!("operand of type {} is not supported", x.value_type()),
        )),
    }
}

fn seq(from: &ValueRef, to: &ValueRef, by: &ValueRef) -> EidosResult<ValueRef> {
    const SITE: &str = "seq";
    let integral = from.value_type() != EidosType::Float
        && to.value_type() != EidosType::Float
        && by.value_type() != EidosType::Float;
    if integral {
        let start = from.integer_at(0)?;
        let end = to.integer_at(0)?;
        let step = if by.value_type() == EidosType::Null {
            if start <= end { 1 } else { -1 }
        } else {
            by.integer_at(0)?
        };
        if step == 0 || (step > 0) != (start <= end) && start != end {
            return Err(EidosError::type_error(
                SITE,
                format!("by ({step}) has the wrong sign for from ({start}) and to ({end})"),
            ));
        }
        let mut out = Vec::new();
        let mut x = start;
        loop {
            out.push(x);
            let Some(next) = x.checked_add(step) else { break };
            if (step > 0 && next > end) || (step < 0 && next < end) {
                break;
            }
            x = next;
        }
        if out.len() == 1 {
            return Ok(EidosValue::integer(out[0]));
        }
        return Ok(Rc::new(EidosValue::integer_vector(out)));
    }

    let start = from.float_at(0)?;
    let end = to.float_at(0)?;
    let step = if by.value_type() == EidosType::Null {
        if start <= end { 1.0 } else { -1.0 }
    } else {
        by.float_at(0)?
    };
    if !start.is_finite() || !end.is_finite() || !step.is_finite() || step == 0.0 {
        return Err(EidosError::type_error(
            SITE,
            "from, to, and by must be finite and by must be nonzero",
        ));
    }
    if (step > 0.0) != (start <= end) && start != end {
        return Err(EidosError::type_error(
            SITE,
            format!("by ({step}) has the wrong sign for from ({start}) and to ({end})"),
        ));
    }
    let count = ((end - start) / step).floor() as usize + 1;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        out.push(start + step * i as f64);
    }
    if out.len() == 1 {
        return Ok(EidosValue::float(out[0]));
    }
    Ok(Rc::new(EidosValue::float_vector(out)))
}

fn sort(x: &ValueRef, ascending: bool) -> EidosResult<ValueRef> {
    let mut sorted = x.copy_values();
    match sorted.data_mut() {
        ValueData::Logical(v) => v.as_mut_slice().sort_unstable(),
        ValueData::Integer(v) => v.as_mut_slice().sort_unstable(),
        // NaN sorts after every other value and equal to itself
        ValueData::Float(v) => v
            .as_mut_slice()
            .sort_unstable_by_key(|&value| OrderedFloat(value)),
        ValueData::String(v) => v.as_mut_slice().sort_unstable(),
        _ => {
            return Err(EidosError::type_error(
                "sort",
                format!("operand of type {} is not supported", x.value_type()),
            ));
        }
    }
    if !ascending {
        let indices: Vec<usize> = (0..sorted.count()).rev().collect();
        return Ok(Rc::new(ops::select("sort", &sorted, &indices)?));
    }
    Ok(Rc::new(sorted))
}
