//! Element-wise operations over values: the logical ≤ integer ≤ float
//! promotion lattice, length-1 broadcasting, comparisons, the sequence
//! operator, and concatenation.

use core::fmt;

use crate::global::termination::{EidosError, EidosResult};
use crate::values::{pool, EidosType, EidosValue, ValueData, ValueRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl ArithmeticOperator {
    pub fn site(self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "Evaluate_Plus",
            ArithmeticOperator::Subtract => "Evaluate_Minus",
            ArithmeticOperator::Multiply => "Evaluate_Mult",
            ArithmeticOperator::Divide => "Evaluate_Div",
            ArithmeticOperator::Modulo => "Evaluate_Mod",
            ArithmeticOperator::Power => "Evaluate_Exp",
        }
    }

    /// Division, modulo and power always produce float, like their hosts in
    /// scientific scripting; add/subtract/multiply stay in integer when both
    /// operands are integral.
    fn always_float(self) -> bool {
        matches!(
            self,
            ArithmeticOperator::Divide | ArithmeticOperator::Modulo | ArithmeticOperator::Power
        )
    }
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulo => "%",
            ArithmeticOperator::Power => "^",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ComparisonOperator {
    pub fn site(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "Evaluate_Eq",
            ComparisonOperator::NotEqual => "Evaluate_NotEq",
            ComparisonOperator::Less => "Evaluate_Lt",
            ComparisonOperator::LessEqual => "Evaluate_LtEq",
            ComparisonOperator::Greater => "Evaluate_Gt",
            ComparisonOperator::GreaterEqual => "Evaluate_GtEq",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessEqual => "<=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterEqual => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// The broadcast length rule: equal lengths pass through, a length-1 operand
/// is reused for every index of the other, and an empty operand against a
/// singleton yields an empty result. Everything else is a length mismatch.
pub fn broadcast_length(
    site: &'static str,
    operator: impl fmt::Display,
    m: usize,
    n: usize,
) -> EidosResult<usize> {
    if m == n {
        return Ok(m);
    }
    if m == 0 || n == 0 {
        if m <= 1 && n <= 1 {
            return Ok(0);
        }
    } else if m == 1 {
        return Ok(n);
    } else if n == 1 {
        return Ok(m);
    }
    Err(EidosError::length_mismatch(
        site,
        format!("operator {operator} requires operand lengths {m} and {n} to match, or one to be 1"),
    ))
}

fn require_numeric(
    site: &'static str,
    operator: ArithmeticOperator,
    value: &EidosValue,
) -> EidosResult<()> {
    match value.value_type() {
        EidosType::Logical | EidosType::Integer | EidosType::Float => Ok(()),
        other => Err(EidosError::type_error(
            site,
            format!("operand of type {other} is not supported by operator {operator}"),
        )),
    }
}

/// Element-wise arithmetic with promotion and broadcasting.
pub fn arithmetic(
    op: ArithmeticOperator,
    lhs: &EidosValue,
    rhs: &EidosValue,
) -> EidosResult<EidosValue> {
    let site = op.site();
    require_numeric(site, op, lhs)?;
    require_numeric(site, op, rhs)?;
    let m = lhs.count();
    let n = rhs.count();
    let len = broadcast_length(site, op, m, n)?;

    let float_result = op.always_float()
        || lhs.value_type() == EidosType::Float
        || rhs.value_type() == EidosType::Float;

    if float_result {
        let one = |a: f64, b: f64| match op {
            ArithmeticOperator::Add => a + b,
            ArithmeticOperator::Subtract => a - b,
            ArithmeticOperator::Multiply => a * b,
            ArithmeticOperator::Divide => a / b,
            ArithmeticOperator::Modulo => a % b,
            ArithmeticOperator::Power => a.powf(b),
        };
        if len == 1 {
            return Ok(EidosValue::float_singleton(one(
                lhs.float_at(0)?,
                rhs.float_at(0)?,
            )));
        }
        let mut out = pool::float_buffer(len);
        for i in 0..len {
            out.push(one(lhs.float_at(i % m)?, rhs.float_at(i % n)?));
        }
        return Ok(EidosValue::float_vector(out));
    }

    let one = |a: i64, b: i64| -> EidosResult<i64> {
        let result = match op {
            ArithmeticOperator::Add => a.checked_add(b),
            ArithmeticOperator::Subtract => a.checked_sub(b),
            ArithmeticOperator::Multiply => a.checked_mul(b),
            _ => unreachable!("float-only operator in integer path"),
        };
        result.ok_or_else(|| {
            EidosError::type_error(site, format!("integer overflow in {a} {op} {b}"))
        })
    };
    if len == 1 {
        return Ok(EidosValue::integer_singleton(one(
            lhs.integer_at(0)?,
            rhs.integer_at(0)?,
        )?));
    }
    let mut out = pool::integer_buffer(len);
    for i in 0..len {
        out.push(one(lhs.integer_at(i % m)?, rhs.integer_at(i % n)?)?);
    }
    Ok(EidosValue::integer_vector(out))
}

fn compare_pair(
    site: &'static str,
    op: ComparisonOperator,
    lhs: &EidosValue,
    i: usize,
    rhs: &EidosValue,
    j: usize,
) -> EidosResult<bool> {
    let a_type = lhs.value_type();
    let b_type = rhs.value_type();
    if matches!(a_type, EidosType::Object | EidosType::Null)
        || matches!(b_type, EidosType::Object | EidosType::Null)
    {
        return Err(EidosError::type_error(
            site,
            format!("cannot compare {a_type} and {b_type} values with operator {op}"),
        ));
    }
    if a_type == EidosType::String || b_type == EidosType::String {
        let a = lhs.string_at(i)?;
        let b = rhs.string_at(j)?;
        return Ok(match op {
            ComparisonOperator::Equal => a == b,
            ComparisonOperator::NotEqual => a != b,
            ComparisonOperator::Less => a < b,
            ComparisonOperator::LessEqual => a <= b,
            ComparisonOperator::Greater => a > b,
            ComparisonOperator::GreaterEqual => a >= b,
        });
    }
    if a_type == EidosType::Float || b_type == EidosType::Float {
        // IEEE semantics: every comparison with NaN is false, except !=.
        let a = lhs.float_at(i)?;
        let b = rhs.float_at(j)?;
        return Ok(match op {
            ComparisonOperator::Equal => a == b,
            ComparisonOperator::NotEqual => a != b,
            ComparisonOperator::Less => a < b,
            ComparisonOperator::LessEqual => a <= b,
            ComparisonOperator::Greater => a > b,
            ComparisonOperator::GreaterEqual => a >= b,
        });
    }
    let a = lhs.integer_at(i)?;
    let b = rhs.integer_at(j)?;
    Ok(match op {
        ComparisonOperator::Equal => a == b,
        ComparisonOperator::NotEqual => a != b,
        ComparisonOperator::Less => a < b,
        ComparisonOperator::LessEqual => a <= b,
        ComparisonOperator::Greater => a > b,
        ComparisonOperator::GreaterEqual => a >= b,
    })
}

/// Element-wise comparison producing a logical value of the broadcast shape.
pub fn compare(
    op: ComparisonOperator,
    lhs: &EidosValue,
    rhs: &EidosValue,
) -> EidosResult<EidosValue> {
    let site = op.site();
    let m = lhs.count();
    let n = rhs.count();
    let len = broadcast_length(site, op, m, n)?;
    if len == 1 {
        return Ok(EidosValue::logical_singleton(compare_pair(
            site, op, lhs, 0, rhs, 0,
        )?));
    }
    let mut out = pool::logical_buffer(len);
    for i in 0..len {
        out.push(compare_pair(site, op, lhs, i % m, rhs, i % n)?);
    }
    Ok(EidosValue::logical_vector(out))
}

/// Unary minus over the numeric lattice; logical operands are not negatable.
pub fn negate(value: &EidosValue) -> EidosResult<EidosValue> {
    const SITE: &str = "Evaluate_UnaryMinus";
    match value.data() {
        ValueData::Integer(_) => {
            let len = value.count();
            let mut out = pool::integer_buffer(len);
            for i in 0..len {
                let x = value.integer_at(i)?;
                let Some(negated) = x.checked_neg() else {
                    return Err(EidosError::type_error(
                        SITE,
                        format!("integer overflow negating {x}"),
                    ));
                };
                out.push(negated);
            }
            if len == 1 {
                return Ok(EidosValue::integer_singleton(out[0]));
            }
            Ok(EidosValue::integer_vector(out))
        }
        ValueData::Float(_) => {
            let len = value.count();
            let mut out = pool::float_buffer(len);
            for i in 0..len {
                out.push(-value.float_at(i)?);
            }
            if len == 1 {
                return Ok(EidosValue::float_singleton(out[0]));
            }
            Ok(EidosValue::float_vector(out))
        }
        _ => Err(EidosError::type_error(
            SITE,
            format!(
                "operand of type {} is not supported by unary minus",
                value.value_type()
            ),
        )),
    }
}

/// Unary plus is an identity on numeric operands.
pub fn unary_plus(value: &EidosValue) -> EidosResult<EidosValue> {
    match value.value_type() {
        EidosType::Integer | EidosType::Float => Ok(value.copy_values()),
        other => Err(EidosError::type_error(
            "Evaluate_UnaryPlus",
            format!("operand of type {other} is not supported by unary plus"),
        )),
    }
}

/// Element-wise logical not; numeric operands coerce to logical.
pub fn logical_not(value: &EidosValue) -> EidosResult<EidosValue> {
    let len = value.count();
    if len == 1 {
        return Ok(EidosValue::logical_singleton(!value.logical_at(0)?));
    }
    let mut out = pool::logical_buffer(len);
    for i in 0..len {
        out.push(!value.logical_at(i)?);
    }
    Ok(EidosValue::logical_vector(out))
}

fn logical_binary(
    site: &'static str,
    operator: &'static str,
    lhs: &EidosValue,
    rhs: &EidosValue,
    combine: impl Fn(bool, bool) -> bool,
) -> EidosResult<EidosValue> {
    let m = lhs.count();
    let n = rhs.count();
    let len = broadcast_length(site, operator, m, n)?;
    if len == 1 {
        return Ok(EidosValue::logical_singleton(combine(
            lhs.logical_at(0)?,
            rhs.logical_at(0)?,
        )));
    }
    let mut out = pool::logical_buffer(len);
    for i in 0..len {
        out.push(combine(lhs.logical_at(i % m)?, rhs.logical_at(i % n)?));
    }
    Ok(EidosValue::logical_vector(out))
}

pub fn logical_and(lhs: &EidosValue, rhs: &EidosValue) -> EidosResult<EidosValue> {
    logical_binary("Evaluate_And", "&", lhs, rhs, |a, b| a && b)
}

pub fn logical_or(lhs: &EidosValue, rhs: &EidosValue) -> EidosResult<EidosValue> {
    logical_binary("Evaluate_Or", "|", lhs, rhs, |a, b| a || b)
}

/// The sequence operator `a:b`: an inclusive integer vector stepping ±1 by
/// the sign of the distance. Endpoints are coerced to integer and must be
/// finite singletons.
pub fn sequence(from: &EidosValue, to: &EidosValue) -> EidosResult<EidosValue> {
    const SITE: &str = "Evaluate_Seq";
    if from.count() != 1 || to.count() != 1 {
        return Err(EidosError::type_error(
            SITE,
            format!(
                "operator : requires singleton operands, got lengths {} and {}",
                from.count(),
                to.count()
            ),
        ));
    }
    let start = from.integer_at(0).map_err(|mut err| {
        err.site = SITE;
        err
    })?;
    let end = to.integer_at(0).map_err(|mut err| {
        err.site = SITE;
        err
    })?;
    if start == end {
        return Ok(EidosValue::integer_singleton(start));
    }
    let len = start.abs_diff(end) as usize + 1;
    let mut out = pool::integer_buffer(len);
    if start <= end {
        out.extend(start..=end);
    } else {
        out.extend((end..=start).rev());
    }
    Ok(EidosValue::integer_vector(out))
}

/// Concatenation with promotion: NULL parts vanish, the remaining parts
/// promote to the highest type in logical ≤ integer ≤ float ≤ string, and
/// object parts require every part to be an object of one class.
pub fn concatenate(site: &'static str, parts: &[ValueRef]) -> EidosResult<EidosValue> {
    let mut result_type: Option<EidosType> = None;
    let mut total = 0usize;
    for part in parts {
        let part_type = part.value_type();
        if part_type == EidosType::Null {
            continue;
        }
        total += part.count();
        result_type = Some(match result_type {
            None => part_type,
            Some(current) => promote_for_concat(site, current, part_type)?,
        });
    }

    let Some(result_type) = result_type else {
        return Ok(EidosValue::null_singleton());
    };

    match result_type {
        EidosType::Logical => {
            let mut out = pool::logical_buffer(total);
            for part in non_null(parts) {
                for i in 0..part.count() {
                    out.push(part.logical_at(i)?);
                }
            }
            Ok(EidosValue::logical_vector(out))
        }
        EidosType::Integer => {
            let mut out = pool::integer_buffer(total);
            for part in non_null(parts) {
                for i in 0..part.count() {
                    out.push(part.integer_at(i)?);
                }
            }
            Ok(EidosValue::integer_vector(out))
        }
        EidosType::Float => {
            let mut out = pool::float_buffer(total);
            for part in non_null(parts) {
                for i in 0..part.count() {
                    out.push(part.float_at(i)?);
                }
            }
            Ok(EidosValue::float_vector(out))
        }
        EidosType::String => {
            let mut out = pool::string_buffer(total);
            for part in non_null(parts) {
                for i in 0..part.count() {
                    out.push(part.string_at(i)?);
                }
            }
            Ok(EidosValue::string_vector(out))
        }
        EidosType::Object => {
            let mut elements = Vec::with_capacity(total);
            let mut class = None;
            for part in non_null(parts) {
                let ValueData::Object(object) = part.data() else {
                    unreachable!("promotion guarantees object parts");
                };
                match &class {
                    None => class = Some(object.class().clone()),
                    Some(class) => {
                        if !std::rc::Rc::ptr_eq(class, object.class()) {
                            return Err(EidosError::type_error(
                                site,
                                format!(
                                    "cannot mix object<{}> and object<{}> elements",
                                    class.name(),
                                    object.class().name()
                                ),
                            ));
                        }
                    }
                }
                elements.extend(object.elements().iter().cloned());
            }
            let class = class.expect("object parts imply a class");
            Ok(EidosValue::object(super::object::ObjectVec::new(
                class, elements,
            )))
        }
        EidosType::Null => unreachable!("NULL parts are skipped"),
    }
}

/// Gathers the given element positions into a new value of the same type.
/// Every index must already be validated against the operand length.
pub fn select(
    site: &'static str,
    value: &EidosValue,
    indices: &[usize],
) -> EidosResult<EidosValue> {
    let count = value.count();
    if let Some(&bad) = indices.iter().find(|&&i| i >= count) {
        return Err(EidosError::index_out_of_range(
            site,
            format!("index {bad} is out of range for a value of length {count}"),
        ));
    }
    Ok(match value.data() {
        ValueData::Null => EidosValue::null_singleton(),
        ValueData::Logical(v) => {
            let source = v.as_slice();
            let mut out = pool::logical_buffer(indices.len());
            out.extend(indices.iter().map(|&i| source[i]));
            EidosValue::logical_vector(out)
        }
        ValueData::Integer(v) => {
            let source = v.as_slice();
            let mut out = pool::integer_buffer(indices.len());
            out.extend(indices.iter().map(|&i| source[i]));
            EidosValue::integer_vector(out)
        }
        ValueData::Float(v) => {
            let source = v.as_slice();
            let mut out = pool::float_buffer(indices.len());
            out.extend(indices.iter().map(|&i| source[i]));
            EidosValue::float_vector(out)
        }
        ValueData::String(v) => {
            let source = v.as_slice();
            let mut out = pool::string_buffer(indices.len());
            out.extend(indices.iter().map(|&i| source[i].clone()));
            EidosValue::string_vector(out)
        }
        ValueData::Object(v) => {
            let elements = indices.iter().map(|&i| v.elements()[i].clone()).collect();
            EidosValue::object(super::object::ObjectVec::new(v.class().clone(), elements))
        }
    })
}

fn non_null<'a>(parts: &'a [ValueRef]) -> impl Iterator<Item = &'a ValueRef> {
    parts
        .iter()
        .filter(|p| p.value_type() != EidosType::Null)
}

fn promote_for_concat(
    site: &'static str,
    a: EidosType,
    b: EidosType,
) -> EidosResult<EidosType> {
    fn rank(t: EidosType) -> Option<u8> {
        match t {
            EidosType::Logical => Some(0),
            EidosType::Integer => Some(1),
            EidosType::Float => Some(2),
            EidosType::String => Some(3),
            _ => None,
        }
    }
    match (rank(a), rank(b)) {
        (Some(ra), Some(rb)) => Ok(if ra >= rb { a } else { b }),
        _ if a == EidosType::Object && b == EidosType::Object => Ok(EidosType::Object),
        _ => Err(EidosError::type_error(
            site,
            format!("cannot concatenate {a} and {b} values"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn broadcast_rules() {
        assert_eq!(broadcast_length("test", "+", 3, 3).unwrap(), 3);
        assert_eq!(broadcast_length("test", "+", 1, 5).unwrap(), 5);
        assert_eq!(broadcast_length("test", "+", 5, 1).unwrap(), 5);
        assert_eq!(broadcast_length("test", "+", 0, 1).unwrap(), 0);
        assert!(broadcast_length("test", "+", 2, 3).is_err());
        assert!(broadcast_length("test", "+", 0, 3).is_err());
    }

    #[test]
    fn integer_arithmetic_broadcasts() {
        let a = EidosValue::integer_vector(vec![1, 2, 3]);
        let b = EidosValue::integer_singleton(10);
        let sum = arithmetic(ArithmeticOperator::Add, &a, &b).unwrap();
        assert_eq!(sum, EidosValue::integer_vector(vec![11, 12, 13]));
    }

    #[test]
    fn division_is_always_float() {
        let a = EidosValue::integer_singleton(1);
        let b = EidosValue::integer_singleton(2);
        let q = arithmetic(ArithmeticOperator::Divide, &a, &b).unwrap();
        assert_eq!(q, EidosValue::float_singleton(0.5));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let a = EidosValue::float_vector(vec![1.0, 2.0]);
        let b = EidosValue::float_vector(vec![10.0, 20.0, 30.0]);
        let err = arithmetic(ArithmeticOperator::Add, &a, &b).unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::LengthMismatch);
    }

    #[test]
    fn string_operands_are_rejected() {
        let a = EidosValue::string_singleton("x");
        let b = EidosValue::integer_singleton(1);
        assert!(arithmetic(ArithmeticOperator::Add, &a, &b).is_err());
    }

    #[test]
    fn integer_overflow_is_reported() {
        let a = EidosValue::integer_singleton(i64::MAX);
        let b = EidosValue::integer_singleton(1);
        let err = arithmetic(ArithmeticOperator::Add, &a, &b).unwrap_err();
        assert!(err.message.contains("integer overflow"));
    }

    #[test]
    fn comparisons_promote_strings_lexicographically() {
        let a = EidosValue::string_vector(vec!["apple".into(), "pear".into()]);
        let b = EidosValue::string_singleton("banana");
        let lt = compare(ComparisonOperator::Less, &a, &b).unwrap();
        assert_eq!(lt, EidosValue::logical_vector(vec![true, false]));
    }

    #[test]
    fn nan_compares_false_at_runtime() {
        let a = EidosValue::float_singleton(f64::NAN);
        let b = EidosValue::float_singleton(f64::NAN);
        let eq = compare(ComparisonOperator::Equal, &a, &b).unwrap();
        assert_eq!(eq, EidosValue::logical_singleton(false));
        let ne = compare(ComparisonOperator::NotEqual, &a, &b).unwrap();
        assert_eq!(ne, EidosValue::logical_singleton(true));
    }

    #[test]
    fn sequence_ascending_and_descending() {
        let up = sequence(
            &EidosValue::integer_singleton(1),
            &EidosValue::integer_singleton(5),
        )
        .unwrap();
        assert_eq!(up, EidosValue::integer_vector(vec![1, 2, 3, 4, 5]));

        let down = sequence(
            &EidosValue::integer_singleton(3),
            &EidosValue::integer_singleton(1),
        )
        .unwrap();
        assert_eq!(down, EidosValue::integer_vector(vec![3, 2, 1]));
    }

    #[test]
    fn sequence_rejects_non_finite_endpoints() {
        let err = sequence(
            &EidosValue::float_singleton(f64::NAN),
            &EidosValue::integer_singleton(1),
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Type);

        let err = sequence(
            &EidosValue::integer_singleton(1),
            &EidosValue::float_singleton(f64::INFINITY),
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Type);
    }

    #[test]
    fn concatenate_promotes_and_skips_null() {
        let parts = vec![
            Rc::new(EidosValue::null_singleton()),
            Rc::new(EidosValue::logical_singleton(true)),
            Rc::new(EidosValue::integer_vector(vec![2, 3])),
        ];
        let joined = concatenate("c", &parts).unwrap();
        assert_eq!(joined, EidosValue::integer_vector(vec![1, 2, 3]));
    }

    #[test]
    fn concatenate_to_string_uses_canonical_text() {
        let parts = vec![
            Rc::new(EidosValue::string_singleton("a")),
            Rc::new(EidosValue::integer_singleton(2)),
        ];
        let joined = concatenate("c", &parts).unwrap();
        assert_eq!(
            joined,
            EidosValue::string_vector(vec!["a".into(), "2".into()])
        );
    }

    #[test]
    fn concatenate_nothing_is_null() {
        let joined = concatenate("c", &[]).unwrap();
        assert_eq!(joined.value_type(), EidosType::Null);
    }
}
