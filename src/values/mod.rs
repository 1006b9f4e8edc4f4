//! The Eidos value model: six semantic types, each logically a vector of its
//! element type, shared through `Rc` with copy-on-write mutation. Singleton
//! values store their element inline; vectors draw their buffers from the
//! recycling pool in [`pool`].

pub mod object;
pub mod ops;
pub mod pool;
pub mod statics;

use core::cmp::Ordering;
use core::fmt;
use core::mem;
use core::slice;
use std::rc::Rc;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::global::termination::{EidosError, EidosResult};
use crate::values::object::ObjectVec;

/// Shared handle to a value. `Rc::strong_count == 1` is the unique-ownership
/// test the copy-on-write discipline is built on.
pub type ValueRef = Rc<EidosValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EidosType {
    Null,
    Logical,
    Integer,
    Float,
    String,
    Object,
}

impl fmt::Display for EidosType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EidosType::Null => "NULL",
            EidosType::Logical => "logical",
            EidosType::Integer => "integer",
            EidosType::Float => "float",
            EidosType::String => "string",
            EidosType::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// Bit mask over the semantic types, used by function signatures and property
/// descriptors to constrain arguments and return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const NULL: TypeMask = TypeMask(1 << 0);
    pub const LOGICAL: TypeMask = TypeMask(1 << 1);
    pub const INTEGER: TypeMask = TypeMask(1 << 2);
    pub const FLOAT: TypeMask = TypeMask(1 << 3);
    pub const STRING: TypeMask = TypeMask(1 << 4);
    pub const OBJECT: TypeMask = TypeMask(1 << 5);
    pub const NUMERIC: TypeMask = TypeMask(1 << 1 | 1 << 2 | 1 << 3);
    pub const ANY: TypeMask = TypeMask(0b11_1111);

    pub const fn union(self, other: TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }

    pub fn admits(self, value_type: EidosType) -> bool {
        let bit = match value_type {
            EidosType::Null => TypeMask::NULL,
            EidosType::Logical => TypeMask::LOGICAL,
            EidosType::Integer => TypeMask::INTEGER,
            EidosType::Float => TypeMask::FLOAT,
            EidosType::String => TypeMask::STRING,
            EidosType::Object => TypeMask::OBJECT,
        };
        self.0 & bit.0 != 0
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (bit, name) in [
            (TypeMask::NULL, "NULL"),
            (TypeMask::LOGICAL, "logical"),
            (TypeMask::INTEGER, "integer"),
            (TypeMask::FLOAT, "float"),
            (TypeMask::STRING, "string"),
            (TypeMask::OBJECT, "object"),
        ] {
            if self.0 & bit.0 != 0 {
                names.push(name);
            }
        }
        write!(f, "{}", names.join("|"))
    }
}

/// Element storage: a singleton element lives inline, a vector on the heap.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementVec<T> {
    Singleton(T),
    Vector(Vec<T>),
}

impl<T> ElementVec<T> {
    pub fn len(&self) -> usize {
        match self {
            ElementVec::Singleton(_) => 1,
            ElementVec::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            ElementVec::Singleton(x) => slice::from_ref(x),
            ElementVec::Vector(v) => v.as_slice(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            ElementVec::Singleton(x) => slice::from_mut(x),
            ElementVec::Vector(v) => v.as_mut_slice(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }
}

#[derive(Debug, Clone)]
pub enum ValueData {
    Null,
    Logical(ElementVec<bool>),
    Integer(ElementVec<i64>),
    Float(ElementVec<f64>),
    String(ElementVec<String>),
    Object(ObjectVec),
}

impl ValueData {
    pub fn value_type(&self) -> EidosType {
        match self {
            ValueData::Null => EidosType::Null,
            ValueData::Logical(_) => EidosType::Logical,
            ValueData::Integer(_) => EidosType::Integer,
            ValueData::Float(_) => EidosType::Float,
            ValueData::String(_) => EidosType::String,
            ValueData::Object(_) => EidosType::Object,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            ValueData::Null => 0,
            ValueData::Logical(v) => v.len(),
            ValueData::Integer(v) => v.len(),
            ValueData::Float(v) => v.len(),
            ValueData::String(v) => v.len(),
            ValueData::Object(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EidosValue {
    data: ValueData,
    invisible: bool,
}

/// Value equality ignores the invisible flag and the singleton/vector storage
/// distinction: a singleton equals a one-element vector with the same element.
impl PartialEq for EidosValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Null, ValueData::Null) => true,
            (ValueData::Logical(a), ValueData::Logical(b)) => a.as_slice() == b.as_slice(),
            (ValueData::Integer(a), ValueData::Integer(b)) => a.as_slice() == b.as_slice(),
            (ValueData::Float(a), ValueData::Float(b)) => a.as_slice() == b.as_slice(),
            (ValueData::String(a), ValueData::String(b)) => a.as_slice() == b.as_slice(),
            (ValueData::Object(a), ValueData::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Drop for EidosValue {
    fn drop(&mut self) {
        let data = mem::replace(&mut self.data, ValueData::Null);
        pool::recycle(data);
    }
}

impl EidosValue {
    // ---- construction -----------------------------------------------------

    pub(crate) fn from_data(data: ValueData) -> Self {
        EidosValue {
            data,
            invisible: false,
        }
    }

    /// The canonical visible NULL.
    pub fn null() -> ValueRef {
        statics::null()
    }

    /// The canonical invisible NULL.
    pub fn null_invisible() -> ValueRef {
        statics::null_invisible()
    }

    /// Logical singleton; returns the shared `T`/`F` constants.
    pub fn logical(value: bool) -> ValueRef {
        if value {
            statics::logical_true()
        } else {
            statics::logical_false()
        }
    }

    /// Integer singleton; 0 and 1 come from the shared static set.
    pub fn integer(value: i64) -> ValueRef {
        match value {
            0 => statics::integer_zero(),
            1 => statics::integer_one(),
            _ => Rc::new(EidosValue::integer_singleton(value)),
        }
    }

    /// Float singleton; 0.0, 0.5, 1.0 and +∞ come from the shared static set.
    pub fn float(value: f64) -> ValueRef {
        if value == 0.0 && value.is_sign_positive() {
            statics::float_zero()
        } else if value == 0.5 {
            statics::float_half()
        } else if value == 1.0 {
            statics::float_one()
        } else if value == f64::INFINITY {
            statics::float_infinity()
        } else {
            Rc::new(EidosValue::float_singleton(value))
        }
    }

    pub fn string(value: impl Into<String>) -> ValueRef {
        Rc::new(EidosValue::string_singleton(value))
    }

    /// The shared empty vector of the given element type.
    pub fn empty(element_type: EidosType) -> ValueRef {
        statics::empty(element_type)
    }

    pub fn logical_singleton(value: bool) -> Self {
        EidosValue::from_data(ValueData::Logical(ElementVec::Singleton(value)))
    }

    pub fn integer_singleton(value: i64) -> Self {
        EidosValue::from_data(ValueData::Integer(ElementVec::Singleton(value)))
    }

    pub fn float_singleton(value: f64) -> Self {
        EidosValue::from_data(ValueData::Float(ElementVec::Singleton(value)))
    }

    pub fn string_singleton(value: impl Into<String>) -> Self {
        EidosValue::from_data(ValueData::String(ElementVec::Singleton(value.into())))
    }

    pub fn null_singleton() -> Self {
        EidosValue::from_data(ValueData::Null)
    }

    pub fn logical_vector(values: Vec<bool>) -> Self {
        EidosValue::from_data(ValueData::Logical(ElementVec::Vector(values)))
    }

    pub fn integer_vector(values: Vec<i64>) -> Self {
        EidosValue::from_data(ValueData::Integer(ElementVec::Vector(values)))
    }

    pub fn float_vector(values: Vec<f64>) -> Self {
        EidosValue::from_data(ValueData::Float(ElementVec::Vector(values)))
    }

    pub fn string_vector(values: Vec<String>) -> Self {
        EidosValue::from_data(ValueData::String(ElementVec::Vector(values)))
    }

    pub fn object(object: ObjectVec) -> Self {
        EidosValue::from_data(ValueData::Object(object))
    }

    // ---- basic observers --------------------------------------------------

    pub fn value_type(&self) -> EidosType {
        self.data.value_type()
    }

    pub fn count(&self) -> usize {
        self.data.count()
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ValueData {
        &mut self.data
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    /// Marks the value invisible, suppressing implicit top-level printing.
    pub fn invert_invisibility(&mut self) {
        self.invisible = true;
    }

    pub fn set_invisible(&mut self, invisible: bool) {
        self.invisible = invisible;
    }

    // ---- element coercion -------------------------------------------------

    fn element_error(&self, site: &'static str, index: usize) -> EidosError {
        EidosError::index_out_of_range(
            site,
            format!(
                "index {index} is out of range for a {} value of length {}",
                self.value_type(),
                self.count()
            ),
        )
    }

    pub fn logical_at(&self, index: usize) -> EidosResult<bool> {
        const SITE: &str = "LogicalAtIndex";
        match &self.data {
            ValueData::Logical(v) => v.get(index).copied().ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Integer(v) => v.get(index).map(|x| *x != 0).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Float(v) => v.get(index).map(|x| *x != 0.0).ok_or_else(|| self.element_error(SITE, index)),
            _ => Err(EidosError::type_error(
                SITE,
                format!("cannot coerce a {} value to logical", self.value_type()),
            )),
        }
    }

    pub fn integer_at(&self, index: usize) -> EidosResult<i64> {
        const SITE: &str = "IntegerAtIndex";
        match &self.data {
            ValueData::Logical(v) => v.get(index).map(|x| *x as i64).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Integer(v) => v.get(index).copied().ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Float(v) => {
                let x = *v.get(index).ok_or_else(|| self.element_error(SITE, index))?;
                if !x.is_finite() {
                    return Err(EidosError::type_error(
                        SITE,
                        format!("cannot coerce non-finite float {} to integer", format_float(x)),
                    ));
                }
                Ok(x.trunc() as i64)
            }
            _ => Err(EidosError::type_error(
                SITE,
                format!("cannot coerce a {} value to integer", self.value_type()),
            )),
        }
    }

    pub fn float_at(&self, index: usize) -> EidosResult<f64> {
        const SITE: &str = "FloatAtIndex";
        match &self.data {
            ValueData::Logical(v) => v.get(index).map(|x| *x as i64 as f64).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Integer(v) => v.get(index).map(|x| *x as f64).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Float(v) => v.get(index).copied().ok_or_else(|| self.element_error(SITE, index)),
            _ => Err(EidosError::type_error(
                SITE,
                format!("cannot coerce a {} value to float", self.value_type()),
            )),
        }
    }

    /// The canonical element text, as used by `cat` and string coercion.
    pub fn string_at(&self, index: usize) -> EidosResult<String> {
        const SITE: &str = "StringAtIndex";
        match &self.data {
            ValueData::Logical(v) => v
                .get(index)
                .map(|x| if *x { "T".to_string() } else { "F".to_string() })
                .ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Integer(v) => v.get(index).map(|x| x.to_string()).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::Float(v) => v.get(index).map(|x| format_float(*x)).ok_or_else(|| self.element_error(SITE, index)),
            ValueData::String(v) => v.get(index).cloned().ok_or_else(|| self.element_error(SITE, index)),
            _ => Err(EidosError::type_error(
                SITE,
                format!("cannot coerce a {} value to string", self.value_type()),
            )),
        }
    }

    // ---- indexed access ---------------------------------------------------

    /// Returns element `index` as a fresh singleton, or the shared singleton
    /// constant when the element matches one.
    pub fn value_at_index(&self, index: usize) -> EidosResult<ValueRef> {
        const SITE: &str = "GetValueAtIndex";
        if index >= self.count() {
            return Err(self.element_error(SITE, index));
        }
        Ok(match &self.data {
            ValueData::Null => unreachable!("NULL has length 0"),
            ValueData::Logical(v) => EidosValue::logical(v.as_slice()[index]),
            ValueData::Integer(v) => EidosValue::integer(v.as_slice()[index]),
            ValueData::Float(v) => EidosValue::float(v.as_slice()[index]),
            ValueData::String(v) => EidosValue::string(v.as_slice()[index].clone()),
            ValueData::Object(v) => Rc::new(EidosValue::object(v.slice_single(index))),
        })
    }

    /// Writes element `index` in place from a singleton value. The caller
    /// must hold exclusive ownership; the symbol-table and interpreter COW
    /// paths guarantee that.
    pub fn set_value_at_index(&mut self, index: usize, value: &EidosValue) -> EidosResult<()> {
        const SITE: &str = "SetValueAtIndex";
        if index >= self.count() {
            return Err(self.element_error(SITE, index));
        }
        if value.count() != 1 {
            return Err(EidosError::type_error(
                SITE,
                format!("expected a singleton value, got length {}", value.count()),
            ));
        }
        let value_type = value.value_type();
        let target_type = self.data.value_type();
        let incompatible = move || {
            EidosError::type_error(
                SITE,
                format!("cannot assign a {value_type} element into a {target_type} value"),
            )
        };
        match &mut self.data {
            ValueData::Logical(v) => {
                if value.value_type() != EidosType::Logical {
                    return Err(incompatible());
                }
                v.as_mut_slice()[index] = value.logical_at(0)?;
            }
            ValueData::Integer(v) => {
                if !matches!(value.value_type(), EidosType::Logical | EidosType::Integer) {
                    return Err(incompatible());
                }
                v.as_mut_slice()[index] = value.integer_at(0)?;
            }
            ValueData::Float(v) => {
                if !matches!(
                    value.value_type(),
                    EidosType::Logical | EidosType::Integer | EidosType::Float
                ) {
                    return Err(incompatible());
                }
                v.as_mut_slice()[index] = value.float_at(0)?;
            }
            ValueData::String(v) => {
                let ValueData::String(src) = value.data() else {
                    return Err(incompatible());
                };
                v.as_mut_slice()[index] = src.as_slice()[0].clone();
            }
            ValueData::Object(v) => {
                let ValueData::Object(src) = value.data() else {
                    return Err(incompatible());
                };
                v.set_element(index, src)?;
            }
            ValueData::Null => unreachable!("NULL has length 0"),
        }
        Ok(())
    }

    /// Deep copy of the element storage; the copy is visible and uniquely
    /// owned by the caller.
    pub fn copy_values(&self) -> EidosValue {
        let data = match &self.data {
            ValueData::Null => ValueData::Null,
            ValueData::Logical(v) => match v {
                ElementVec::Singleton(x) => ValueData::Logical(ElementVec::Singleton(*x)),
                ElementVec::Vector(xs) => {
                    let mut buf = pool::logical_buffer(xs.len());
                    buf.extend_from_slice(xs);
                    ValueData::Logical(ElementVec::Vector(buf))
                }
            },
            ValueData::Integer(v) => match v {
                ElementVec::Singleton(x) => ValueData::Integer(ElementVec::Singleton(*x)),
                ElementVec::Vector(xs) => {
                    let mut buf = pool::integer_buffer(xs.len());
                    buf.extend_from_slice(xs);
                    ValueData::Integer(ElementVec::Vector(buf))
                }
            },
            ValueData::Float(v) => match v {
                ElementVec::Singleton(x) => ValueData::Float(ElementVec::Singleton(*x)),
                ElementVec::Vector(xs) => {
                    let mut buf = pool::float_buffer(xs.len());
                    buf.extend_from_slice(xs);
                    ValueData::Float(ElementVec::Vector(buf))
                }
            },
            ValueData::String(v) => match v {
                ElementVec::Singleton(x) => ValueData::String(ElementVec::Singleton(x.clone())),
                ElementVec::Vector(xs) => {
                    let mut buf = pool::string_buffer(xs.len());
                    buf.extend_from_slice(xs);
                    ValueData::String(ElementVec::Vector(buf))
                }
            },
            ValueData::Object(v) => ValueData::Object(v.clone()),
        };
        EidosValue::from_data(data)
    }

    // ---- comparison -------------------------------------------------------

    /// Compares element `index` of `self` against element `other_index` of
    /// `other` under promoted-type rules: strings lexicographic when either
    /// side is a string, otherwise numeric with NaN ordered equal to itself
    /// and after every other float.
    pub fn compare_elements(
        &self,
        index: usize,
        other: &EidosValue,
        other_index: usize,
    ) -> EidosResult<Ordering> {
        const SITE: &str = "CompareValues";
        let a_type = self.value_type();
        let b_type = other.value_type();
        if matches!(a_type, EidosType::Object | EidosType::Null)
            || matches!(b_type, EidosType::Object | EidosType::Null)
        {
            return Err(EidosError::type_error(
                SITE,
                format!("cannot compare {a_type} and {b_type} values"),
            ));
        }
        if a_type == EidosType::String || b_type == EidosType::String {
            return Ok(self.string_at(index)?.cmp(&other.string_at(other_index)?));
        }
        if a_type == EidosType::Float || b_type == EidosType::Float {
            let a = OrderedFloat(self.float_at(index)?);
            let b = OrderedFloat(other.float_at(other_index)?);
            return Ok(a.cmp(&b));
        }
        Ok(self.integer_at(index)?.cmp(&other.integer_at(other_index)?))
    }

    /// Total order over singleton values, sufficient for sort and equality.
    pub fn compare(&self, other: &EidosValue) -> EidosResult<Ordering> {
        self.compare_elements(0, other, 0)
    }

    // ---- concatenation ----------------------------------------------------

    /// Appends the elements of `other`, promoting this value's element type
    /// upward through logical ≤ integer ≤ float as needed. String and object
    /// storage accept only their own type.
    pub fn append_from(&mut self, other: &EidosValue) -> EidosResult<()> {
        let joined = ops::concatenate("AppendFrom", &[self.snapshot(), other.snapshot()])?;
        self.data = joined.take_data();
        Ok(())
    }

    /// Cheap shared snapshot for read-only plumbing.
    fn snapshot(&self) -> ValueRef {
        Rc::new(self.copy_values())
    }

    pub(crate) fn take_data(mut self) -> ValueData {
        mem::replace(&mut self.data, ValueData::Null)
    }

    // ---- printing ---------------------------------------------------------

    /// Canonical textual form, used by `print`, `cat`, and `str`.
    pub fn stream_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        match &self.data {
            ValueData::Null => write!(out, "NULL"),
            ValueData::Logical(v) => write!(
                out,
                "{}",
                v.as_slice()
                    .iter()
                    .format_with(" ", |x, f| f(&if *x { "T" } else { "F" }))
            ),
            ValueData::Integer(v) => write!(out, "{}", v.as_slice().iter().format(" ")),
            ValueData::Float(v) => write!(
                out,
                "{}",
                v.as_slice()
                    .iter()
                    .format_with(" ", |x, f| f(&format_float(*x)))
            ),
            ValueData::String(v) => write!(
                out,
                "{}",
                v.as_slice().iter().format_with(" ", |x, f| {
                    f(&format_args!("\"{}\"", escape_string(x)))
                })
            ),
            ValueData::Object(v) => v.stream_to(out),
        }
    }
}

impl fmt::Display for EidosValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.stream_to(f)
    }
}

/// Formats a float so that the text re-lexes to an equal float: integral
/// values keep a trailing `.0`, non-finite values spell the intrinsic
/// constants.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NAN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let text = format!("{x}");
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Escapes a string element for canonical quoted printing.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_and_vector_lengths() {
        assert_eq!(EidosValue::integer_singleton(7).count(), 1);
        assert_eq!(EidosValue::integer_vector(vec![1, 2, 3]).count(), 3);
        assert_eq!(EidosValue::null_singleton().count(), 0);
    }

    #[test]
    fn get_value_at_index_returns_shared_constants() {
        let v = EidosValue::integer_vector(vec![0, 1, 7]);
        let zero = v.value_at_index(0).unwrap();
        assert!(Rc::ptr_eq(&zero, &statics::integer_zero()));
        let one = v.value_at_index(1).unwrap();
        assert!(Rc::ptr_eq(&one, &statics::integer_one()));
        let seven = v.value_at_index(2).unwrap();
        assert_eq!(*seven, EidosValue::integer_singleton(7));
    }

    #[test]
    fn get_value_at_index_out_of_range() {
        let v = EidosValue::integer_vector(vec![1, 2]);
        let err = v.value_at_index(2).unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn set_value_at_index_enforces_element_type() {
        let mut v = EidosValue::integer_vector(vec![1, 2, 3]);
        v.set_value_at_index(1, &EidosValue::integer_singleton(99)).unwrap();
        assert_eq!(v, EidosValue::integer_vector(vec![1, 99, 3]));

        let err = v
            .set_value_at_index(0, &EidosValue::string_singleton("no"))
            .unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Type);
    }

    #[test]
    fn copy_values_is_deep_and_visible() {
        let mut original = EidosValue::integer_vector(vec![1, 2, 3]);
        original.invert_invisibility();
        let copy = original.copy_values();
        assert!(!copy.is_invisible());
        assert_eq!(copy, original);
    }

    #[test]
    fn compare_promotes_to_string_and_float() {
        let s = EidosValue::string_singleton("10");
        let i = EidosValue::integer_singleton(9);
        // lexicographic: "10" < "9"
        assert_eq!(s.compare(&i).unwrap(), Ordering::Less);

        let f = EidosValue::float_singleton(9.5);
        assert_eq!(i.compare(&f).unwrap(), Ordering::Less);
    }

    #[test]
    fn nan_is_equal_to_itself_for_sorting() {
        let a = EidosValue::float_singleton(f64::NAN);
        let b = EidosValue::float_singleton(f64::NAN);
        assert_eq!(a.compare(&b).unwrap(), Ordering::Equal);
        let c = EidosValue::float_singleton(f64::INFINITY);
        assert_eq!(c.compare(&a).unwrap(), Ordering::Less);
    }

    #[test]
    fn append_from_promotes_through_the_lattice() {
        let mut v = EidosValue::logical_vector(vec![true, false]);
        v.append_from(&EidosValue::integer_singleton(5)).unwrap();
        assert_eq!(v, EidosValue::integer_vector(vec![1, 0, 5]));

        let mut v = EidosValue::integer_vector(vec![1, 2]);
        v.append_from(&EidosValue::float_singleton(0.5)).unwrap();
        assert_eq!(v, EidosValue::float_vector(vec![1.0, 2.0, 0.5]));
    }

    #[test]
    fn append_from_rejects_out_of_lattice() {
        let mut v = EidosValue::integer_vector(vec![1]);
        assert!(v.append_from(&EidosValue::string_singleton("x")).is_err());
    }

    #[test]
    fn float_formatting_round_trips() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_float(f64::NAN), "NAN");
    }

    #[test]
    fn stream_form_is_canonical() {
        let mut out = String::new();
        EidosValue::integer_vector(vec![1, 2, 99]).stream_to(&mut out).unwrap();
        assert_eq!(out, "1 2 99");

        let mut out = String::new();
        EidosValue::logical_vector(vec![true, false]).stream_to(&mut out).unwrap();
        assert_eq!(out, "T F");

        let mut out = String::new();
        EidosValue::string_singleton("a\"b").stream_to(&mut out).unwrap();
        assert_eq!(out, "\"a\\\"b\"");
    }
}
