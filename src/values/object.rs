//! Object values: vectors of host-provided elements described by an element
//! class descriptor. The descriptor resolves member access (`x.p`) and method
//! dispatch (`x.m(...)`); elements themselves are opaque to the core and are
//! shared by reference, so property writes are visible to every holder.

use core::any::Any;
use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use itertools::Itertools;

use crate::global::termination::{EidosError, EidosResult};
use crate::runtime::functions::FunctionSignature;
use crate::utils::interner::SymbolId;
use crate::values::{ops, ElementVec, EidosValue, TypeMask, ValueRef};

/// A host object element. Hosts downcast through `as_any` in their property
/// getters/setters and method implementations.
pub trait EidosObjectElement: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type ObjectElementRef = Rc<RefCell<dyn EidosObjectElement>>;

pub type PropertyGetter = fn(&dyn EidosObjectElement) -> EidosResult<ValueRef>;
pub type PropertySetter = fn(&mut dyn EidosObjectElement, &EidosValue) -> EidosResult<()>;

#[derive(Debug)]
pub struct PropertySignature {
    pub name: SymbolId,
    pub mask: TypeMask,
    pub getter: PropertyGetter,
    pub setter: Option<PropertySetter>,
}

/// Element class descriptor supplied by the host: identity, display name, and
/// the enumerable property/method surface of one kind of object element.
pub struct ObjectClass {
    name: String,
    properties: Vec<PropertySignature>,
    methods: Vec<Rc<FunctionSignature>>,
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl ObjectClass {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectClass {
            name: name.into(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: PropertySignature) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_method(mut self, method: Rc<FunctionSignature>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: SymbolId) -> Option<&PropertySignature> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: SymbolId) -> Option<&Rc<FunctionSignature>> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn properties(&self) -> &[PropertySignature] {
        &self.properties
    }

    pub fn methods(&self) -> &[Rc<FunctionSignature>] {
        &self.methods
    }
}

#[derive(Debug, Clone)]
pub struct ObjectVec {
    class: Rc<ObjectClass>,
    elements: ElementVec<ObjectElementRef>,
}

/// Object equality is element identity: two object values are equal when they
/// hold the same elements of the same class, in order.
impl PartialEq for ObjectVec {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.class, &other.class)
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .as_slice()
                .iter()
                .zip(other.elements.as_slice())
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}

impl ObjectVec {
    pub fn new(class: Rc<ObjectClass>, mut elements: Vec<ObjectElementRef>) -> Self {
        let elements = if elements.len() == 1 {
            ElementVec::Singleton(elements.pop().expect("length checked"))
        } else {
            ElementVec::Vector(elements)
        };
        ObjectVec { class, elements }
    }

    pub fn singleton(class: Rc<ObjectClass>, element: ObjectElementRef) -> Self {
        ObjectVec {
            class,
            elements: ElementVec::Singleton(element),
        }
    }

    pub fn class(&self) -> &Rc<ObjectClass> {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[ObjectElementRef] {
        self.elements.as_slice()
    }

    /// A singleton object value sharing element `index`.
    pub fn slice_single(&self, index: usize) -> ObjectVec {
        ObjectVec::singleton(self.class.clone(), self.elements.as_slice()[index].clone())
    }

    pub(crate) fn set_element(&mut self, index: usize, source: &ObjectVec) -> EidosResult<()> {
        if !Rc::ptr_eq(&self.class, &source.class) {
            return Err(EidosError::type_error(
                "SetValueAtIndex",
                format!(
                    "cannot assign an object<{}> element into an object<{}> value",
                    source.class.name(),
                    self.class.name()
                ),
            ));
        }
        self.elements.as_mut_slice()[index] = source.elements.as_slice()[0].clone();
        Ok(())
    }

    fn resolve_property(&self, name: SymbolId) -> EidosResult<&PropertySignature> {
        self.class.property(name).ok_or_else(|| {
            EidosError::type_error(
                "GetProperty",
                format!(
                    "property \"{name}\" is not defined for object<{}>",
                    self.class.name()
                ),
            )
        })
    }

    /// Member read: applies the property getter to every element and
    /// concatenates the per-element results.
    pub fn get_property(&self, name: SymbolId) -> EidosResult<ValueRef> {
        let property = self.resolve_property(name)?;
        let mut parts = Vec::with_capacity(self.len());
        for element in self.elements.as_slice() {
            let part = (property.getter)(&*element.borrow())?;
            if !property.mask.admits(part.value_type()) {
                return Err(EidosError::internal(
                    "GetProperty",
                    format!(
                        "getter for \"{name}\" produced a {} value outside its mask {}",
                        part.value_type(),
                        property.mask
                    ),
                ));
            }
            parts.push(part);
        }
        if parts.len() == 1 {
            return Ok(parts.pop().expect("length checked"));
        }
        Ok(Rc::new(ops::concatenate("GetProperty", &parts)?))
    }

    /// Member write: broadcasts a singleton across all elements, or assigns
    /// one element of `value` per object element when lengths match.
    pub fn set_property(&self, name: SymbolId, value: &EidosValue) -> EidosResult<()> {
        let property = self.resolve_property(name)?;
        let Some(setter) = property.setter else {
            return Err(EidosError::type_error(
                "SetProperty",
                format!(
                    "property \"{name}\" of object<{}> is read-only",
                    self.class.name()
                ),
            ));
        };
        if !property.mask.admits(value.value_type()) {
            return Err(EidosError::type_error(
                "SetProperty",
                format!(
                    "property \"{name}\" expects {} but was assigned a {} value",
                    property.mask,
                    value.value_type()
                ),
            ));
        }
        if value.count() != 1 && value.count() != self.len() {
            return Err(EidosError::length_mismatch(
                "SetProperty",
                format!(
                    "assigned value of length {} does not match object length {}",
                    value.count(),
                    self.len()
                ),
            ));
        }
        for (i, element) in self.elements.as_slice().iter().enumerate() {
            if value.count() == 1 {
                setter(&mut *element.borrow_mut(), value)?;
            } else {
                let one = value.value_at_index(i)?;
                setter(&mut *element.borrow_mut(), &one)?;
            }
        }
        Ok(())
    }

    pub fn stream_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        if self.is_empty() {
            return write!(out, "object<{}>(0)", self.class.name());
        }
        write!(
            out,
            "{}",
            self.elements.as_slice().iter().format_with(" ", |_, f| {
                f(&format_args!("<{}>", self.class.name()))
            })
        )
    }
}
