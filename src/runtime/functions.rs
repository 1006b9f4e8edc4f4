//! Function signatures and the function map. The built-in map is computed
//! once at warmup and shared immutably; an embedding host may layer an
//! extended map above it. Signatures enforce arity and per-argument type
//! masks at call time.

use core::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::global::termination::{EidosError, EidosResult};
use crate::runtime::builtins::BuiltinTag;
use crate::runtime::interpreter::Interpreter;
use crate::utils::interner::SymbolId;
use crate::values::object::ObjectVec;
use crate::values::{TypeMask, ValueRef};

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: SymbolId,
    pub mask: TypeMask,
    pub default: Option<ValueRef>,
}

impl ParamSpec {
    pub fn required(name: &str, mask: TypeMask) -> Self {
        ParamSpec {
            name: SymbolId::new(name),
            mask,
            default: None,
        }
    }

    pub fn optional(name: &str, mask: TypeMask, default: ValueRef) -> Self {
        ParamSpec {
            name: SymbolId::new(name),
            mask,
            default: Some(default),
        }
    }
}

pub type DelegateImpl = Rc<dyn Fn(&mut Interpreter, &[ValueRef]) -> EidosResult<ValueRef>>;
pub type MethodImpl = fn(&ObjectVec, &[ValueRef]) -> EidosResult<ValueRef>;

#[derive(Clone)]
pub enum FunctionImpl {
    /// Dispatch tag for a built-in (see [`crate::runtime::builtins`]).
    Builtin(BuiltinTag),
    /// Host-supplied implementation, registered through an extended map.
    Delegate(DelegateImpl),
    /// Method of an object class, receiving the receiver object.
    Method(MethodImpl),
}

impl fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionImpl::Builtin(tag) => write!(f, "Builtin({tag:?})"),
            FunctionImpl::Delegate(_) => write!(f, "Delegate(..)"),
            FunctionImpl::Method(_) => write!(f, "Method(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: SymbolId,
    pub return_mask: TypeMask,
    pub params: Vec<ParamSpec>,
    /// For variadic signatures: the mask every trailing argument must
    /// satisfy. A variadic signature's declared parameters are filled by
    /// name only; every positional argument joins the variadic tail.
    pub variadic_mask: Option<TypeMask>,
    pub imp: FunctionImpl,
}

impl FunctionSignature {
    pub fn new(name: &str, return_mask: TypeMask, imp: FunctionImpl) -> Self {
        FunctionSignature {
            name: SymbolId::new(name),
            return_mask,
            params: Vec::new(),
            variadic_mask: None,
            imp,
        }
    }

    pub fn builtin(name: &str, return_mask: TypeMask, tag: BuiltinTag) -> Self {
        FunctionSignature::new(name, return_mask, FunctionImpl::Builtin(tag))
    }

    pub fn delegate(
        name: &str,
        return_mask: TypeMask,
        imp: impl Fn(&mut Interpreter, &[ValueRef]) -> EidosResult<ValueRef> + 'static,
    ) -> Self {
        FunctionSignature::new(name, return_mask, FunctionImpl::Delegate(Rc::new(imp)))
    }

    pub fn method(name: &str, return_mask: TypeMask, imp: MethodImpl) -> Self {
        FunctionSignature::new(name, return_mask, FunctionImpl::Method(imp))
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn variadic(mut self, mask: TypeMask) -> Self {
        self.variadic_mask = Some(mask);
        self
    }

    fn argument_type_error(
        &self,
        param: SymbolId,
        actual: &ValueRef,
        expected: TypeMask,
    ) -> EidosError {
        EidosError::type_error(
            "CheckArguments",
            format!(
                "argument \"{param}\" of function {}() cannot be type {}; expected {}",
                self.name,
                actual.value_type(),
                expected
            ),
        )
    }

    fn fill_named_slots(
        &self,
        slots: &mut [Option<ValueRef>],
        named: Vec<(SymbolId, ValueRef)>,
    ) -> EidosResult<()> {
        const SITE: &str = "CheckArguments";
        for (name, argument) in named {
            let Some(index) = self.params.iter().position(|p| p.name == name) else {
                return Err(EidosError::type_error(
                    SITE,
                    format!("function {}() has no parameter named \"{name}\"", self.name),
                ));
            };
            if slots[index].is_some() {
                return Err(EidosError::type_error(
                    SITE,
                    format!(
                        "parameter \"{name}\" of function {}() was supplied twice",
                        self.name
                    ),
                ));
            }
            slots[index] = Some(argument);
        }
        Ok(())
    }

    fn resolve_slots(&self, slots: Vec<Option<ValueRef>>) -> EidosResult<Vec<ValueRef>> {
        const SITE: &str = "CheckArguments";
        let mut arguments = Vec::with_capacity(self.params.len());
        for (slot, param) in slots.into_iter().zip(&self.params) {
            let argument = match slot {
                Some(argument) => argument,
                None => match &param.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(EidosError::type_error(
                            SITE,
                            format!(
                                "missing required argument \"{}\" to function {}()",
                                param.name, self.name
                            ),
                        ));
                    }
                },
            };
            if !param.mask.admits(argument.value_type()) {
                return Err(self.argument_type_error(param.name, &argument, param.mask));
            }
            arguments.push(argument);
        }
        Ok(arguments)
    }

    /// Matches positional then keyword arguments against the formal
    /// parameters, fills defaults, and enforces the type masks. Returns the
    /// resolved argument vector (fixed parameters first, then any variadic
    /// tail).
    pub fn match_arguments(
        &self,
        positional: Vec<ValueRef>,
        named: Vec<(SymbolId, ValueRef)>,
    ) -> EidosResult<Vec<ValueRef>> {
        const SITE: &str = "CheckArguments";
        if let Some(mask) = self.variadic_mask {
            // declared parameters are reachable by name only; everything
            // positional is part of the tail
            let mut slots: Vec<Option<ValueRef>> = vec![None; self.params.len()];
            self.fill_named_slots(&mut slots, named)?;
            for argument in &positional {
                if !mask.admits(argument.value_type()) {
                    return Err(self.argument_type_error(
                        SymbolId::new("..."),
                        argument,
                        mask,
                    ));
                }
            }
            let mut arguments = self.resolve_slots(slots)?;
            arguments.extend(positional);
            return Ok(arguments);
        }

        if positional.len() > self.params.len() {
            return Err(EidosError::type_error(
                SITE,
                format!(
                    "function {}() takes at most {} arguments, got {}",
                    self.name,
                    self.params.len(),
                    positional.len()
                ),
            ));
        }
        let mut slots: Vec<Option<ValueRef>> = vec![None; self.params.len()];
        for (i, argument) in positional.into_iter().enumerate() {
            slots[i] = Some(argument);
        }
        self.fill_named_slots(&mut slots, named)?;
        self.resolve_slots(slots)
    }
}

/// An immutable name → signature map, optionally layered above a base map.
#[derive(Debug, Default)]
pub struct FunctionMap {
    entries: IndexMap<SymbolId, Rc<FunctionSignature>>,
    base: Option<Rc<FunctionMap>>,
}

impl FunctionMap {
    pub fn new() -> Self {
        FunctionMap::default()
    }

    /// A map layered above `base`; lookups fall through to the base.
    pub fn extending(base: Rc<FunctionMap>) -> Self {
        FunctionMap {
            entries: IndexMap::new(),
            base: Some(base),
        }
    }

    pub fn add(&mut self, signature: FunctionSignature) {
        self.entries
            .insert(signature.name, Rc::new(signature));
    }

    pub fn from_signatures(signatures: Vec<FunctionSignature>) -> Self {
        let mut map = FunctionMap::new();
        for signature in signatures {
            map.add(signature);
        }
        map
    }

    pub fn lookup(&self, name: SymbolId) -> Option<Rc<FunctionSignature>> {
        if let Some(signature) = self.entries.get(&name) {
            return Some(signature.clone());
        }
        self.base.as_ref().and_then(|base| base.lookup(name))
    }

    /// All names resolvable through this map, base first.
    pub fn names(&self) -> Vec<SymbolId> {
        let mut names = match &self.base {
            Some(base) => base.names(),
            None => Vec::new(),
        };
        names.extend(self.entries.keys().copied());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::termination::ErrorKind;
    use crate::values::EidosValue;

    fn sig() -> FunctionSignature {
        FunctionSignature::builtin("rep", TypeMask::ANY, BuiltinTag::Rep)
            .with_param(ParamSpec::required("x", TypeMask::ANY))
            .with_param(ParamSpec::optional(
                "count",
                TypeMask::INTEGER,
                EidosValue::integer(1),
            ))
    }

    #[test]
    fn positional_then_named_then_defaults() {
        let signature = sig();
        let args = signature
            .match_arguments(vec![EidosValue::integer(7)], vec![])
            .unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(*args[1], EidosValue::integer_singleton(1));

        let args = signature
            .match_arguments(
                vec![EidosValue::integer(7)],
                vec![(SymbolId::new("count"), EidosValue::integer(3))],
            )
            .unwrap();
        assert_eq!(*args[1], EidosValue::integer_singleton(3));
    }

    #[test]
    fn type_mask_violation_names_function_and_parameter() {
        let signature = sig();
        let err = signature
            .match_arguments(
                vec![EidosValue::integer(7), EidosValue::string("three")],
                vec![],
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert!(err.message.contains("rep()"));
        assert!(err.message.contains("\"count\""));
        assert!(err.message.contains("string"));
    }

    #[test]
    fn unknown_and_duplicate_named_arguments_are_rejected() {
        let signature = sig();
        let err = signature
            .match_arguments(
                vec![],
                vec![(SymbolId::new("bogus"), EidosValue::integer(1))],
            )
            .unwrap_err();
        assert!(err.message.contains("no parameter named"));

        let err = signature
            .match_arguments(
                vec![EidosValue::integer(1), EidosValue::integer(2)],
                vec![(SymbolId::new("count"), EidosValue::integer(3))],
            )
            .unwrap_err();
        assert!(err.message.contains("supplied twice"));
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let signature = sig();
        let err = signature.match_arguments(vec![], vec![]).unwrap_err();
        assert!(err.message.contains("missing required argument \"x\""));
    }

    #[test]
    fn variadic_signatures_fill_declared_parameters_by_name() {
        let signature = FunctionSignature::builtin("cat", TypeMask::NULL, BuiltinTag::Cat)
            .with_param(ParamSpec::optional(
                "sep",
                TypeMask::STRING,
                EidosValue::string(" "),
            ))
            .variadic(TypeMask::ANY);

        // positional arguments all land in the tail; sep defaults
        let args = signature
            .match_arguments(vec![EidosValue::integer(1), EidosValue::integer(2)], vec![])
            .unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(*args[0], EidosValue::string_singleton(" "));
        assert_eq!(*args[1], EidosValue::integer_singleton(1));
        assert_eq!(*args[2], EidosValue::integer_singleton(2));

        // a named argument reaches the declared parameter
        let args = signature
            .match_arguments(
                vec![EidosValue::integer(1)],
                vec![(SymbolId::new("sep"), EidosValue::string(","))],
            )
            .unwrap();
        assert_eq!(*args[0], EidosValue::string_singleton(","));
        assert_eq!(*args[1], EidosValue::integer_singleton(1));

        // unknown names are still rejected
        let err = signature
            .match_arguments(
                vec![],
                vec![(SymbolId::new("bogus"), EidosValue::integer(1))],
            )
            .unwrap_err();
        assert!(err.message.contains("no parameter named"));
    }

    #[test]
    fn layered_lookup_falls_through() {
        let base = Rc::new(FunctionMap::from_signatures(vec![sig()]));
        let mut extended = FunctionMap::extending(base);
        extended.add(FunctionSignature::delegate(
            "host_fn",
            TypeMask::NULL,
            |_, _| Ok(EidosValue::null()),
        ));
        assert!(extended.lookup(SymbolId::new("rep")).is_some());
        assert!(extended.lookup(SymbolId::new("host_fn")).is_some());
        assert!(extended.lookup(SymbolId::new("zzz")).is_none());
    }
}
