//! The chained symbol table: an intrinsic-constants scope at the root,
//! optionally a defined-constants scope, and a variables scope in front.
//! Lookup walks front to root; writes only ever touch a variables scope.
//!
//! Storage starts as a small contiguous array scanned back-to-front and
//! migrates one way to a hash map when it overflows.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::global::termination::{EidosError, EidosResult};
use crate::utils::interner::SymbolId;
use crate::values::{EidosValue, ValueRef};

/// Entries a scope holds before its storage migrates to a hash map.
pub const COMPACT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    IntrinsicConstants,
    DefinedConstants,
    Variables,
}

pub type ScopeRef = Rc<RefCell<SymbolScope>>;

#[derive(Debug)]
enum ScopeStorage {
    Compact(Vec<(SymbolId, ValueRef)>),
    Hashed(IndexMap<SymbolId, ValueRef>),
}

impl ScopeStorage {
    fn get(&self, id: SymbolId) -> Option<&ValueRef> {
        match self {
            // back-to-front so the most recently defined binding wins
            ScopeStorage::Compact(entries) => entries
                .iter()
                .rev()
                .find(|(name, _)| *name == id)
                .map(|(_, value)| value),
            ScopeStorage::Hashed(map) => map.get(&id),
        }
    }

    fn contains(&self, id: SymbolId) -> bool {
        self.get(id).is_some()
    }

    fn insert(&mut self, id: SymbolId, value: ValueRef) {
        match self {
            ScopeStorage::Compact(entries) => {
                if let Some(slot) = entries.iter_mut().rev().find(|(name, _)| *name == id) {
                    slot.1 = value;
                    return;
                }
                if entries.len() < COMPACT_CAPACITY {
                    entries.push((id, value));
                    return;
                }
            }
            ScopeStorage::Hashed(map) => {
                map.insert(id, value);
                return;
            }
        }
        // compact and full: migrate, then insert into the hash map
        self.migrate();
        self.insert(id, value);
    }

    /// One-way transition from the compact array to hash storage,
    /// preserving all existing bindings.
    fn migrate(&mut self) {
        if let ScopeStorage::Compact(entries) = self {
            debug!(
                "symbol scope migrating to hash storage at {} entries",
                entries.len()
            );
            let map: IndexMap<SymbolId, ValueRef> = entries.drain(..).collect();
            *self = ScopeStorage::Hashed(map);
        }
    }

    fn remove(&mut self, id: SymbolId) -> Option<ValueRef> {
        match self {
            ScopeStorage::Compact(entries) => {
                let position = entries.iter().rposition(|(name, _)| *name == id)?;
                Some(entries.remove(position).1)
            }
            ScopeStorage::Hashed(map) => map.shift_remove(&id),
        }
    }

    fn names(&self) -> Vec<SymbolId> {
        match self {
            ScopeStorage::Compact(entries) => entries.iter().map(|(name, _)| *name).collect(),
            ScopeStorage::Hashed(map) => map.keys().copied().collect(),
        }
    }

    fn is_hashed(&self) -> bool {
        matches!(self, ScopeStorage::Hashed(_))
    }
}

#[derive(Debug)]
pub struct SymbolScope {
    kind: ScopeKind,
    parent: Option<ScopeRef>,
    storage: ScopeStorage,
}

impl SymbolScope {
    /// Creates a scope. A parent must be a constants scope; chains never hang
    /// off a variables scope.
    pub fn new(kind: ScopeKind, parent: Option<ScopeRef>) -> EidosResult<ScopeRef> {
        if let Some(parent) = &parent {
            if parent.borrow().kind == ScopeKind::Variables {
                return Err(EidosError::internal(
                    "SymbolScope",
                    "a symbol scope may not have a variables scope as its parent",
                ));
            }
        }
        Ok(Rc::new(RefCell::new(SymbolScope {
            kind,
            parent,
            storage: ScopeStorage::Compact(Vec::new()),
        })))
    }

    pub fn new_variables(parent: Option<ScopeRef>) -> EidosResult<ScopeRef> {
        SymbolScope::new(ScopeKind::Variables, parent)
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn is_constant_scope(&self) -> bool {
        self.kind != ScopeKind::Variables
    }

    /// True when storage has migrated to the hash map.
    pub fn uses_hash_storage(&self) -> bool {
        self.storage.is_hashed()
    }

    /// Privileged insert used at warmup and by constant installation;
    /// bypasses the write rules.
    pub(crate) fn insert_binding(&mut self, id: SymbolId, value: ValueRef) {
        self.storage.insert(id, value);
    }

    // ---- lookup -----------------------------------------------------------

    /// True if this scope or any ancestor holds the symbol.
    pub fn contains_symbol(&self, id: SymbolId) -> bool {
        if self.storage.contains(id) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow().contains_symbol(id),
            None => false,
        }
    }

    pub fn get_value(&self, id: SymbolId) -> EidosResult<ValueRef> {
        self.get_value_with_constness(id).map(|(value, _)| value)
    }

    /// Lookup that additionally reports whether the hit came from a constant
    /// scope.
    pub fn get_value_with_constness(&self, id: SymbolId) -> EidosResult<(ValueRef, bool)> {
        if let Some(value) = self.storage.get(id) {
            return Ok((value.clone(), self.is_constant_scope()));
        }
        match &self.parent {
            Some(parent) => parent.borrow().get_value_with_constness(id),
            None => Err(EidosError::undefined_identifier("GetValue", id)),
        }
    }

    // ---- writes -----------------------------------------------------------

    fn check_writable(&self, site: &'static str, id: SymbolId) -> EidosResult<()> {
        if self.kind != ScopeKind::Variables {
            return Err(EidosError::internal(
                site,
                format!("symbol \"{id}\" may only be written into a variables scope"),
            ));
        }
        // any ancestor binding is necessarily a constant
        if let Some(parent) = &self.parent {
            if parent.borrow().contains_symbol(id) {
                return Err(EidosError::constant_redefinition(site, id));
            }
        }
        Ok(())
    }

    /// Upserts a variable binding. The value is copied unless it is uniquely
    /// owned and visible; the stored value is never invisible.
    pub fn set_value(&mut self, id: SymbolId, value: ValueRef) -> EidosResult<()> {
        self.check_writable("SetValueForSymbol", id)?;
        let stored = if Rc::strong_count(&value) != 1 || value.is_invisible() {
            Rc::new(value.copy_values())
        } else {
            value
        };
        self.storage.insert(id, stored);
        Ok(())
    }

    /// The no-copy write path for the interpreter's for-loop induction
    /// variable and subscript reification. The value must not be invisible.
    pub fn set_value_no_copy(&mut self, id: SymbolId, value: ValueRef) -> EidosResult<()> {
        const SITE: &str = "SetValueForSymbolNoCopy";
        self.check_writable(SITE, id)?;
        if value.is_invisible() {
            return Err(EidosError::internal(
                SITE,
                format!("invisible value may not enter the symbol table for \"{id}\""),
            ));
        }
        self.storage.insert(id, value);
        Ok(())
    }

    /// Removes the binding and returns its value as uniquely owned storage:
    /// without copying when this scope held the only reference, deep-copied
    /// otherwise. Interpreter-internal, for subscript reification.
    pub(crate) fn take_for_mutation(&mut self, id: SymbolId) -> EidosResult<EidosValue> {
        self.check_writable("TakeForMutation", id)?;
        let Some(value) = self.storage.remove(id) else {
            return Err(EidosError::undefined_identifier("TakeForMutation", id));
        };
        Ok(Rc::try_unwrap(value).unwrap_or_else(|shared| shared.copy_values()))
    }

    /// Installs a defined constant. The binding lands in the nearest
    /// defined-constants scope, which is created and linked between this
    /// variables scope and its parent if the chain has none.
    pub fn define_constant(&mut self, id: SymbolId, value: ValueRef) -> EidosResult<()> {
        const SITE: &str = "DefineConstantForSymbol";
        if self.storage.contains(id)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.borrow().contains_symbol(id))
        {
            return Err(EidosError::constant_redefinition(SITE, id));
        }
        let stored = if Rc::strong_count(&value) != 1 || value.is_invisible() {
            Rc::new(value.copy_values())
        } else {
            value
        };
        if self.kind == ScopeKind::DefinedConstants {
            self.storage.insert(id, stored);
            return Ok(());
        }
        if self.kind != ScopeKind::Variables {
            return Err(EidosError::internal(
                SITE,
                "constants may be defined only through a variables or defined-constants scope",
            ));
        }
        if let Some(defined) = find_defined_constants(self.parent.clone()) {
            defined.borrow_mut().insert_binding(id, stored);
            return Ok(());
        }
        // privileged link: splice a defined-constants scope into the chain
        let defined = SymbolScope::new(ScopeKind::DefinedConstants, self.parent.take())?;
        defined.borrow_mut().insert_binding(id, stored);
        self.parent = Some(defined);
        Ok(())
    }

    /// Removes the symbol from the nearest scope holding it. Intrinsic
    /// constants are never removable; defined constants only with
    /// `allow_constant`.
    pub fn remove_symbol(&mut self, id: SymbolId, allow_constant: bool) -> EidosResult<()> {
        const SITE: &str = "RemoveSymbol";
        if self.storage.contains(id) {
            match self.kind {
                ScopeKind::IntrinsicConstants => {
                    return Err(EidosError::constant_redefinition(SITE, id));
                }
                ScopeKind::DefinedConstants if !allow_constant => {
                    return Err(EidosError::constant_redefinition(SITE, id));
                }
                _ => {
                    self.storage.remove(id);
                    return Ok(());
                }
            }
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().remove_symbol(id, allow_constant),
            None => Err(EidosError::undefined_identifier(SITE, id)),
        }
    }

    /// Names in the chain, root-first: ancestors' names precede local names.
    pub fn enumerate_names(
        &self,
        include_constants: bool,
        include_variables: bool,
    ) -> Vec<SymbolId> {
        let mut names = match &self.parent {
            Some(parent) => parent
                .borrow()
                .enumerate_names(include_constants, include_variables),
            None => Vec::new(),
        };
        let wanted = if self.is_constant_scope() {
            include_constants
        } else {
            include_variables
        };
        if wanted {
            names.extend(self.storage.names());
        }
        names
    }
}

fn find_defined_constants(mut scope: Option<ScopeRef>) -> Option<ScopeRef> {
    while let Some(current) = scope {
        if current.borrow().kind == ScopeKind::DefinedConstants {
            return Some(current);
        }
        scope = current.borrow().parent.clone();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::termination::ErrorKind;
    use crate::values::EidosValue;

    fn sym(name: &str) -> SymbolId {
        SymbolId::new(name)
    }

    fn chain() -> (ScopeRef, ScopeRef) {
        let intrinsic = SymbolScope::new(ScopeKind::IntrinsicConstants, None).unwrap();
        intrinsic
            .borrow_mut()
            .insert_binding(sym("PI"), EidosValue::float(core::f64::consts::PI));
        let variables = SymbolScope::new_variables(Some(intrinsic.clone())).unwrap();
        (intrinsic, variables)
    }

    #[test]
    fn lookup_walks_to_the_root() {
        let (_, variables) = chain();
        let (value, is_constant) = variables
            .borrow()
            .get_value_with_constness(sym("PI"))
            .unwrap();
        assert!(is_constant);
        assert_eq!(*value, EidosValue::float_singleton(core::f64::consts::PI));
    }

    #[test]
    fn undefined_identifier_fails_at_the_root() {
        let (_, variables) = chain();
        let err = variables.borrow().get_value(sym("zzz")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedIdentifier);
    }

    #[test]
    fn writes_to_constants_are_rejected() {
        let (_, variables) = chain();
        let err = variables
            .borrow_mut()
            .set_value(sym("PI"), Rc::new(EidosValue::integer_singleton(4)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);
        // and PI is unchanged
        let value = variables.borrow().get_value(sym("PI")).unwrap();
        assert_eq!(*value, EidosValue::float_singleton(core::f64::consts::PI));
    }

    #[test]
    fn unique_visible_values_move_in_without_copy() {
        let (_, variables) = chain();
        let value = Rc::new(EidosValue::integer_vector(vec![1, 2, 3]));
        variables
            .borrow_mut()
            .set_value(sym("x"), value)
            .unwrap();
        let held = variables.borrow().get_value(sym("x")).unwrap();
        assert_eq!(Rc::strong_count(&held), 2); // scope + this handle
    }

    #[test]
    fn shared_values_are_copied_on_write() {
        let (_, variables) = chain();
        let value = Rc::new(EidosValue::integer_vector(vec![1, 2, 3]));
        let keep = value.clone();
        variables.borrow_mut().set_value(sym("x"), value).unwrap();
        let held = variables.borrow().get_value(sym("x")).unwrap();
        assert!(!Rc::ptr_eq(&held, &keep));
        assert_eq!(*held, *keep);
    }

    #[test]
    fn invisible_values_are_copied_visible() {
        let (_, variables) = chain();
        let mut value = EidosValue::integer_singleton(7);
        value.invert_invisibility();
        variables
            .borrow_mut()
            .set_value(sym("x"), Rc::new(value))
            .unwrap();
        let held = variables.borrow().get_value(sym("x")).unwrap();
        assert!(!held.is_invisible());
    }

    #[test]
    fn storage_migrates_past_the_compact_capacity() {
        let variables = SymbolScope::new_variables(None).unwrap();
        let mut names = Vec::new();
        for i in 0..(COMPACT_CAPACITY + 4) {
            let name = sym(&format!("v{i}"));
            names.push(name);
            variables
                .borrow_mut()
                .set_value(name, Rc::new(EidosValue::integer_singleton(i as i64)))
                .unwrap();
        }
        assert!(variables.borrow().uses_hash_storage());
        for (i, name) in names.iter().enumerate() {
            let value = variables.borrow().get_value(*name).unwrap();
            assert_eq!(*value, EidosValue::integer_singleton(i as i64));
        }
        let mut enumerated = variables.borrow().enumerate_names(true, true);
        enumerated.sort();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(enumerated, expected);
    }

    #[test]
    fn compact_storage_stays_compact_under_capacity() {
        let variables = SymbolScope::new_variables(None).unwrap();
        for i in 0..COMPACT_CAPACITY {
            variables
                .borrow_mut()
                .set_value(sym(&format!("v{i}")), Rc::new(EidosValue::integer_singleton(0)))
                .unwrap();
        }
        assert!(!variables.borrow().uses_hash_storage());
    }

    #[test]
    fn define_constant_splices_a_scope_into_the_chain() {
        let (intrinsic, variables) = chain();
        variables
            .borrow_mut()
            .define_constant(sym("K"), Rc::new(EidosValue::integer_singleton(10)))
            .unwrap();
        // the constant is visible through the chain and marked constant
        let (value, is_constant) = variables
            .borrow()
            .get_value_with_constness(sym("K"))
            .unwrap();
        assert!(is_constant);
        assert_eq!(*value, EidosValue::integer_singleton(10));
        // the intrinsic scope itself did not change
        assert!(!intrinsic.borrow().contains_symbol(sym("K")));
        // writing to it now fails
        let err = variables
            .borrow_mut()
            .set_value(sym("K"), Rc::new(EidosValue::integer_singleton(1)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);
    }

    #[test]
    fn define_constant_rejects_existing_names() {
        let (_, variables) = chain();
        variables
            .borrow_mut()
            .set_value(sym("x"), Rc::new(EidosValue::integer_singleton(1)))
            .unwrap();
        let err = variables
            .borrow_mut()
            .define_constant(sym("x"), Rc::new(EidosValue::integer_singleton(2)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);
        let err = variables
            .borrow_mut()
            .define_constant(sym("PI"), Rc::new(EidosValue::integer_singleton(3)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);
    }

    #[test]
    fn remove_respects_constness() {
        let (_, variables) = chain();
        variables
            .borrow_mut()
            .set_value(sym("x"), Rc::new(EidosValue::integer_singleton(1)))
            .unwrap();
        variables
            .borrow_mut()
            .define_constant(sym("K"), Rc::new(EidosValue::integer_singleton(2)))
            .unwrap();

        // intrinsic constants can never be removed
        let err = variables
            .borrow_mut()
            .remove_symbol(sym("PI"), true)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);

        // defined constants need allow_constant
        let err = variables
            .borrow_mut()
            .remove_symbol(sym("K"), false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstantRedefinition);
        variables.borrow_mut().remove_symbol(sym("K"), true).unwrap();
        assert!(!variables.borrow().contains_symbol(sym("K")));

        // variables are plainly removable
        variables.borrow_mut().remove_symbol(sym("x"), false).unwrap();
        assert!(!variables.borrow().contains_symbol(sym("x")));
    }

    #[test]
    fn enumerate_is_root_first() {
        let (intrinsic, variables) = chain();
        intrinsic
            .borrow_mut()
            .insert_binding(sym("E"), EidosValue::float(core::f64::consts::E));
        variables
            .borrow_mut()
            .set_value(sym("x"), Rc::new(EidosValue::integer_singleton(1)))
            .unwrap();
        let names = variables.borrow().enumerate_names(true, true);
        let spelled: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        assert_eq!(spelled, vec!["PI", "E", "x"]);

        let only_vars = variables.borrow().enumerate_names(false, true);
        assert_eq!(only_vars, vec![sym("x")]);
    }

    #[test]
    fn variables_parent_is_rejected() {
        let variables = SymbolScope::new_variables(None).unwrap();
        let err = SymbolScope::new_variables(Some(variables)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn take_for_mutation_avoids_copying_unique_values() {
        let (_, variables) = chain();
        variables
            .borrow_mut()
            .set_value(sym("x"), Rc::new(EidosValue::integer_vector(vec![1, 2])))
            .unwrap();
        let mut working = variables.borrow_mut().take_for_mutation(sym("x")).unwrap();
        working
            .set_value_at_index(0, &EidosValue::integer_singleton(9))
            .unwrap();
        variables
            .borrow_mut()
            .set_value_no_copy(sym("x"), Rc::new(working))
            .unwrap();
        let value = variables.borrow().get_value(sym("x")).unwrap();
        assert_eq!(*value, EidosValue::integer_vector(vec![9, 2]));
    }
}
