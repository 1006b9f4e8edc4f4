//! Object values driven through a host-defined element class: property reads
//! and writes, method dispatch, and reference semantics across bindings.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use eidos_core::global::context::{builtin_function_map, intrinsic_constants_scope};
use eidos_core::global::termination::{
    capture_termination_stream, set_termination_mode, ErrorKind, TerminationMode,
};
use eidos_core::logger::init_logger_debug;
use eidos_core::runtime::functions::{FunctionSignature, ParamSpec};
use eidos_core::runtime::symbol_table::SymbolScope;
use eidos_core::utils::interner::SymbolId;
use eidos_core::values::object::{
    EidosObjectElement, ObjectClass, ObjectVec, PropertySignature,
};
use eidos_core::values::{EidosValue, TypeMask, ValueRef};
use eidos_core::{warmup, EidosError, EidosScript, Interpreter};

#[derive(Debug)]
struct Particle {
    tag: i64,
    mass: f64,
}

impl EidosObjectElement for Particle {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn get_tag(element: &dyn EidosObjectElement) -> Result<ValueRef, EidosError> {
    let particle = element
        .as_any()
        .downcast_ref::<Particle>()
        .expect("element class guarantees Particle");
    Ok(EidosValue::integer(particle.tag))
}

fn set_tag(element: &mut dyn EidosObjectElement, value: &EidosValue) -> Result<(), EidosError> {
    let particle = element
        .as_any_mut()
        .downcast_mut::<Particle>()
        .expect("element class guarantees Particle");
    particle.tag = value.integer_at(0)?;
    Ok(())
}

fn get_mass(element: &dyn EidosObjectElement) -> Result<ValueRef, EidosError> {
    let particle = element
        .as_any()
        .downcast_ref::<Particle>()
        .expect("element class guarantees Particle");
    Ok(EidosValue::float(particle.mass))
}

fn total_mass(receiver: &ObjectVec, _arguments: &[ValueRef]) -> Result<ValueRef, EidosError> {
    let mut total = 0.0;
    for element in receiver.elements() {
        let element = element.borrow();
        let particle = element
            .as_any()
            .downcast_ref::<Particle>()
            .expect("element class guarantees Particle");
        total += particle.mass;
    }
    Ok(EidosValue::float(total))
}

fn scaled_tags(receiver: &ObjectVec, arguments: &[ValueRef]) -> Result<ValueRef, EidosError> {
    let factor = arguments[0].integer_at(0)?;
    let mut out = Vec::with_capacity(receiver.len());
    for element in receiver.elements() {
        let element = element.borrow();
        let particle = element
            .as_any()
            .downcast_ref::<Particle>()
            .expect("element class guarantees Particle");
        out.push(particle.tag * factor);
    }
    Ok(Rc::new(EidosValue::integer_vector(out)))
}

fn particle_class() -> Rc<ObjectClass> {
    Rc::new(
        ObjectClass::new("Particle")
            .with_property(PropertySignature {
                name: SymbolId::new("tag"),
                mask: TypeMask::INTEGER,
                getter: get_tag,
                setter: Some(set_tag),
            })
            .with_property(PropertySignature {
                name: SymbolId::new("mass"),
                mask: TypeMask::FLOAT,
                getter: get_mass,
                setter: None,
            })
            .with_method(Rc::new(FunctionSignature::method(
                "totalMass",
                TypeMask::FLOAT,
                total_mass,
            )))
            .with_method(Rc::new(
                FunctionSignature::method("scaledTags", TypeMask::INTEGER, scaled_tags)
                    .with_param(ParamSpec::required("factor", TypeMask::INTEGER)),
            )),
    )
}

fn particles(class: &Rc<ObjectClass>, tags: &[i64]) -> ObjectVec {
    let elements = tags
        .iter()
        .map(|&tag| {
            Rc::new(RefCell::new(Particle {
                tag,
                mass: tag as f64 * 0.5,
            })) as Rc<RefCell<dyn EidosObjectElement>>
        })
        .collect();
    ObjectVec::new(class.clone(), elements)
}

fn run_with_particles(source: &str) -> Result<ValueRef, EidosError> {
    init_logger_debug();
    warmup();
    set_termination_mode(TerminationMode::Throw);
    let _ = capture_termination_stream();
    let class = particle_class();
    let scope = SymbolScope::new_variables(Some(intrinsic_constants_scope())).unwrap();
    scope
        .borrow_mut()
        .set_value(
            SymbolId::new("p"),
            Rc::new(EidosValue::object(particles(&class, &[1, 2, 3]))),
        )
        .unwrap();
    let mut script = EidosScript::new(source);
    script.set_final_semicolon_optional(true);
    script.tokenize()?;
    script.parse_interpreter_block()?;
    let mut interpreter = Interpreter::new(script, scope, builtin_function_map(), None)?;
    let result = interpreter.evaluate_interpreter_block(false);
    let _ = capture_termination_stream();
    result
}

#[test]
fn property_read_concatenates_per_element_results() {
    let result = run_with_particles("p.tag;").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![1, 2, 3]));

    let result = run_with_particles("p.mass;").unwrap();
    assert_eq!(*result, EidosValue::float_vector(vec![0.5, 1.0, 1.5]));
}

#[test]
fn property_write_broadcasts_a_singleton() {
    let result = run_with_particles("p.tag = 9; p.tag;").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![9, 9, 9]));
}

#[test]
fn property_write_matches_lengths_elementwise() {
    let result = run_with_particles("p.tag = c(7, 8, 9); p.tag;").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![7, 8, 9]));

    let err = run_with_particles("p.tag = c(1, 2);").unwrap_err();
    assert_eq!(err.kind, ErrorKind::LengthMismatch);
}

#[test]
fn read_only_properties_reject_writes() {
    let err = run_with_particles("p.mass = 1.0;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("read-only"));
}

#[test]
fn property_mask_is_enforced_on_write() {
    let err = run_with_particles("p.tag = \"label\";").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
}

#[test]
fn unknown_members_are_reported_with_the_class_name() {
    let err = run_with_particles("p.volume;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("Particle"));
}

#[test]
fn methods_dispatch_through_the_class() {
    let result = run_with_particles("p.totalMass();").unwrap();
    assert_eq!(*result, EidosValue::float_singleton(3.0));

    let result = run_with_particles("p.scaledTags(10);").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![10, 20, 30]));
}

#[test]
fn method_arguments_are_mask_checked() {
    let err = run_with_particles("p.scaledTags(\"x\");").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("scaledTags()"));
}

#[test]
fn unknown_methods_are_rejected() {
    let err = run_with_particles("p.explode();").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
}

#[test]
fn object_subscript_shares_elements() {
    // q holds the same element; writing through q is visible through p
    let result = run_with_particles("q = p[1]; q.tag = 42; p.tag;").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![1, 42, 3]));
}

#[test]
fn object_copies_are_reference_semantics() {
    let result = run_with_particles("q = p; q.tag = 5; p.tag;").unwrap();
    assert_eq!(*result, EidosValue::integer_vector(vec![5, 5, 5]));
}

#[test]
fn member_access_on_non_objects_is_a_type_error() {
    let err = run_with_particles("x = 1; x.tag;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
}
