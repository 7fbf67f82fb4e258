//! End-to-end exercise of the foreign-object system (spec.md §4.9): a
//! host registers a `counter` type, a script constructs instances
//! through a host-provided constructor builtin, and method calls route
//! through the per-instance command the core registers.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use tcl_engine::{ForeignHandle, ForeignTypeSpec, Interp, Obj, Unwind};

fn counter_payload(handle: &ForeignHandle) -> Rc<RefCell<i64>> {
    handle.0.clone().downcast::<RefCell<i64>>().expect("counter handle holds a RefCell<i64>")
}

fn counter_ctor(_interp: &mut Interp, args: &[Obj]) -> Result<ForeignHandle, Unwind> {
    let start = args.first().map(Obj::as_int).transpose()?.unwrap_or(0);
    Ok(ForeignHandle(Rc::new(RefCell::new(start))))
}

fn counter_incr(_interp: &mut Interp, handle: &ForeignHandle, args: &[Obj]) -> Result<Obj, Unwind> {
    let delta = args.first().map(Obj::as_int).transpose()?.unwrap_or(1);
    let cell = counter_payload(handle);
    *cell.borrow_mut() += delta;
    Ok(Obj::from_int(*cell.borrow()))
}

fn counter_get(_interp: &mut Interp, handle: &ForeignHandle, _args: &[Obj]) -> Result<Obj, Unwind> {
    Ok(Obj::from_int(*counter_payload(handle).borrow()))
}

fn cmd_counter_new(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let handle_name = interp.create_foreign_instance("counter", &args[1..])?;
    Ok(Obj::from_string(handle_name))
}

fn install_counter_type(interp: &mut Interp) {
    let mut methods = IndexMap::new();
    methods.insert("incr".to_string(), counter_incr as _);
    methods.insert("get".to_string(), counter_get as _);
    interp.register_foreign_type(ForeignTypeSpec { name: "counter".to_string(), ctor: counter_ctor, methods, destructor: None, renderer: None });
    interp.register_builtin("counter", cmd_counter_new);
}

#[test]
fn constructing_a_foreign_instance_yields_the_spec_example_handle_name() {
    let mut interp = Interp::new();
    install_counter_type(&mut interp);
    assert_eq!(interp.eval("set c [counter]").unwrap(), "counter1");
}

#[test]
fn method_calls_route_through_the_per_instance_command() {
    let mut interp = Interp::new();
    install_counter_type(&mut interp);
    interp.eval("set c [counter]").unwrap();
    assert_eq!(interp.eval("$c incr").unwrap(), "1");
    assert_eq!(interp.eval("$c incr 5").unwrap(), "6");
    assert_eq!(interp.eval("$c get").unwrap(), "6");
}

#[test]
fn each_instance_gets_a_distinct_handle_and_independent_state() {
    let mut interp = Interp::new();
    install_counter_type(&mut interp);
    interp.eval("set a [counter 10]").unwrap();
    interp.eval("set b [counter 20]").unwrap();
    assert_eq!(interp.eval("set a").unwrap(), "counter1");
    assert_eq!(interp.eval("set b").unwrap(), "counter2");
    interp.eval("$a incr").unwrap();
    assert_eq!(interp.eval("$a get").unwrap(), "11");
    assert_eq!(interp.eval("$b get").unwrap(), "20");
}

#[test]
fn unknown_foreign_type_is_an_error() {
    let mut interp = Interp::new();
    let err = interp.create_foreign_instance("nonexistent", &[]).unwrap_err();
    assert!(err.to_string().contains("unknown foreign type"), "got: {err}");
}
