//! The six worked scenarios of spec.md §8, run as whole-script
//! evaluations rather than per-module unit tests, plus the handful of
//! round-trip/idempotence properties and boundary conditions from the
//! same section that don't fit naturally into a `.tcl` fixture.

use tcl_engine::{Interp, Obj, Unwind};

fn install_minimal_expr(interp: &mut Interp) {
    interp.register_builtin("expr", cmd_expr);
}

/// Same scope as `tcl-cli`'s `expr`: `+` only, enough for scenario 1's
/// `$a + $b`.
fn cmd_expr(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let text = args[1..].iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
    let mut parts = text.split_whitespace();
    let lhs = resolve(interp, parts.next().unwrap())?;
    let Some(op) = parts.next() else {
        return Ok(Obj::from_int(lhs));
    };
    let rhs = resolve(interp, parts.next().expect("binary operator needs a right operand"))?;
    let result = match op {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        other => panic!("unsupported operator in test expr: {other}"),
    };
    Ok(Obj::from_int(result))
}

fn resolve(interp: &Interp, token: &str) -> Result<i64, Unwind> {
    let text = if let Some(name) = token.strip_prefix('$') {
        interp.get_var(name).map_err(|e| Unwind::error(e.to_string()))?.as_string()
    } else {
        token.to_string()
    };
    text.parse().map_err(|_| Unwind::error(format!("expected integer but got \"{text}\"")))
}

#[test]
fn proc_with_default_args() {
    let mut interp = Interp::new();
    install_minimal_expr(&mut interp);
    interp.eval("proc f {a {b 10}} {expr {$a + $b}}").unwrap();
    assert_eq!(interp.eval("f 5").unwrap(), "15");
    assert_eq!(interp.eval("f 5 7").unwrap(), "12");
    let err = interp.eval("f").unwrap_err();
    assert!(err.message.contains("wrong # args"), "got: {}", err.message);
}

#[test]
fn upvar_links_caller_frame() {
    let mut interp = Interp::new();
    interp.eval("proc incr-ref {name} {upvar 1 $name v; incr v}").unwrap();
    interp.eval("set x 4").unwrap();
    interp.eval("incr-ref x").unwrap();
    assert_eq!(interp.eval("set x").unwrap(), "5");
}

#[test]
fn variable_trace_fires_on_every_write() {
    let mut interp = Interp::new();
    interp.eval("set log {}").unwrap();
    interp.eval(r#"proc t {n1 n2 op} {lappend ::log "$n1 $op"}"#).unwrap();
    interp.eval("trace add variable x write t").unwrap();
    interp.eval("set x 1").unwrap();
    interp.eval("set x 2").unwrap();
    assert_eq!(interp.eval("set log").unwrap(), "{x write} {x write}");
}

#[test]
fn namespace_rename_moves_command_between_namespaces() {
    let mut interp = Interp::new();
    interp.eval("namespace eval ns1 {proc p {} {return one}}").unwrap();
    interp.eval("rename ns1::p ns2::p").unwrap();
    assert_eq!(interp.eval("ns2::p").unwrap(), "one");
    assert!(interp.eval("ns1::p").is_err());
}

#[test]
fn list_shimmering_preserves_string_form_until_mutated() {
    let mut interp = Interp::new();
    interp.eval(r#"set s "a b c""#).unwrap();
    assert_eq!(interp.eval("llength $s").unwrap(), "3");
    interp.eval("lappend s d").unwrap();
    assert_eq!(interp.eval("set s").unwrap(), "a b c d");
}

#[test]
fn return_code_error_surfaces_through_catch() {
    let mut interp = Interp::new();
    interp.eval("proc fail {} {return -code error boom}").unwrap();
    interp.eval("catch fail msg").unwrap();
    assert_eq!(interp.eval("set msg").unwrap(), "boom");
}

#[test]
fn dict_create_round_trips_through_list_form() {
    let mut interp = Interp::new();
    let result = interp.eval("dict create a 1 b 2").unwrap();
    assert_eq!(interp.eval(&format!("llength {{{result}}}")).unwrap(), "4");
    assert_eq!(result, "a 1 b 2");
}

#[test]
fn double_rename_restores_original_lookup() {
    let mut interp = Interp::new();
    interp.eval("proc original {} {return here}").unwrap();
    interp.eval("rename original moved").unwrap();
    interp.eval("rename moved original").unwrap();
    assert_eq!(interp.eval("original").unwrap(), "here");
}

#[test]
fn empty_script_parses_and_evaluates_to_empty_result() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("").unwrap(), "");
    assert_eq!(interp.eval("   \n\n  ").unwrap(), "");
}

#[test]
fn bare_break_at_top_level_is_an_error() {
    let mut interp = Interp::new();
    let err = interp.eval("break").unwrap_err();
    assert!(err.message.contains("invoked \"break\" outside of a loop"), "got: {}", err.message);
}

#[test]
fn recursion_limit_is_enforced_before_the_overflowing_frame() {
    let mut interp = Interp::new();
    interp.set_recursion_limit(20);
    interp.eval("proc spin {} {spin}").unwrap();
    let err = interp.eval("spin").unwrap_err();
    assert!(err.message.contains("too many nested evaluations"), "got: {}", err.message);
}
