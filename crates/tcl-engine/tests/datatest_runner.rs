//! Fixture-driven end-to-end tests (spec.md §8): each `tests/fixtures/*.tcl`
//! file is a full script, evaluated top to bottom, with its expected
//! outcome given by a trailing directive comment:
//!
//! - `# Return=<value>` — the script's final result must equal `<value>`
//! - `# Error=<prefix>` — evaluation must fail with a message starting
//!   with `<prefix>`
//!
//! Mirrors the teacher's own fixture-file test style (`datatest-stable`
//! over a `tests/fixtures` directory), trimmed to TCL's own value model —
//! no CPython-parity comparison, since there is no second interpreter to
//! agree with here.

use std::path::Path;

use datatest_stable::Result;
use tcl_engine::Interp;

fn install_test_builtins(interp: &mut Interp) {
    interp.register_builtin("puts", cmd_puts);
    interp.register_builtin("expr", cmd_expr);
}

fn cmd_puts(_interp: &mut Interp, _args: &[tcl_engine::Obj]) -> std::result::Result<tcl_engine::Obj, tcl_engine::Unwind> {
    Ok(tcl_engine::Obj::empty())
}

/// A trimmed-down copy of `tcl-cli`'s arithmetic `expr`: the fixtures here
/// only need enough of it to exercise `if`/`while` conditions and the
/// worked `expr` example from spec.md §8, not a general expression engine.
fn cmd_expr(interp: &mut Interp, args: &[tcl_engine::Obj]) -> std::result::Result<tcl_engine::Obj, tcl_engine::Unwind> {
    use tcl_engine::{Obj, Unwind};
    let text = args[1..].iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
    let mut value: f64 = 0.0;
    let mut op = '+';
    let mut is_int = true;
    for raw_token in text.split_whitespace() {
        match raw_token {
            "+" | "-" | "*" | "/" => op = raw_token.chars().next().unwrap(),
            token => {
                let resolved = if let Some(name) = token.strip_prefix('$') {
                    interp.get_var(name).map_err(|e| Unwind::error(e.to_string()))?.as_string()
                } else {
                    token.to_string()
                };
                let n: f64 = resolved.parse().map_err(|_| Unwind::error(format!("expected number but got \"{resolved}\"")))?;
                is_int = is_int && resolved.parse::<i64>().is_ok();
                value = match op {
                    '+' => value + n,
                    '-' => value - n,
                    '*' => value * n,
                    '/' => value / n,
                    _ => unreachable!(),
                };
            }
        }
    }
    Ok(if is_int { Obj::from_int(value as i64) } else { Obj::from_double(value) })
}

enum Expectation {
    Return(String),
    Error(String),
}

fn parse_fixture(content: &str) -> (String, Expectation) {
    let lines: Vec<&str> = content.lines().collect();
    let last = *lines.last().expect("fixture file is empty");
    if let Some(expected) = last.strip_prefix("# Return=") {
        (lines[..lines.len() - 1].join("\n"), Expectation::Return(expected.to_string()))
    } else if let Some(expected) = last.strip_prefix("# Error=") {
        (lines[..lines.len() - 1].join("\n"), Expectation::Error(expected.to_string()))
    } else {
        panic!("fixture is missing a trailing '# Return=' or '# Error=' directive");
    }
}

fn run_fixture(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let (source, expectation) = parse_fixture(&content);

    let mut interp = Interp::new();
    install_test_builtins(&mut interp);

    match (interp.eval(&source), expectation) {
        (Ok(value), Expectation::Return(expected)) => {
            assert_eq!(value, expected, "fixture {} produced an unexpected result", path.display());
        }
        (Err(err), Expectation::Error(expected_prefix)) => {
            assert!(
                err.to_string().starts_with(&expected_prefix),
                "fixture {} raised {:?}, expected a message starting with {expected_prefix:?}",
                path.display(),
                err.to_string()
            );
        }
        (Ok(value), Expectation::Error(expected_prefix)) => {
            panic!("fixture {} succeeded with {value:?}, expected an error starting with {expected_prefix:?}", path.display());
        }
        (Err(err), Expectation::Return(expected)) => {
            panic!("fixture {} failed with {err}, expected Return={expected}", path.display());
        }
    }
    Ok(())
}

datatest_stable::harness!(run_fixture, "tests/fixtures", r"^.*\.tcl$");
