//! Parser and evaluator micro-benchmarks, adapted from the teacher's
//! `benches/arithmetic_non_foldable.rs` shape (non-foldable bodies, one
//! `criterion_group`/`criterion_main` pair) with the CPython-comparison
//! half dropped: there is no second TCL interpreter in this workspace to
//! compare against, so every benchmark here measures this crate alone.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tcl_engine::Interp;

/// Parses (without evaluating) a command list long enough that parser
/// overhead dominates any one-off setup cost.
fn bench_parse_command_list(c: &mut Criterion) {
    let source = "set a 1\n".repeat(500);
    c.bench_function("parse_500_commands", |b| {
        b.iter(|| {
            let interp = Interp::new();
            let outcome = interp.parse(black_box(&source));
            black_box(outcome);
        });
    });
}

/// A tight `foreach` loop doing integer accumulation: exercises command
/// dispatch, variable read/write, and list iteration without needing a
/// host-registered `expr` (see `eval_condition`'s fallback in
/// `builtins.rs`, which `for`/`while` conditions depend on but `foreach`
/// does not).
fn bench_foreach_accumulate(c: &mut Criterion) {
    let items: Vec<String> = (0..1000).map(|n| n.to_string()).collect();
    let source = format!("set total 0\nforeach n [list {}] {{incr total $n}}\nset total", items.join(" "));

    c.bench_function("foreach_accumulate_1000", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            let result = interp.eval(black_box(&source)).unwrap();
            black_box(result);
        });
    });
}

/// Proc call overhead: a recursive proc counted down via `foreach` over a
/// precomputed range rather than a `while`/`for` condition, so no `expr`
/// builtin is required to drive it.
fn bench_proc_calls(c: &mut Criterion) {
    let source = r#"
proc double {n} {
    return [expr-fallback $n]
}
proc expr-fallback {n} {
    return $n
}
set total 0
foreach n [list 1 2 3 4 5 6 7 8 9 10] {
    incr total [double $n]
}
set total
"#;

    c.bench_function("proc_calls_10_per_iteration", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            let result = interp.eval(black_box(source)).unwrap();
            black_box(result);
        });
    });
}

/// List construction and shimmering: builds a list via repeated
/// `lappend` then measures `llength`, exercising the string<->list
/// representation cache invalidation path.
fn bench_list_build_and_measure(c: &mut Criterion) {
    let source = "set items {}\nforeach n [list 1 2 3 4 5 6 7 8 9 10] {lappend items $n}\nllength $items";

    c.bench_function("list_build_and_measure", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            let result = interp.eval(black_box(source)).unwrap();
            black_box(result);
        });
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    bench_parse_command_list(c);
    bench_foreach_accumulate(c);
    bench_proc_calls(c);
    bench_list_build_and_measure(c);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
