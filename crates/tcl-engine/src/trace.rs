use indexmap::IndexMap;

use crate::{
    error::Unwind,
    eval::{self, EvalFlag},
    interp::Interp,
    value::Obj,
};

/// A registered trace: an operation-set string (space-separated ops) and
/// the script prefix to invoke on fire (spec §3 "Trace entry").
#[derive(Clone)]
pub struct TraceEntry {
    pub ops: String,
    pub script: Obj,
}

impl TraceEntry {
    fn has_op(&self, op: &str) -> bool {
        self.ops.split_whitespace().any(|o| o == op)
    }
}

/// Per-interpreter trace registry, keyed by variable name or fully
/// qualified command name (spec §3, §4.8).
#[derive(Default)]
pub struct Traces {
    variable: IndexMap<String, Vec<TraceEntry>>,
    command: IndexMap<String, Vec<TraceEntry>>,
}

impl Traces {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: &str, ops: String, script: Obj) {
        self.variable.entry(name.to_string()).or_default().push(TraceEntry { ops, script });
    }

    pub fn add_command(&mut self, name: &str, ops: String, script: Obj) {
        self.command.entry(name.to_string()).or_default().push(TraceEntry { ops, script });
    }

    /// `trace remove`: matches by exact `ops` string and script string
    /// (spec §4.8).
    pub fn remove_variable(&mut self, name: &str, ops: &str, script: &Obj) {
        if let Some(list) = self.variable.get_mut(name) {
            list.retain(|entry| !(entry.ops == ops && entry.script.as_string() == script.as_string()));
        }
    }

    pub fn remove_command(&mut self, name: &str, ops: &str, script: &Obj) {
        if let Some(list) = self.command.get_mut(name) {
            list.retain(|entry| !(entry.ops == ops && entry.script.as_string() == script.as_string()));
        }
    }

    #[must_use]
    pub fn info_variable(&self, name: &str) -> Vec<(String, Obj)> {
        self.variable.get(name).map(|list| list.iter().map(|e| (e.ops.clone(), e.script.clone())).collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn info_command(&self, name: &str) -> Vec<(String, Obj)> {
        self.command.get(name).map(|list| list.iter().map(|e| (e.ops.clone(), e.script.clone())).collect()).unwrap_or_default()
    }

    /// Snapshots the traces registered for `name` matching `op`, so that
    /// script-level mutation of the trace set during fire does not
    /// invalidate the iteration (spec §4.5, §4.8, §9 "Trace reentrancy").
    #[must_use]
    pub fn snapshot_variable(&self, name: &str, op: &str) -> Vec<Obj> {
        self.variable
            .get(name)
            .into_iter()
            .flatten()
            .filter(|entry| entry.has_op(op))
            .map(|entry| entry.script.clone())
            .collect()
    }

    #[must_use]
    pub fn snapshot_command(&self, name: &str, op: &str) -> Vec<Obj> {
        self.command
            .get(name)
            .into_iter()
            .flatten()
            .filter(|entry| entry.has_op(op))
            .map(|entry| entry.script.clone())
            .collect()
    }
}

/// Builds the command string to evaluate for a variable trace fire
/// (spec §4.5: "prepending `varname \"\" op` to the stored script
/// prefix"). The second name slot is always empty — array variables are
/// out of scope (spec §9 Open Questions).
#[must_use]
pub fn variable_fire_command(script: &Obj, name: &str, op: &str) -> String {
    format!("{} {{{name}}} {{}} {op}", script.as_string())
}

/// Builds the command string to evaluate for a command trace fire
/// (spec §4.8: "with old and new display names").
#[must_use]
pub fn command_fire_command(script: &Obj, old_name: &str, new_name: &str, op: &str) -> String {
    format!("{} {{{old_name}}} {{{new_name}}} {op}", script.as_string())
}

/// Fires every registered variable trace matching `op` against `name`
/// (spec §4.5: traces fire "after the operation completes"). The single
/// call site for every read/write/unset on a named variable, whether
/// reached through `set`/`incr`/`unset` or through `$name` substitution
/// in `eval_command`.
pub fn fire_variable_trace(interp: &mut Interp, name: &str, op: &str) -> Result<(), Unwind> {
    for script in interp.traces.snapshot_variable(name, op) {
        let command = variable_fire_command(&script, name, op);
        eval::eval(interp, &command, EvalFlag::Local)?;
    }
    Ok(())
}

/// Fires every registered command trace matching `op` (spec §4.8).
pub fn fire_command_trace(interp: &mut Interp, old_name: &str, new_name: &str, op: &str) -> Result<(), Unwind> {
    for script in interp.traces.snapshot_command(old_name, op) {
        let command = command_fire_command(&script, old_name, new_name, op);
        eval::eval(interp, &command, EvalFlag::Local)?;
    }
    Ok(())
}
