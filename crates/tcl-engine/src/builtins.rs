//! The core structural/control commands of spec.md §4.10, registered into
//! the root namespace at [`Interp::new`] construction time through the
//! same [`crate::command::define_builtin`] hook a host uses. Everything
//! host-specific (`puts`, `open`, `file`, `regexp`, `expr`) lives outside
//! this crate.

use indexmap::IndexMap;

use crate::{
    command::{self, ProcParam},
    error::{Code, ReturnOptions, Unwind},
    eval::{self, EvalFlag},
    frame::{self, VarSlot},
    interp::Interp,
    namespace::Namespaces,
    trace,
    value::Obj,
};

pub(crate) fn install(interp: &mut Interp) {
    interp.register_builtin("set", cmd_set);
    interp.register_builtin("unset", cmd_unset);
    interp.register_builtin("incr", cmd_incr);
    interp.register_builtin("list", cmd_list);
    interp.register_builtin("llength", cmd_llength);
    interp.register_builtin("lindex", cmd_lindex);
    interp.register_builtin("lappend", cmd_lappend);
    interp.register_builtin("linsert", cmd_linsert);
    interp.register_builtin("lset", cmd_lset);
    interp.register_builtin("lrange", cmd_lrange);
    interp.register_builtin("dict", cmd_dict);
    interp.register_builtin("proc", cmd_proc);
    interp.register_builtin("return", cmd_return);
    interp.register_builtin("break", cmd_break);
    interp.register_builtin("continue", cmd_continue);
    interp.register_builtin("catch", cmd_catch);
    interp.register_builtin("try", cmd_try);
    interp.register_builtin("rename", cmd_rename);
    interp.register_builtin("namespace", cmd_namespace);
    interp.register_builtin("trace", cmd_trace);
    interp.register_builtin("upvar", cmd_upvar);
    interp.register_builtin("variable", cmd_variable);
    interp.register_builtin("global", cmd_global);
    interp.register_builtin("uplevel", cmd_uplevel);
    interp.register_builtin("info", cmd_info);
    interp.register_builtin("if", cmd_if);
    interp.register_builtin("while", cmd_while);
    interp.register_builtin("for", cmd_for);
    interp.register_builtin("foreach", cmd_foreach);
}

/// Resolves a TCL list/string index argument (spec §4.2's list ops):
/// plain non-negative integers, or `end`/`end-N`/`end+N`.
fn parse_list_index(text: &str, len: usize) -> Option<usize> {
    if let Some(rest) = text.strip_prefix("end") {
        if rest.is_empty() {
            return len.checked_sub(1);
        }
        if let Some(n) = rest.strip_prefix('-') {
            let n: usize = n.parse().ok()?;
            return len.checked_sub(1)?.checked_sub(n);
        }
        if let Some(n) = rest.strip_prefix('+') {
            let n: usize = n.parse().ok()?;
            return Some(len - 1 + n);
        }
        return None;
    }
    text.parse::<usize>().ok()
}

fn parse_code_name(text: &str) -> Option<Code> {
    match text {
        "ok" => Some(Code::Ok),
        "error" => Some(Code::Error),
        "return" => Some(Code::Return),
        "break" => Some(Code::Break),
        "continue" => Some(Code::Continue),
        other => other.parse::<u8>().ok().and_then(Code::from_u8),
    }
}

fn wrong_args(usage: &str) -> Unwind {
    Unwind::error(format!("wrong # args: should be \"{usage}\""))
}

/// `set varName ?newValue?` (spec §4.10).
fn cmd_set(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    match args.len() {
        2 => {
            let name = args[1].as_string();
            let value = frame::read_var(&interp.frames, &interp.namespaces, &name)?;
            trace::fire_variable_trace(interp, &name, "read")?;
            Ok(value)
        }
        3 => {
            let name = args[1].as_string();
            let value = args[2].clone();
            frame::write_var(&interp.frames, &interp.namespaces, &name, value.clone())?;
            trace::fire_variable_trace(interp, &name, "write")?;
            Ok(value)
        }
        _ => Err(wrong_args("set varName ?newValue?")),
    }
}

/// `unset varName ?varName ...?` (spec §4.10).
fn cmd_unset(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 2 {
        return Err(wrong_args("unset varName ?varName ...?"));
    }
    for name_obj in &args[1..] {
        let name = name_obj.as_string();
        frame::unset_var(&interp.frames, &interp.namespaces, &name)?;
        trace::fire_variable_trace(interp, &name, "unset")?;
    }
    Ok(Obj::empty())
}

/// `incr varName ?increment?` (spec §4.10). Creates the variable at `0`
/// before adding `increment` if it does not yet exist, matching real Tcl.
fn cmd_incr(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 2 || args.len() > 3 {
        return Err(wrong_args("incr varName ?increment?"));
    }
    let name = args[1].as_string();
    let delta = if args.len() == 3 { args[2].as_int()? } else { 1 };
    let current = match frame::read_var(&interp.frames, &interp.namespaces, &name) {
        Ok(v) => v.as_int()?,
        Err(crate::error::VarError::NoSuchVariable { .. }) => 0,
        Err(e) => return Err(e.into()),
    };
    let updated = Obj::from_int(current + delta);
    frame::write_var(&interp.frames, &interp.namespaces, &name, updated.clone())?;
    trace::fire_variable_trace(interp, &name, "write")?;
    Ok(updated)
}

/// `list arg ...` (spec §4.10): builds a list `Obj` directly from its
/// already-substituted arguments.
fn cmd_list(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    Ok(Obj::from_list(args[1..].to_vec()))
}

fn cmd_llength(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 2 {
        return Err(wrong_args("llength list"));
    }
    Ok(Obj::from_int(args[1].list_len()? as i64))
}

/// `lindex list index` (spec §4.10): an out-of-range index returns the
/// empty string, matching real Tcl rather than erroring.
fn cmd_lindex(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 3 {
        return Err(wrong_args("lindex list index"));
    }
    let items = args[1].as_list()?;
    let index = parse_list_index(&args[2].as_string(), items.len());
    Ok(index.and_then(|i| items.get(i).cloned()).unwrap_or_else(Obj::empty))
}

/// `lappend varName value ...` (spec §4.10): creates the variable as an
/// empty list if it does not yet exist.
fn cmd_lappend(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 2 {
        return Err(wrong_args("lappend varName ?value value ...?"));
    }
    let name = args[1].as_string();
    let current = frame::read_var(&interp.frames, &interp.namespaces, &name).unwrap_or_else(|_| Obj::empty());
    for value in &args[2..] {
        current.list_append(value.clone())?;
    }
    frame::write_var(&interp.frames, &interp.namespaces, &name, current.clone())?;
    trace::fire_variable_trace(interp, &name, "write")?;
    Ok(current)
}

/// `linsert list index value ...` (spec §4.10): a pure list operation, no
/// variable involved.
fn cmd_linsert(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 3 {
        return Err(wrong_args("linsert list index ?value value ...?"));
    }
    let items = args[1].as_list()?;
    let index = parse_list_index(&args[2].as_string(), items.len()).unwrap_or(items.len());
    let result = Obj::from_list(items);
    result.list_insert(index, args[3..].to_vec())?;
    Ok(result)
}

/// `lset varName index value` (spec §4.10): mutates the variable's list
/// in place.
fn cmd_lset(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 4 {
        return Err(wrong_args("lset varName index value"));
    }
    let name = args[1].as_string();
    let current = frame::read_var(&interp.frames, &interp.namespaces, &name)?;
    let len = current.list_len()?;
    let index = parse_list_index(&args[2].as_string(), len).ok_or_else(|| Unwind::error("list index out of range"))?;
    current.list_set_at(index, args[3].clone())?;
    frame::write_var(&interp.frames, &interp.namespaces, &name, current.clone())?;
    trace::fire_variable_trace(interp, &name, "write")?;
    Ok(current)
}

/// `lrange list first last` (spec §4.10): `last` is inclusive, per the
/// same `end`/`end-N` index grammar as `lindex`.
fn cmd_lrange(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 4 {
        return Err(wrong_args("lrange list first last"));
    }
    let items = args[1].as_list()?;
    let start = parse_list_index(&args[2].as_string(), items.len()).unwrap_or(0);
    let end = parse_list_index(&args[3].as_string(), items.len()).map_or(items.len(), |i| i + 1);
    Ok(Obj::from_list(args[1].list_range(start, end)?))
}

/// `dict create|get|set|exists|keys|values|size` (spec §4.10).
fn cmd_dict(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let sub = args.get(1).map(Obj::as_string).ok_or_else(|| wrong_args("dict subcommand ?arg ...?"))?;
    match sub.as_str() {
        "create" => {
            let rest = &args[2..];
            if rest.len() % 2 != 0 {
                return Err(Unwind::error("wrong # args: dict create requires an even number of arguments"));
            }
            let mut map = IndexMap::new();
            for pair in rest.chunks(2) {
                map.insert(pair[0].as_string(), pair[1].clone());
            }
            Ok(Obj::from_dict(map))
        }
        "get" => {
            if args.len() != 4 {
                return Err(wrong_args("dict get dictionary key"));
            }
            let map = args[2].as_dict()?;
            let key = args[3].as_string();
            map.get(&key).cloned().ok_or_else(|| Unwind::error(format!("key \"{key}\" not known in dictionary")))
        }
        "set" => {
            if args.len() != 5 {
                return Err(wrong_args("dict set varName key value"));
            }
            let name = args[2].as_string();
            let dict_obj = frame::read_var(&interp.frames, &interp.namespaces, &name).unwrap_or_else(|_| Obj::from_dict(IndexMap::new()));
            dict_obj.dict_set(args[3].as_string(), args[4].clone())?;
            frame::write_var(&interp.frames, &interp.namespaces, &name, dict_obj.clone())?;
            trace::fire_variable_trace(interp, &name, "write")?;
            Ok(dict_obj)
        }
        "exists" => {
            if args.len() != 4 {
                return Err(wrong_args("dict exists dictionary key"));
            }
            let map = args[2].as_dict()?;
            Ok(Obj::from_int(i64::from(map.contains_key(&args[3].as_string()))))
        }
        "keys" => {
            if args.len() != 3 {
                return Err(wrong_args("dict keys dictionary"));
            }
            let map = args[2].as_dict()?;
            Ok(Obj::from_list(map.keys().cloned().map(Obj::from_string).collect()))
        }
        "values" => {
            if args.len() != 3 {
                return Err(wrong_args("dict values dictionary"));
            }
            let map = args[2].as_dict()?;
            Ok(Obj::from_list(map.values().cloned().collect()))
        }
        "size" => {
            if args.len() != 3 {
                return Err(wrong_args("dict size dictionary"));
            }
            let map = args[2].as_dict()?;
            Ok(Obj::from_int(map.len() as i64))
        }
        other => Err(Unwind::error(format!("unknown or ambiguous subcommand \"{other}\": must be create, exists, get, keys, set, size, or values"))),
    }
}

/// `proc name args body` (spec §4.7, §4.10): each element of `args` is
/// either a bare required name or a `{name default}` optional pair; a
/// final parameter named `args` absorbs the rest.
fn cmd_proc(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 4 {
        return Err(wrong_args("proc name args body"));
    }
    let name = args[1].as_string();
    let mut params = Vec::new();
    for spec in args[2].as_list()? {
        let parts = spec.as_list()?;
        match parts.len() {
            1 => params.push(ProcParam { name: parts[0].as_string(), default: None }),
            2 => params.push(ProcParam { name: parts[0].as_string(), default: Some(parts[1].clone()) }),
            _ => return Err(Unwind::error("too many fields in argument specifier")),
        }
    }
    let body = args[3].clone();
    let current = interp.frames.get_namespace();
    command::define_proc(&mut interp.namespaces, &name, current, params, body);
    Ok(Obj::empty())
}

/// `return ?-code c? ?-level n? ?-errorinfo s? ?-errorcode s? ?value?`
/// (spec §4.3.1, §4.10).
fn cmd_return(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let (options, value) = eval::parse_return_options(&args[1..]);
    Err(Unwind::Return { value, options })
}

fn cmd_break(_interp: &mut Interp, _args: &[Obj]) -> Result<Obj, Unwind> {
    Err(Unwind::Break)
}

fn cmd_continue(_interp: &mut Interp, _args: &[Obj]) -> Result<Obj, Unwind> {
    Err(Unwind::Continue)
}

fn classify(result: Result<Obj, Unwind>) -> (Code, Obj, ReturnOptions) {
    match result {
        Ok(value) => (Code::Ok, value, ReturnOptions::default()),
        Err(Unwind::Error(msg)) => (Code::Error, msg, ReturnOptions::default()),
        Err(Unwind::Return { value, options }) => (options.code.unwrap_or(Code::Return), value, options),
        Err(Unwind::Break) => (Code::Break, Obj::empty(), ReturnOptions::default()),
        Err(Unwind::Continue) => (Code::Continue, Obj::empty(), ReturnOptions::default()),
    }
}

fn catch_options_dict(code: Code, options: &ReturnOptions) -> Obj {
    let mut map = IndexMap::new();
    map.insert("-code".to_string(), Obj::from_int(code as i64));
    if let Some(errorinfo) = &options.errorinfo {
        map.insert("-errorinfo".to_string(), Obj::from_string(errorinfo.clone()));
    }
    if let Some(errorcode) = &options.errorcode {
        map.insert("-errorcode".to_string(), Obj::from_string(errorcode.clone()));
    }
    Obj::from_dict(map)
}

/// `catch script ?resultVarName? ?optionsVarName?` (spec §4.3.1, §4.10):
/// never itself fails — unwinds of every kind are captured into the
/// numeric code it returns.
fn cmd_catch(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 2 || args.len() > 4 {
        return Err(wrong_args("catch script ?resultVarName? ?optionsVarName?"));
    }
    let script = args[1].as_string();
    let outcome = eval::eval(interp, &script, EvalFlag::Local);
    let (code, value, options) = classify(outcome);
    if let Some(result_name) = args.get(2) {
        frame::write_var(&interp.frames, &interp.namespaces, &result_name.as_string(), value)?;
    }
    if let Some(options_name) = args.get(3) {
        frame::write_var(&interp.frames, &interp.namespaces, &options_name.as_string(), catch_options_dict(code, &options))?;
    }
    Ok(Obj::from_int(code as i64))
}

/// `try body ?on code {resultVar ?optionsVar?} script? ... ?finally
/// script?` (spec §4.3.1, §4.10): a subset of real Tcl's `try` covering
/// `on` handlers and a `finally` clause (no `trap` errorcode-pattern
/// clause — no errorcode-pattern matcher exists in this engine's error
/// model to match against).
fn cmd_try(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() < 2 {
        return Err(wrong_args("try body ?handler ...?"));
    }
    let body = args[1].as_string();
    let mut handlers: Vec<(Code, Vec<String>, String)> = Vec::new();
    let mut finally_script: Option<String> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_string().as_str() {
            "on" => {
                if i + 3 >= args.len() {
                    return Err(Unwind::error("wrong # args to try: on code varList script"));
                }
                let code_text = args[i + 1].as_string();
                let code = parse_code_name(&code_text).ok_or_else(|| Unwind::error(format!("bad completion code \"{code_text}\"")))?;
                let varlist = args[i + 2].as_list()?.iter().map(Obj::as_string).collect();
                handlers.push((code, varlist, args[i + 3].as_string()));
                i += 4;
            }
            "finally" => {
                if i + 1 >= args.len() {
                    return Err(Unwind::error("wrong # args to try: finally script"));
                }
                finally_script = Some(args[i + 1].as_string());
                i += 2;
            }
            other => return Err(Unwind::error(format!("unknown try clause \"{other}\""))),
        }
    }

    let (code, value, _options) = classify(eval::eval(interp, &body, EvalFlag::Local));
    let mut outcome = if code == Code::Ok {
        Ok(value.clone())
    } else {
        Err(unwind_from_code(code, value.clone()))
    };

    if code != Code::Ok
        && let Some((_, varlist, script)) = handlers.iter().find(|(c, _, _)| *c == code)
    {
        if let Some(result_name) = varlist.first() {
            frame::write_var(&interp.frames, &interp.namespaces, result_name, value.clone())?;
        }
        if let Some(options_name) = varlist.get(1) {
            frame::write_var(&interp.frames, &interp.namespaces, options_name, Obj::from_dict(IndexMap::new()))?;
        }
        outcome = eval::eval(interp, script, EvalFlag::Local);
    }

    if let Some(finally) = finally_script {
        eval::eval(interp, &finally, EvalFlag::Local)?;
    }
    outcome
}

fn unwind_from_code(code: Code, value: Obj) -> Unwind {
    match code {
        Code::Ok => Unwind::Return { value, options: ReturnOptions::default() },
        Code::Error => Unwind::Error(value),
        Code::Return => Unwind::Return { value, options: ReturnOptions::default() },
        Code::Break => Unwind::Break,
        Code::Continue => Unwind::Continue,
    }
}

fn qualified_display(namespaces: &Namespaces, current: crate::namespace::NamespaceId, name: &str) -> String {
    let (ns, simple) = namespaces.split_for_lookup(name, current);
    let path = &namespaces.get(ns).path;
    if path == "::" { simple } else { format!("{path}::{simple}") }
}

/// `rename oldName newName` (spec §4.7, §4.10, §4.8): `newName == ""`
/// deletes the command. Fires the command trace after the rename/delete
/// succeeds.
fn cmd_rename(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 3 {
        return Err(wrong_args("rename oldName newName"));
    }
    let old = args[1].as_string();
    let new = args[2].as_string();
    let current = interp.frames.get_namespace();
    if new.is_empty() {
        let display = qualified_display(&interp.namespaces, current, &old);
        command::delete(&mut interp.namespaces, &old, current)?;
        trace::fire_command_trace(interp, &display, "", "delete")?;
    } else {
        let event = command::rename(&mut interp.namespaces, &old, &new, current)?;
        trace::fire_command_trace(interp, &event.old_display, &event.new_display, "rename")?;
    }
    Ok(Obj::empty())
}

fn split_ns_pattern(namespaces: &Namespaces, pattern: &str, current: crate::namespace::NamespaceId) -> (String, String) {
    if let Some(rest) = pattern.strip_prefix("::") {
        let (ns_part, simple) = rest.rsplit_once("::").unwrap_or(("", rest));
        (format!("::{ns_part}"), simple.to_string())
    } else if let Some((ns_part, simple)) = pattern.rsplit_once("::") {
        (namespaces.absolute_path(ns_part, current), simple.to_string())
    } else {
        (namespaces.get(current).path.clone(), pattern.to_string())
    }
}

/// `namespace eval|delete|export|import` (spec §4.6, §4.10).
fn cmd_namespace(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let sub = args.get(1).map(Obj::as_string).ok_or_else(|| wrong_args("namespace subcommand ?arg ...?"))?;
    match sub.as_str() {
        "eval" => {
            if args.len() < 4 {
                return Err(wrong_args("namespace eval name arg ?arg ...?"));
            }
            let current = interp.frames.get_namespace();
            let abs = interp.namespaces.absolute_path(&args[2].as_string(), current);
            let ns = interp.namespaces.create_path(&abs);
            let saved = interp.frames.get_namespace();
            interp.frames.set_namespace(ns);
            let script = args[3..].iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
            let result = eval::eval(interp, &script, EvalFlag::Local);
            interp.frames.set_namespace(saved);
            result
        }
        "delete" => {
            for name in &args[2..] {
                let current = interp.frames.get_namespace();
                let abs = interp.namespaces.absolute_path(&name.as_string(), current);
                if let Some(ns) = interp.namespaces.find(&abs) {
                    interp.namespaces.delete(ns);
                }
            }
            Ok(Obj::empty())
        }
        "export" => {
            let current = interp.frames.get_namespace();
            for pattern in &args[2..] {
                interp.namespaces.get_mut(current).exports.push(pattern.as_string());
            }
            Ok(Obj::empty())
        }
        "import" => {
            let current = interp.frames.get_namespace();
            for pattern_obj in &args[2..] {
                let pattern = pattern_obj.as_string();
                let (ns_path, simple_pattern) = split_ns_pattern(&interp.namespaces, &pattern, current);
                let Some(src_ns) = interp.namespaces.find(&ns_path) else { continue };
                let names: Vec<String> = interp.namespaces.get(src_ns).commands.keys().cloned().collect();
                for name in names {
                    if Namespaces::glob_match(&simple_pattern, &name) && interp.namespaces.is_exported(src_ns, &name) {
                        let record = interp.namespaces.get(src_ns).commands.get(&name).cloned().expect("name came from this namespace's command keys");
                        interp.namespaces.get_mut(current).commands.insert(name, record);
                    }
                }
            }
            Ok(Obj::empty())
        }
        other => Err(Unwind::error(format!("unknown or ambiguous subcommand \"{other}\": must be delete, eval, export, or import"))),
    }
}

/// `trace add|remove|info variable|command name ops script` (spec §4.8,
/// §4.10).
fn cmd_trace(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let sub = args.get(1).map(Obj::as_string).ok_or_else(|| wrong_args("trace subcommand ?arg ...?"))?;
    match sub.as_str() {
        "add" => {
            let kind = args.get(2).map(Obj::as_string).ok_or_else(|| wrong_args("trace add variable|command name ops script"))?;
            let name = args.get(3).map(Obj::as_string).ok_or_else(|| wrong_args("trace add variable|command name ops script"))?;
            let ops = args.get(4).ok_or_else(|| wrong_args("trace add variable|command name ops script"))?.as_list()?;
            let ops = ops.iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
            let script = args.get(5).cloned().ok_or_else(|| wrong_args("trace add variable|command name ops script"))?;
            match kind.as_str() {
                "variable" => interp.traces.add_variable(&name, ops, script),
                "command" => interp.traces.add_command(&name, ops, script),
                other => return Err(Unwind::error(format!("bad trace type \"{other}\": must be command or variable"))),
            }
            Ok(Obj::empty())
        }
        "remove" => {
            let kind = args.get(2).map(Obj::as_string).ok_or_else(|| wrong_args("trace remove variable|command name ops script"))?;
            let name = args.get(3).map(Obj::as_string).ok_or_else(|| wrong_args("trace remove variable|command name ops script"))?;
            let ops = args.get(4).ok_or_else(|| wrong_args("trace remove variable|command name ops script"))?.as_list()?;
            let ops = ops.iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
            let script = args.get(5).cloned().ok_or_else(|| wrong_args("trace remove variable|command name ops script"))?;
            match kind.as_str() {
                "variable" => interp.traces.remove_variable(&name, &ops, &script),
                "command" => interp.traces.remove_command(&name, &ops, &script),
                other => return Err(Unwind::error(format!("bad trace type \"{other}\": must be command or variable"))),
            }
            Ok(Obj::empty())
        }
        "info" => {
            let kind = args.get(2).map(Obj::as_string).ok_or_else(|| wrong_args("trace info variable|command name"))?;
            let name = args.get(3).map(Obj::as_string).ok_or_else(|| wrong_args("trace info variable|command name"))?;
            let entries = match kind.as_str() {
                "variable" => interp.traces.info_variable(&name),
                "command" => interp.traces.info_command(&name),
                other => return Err(Unwind::error(format!("bad trace type \"{other}\": must be command or variable"))),
            };
            Ok(Obj::from_list(entries.into_iter().map(|(ops, script)| Obj::from_list(vec![Obj::from_string(ops), script])).collect()))
        }
        other => Err(Unwind::error(format!("unknown or ambiguous subcommand \"{other}\": must be add, info, or remove"))),
    }
}

fn looks_like_level(text: &str) -> bool {
    text.trim_start_matches('#').parse::<i64>().is_ok()
}

/// `upvar ?level? otherVar myVar ?otherVar myVar ...?` (spec §4.5, §4.10).
fn cmd_upvar(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let rest = &args[1..];
    if rest.is_empty() {
        return Err(wrong_args("upvar ?level? otherVar localVar ?otherVar localVar ...?"));
    }
    let (level_text, pairs) = if rest.len() % 2 == 1 { (rest[0].as_string(), &rest[1..]) } else { ("1".to_string(), rest) };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(wrong_args("upvar ?level? otherVar localVar ?otherVar localVar ...?"));
    }
    let level: i64 = level_text.trim_start_matches('#').parse().unwrap_or(1);
    let from = interp.frames.active_index();
    let target = interp.frames.resolve_level(from, level);
    for pair in pairs.chunks(2) {
        frame::bind_upvar(&interp.frames, target, &pair[0].as_string(), &pair[1].as_string());
    }
    Ok(Obj::empty())
}

/// `variable ?name value? ... ?name?` (spec §4.5, §4.10): links each bare
/// name to the current namespace's variable map, initializing it there if
/// a value is given and the namespace variable does not already exist.
fn cmd_variable(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let rest = &args[1..];
    if rest.is_empty() {
        return Err(wrong_args("variable ?name value ...? name"));
    }
    let current = interp.frames.get_namespace();
    let bare_last = rest.len() % 2 == 1;
    let mut i = 0;
    while i < rest.len() {
        let name = rest[i].as_string();
        let simple = name.rsplit("::").next().unwrap_or(&name).to_string();
        let is_last = i == rest.len() - 1;
        if is_last && bare_last {
            i += 1;
        } else {
            let value = rest[i + 1].clone();
            let exists = interp.namespaces.get(current).vars.0.borrow().contains_key(&simple);
            if !exists {
                interp.namespaces.get_mut(current).vars.0.borrow_mut().insert(simple.clone(), VarSlot::Value(value));
            }
            i += 2;
        }
        frame::bind_namespace_link(&interp.frames, current, &simple, &simple);
    }
    Ok(Obj::empty())
}

/// `global name ...` (spec §4.5, §4.10): links each name to the root
/// namespace.
fn cmd_global(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let root = interp.namespaces.root();
    for name_obj in &args[1..] {
        let name = name_obj.as_string();
        frame::bind_namespace_link(&interp.frames, root, &name, &name);
    }
    Ok(Obj::empty())
}

/// `uplevel ?level? arg ?arg ...?` (spec §4.4, §4.10): evaluates the
/// (joined) script with the active frame temporarily switched to an
/// enclosing level.
fn cmd_uplevel(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let rest = &args[1..];
    if rest.is_empty() {
        return Err(wrong_args("uplevel ?level? arg ?arg ...?"));
    }
    let (level_text, script_words) = if rest.len() > 1 && looks_like_level(&rest[0].as_string()) { (rest[0].as_string(), &rest[1..]) } else { ("1".to_string(), rest) };
    let level: i64 = level_text.trim_start_matches('#').parse().unwrap_or(1);
    let from = interp.frames.active_index();
    let target = interp.frames.resolve_level(from, level);
    let script = script_words.iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
    let saved = interp.frames.active_index();
    interp.frames.set_active(target);
    let result = eval::eval(interp, &script, EvalFlag::Local);
    interp.frames.set_active(saved);
    result
}

/// `info commands|vars|level|exists` (spec §4.10).
fn cmd_info(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let sub = args.get(1).map(Obj::as_string).ok_or_else(|| wrong_args("info subcommand ?arg ...?"))?;
    match sub.as_str() {
        "commands" => {
            let current = interp.frames.get_namespace();
            let names = interp.namespaces.sorted_command_names(current);
            let filtered = match args.get(2).map(Obj::as_string) {
                Some(pattern) => names.into_iter().filter(|n| Namespaces::glob_match(&pattern, n)).collect(),
                None => names,
            };
            Ok(Obj::from_list(filtered.into_iter().map(Obj::from_string).collect()))
        }
        "vars" => {
            let current = interp.frames.get_namespace();
            let names = interp.namespaces.sorted_var_names(current);
            let filtered = match args.get(2).map(Obj::as_string) {
                Some(pattern) => names.into_iter().filter(|n| Namespaces::glob_match(&pattern, n)).collect(),
                None => names,
            };
            Ok(Obj::from_list(filtered.into_iter().map(Obj::from_string).collect()))
        }
        "level" => {
            if let Some(n) = args.get(2) {
                let level = n.as_int()?;
                let from = interp.frames.active_index();
                let index = interp.frames.resolve_level(from, level);
                let (command, frame_args, _ns) = interp.frames.info(index).ok_or_else(|| Unwind::error("bad level"))?;
                let mut words = vec![command.clone()];
                words.extend_from_slice(frame_args);
                Ok(Obj::from_list(words))
            } else {
                Ok(Obj::from_int(interp.frames.active_index() as i64))
            }
        }
        "exists" => {
            let name = args.get(2).map(Obj::as_string).ok_or_else(|| wrong_args("info exists varName"))?;
            Ok(Obj::from_int(i64::from(frame::var_exists(&interp.frames, &interp.namespaces, &name))))
        }
        other => Err(Unwind::error(format!("unknown or ambiguous subcommand \"{other}\": must be commands, exists, level, or vars"))),
    }
}

/// Evaluates a loop/conditional condition word (spec.md amendment,
/// `SPEC_FULL.md` §4.10): dispatches to the host's `expr` builtin if one
/// is registered (so `$var` substitution and comparison happen fresh on
/// every check, exactly as a braced condition requires), otherwise falls
/// back to the substituted text's own truthiness.
fn eval_condition(interp: &mut Interp, cond_text: &str) -> Result<bool, Unwind> {
    let current = interp.frames.get_namespace();
    if interp.namespaces.lookup_command("expr", current).is_some() {
        let words = [Obj::from_string("expr"), Obj::from_string(cond_text.to_string())];
        Ok(eval::dispatch(interp, &words)?.is_truthy())
    } else {
        Ok(Obj::from_string(cond_text.to_string()).is_truthy())
    }
}

/// `if cond ?then? body ?elseif cond ?then? body ...? ?else? ?body?`
/// (spec.md amendment, `SPEC_FULL.md` §4.10).
fn cmd_if(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let rest = &args[1..];
    if rest.len() < 2 {
        return Err(wrong_args("if cond ?then? body ?elseif cond ?then? body ...? ?else? ?body?"));
    }
    let mut i = 0;
    loop {
        if i >= rest.len() {
            return Ok(Obj::empty());
        }
        let cond = rest[i].as_string();
        i += 1;
        if i < rest.len() && rest[i].as_string() == "then" {
            i += 1;
        }
        if i >= rest.len() {
            return Err(Unwind::error("wrong # args: no script following condition"));
        }
        let body = rest[i].as_string();
        i += 1;
        if eval_condition(interp, &cond)? {
            return eval::eval(interp, &body, EvalFlag::Local);
        }
        if i >= rest.len() {
            return Ok(Obj::empty());
        }
        match rest[i].as_string().as_str() {
            "elseif" => {
                i += 1;
            }
            "else" => {
                i += 1;
                let body = rest.get(i).map(Obj::as_string).ok_or_else(|| Unwind::error("wrong # args: no script following \"else\" argument"))?;
                return eval::eval(interp, &body, EvalFlag::Local);
            }
            _ => return Ok(Obj::empty()),
        }
    }
}

/// `while cond body` (spec.md amendment, `SPEC_FULL.md` §4.10).
fn cmd_while(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 3 {
        return Err(wrong_args("while cond body"));
    }
    let cond = args[1].as_string();
    let body = args[2].as_string();
    while eval_condition(interp, &cond)? {
        match eval::eval(interp, &body, EvalFlag::Local) {
            Ok(_) | Err(Unwind::Continue) => {}
            Err(Unwind::Break) => break,
            Err(other) => return Err(other),
        }
    }
    Ok(Obj::empty())
}

/// `for start cond next body` (spec.md amendment, `SPEC_FULL.md` §4.10).
fn cmd_for(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 5 {
        return Err(wrong_args("for start cond next body"));
    }
    let start = args[1].as_string();
    let cond = args[2].as_string();
    let next = args[3].as_string();
    let body = args[4].as_string();
    eval::eval(interp, &start, EvalFlag::Local)?;
    while eval_condition(interp, &cond)? {
        match eval::eval(interp, &body, EvalFlag::Local) {
            Ok(_) | Err(Unwind::Continue) => {}
            Err(Unwind::Break) => break,
            Err(other) => return Err(other),
        }
        eval::eval(interp, &next, EvalFlag::Local)?;
    }
    Ok(Obj::empty())
}

/// `foreach varName list body` (spec.md amendment, `SPEC_FULL.md` §4.10).
fn cmd_foreach(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    if args.len() != 4 {
        return Err(wrong_args("foreach varName list body"));
    }
    let varname = args[1].as_string();
    let items = args[2].as_list()?;
    let body = args[3].as_string();
    for item in items {
        frame::write_var(&interp.frames, &interp.namespaces, &varname, item)?;
        match eval::eval(interp, &body, EvalFlag::Local) {
            Ok(_) | Err(Unwind::Continue) => {}
            Err(Unwind::Break) => break,
            Err(other) => return Err(other),
        }
    }
    Ok(Obj::empty())
}

#[cfg(test)]
mod tests {
    use crate::interp::Interp;

    #[test]
    fn set_and_read_round_trip() {
        let mut interp = Interp::new();
        interp.eval("set x 5").unwrap();
        assert_eq!(interp.eval("set x").unwrap(), "5");
    }

    #[test]
    fn incr_creates_variable_at_zero() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("incr counter").unwrap(), "1");
        assert_eq!(interp.eval("incr counter 5").unwrap(), "6");
    }

    #[test]
    fn list_ops_compose() {
        let mut interp = Interp::new();
        interp.eval("set l [list a b c]").unwrap();
        assert_eq!(interp.eval("llength $l").unwrap(), "3");
        assert_eq!(interp.eval("lindex $l 1").unwrap(), "b");
        assert_eq!(interp.eval("lindex $l end").unwrap(), "c");
    }

    #[test]
    fn lappend_creates_and_extends() {
        let mut interp = Interp::new();
        interp.eval("lappend log a").unwrap();
        assert_eq!(interp.eval("lappend log b").unwrap(), "a b");
    }

    #[test]
    fn dict_round_trip() {
        let mut interp = Interp::new();
        interp.eval("dict set d a 1").unwrap();
        interp.eval("dict set d b 2").unwrap();
        assert_eq!(interp.eval("dict get $d a").unwrap(), "1");
        assert_eq!(interp.eval("dict size $d").unwrap(), "2");
    }

    #[test]
    fn proc_with_default_param() {
        let mut interp = Interp::new();
        interp.eval("proc f {a {b 10}} {return [list $a $b]}").unwrap();
        assert_eq!(interp.eval("f 1").unwrap(), "1 10");
        assert_eq!(interp.eval("f 1 2").unwrap(), "1 2");
    }

    #[test]
    fn catch_reports_error_code_and_message() {
        let mut interp = Interp::new();
        let code = interp.eval("catch {error boom} msg").unwrap();
        assert_eq!(code, "1");
        assert_eq!(interp.eval("set msg").unwrap(), "boom");
    }

    #[test]
    fn while_break_and_continue() {
        let mut interp = Interp::new();
        interp.eval("set total 0").unwrap();
        interp.eval("set i 0").unwrap();
        interp.eval(
            "while {[set i] < 5} { \
                 incr i; \
                 if {$i == 3} { continue }; \
                 if {$i == 5} { break }; \
                 incr total $i \
             }",
        )
        .unwrap();
        assert_eq!(interp.eval("set total").unwrap(), "7");
    }

    #[test]
    fn foreach_iterates_list() {
        let mut interp = Interp::new();
        interp.eval("set acc {}").unwrap();
        interp.eval("foreach x {1 2 3} { lappend acc $x }").unwrap();
        assert_eq!(interp.eval("set acc").unwrap(), "1 2 3");
    }

    #[test]
    fn upvar_links_caller_variable() {
        let mut interp = Interp::new();
        interp.eval("proc bump {name} {upvar 1 $name v; incr v}").unwrap();
        interp.eval("set counter 1").unwrap();
        interp.eval("bump counter").unwrap();
        assert_eq!(interp.eval("set counter").unwrap(), "2");
    }

    #[test]
    fn namespace_eval_and_rename() {
        let mut interp = Interp::new();
        interp.eval("namespace eval ::ns {set greeting hi}").unwrap();
        assert_eq!(interp.eval("set ::ns::greeting").unwrap(), "hi");
        interp.eval("proc ::ns::old {} {return done}").unwrap();
        interp.eval("rename ::ns::old ::ns::new").unwrap();
        assert_eq!(interp.eval("::ns::new").unwrap(), "done");
    }
}
