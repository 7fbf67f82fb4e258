use crate::{
    command::{self, CommandKind, ProcParam},
    error::{Code, ReturnOptions, Unwind},
    foreign,
    frame,
    interp::Interp,
    parse::{self, Command, ParseOutcome, WordPart},
    resource::ResourceTracker,
    trace,
    value::Obj,
};

/// `local` evaluates in the current active frame; `global` temporarily
/// switches to frame 0 for the duration of the call (spec §4.3).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EvalFlag {
    Local,
    Global,
}

/// Evaluates a script under the given flag (spec §4.3).
pub fn eval(interp: &mut Interp, source: &str, flag: EvalFlag) -> Result<Obj, Unwind> {
    match flag {
        EvalFlag::Local => eval_local(interp, source),
        EvalFlag::Global => {
            let saved = interp.frames.active_index();
            interp.frames.set_active(0);
            let result = eval_local(interp, source);
            interp.frames.set_active(saved);
            result
        }
    }
}

fn eval_local(interp: &mut Interp, source: &str) -> Result<Obj, Unwind> {
    match parse::parse(source) {
        ParseOutcome::Complete(commands) => {
            let mut result = Obj::empty();
            for command in &commands {
                result = eval_command(interp, command)?;
            }
            Ok(result)
        }
        ParseOutcome::Incomplete { at } => Err(Unwind::error(format!("incomplete script at position {at}"))),
        ParseOutcome::Error(err) => Err(err.into()),
    }
}

fn eval_command(interp: &mut Interp, command: &Command) -> Result<Obj, Unwind> {
    let mut words = Vec::with_capacity(command.words.len());
    for word in &command.words {
        if word.is_braced_literal() {
            let WordPart::Literal(text) = &word.parts[0] else { unreachable!() };
            words.push(Obj::from_string(text.clone()));
            continue;
        }
        let mut text = String::new();
        for part in &word.parts {
            match part {
                WordPart::Literal(lit) => text.push_str(lit),
                WordPart::Variable(name) => {
                    let value = frame::read_var(&interp.frames, &interp.namespaces, name)?;
                    trace::fire_variable_trace(interp, name, "read")?;
                    text.push_str(&value.as_string());
                }
                WordPart::Command(script) => {
                    let value = eval(interp, script, EvalFlag::Local)?;
                    text.push_str(&value.as_string());
                }
            }
        }
        words.push(Obj::from_string(text));
    }
    if words.is_empty() {
        return Ok(Obj::empty());
    }
    dispatch(interp, &words)
}

/// Resolves and dispatches a command (spec §4.3 steps 3-5, §4.7).
pub fn dispatch(interp: &mut Interp, words: &[Obj]) -> Result<Obj, Unwind> {
    let name = words[0].as_string();
    let current_ns = interp.frames.get_namespace();
    let found = interp.namespaces.lookup_command(&name, current_ns).map(|(ns, rec)| (ns, rec.kind.clone()));
    let Some((defining_ns, kind)) = found else {
        if let Some(handler) = interp.unknown_handler {
            let mut handler_args = Vec::with_capacity(words.len());
            handler_args.push(Obj::from_string("unknown"));
            handler_args.extend_from_slice(words);
            return handler(interp, &handler_args);
        }
        return Err(Unwind::error(format!("invalid command name \"{name}\"")));
    };
    match kind {
        CommandKind::Builtin(f) => f(interp, words),
        CommandKind::Proc { params, body } => call_proc(interp, &params, &body, defining_ns, words),
        CommandKind::ForeignInstance { type_name, instance } => {
            let is_destroy = words.get(1).map(Obj::as_string).as_deref() == Some("destroy");
            let result = foreign::dispatch_method(interp, &type_name, &instance, &words[1..]);
            if is_destroy && result.is_ok() {
                let _ = command::delete(&mut interp.namespaces, &name, current_ns);
            }
            result
        }
    }
}

/// Proc invocation (spec §4.7 "Proc invocation"): push frame, switch
/// namespace, bind parameters, evaluate body, map `return` to `ok`, pop.
fn call_proc(interp: &mut Interp, params: &[ProcParam], body: &Obj, defining_ns: crate::namespace::NamespaceId, words: &[Obj]) -> Result<Obj, Unwind> {
    let depth = interp.frames.top_depth();
    interp.resource.check_recursion_depth(depth).map_err(|e| Unwind::error(e.to_string()))?;

    interp.frames.push(words[0].clone(), words[1..].to_vec(), defining_ns);
    if let Err(err) = bind_params(interp, params, &words[1..]) {
        let _ = interp.frames.pop();
        return Err(err);
    }
    let body_source = body.as_string();
    let result = eval_local(interp, &body_source);
    let _ = interp.frames.pop();
    collapse_at_boundary(result)
}

/// Shared collapse rule applied at both the proc boundary (spec §4.7
/// step 4) and the top-level `eval` boundary (spec §4.3.1): `return`
/// consumes here (honoring `-code` overrides); `break`/`continue` that
/// reach a boundary uncaught by a loop become errors.
pub fn collapse_at_boundary(result: Result<Obj, Unwind>) -> Result<Obj, Unwind> {
    match result {
        Ok(value) => Ok(value),
        Err(Unwind::Return { value, options }) => match options.code.unwrap_or(Code::Ok) {
            Code::Ok => Ok(value),
            Code::Error => Err(Unwind::Error(value)),
            Code::Return => Ok(value),
            Code::Break => Err(Unwind::Break),
            Code::Continue => Err(Unwind::Continue),
        },
        Err(Unwind::Break) => Err(Unwind::error("invoked \"break\" outside of a loop")),
        Err(Unwind::Continue) => Err(Unwind::error("invoked \"continue\" outside of a loop")),
        Err(other) => Err(other),
    }
}

/// Binds formal parameters to actual arguments (spec §4.7 step 3): each
/// parameter is bare (required) or `{name default}` (optional); a final
/// parameter named `args` absorbs all remaining arguments as a list.
fn bind_params(interp: &mut Interp, params: &[ProcParam], argv: &[Obj]) -> Result<(), Unwind> {
    let mut ai = 0usize;
    for (i, param) in params.iter().enumerate() {
        let is_last = i + 1 == params.len();
        if is_last && param.name == "args" {
            let rest = argv.get(ai..).unwrap_or_default().to_vec();
            frame::write_var(&interp.frames, &interp.namespaces, "args", Obj::from_list(rest))
                .map_err(|e| Unwind::error(e.to_string()))?;
            ai = argv.len();
            break;
        }
        if ai < argv.len() {
            frame::write_var(&interp.frames, &interp.namespaces, &param.name, argv[ai].clone()).map_err(|e| Unwind::error(e.to_string()))?;
            ai += 1;
        } else if let Some(default) = &param.default {
            frame::write_var(&interp.frames, &interp.namespaces, &param.name, default.clone()).map_err(|e| Unwind::error(e.to_string()))?;
        } else {
            return Err(Unwind::error(format!("wrong # args: should be \"{}\"", proc_usage(params))));
        }
    }
    if ai < argv.len() {
        return Err(Unwind::error(format!("wrong # args: should be \"{}\"", proc_usage(params))));
    }
    Ok(())
}

fn proc_usage(params: &[ProcParam]) -> String {
    let mut parts = Vec::new();
    for param in params {
        if param.name == "args" {
            parts.push("?arg ...?".to_string());
        } else if param.default.is_some() {
            parts.push(format!("?{}?", param.name));
        } else {
            parts.push(param.name.clone());
        }
    }
    parts.join(" ")
}

/// Builds the auxiliary return-options dict a `return` carries
/// (spec §4.3.1 "Return options").
#[must_use]
pub fn parse_return_options(args: &[Obj]) -> (ReturnOptions, Obj) {
    let mut options = ReturnOptions::default();
    let mut i = 0;
    while i + 1 < args.len() {
        match args[i].as_string().as_str() {
            "-code" => {
                options.code = match args[i + 1].as_string().as_str() {
                    "ok" => Some(Code::Ok),
                    "error" => Some(Code::Error),
                    "return" => Some(Code::Return),
                    "break" => Some(Code::Break),
                    "continue" => Some(Code::Continue),
                    other => other.parse::<u8>().ok().and_then(Code::from_u8),
                };
                i += 2;
            }
            "-level" => {
                options.level = args[i + 1].as_string().parse().unwrap_or(1);
                i += 2;
            }
            "-errorinfo" => {
                options.errorinfo = Some(args[i + 1].as_string());
                i += 2;
            }
            "-errorcode" => {
                options.errorcode = Some(args[i + 1].as_string());
                i += 2;
            }
            _ => break,
        }
    }
    let value = args.get(i).cloned().unwrap_or_else(Obj::empty);
    (options, value)
}

#[cfg(test)]
mod tests {
    use crate::interp::Interp;

    #[test]
    fn empty_script_evaluates_to_empty_result() {
        let mut interp = Interp::new();
        let result = interp.eval("").unwrap();
        assert_eq!(result, "");
    }

    #[test]
    fn command_substitution_splices_result() {
        let mut interp = Interp::new();
        interp.eval("proc one {} {return 1}").unwrap();
        let result = interp.eval("set x [one]").unwrap();
        assert_eq!(result, "1");
    }
}
