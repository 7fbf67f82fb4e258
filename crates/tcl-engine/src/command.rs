use crate::{
    error::{CommandError, Unwind},
    interp::Interp,
    namespace::{NamespaceId, Namespaces},
    value::{ForeignHandle, Obj},
};

/// A host-registered native command (spec §4.7, §6). Receives the
/// interpreter and the already-substituted argument `Obj` array,
/// including the command name at index 0.
pub type BuiltinFn = fn(&mut Interp, &[Obj]) -> Result<Obj, Unwind>;

/// One formal parameter of a `proc` (spec §4.7): bare (required) or
/// `{name default}` (optional).
#[derive(Clone, Debug)]
pub struct ProcParam {
    pub name: String,
    pub default: Option<Obj>,
}

/// Either a builtin (native function pointer) or a proc (parameter list +
/// body + defining namespace) (spec §3, §4.7).
#[derive(Clone)]
pub enum CommandKind {
    Builtin(BuiltinFn),
    Proc { params: Vec<ProcParam>, body: Obj },
    /// A per-instance command routing method calls to a foreign type's
    /// dispatch table (spec §4.9).
    ForeignInstance { type_name: String, instance: ForeignHandle },
}

/// A command record, as stored inside a namespace's command map
/// (spec §3).
#[derive(Clone)]
pub struct CommandRecord {
    pub kind: CommandKind,
}

impl CommandRecord {
    #[must_use]
    pub fn is_proc(&self) -> bool {
        matches!(self.kind, CommandKind::Proc { .. })
    }
}

/// Registers a builtin under `qualified_name`, creating intermediate
/// namespaces as needed (spec §4.7 "Define builtin").
pub fn define_builtin(namespaces: &mut Namespaces, qualified_name: &str, f: BuiltinFn) {
    let (ns_path, simple) = split_definition_target(qualified_name);
    let ns = namespaces.create_path(&ns_path);
    namespaces.get_mut(ns).commands.insert(simple, CommandRecord { kind: CommandKind::Builtin(f) });
}

/// Registers a proc in the namespace named by `name` (or `current` if
/// unqualified) (spec §4.7 "Define proc").
pub fn define_proc(namespaces: &mut Namespaces, name: &str, current: NamespaceId, params: Vec<ProcParam>, body: Obj) {
    let (ns_path, simple) = if name.contains("::") { split_definition_target(name) } else { (namespaces.get(current).path.clone(), name.to_string()) };
    let ns = namespaces.create_path(&ns_path);
    namespaces.get_mut(ns).commands.insert(simple, CommandRecord { kind: CommandKind::Proc { params, body } });
}

fn split_definition_target(qualified_name: &str) -> (String, String) {
    let rest = qualified_name.strip_prefix("::").unwrap_or(qualified_name);
    match rest.rsplit_once("::") {
        Some((ns, simple)) => (format!("::{ns}"), simple.to_string()),
        None => ("::".to_string(), rest.to_string()),
    }
}

/// Outcome of a successful rename, carrying the display names a trace
/// fire needs (spec §4.8: "old and new display names, leading `::`
/// stripped for commands living directly in the global namespace").
pub struct RenameEvent {
    pub old_display: String,
    pub new_display: String,
}

fn display_name(namespaces: &Namespaces, ns: NamespaceId, simple: &str) -> String {
    let path = &namespaces.get(ns).path;
    if path == "::" { simple.to_string() } else { format!("{path}::{simple}") }
}

/// `rename old new` (spec §4.7): moves the record from `old`'s namespace
/// to `new`'s namespace under `new`'s simple name. Errors if `old` does
/// not exist or `new` already exists. Does not fire traces — the caller
/// fires `rename` traces after success.
pub fn rename(namespaces: &mut Namespaces, old: &str, new: &str, current: NamespaceId) -> Result<RenameEvent, CommandError> {
    let (old_ns, old_simple) = namespaces.split_for_lookup(old, current);
    let record = namespaces
        .get_mut(old_ns)
        .commands
        .shift_remove(&old_simple)
        .ok_or_else(|| CommandError::InvalidCommandName { name: old.to_string() })?;

    let (new_ns_path, new_simple) = if new.contains("::") { split_definition_target(new) } else { (namespaces.get(current).path.clone(), new.to_string()) };
    let new_ns = namespaces.create_path(&new_ns_path);

    if namespaces.get(new_ns).commands.contains_key(&new_simple) {
        namespaces.get_mut(old_ns).commands.insert(old_simple, record);
        return Err(CommandError::AlreadyExists { name: new.to_string() });
    }

    let old_display = display_name(namespaces, old_ns, &old_simple);
    namespaces.get_mut(new_ns).commands.insert(new_simple.clone(), record);
    let new_display = display_name(namespaces, new_ns, &new_simple);
    Ok(RenameEvent { old_display, new_display })
}

/// Registers a per-instance foreign command under `handle_name`, already
/// minted by [`crate::foreign::ForeignRegistry::next_handle_name`]
/// (spec §4.9).
pub fn define_foreign_instance(namespaces: &mut Namespaces, current: NamespaceId, handle_name: &str, type_name: String, instance: ForeignHandle) {
    namespaces.get_mut(current).commands.insert(handle_name.to_string(), CommandRecord { kind: CommandKind::ForeignInstance { type_name, instance } });
}

/// `rename old {}` (spec §4.7): deletes the command. Does not fire
/// traces — the caller fires `delete` traces before calling this.
pub fn delete(namespaces: &mut Namespaces, name: &str, current: NamespaceId) -> Result<String, CommandError> {
    let (ns, simple) = namespaces.split_for_lookup(name, current);
    namespaces
        .get_mut(ns)
        .commands
        .shift_remove(&simple)
        .map(|_| display_name(namespaces, ns, &simple))
        .ok_or_else(|| CommandError::InvalidCommandName { name: name.to_string() })
}
