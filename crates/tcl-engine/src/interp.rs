use crate::{
    builtins,
    command::{self, BuiltinFn},
    error::{EvalError, Unwind, VarError},
    eval::{self, EvalFlag},
    foreign::{ForeignRegistry, ForeignTypeSpec},
    frame::{self, Frames},
    intern::{Accessor, Handle, ObjectTable},
    namespace::Namespaces,
    parse::{self, ParseOutcome},
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    trace::Traces,
    value::Obj,
};

/// The embeddable interpreter (spec §2, §3, §6): owns the namespace tree,
/// call frame stack, trace registry, foreign-type registry, and the
/// handle table the host uses to refer to `Obj`s across the boundary.
///
/// One `Interp` is one single-threaded cooperative interpreter (spec §5);
/// nothing here is `Send`/`Sync`, matching the `Rc<RefCell<_>>` storage
/// throughout `value.rs` and `frame.rs`.
pub struct Interp {
    pub(crate) namespaces: Namespaces,
    pub(crate) frames: Frames,
    pub(crate) traces: Traces,
    pub(crate) foreign: ForeignRegistry,
    pub(crate) objects: ObjectTable,
    pub(crate) resource: Box<dyn ResourceTracker>,
    pub(crate) unknown_handler: Option<BuiltinFn>,
    last_result: String,
}

impl Interp {
    /// Builds a fresh interpreter with the core builtins of spec.md §4.10
    /// already registered (`set`, `proc`, `catch`, `namespace`, ...), the
    /// default recursion limit, and an empty foreign-type registry.
    #[must_use]
    pub fn new() -> Self {
        let namespaces = Namespaces::new();
        // Frame 0's locals and the root namespace's vars are the same
        // shared table (spec §3, §9 "Global namespace / frame 0 unification").
        let global_vars = namespaces.get(namespaces.root()).vars.clone();
        let root = namespaces.root();
        let frames = Frames::new(global_vars, root);
        let mut interp = Self {
            namespaces,
            frames,
            traces: Traces::new(),
            foreign: ForeignRegistry::new(),
            objects: ObjectTable::new(),
            resource: Box::new(NoLimitTracker::new()),
            unknown_handler: None,
            last_result: String::new(),
        };
        builtins::install(&mut interp);
        interp
    }

    /// Overrides the recursion-depth limit checked before every proc call
    /// (spec §4.3.1, §5; default is [`crate::resource::DEFAULT_MAX_RECURSION_DEPTH`]).
    pub fn set_recursion_limit(&mut self, n: usize) {
        self.resource = Box::new(LimitedTracker::new(ResourceLimits::new().max_recursion_depth(Some(n))));
    }

    /// Registers a host-native command under `qualified_name` (spec §4.7,
    /// §6). The same hook used internally to install the core builtins.
    pub fn register_builtin(&mut self, qualified_name: &str, f: BuiltinFn) {
        command::define_builtin(&mut self.namespaces, qualified_name, f);
    }

    /// Registers a foreign type's constructor and method table
    /// (spec §4.9, §6).
    pub fn register_foreign_type(&mut self, spec: ForeignTypeSpec) {
        self.foreign.register_type(spec);
    }

    /// Constructs a new instance of a registered foreign type (spec §4.9):
    /// calls the type's `ctor`, mints the next per-type handle name (e.g.
    /// `counter1`), and registers a per-instance command under that name
    /// in the currently active namespace. Returns the handle name, which
    /// doubles as the instance command a script invokes (`$h method ...`)
    /// and as the value a constructor builtin returns to script
    /// (`set c [counter new]` binds `c` to this string).
    pub fn create_foreign_instance(&mut self, type_name: &str, args: &[Obj]) -> Result<String, Unwind> {
        let ctor = self.foreign.get_type(type_name).map(|spec| spec.ctor).ok_or_else(|| Unwind::error(format!("unknown foreign type \"{type_name}\"")))?;
        let instance = ctor(self, args)?;
        let handle_name = self.foreign.next_handle_name(type_name);
        let current = self.frames.get_namespace();
        command::define_foreign_instance(&mut self.namespaces, current, &handle_name, type_name.to_string(), instance);
        Ok(handle_name)
    }

    /// Installs the handler invoked when command resolution fails
    /// (spec §4.7 "unknown handler", §6). Called with `unknown` prepended
    /// to the original (unresolved) command words.
    pub fn set_unknown_handler(&mut self, f: BuiltinFn) {
        self.unknown_handler = Some(f);
    }

    /// Parses `source` without evaluating it (spec §4.1, §6).
    #[must_use]
    pub fn parse(&self, source: &str) -> ParseOutcome {
        parse::parse(source)
    }

    /// Evaluates a script at the top level (spec §4.3, §4.3.1, §7): applies
    /// the same boundary-collapse rule a proc return uses, so a bare
    /// `return` at the top level ends evaluation with its value rather than
    /// propagating as an internal unwind, while an uncaught `break`/
    /// `continue` becomes an error.
    pub fn eval(&mut self, source: &str) -> Result<String, EvalError> {
        match eval::collapse_at_boundary(eval::eval(self, source, EvalFlag::Local)) {
            Ok(value) => {
                self.last_result = value.as_string();
                Ok(self.last_result.clone())
            }
            Err(unwind) => {
                let err: EvalError = unwind.into();
                self.last_result.clone_from(&err.message);
                Err(err)
            }
        }
    }

    /// The interpreter result left by the most recent `eval` (spec §6).
    #[must_use]
    pub fn get_result(&self) -> &str {
        &self.last_result
    }

    /// Sets a variable by bare or qualified name through the active
    /// frame's link chain (spec §4.5, §6).
    pub fn set_var(&mut self, name: &str, value: impl Into<Obj>) -> Result<(), VarError> {
        frame::write_var(&self.frames, &self.namespaces, name, value.into())
    }

    /// Reads a variable by bare or qualified name (spec §4.5, §6).
    pub fn get_var(&self, name: &str) -> Result<Obj, VarError> {
        frame::read_var(&self.frames, &self.namespaces, name)
    }

    /// Mints a handle for `obj` so the host can refer to it across the
    /// boundary (spec §3 "objects table", §6).
    pub fn register_handle(&mut self, obj: Obj) -> Handle {
        self.objects.register(obj)
    }

    /// Looks up the `Obj` behind a handle without consuming it.
    #[must_use]
    pub fn handle_value(&self, handle: Handle) -> Option<&Obj> {
        self.objects.get(handle)
    }

    /// Releases a handle, returning the `Obj` it referred to.
    pub fn release_handle(&mut self, handle: Handle) -> Option<Obj> {
        self.objects.release(handle)
    }

    /// The host-facing value accessor for a handle (spec §6:
    /// `get_string`/`get_int`/`get_double`/`get_list`/`get_dict`/`type`/
    /// `is_foreign`/`foreign_type`/`foreign_value`).
    #[must_use]
    pub fn accessor(&self, handle: Handle) -> Option<Accessor<'_>> {
        self.objects.get(handle).map(Accessor)
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
