use indexmap::IndexMap;

use crate::{
    error::Unwind,
    interp::Interp,
    value::{ForeignHandle, Obj},
};

/// Host constructor for a foreign type instance (spec §4.9).
pub type ForeignCtor = fn(&mut Interp, &[Obj]) -> Result<ForeignHandle, Unwind>;
/// Host method implementation, dispatched by name (spec §4.9).
pub type ForeignMethod = fn(&mut Interp, &ForeignHandle, &[Obj]) -> Result<Obj, Unwind>;
/// Host destructor, invoked through the universal `destroy` method
/// (spec §4.9).
pub type ForeignDestructor = fn(&mut Interp, &ForeignHandle);
/// Optional custom string renderer for a foreign value (spec §3: an
/// internal form "carries a tag naming its type"; foreign values may
/// additionally customize their string form).
pub type ForeignRenderer = fn(&ForeignHandle) -> String;

/// A host-registered foreign type: constructor, method dispatch table,
/// optional destructor and renderer (spec §4.9).
#[derive(Clone)]
pub struct ForeignTypeSpec {
    pub name: String,
    pub ctor: ForeignCtor,
    pub methods: IndexMap<String, ForeignMethod>,
    pub destructor: Option<ForeignDestructor>,
    pub renderer: Option<ForeignRenderer>,
}

/// Registry of foreign types and live instances (spec §4.9): "The core
/// stores foreign instances in a registry keyed by handle name so that
/// lookups from script-side (`$h method ...`) work through the normal
/// command table."
#[derive(Default)]
pub struct ForeignRegistry {
    types: IndexMap<String, ForeignTypeSpec>,
    next_instance_id: IndexMap<String, u64>,
}

impl ForeignRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, spec: ForeignTypeSpec) {
        self.types.insert(spec.name.clone(), spec);
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&ForeignTypeSpec> {
        self.types.get(name)
    }

    /// Mints the next per-type instance handle name (e.g. `counter1`,
    /// `counter2`), matching the example in spec §4.9.
    pub fn next_handle_name(&mut self, type_name: &str) -> String {
        let counter = self.next_instance_id.entry(type_name.to_string()).or_insert(0);
        *counter += 1;
        format!("{type_name}{counter}")
    }
}

/// Dispatches a method call on a foreign instance's per-instance command
/// (spec §4.9): routes `destroy` through the destructor, everything else
/// through the type's method table.
pub fn dispatch_method(interp: &mut Interp, type_name: &str, instance: &ForeignHandle, args: &[Obj]) -> Result<Obj, Unwind> {
    let Some(method_name) = args.first().map(Obj::as_string) else {
        return Err(Unwind::error("wrong # args: should be \"handle method ?arg ...?\""));
    };
    if method_name == "destroy" {
        if let Some(destructor) = interp.foreign.get_type(type_name).and_then(|spec| spec.destructor) {
            destructor(interp, instance);
        }
        return Ok(Obj::empty());
    }
    let method = interp
        .foreign
        .get_type(type_name)
        .and_then(|spec| spec.methods.get(&method_name))
        .copied()
        .ok_or_else(|| Unwind::error(format!("unknown method \"{method_name}\"")))?;
    method(interp, instance, &args[1..])
}
