use std::{collections::HashMap, num::NonZeroU32};

use indexmap::IndexMap;

use crate::{
    error::VarError,
    value::{ForeignHandle, ForeignTypeTag, Obj},
};

/// An opaque non-zero handle the core hands to the host to refer to an
/// `Obj` (spec §3, §6). Handle `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-interpreter mapping from [`Handle`] to `Obj` (spec §3's "objects
/// table"). Handles are dispensed at the host boundary only; internally the
/// engine passes `Obj` by value (a cheap `Rc` clone).
#[derive(Default)]
pub struct ObjectTable {
    next: u32,
    map: HashMap<u32, Obj>,
}

impl ObjectTable {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1, map: HashMap::new() }
    }

    /// Registers a value and returns a fresh non-zero handle for it.
    pub fn register(&mut self, obj: Obj) -> Handle {
        let id = self.next;
        self.next = self.next.checked_add(1).expect("object handle space exhausted");
        self.map.insert(id, obj);
        Handle(NonZeroU32::new(id).expect("handle ids start at 1"))
    }

    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&Obj> {
        self.map.get(&handle.get())
    }

    pub fn release(&mut self, handle: Handle) -> Option<Obj> {
        self.map.remove(&handle.get())
    }
}

/// Value accessors exposed at the host boundary (spec §6): "From the
/// host, given a handle: `get_string`, `get_int`, `get_double`,
/// `get_list`, `get_dict`, `type`, `is_foreign`, `foreign_type`,
/// `foreign_value`."
pub struct Accessor<'a>(pub &'a Obj);

impl Accessor<'_> {
    #[must_use]
    pub fn get_string(&self) -> String {
        self.0.as_string()
    }

    pub fn get_int(&self) -> Result<i64, VarError> {
        self.0.as_int()
    }

    pub fn get_double(&self) -> Result<f64, VarError> {
        self.0.as_double()
    }

    pub fn get_list(&self) -> Result<Vec<Obj>, VarError> {
        self.0.as_list()
    }

    pub fn get_dict(&self) -> Result<IndexMap<String, Obj>, VarError> {
        self.0.as_dict()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    #[must_use]
    pub fn is_foreign(&self) -> bool {
        self.0.is_foreign()
    }

    #[must_use]
    pub fn foreign_type(&self) -> Option<ForeignTypeTag> {
        self.0.foreign().map(|(tag, _)| tag)
    }

    #[must_use]
    pub fn foreign_value(&self) -> Option<ForeignHandle> {
        self.0.foreign().map(|(_, handle)| handle)
    }
}
