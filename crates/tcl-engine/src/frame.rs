use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    error::VarError,
    namespace::{NamespaceId, Namespaces},
    value::Obj,
};

/// Either a level-link (up-level) or a namespace-link (spec §3's "Link
/// record", §4.5).
#[derive(Debug, Clone)]
pub enum Link {
    /// Points at `name` in the frame at absolute stack index `level`.
    Level { level: usize, name: String },
    /// Points at `name` in the given namespace's variable map.
    Namespace { ns: NamespaceId, name: String },
}

/// A slot in a frame's (or namespace's) variable map: a direct value, or
/// a link redirecting to a variable elsewhere (spec §3, §4.5).
#[derive(Debug, Clone)]
pub enum VarSlot {
    Value(Obj),
    Link(Link),
}

/// Shared, mutable variable map. Frame 0's `locals` is the *same*
/// `VarTable` as the global namespace's `vars` (spec §3, §9: "Global
/// namespace / frame 0 unification").
#[derive(Clone, Default)]
pub struct VarTable(pub Rc<RefCell<IndexMap<String, VarSlot>>>);

impl VarTable {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(IndexMap::new())))
    }
}

/// A call frame (spec §3, §4.4): the command/args that created it (for
/// introspection), its local variable map, its active namespace, and its
/// depth.
pub struct Frame {
    pub command: Obj,
    pub args: Vec<Obj>,
    pub locals: VarTable,
    pub namespace: NamespaceId,
    pub depth: usize,
}

/// The call frame stack (spec §4.4). Frame 0 is the global frame and is
/// never popped.
pub struct Frames {
    stack: Vec<Frame>,
    active: usize,
}

impl Frames {
    #[must_use]
    pub fn new(global_vars: VarTable, root_ns: NamespaceId) -> Self {
        let global = Frame { command: Obj::empty(), args: Vec::new(), locals: global_vars, namespace: root_ns, depth: 0 };
        Self { stack: vec![global], active: 0 }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.stack.len()
    }

    /// Depth of the topmost (most recently pushed) frame — not
    /// necessarily the active one during `uplevel`/`upvar` time-travel.
    #[must_use]
    pub fn top_depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn push(&mut self, command: Obj, args: Vec<Obj>, namespace: NamespaceId) {
        let depth = self.stack.len();
        self.stack.push(Frame { command, args, locals: VarTable::new(), namespace, depth });
        self.active = self.stack.len() - 1;
    }

    /// `pop()`: an error below frame 1 (spec §4.4 invariant).
    pub fn pop(&mut self) -> Result<(), String> {
        if self.stack.len() <= 1 {
            return Err("cannot pop the global frame".to_string());
        }
        self.stack.pop();
        if self.active >= self.stack.len() {
            self.active = self.stack.len() - 1;
        }
        Ok(())
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set_active(&mut self, level: usize) {
        self.active = level.min(self.stack.len() - 1);
    }

    #[must_use]
    pub fn current(&self) -> &Frame {
        &self.stack[self.active]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.stack[self.active]
    }

    #[must_use]
    pub fn frame_at(&self, index: usize) -> Option<&Frame> {
        self.stack.get(index)
    }

    pub fn set_namespace(&mut self, ns: NamespaceId) {
        self.current_mut().namespace = ns;
    }

    #[must_use]
    pub fn get_namespace(&self) -> NamespaceId {
        self.current().namespace
    }

    #[must_use]
    pub fn info(&self, level: usize) -> Option<(&Obj, &[Obj], NamespaceId)> {
        self.stack.get(level).map(|f| (&f.command, f.args.as_slice(), f.namespace))
    }

    /// Resolves a relative `upvar`/`uplevel` level count (number of
    /// frames up from `from`) to an absolute stack index, clamped at the
    /// global frame (spec §9: "cap traversal depth to detect cycles").
    #[must_use]
    pub fn resolve_level(&self, from: usize, level: i64) -> usize {
        if level <= 0 {
            return from;
        }
        (from as i64 - level).max(0) as usize
    }
}

/// The outcome of resolving a variable name to its terminal storage
/// location (spec §4.5 steps 1-3).
enum Resolved {
    Frame { index: usize, name: String },
    Namespace { ns: NamespaceId, name: String },
}

const MAX_LINK_HOPS: usize = 256;

/// Follows the link chain starting at `name` in the active frame until a
/// terminal (non-link) location is reached (spec §4.5 steps 1-3).
fn resolve(frames: &Frames, start_name: &str) -> Result<Resolved, VarError> {
    let mut index = frames.active_index();
    let mut name = start_name.to_string();
    for _ in 0..MAX_LINK_HOPS {
        let frame = frames.frame_at(index).expect("frame index must be valid during resolution");
        let slot = frame.locals.0.borrow().get(&name).cloned();
        match slot {
            Some(VarSlot::Link(Link::Level { level, name: target_name })) => {
                index = level;
                name = target_name;
            }
            Some(VarSlot::Link(Link::Namespace { ns, name: target_name })) => {
                return Ok(Resolved::Namespace { ns, name: target_name });
            }
            _ => return Ok(Resolved::Frame { index, name }),
        }
    }
    Err(VarError::CannotRead { name: start_name.to_string(), reason: "too many nested variable links".to_string() })
}

/// Reads a variable by bare name through the link chain (spec §4.5).
pub fn read_var(frames: &Frames, namespaces: &Namespaces, name: &str) -> Result<Obj, VarError> {
    if let Some((ns, simple)) = qualified_target(namespaces, frames, name) {
        return namespaces
            .get(ns)
            .vars
            .0
            .borrow()
            .get(&simple)
            .and_then(|slot| match slot {
                VarSlot::Value(v) => Some(v.clone()),
                VarSlot::Link(_) => None,
            })
            .ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() });
    }
    match resolve(frames, name)? {
        Resolved::Frame { index, name: simple } => frames
            .frame_at(index)
            .unwrap()
            .locals
            .0
            .borrow()
            .get(&simple)
            .and_then(|slot| match slot {
                VarSlot::Value(v) => Some(v.clone()),
                VarSlot::Link(_) => None,
            })
            .ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() }),
        Resolved::Namespace { ns, name: simple } => namespaces
            .get(ns)
            .vars
            .0
            .borrow()
            .get(&simple)
            .and_then(|slot| match slot {
                VarSlot::Value(v) => Some(v.clone()),
                VarSlot::Link(_) => None,
            })
            .ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() }),
    }
}

/// Writes (creating if absent) a variable by bare name through the link
/// chain (spec §4.5).
pub fn write_var(frames: &Frames, namespaces: &Namespaces, name: &str, value: Obj) -> Result<(), VarError> {
    if let Some((ns, simple)) = qualified_target(namespaces, frames, name) {
        namespaces.get(ns).vars.0.borrow_mut().insert(simple, VarSlot::Value(value));
        return Ok(());
    }
    match resolve(frames, name)? {
        Resolved::Frame { index, name: simple } => {
            frames.frame_at(index).unwrap().locals.0.borrow_mut().insert(simple, VarSlot::Value(value));
        }
        Resolved::Namespace { ns, name: simple } => {
            namespaces.get(ns).vars.0.borrow_mut().insert(simple, VarSlot::Value(value));
        }
    }
    Ok(())
}

pub fn unset_var(frames: &Frames, namespaces: &Namespaces, name: &str) -> Result<(), VarError> {
    if let Some((ns, simple)) = qualified_target(namespaces, frames, name) {
        let removed = namespaces.get(ns).vars.0.borrow_mut().shift_remove(&simple);
        return removed.map(|_| ()).ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() });
    }
    match resolve(frames, name)? {
        Resolved::Frame { index, name: simple } => {
            let removed = frames.frame_at(index).unwrap().locals.0.borrow_mut().shift_remove(&simple);
            removed.map(|_| ()).ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() })
        }
        Resolved::Namespace { ns, name: simple } => {
            let removed = namespaces.get(ns).vars.0.borrow_mut().shift_remove(&simple);
            removed.map(|_| ()).ok_or_else(|| VarError::NoSuchVariable { name: name.to_string() })
        }
    }
}

#[must_use]
pub fn var_exists(frames: &Frames, namespaces: &Namespaces, name: &str) -> bool {
    read_var(frames, namespaces, name).is_ok()
}

/// A name containing `::` always targets a namespace's variable map
/// directly, bypassing the frame link chain (needed for idioms like
/// `lappend ::log ...` inside a proc body).
fn qualified_target(namespaces: &Namespaces, frames: &Frames, name: &str) -> Option<(NamespaceId, String)> {
    if !name.contains("::") {
        return None;
    }
    let current = frames.current().namespace;
    Some(namespaces.split_for_lookup(name, current))
}

/// `upvar N src local` (spec §4.5 "Link creation"): binds `local` in the
/// current frame to a level-link at `N` frames up.
pub fn bind_upvar(frames: &Frames, level: usize, src: &str, local: &str) {
    frames
        .current()
        .locals
        .0
        .borrow_mut()
        .insert(local.to_string(), VarSlot::Link(Link::Level { level, name: src.to_string() }));
}

/// `variable ns::name` (spec §4.5 "Link creation"): binds a plain name in
/// the current frame to a namespace-link.
pub fn bind_namespace_link(frames: &Frames, ns: NamespaceId, ns_qualified_name: &str, local: &str) {
    frames
        .current()
        .locals
        .0
        .borrow_mut()
        .insert(local.to_string(), VarSlot::Link(Link::Namespace { ns, name: ns_qualified_name.to_string() }));
}
