use indexmap::IndexMap;

use crate::{
    command::CommandRecord,
    frame::VarTable,
};

/// An index into the namespace arena (spec §4.6). Root (`::`) is always
/// [`NamespaceId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(usize);

impl NamespaceId {
    pub const ROOT: Self = Self(0);
}

/// A node in the namespace tree (spec §3, §4.6): full absolute path,
/// parent, child map, variable map, command map, export patterns.
pub struct Namespace {
    pub path: String,
    pub parent: Option<NamespaceId>,
    pub children: IndexMap<String, NamespaceId>,
    pub vars: VarTable,
    pub commands: IndexMap<String, CommandRecord>,
    pub exports: Vec<String>,
}

impl Namespace {
    fn new(path: String, parent: Option<NamespaceId>) -> Self {
        Self {
            path,
            parent,
            children: IndexMap::new(),
            vars: VarTable::default(),
            commands: IndexMap::new(),
            exports: Vec::new(),
        }
    }
}

/// The namespace tree rooted at `::` (spec §3, §4.6). Namespaces are
/// never truly freed from the arena (ids must stay stable for the life
/// of the interpreter); `delete` detaches a subtree from its parent and
/// marks it tombstoned so lookups and `info` no longer see it.
pub struct Namespaces {
    arena: Vec<Option<Namespace>>,
}

impl Namespaces {
    #[must_use]
    pub fn new() -> Self {
        Self { arena: vec![Some(Namespace::new("::".to_string(), None))] }
    }

    #[must_use]
    pub fn root(&self) -> NamespaceId {
        NamespaceId::ROOT
    }

    #[must_use]
    pub fn get(&self, id: NamespaceId) -> &Namespace {
        self.arena[id.0].as_ref().expect("namespace id must be live")
    }

    pub fn get_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        self.arena[id.0].as_mut().expect("namespace id must be live")
    }

    fn is_live(&self, id: NamespaceId) -> bool {
        self.arena.get(id.0).is_some_and(Option::is_some)
    }

    /// Normalizes a namespace reference written at a use site relative to
    /// `current` into an absolute path string (spec §4.6): absolute names
    /// (`::foo::bar`) are used as-is; unqualified names are joined under
    /// `current`.
    #[must_use]
    pub fn absolute_path(&self, name: &str, current: NamespaceId) -> String {
        if let Some(rest) = name.strip_prefix("::") {
            format!("::{rest}")
        } else if name.is_empty() {
            self.get(current).path.clone()
        } else {
            let base = &self.get(current).path;
            if base == "::" { format!("::{name}") } else { format!("{base}::{name}") }
        }
    }

    /// Creates every intermediate node along `path` (absolute, e.g.
    /// `::a::b::c`) that does not yet exist, returning the leaf id
    /// (spec §4.6 "Create").
    pub fn create_path(&mut self, path: &str) -> NamespaceId {
        let trimmed = path.strip_prefix("::").unwrap_or(path);
        let mut current = NamespaceId::ROOT;
        if trimmed.is_empty() {
            return current;
        }
        for part in trimmed.split("::") {
            current = self.child_or_create(current, part);
        }
        current
    }

    fn child_or_create(&mut self, parent: NamespaceId, name: &str) -> NamespaceId {
        if let Some(&id) = self.get(parent).children.get(name) {
            return id;
        }
        let child_path = {
            let parent_path = &self.get(parent).path;
            if parent_path == "::" { format!("::{name}") } else { format!("{parent_path}::{name}") }
        };
        let id = NamespaceId(self.arena.len());
        self.arena.push(Some(Namespace::new(child_path, Some(parent))));
        self.get_mut(parent).children.insert(name.to_string(), id);
        id
    }

    /// Finds an existing namespace by absolute path without creating it.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NamespaceId> {
        let trimmed = path.strip_prefix("::").unwrap_or(path);
        let mut current = NamespaceId::ROOT;
        if trimmed.is_empty() {
            return Some(current);
        }
        for part in trimmed.split("::") {
            current = *self.get(current).children.get(part)?;
            if !self.is_live(current) {
                return None;
            }
        }
        Some(current)
    }

    /// Splits a use-site name into (namespace path, simple name),
    /// resolving unqualified names against `current`, falling back to
    /// global if not found there (spec §4.6/§4.7 resolve/lookup rule).
    #[must_use]
    pub fn split_for_lookup(&self, name: &str, current: NamespaceId) -> (NamespaceId, String) {
        if let Some(rest) = name.strip_prefix("::") {
            let (ns_part, simple) = rest.rsplit_once("::").unwrap_or(("", rest));
            let id = self.find(&format!("::{ns_part}")).unwrap_or(NamespaceId::ROOT);
            return (id, simple.to_string());
        }
        if let Some((ns_part, simple)) = name.rsplit_once("::") {
            let abs = self.absolute_path(ns_part, current);
            let id = self.find(&abs).unwrap_or(NamespaceId::ROOT);
            return (id, simple.to_string());
        }
        (current, name.to_string())
    }

    #[must_use]
    pub fn lookup_command(&self, name: &str, current: NamespaceId) -> Option<(NamespaceId, &CommandRecord)> {
        let (ns, simple) = self.split_for_lookup(name, current);
        if let Some(rec) = self.get(ns).commands.get(&simple) {
            return Some((ns, rec));
        }
        if ns != NamespaceId::ROOT && !name.contains("::") {
            return self.get(NamespaceId::ROOT).commands.get(&simple).map(|rec| (NamespaceId::ROOT, rec));
        }
        None
    }

    /// Recursively removes descendants and cleans the parent's child map
    /// (spec §4.6). `::` itself cannot be deleted.
    pub fn delete(&mut self, id: NamespaceId) {
        if id == NamespaceId::ROOT {
            return;
        }
        let children: Vec<NamespaceId> = self.get(id).children.values().copied().collect();
        for child in children {
            self.delete(child);
        }
        if let Some(parent) = self.get(id).parent {
            let name = self.get(id).path.rsplit("::").next().unwrap_or_default().to_string();
            self.get_mut(parent).children.shift_remove(&name);
        }
        self.arena[id.0] = None;
    }

    /// Sorted command names for `info commands` (spec §4.6: "must return
    /// sorted outputs for determinism").
    #[must_use]
    pub fn sorted_command_names(&self, id: NamespaceId) -> Vec<String> {
        let mut names: Vec<String> = self.get(id).commands.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn sorted_var_names(&self, id: NamespaceId) -> Vec<String> {
        let mut names: Vec<String> = self.get(id).vars.0.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn sorted_child_names(&self, id: NamespaceId) -> Vec<String> {
        let mut names: Vec<String> = self.get(id).children.keys().cloned().collect();
        names.sort();
        names
    }

    /// Glob grammar (spec §4.6): `*` any run, `?` single char.
    #[must_use]
    pub fn glob_match(pattern: &str, text: &str) -> bool {
        glob_match(pattern.as_bytes(), text.as_bytes())
    }

    #[must_use]
    pub fn is_exported(&self, id: NamespaceId, name: &str) -> bool {
        self.get(id).exports.iter().any(|pattern| Self::glob_match(pattern, name))
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..])),
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_path_creates_intermediate_nodes() {
        let mut ns = Namespaces::new();
        let leaf = ns.create_path("::a::b::c");
        assert_eq!(ns.get(leaf).path, "::a::b::c");
        assert!(ns.find("::a::b").is_some());
        assert!(ns.find("::a").is_some());
    }

    #[test]
    fn delete_removes_from_parent_child_map() {
        let mut ns = Namespaces::new();
        let a = ns.create_path("::a");
        ns.delete(a);
        assert!(ns.find("::a").is_none());
        assert!(!ns.get(NamespaceId::ROOT).children.contains_key("a"));
    }

    #[test]
    fn root_cannot_be_deleted() {
        let mut ns = Namespaces::new();
        ns.delete(NamespaceId::ROOT);
        assert_eq!(ns.find("::"), Some(NamespaceId::ROOT));
    }

    #[test]
    fn glob_export_patterns() {
        assert!(Namespaces::glob_match("foo*", "foobar"));
        assert!(Namespaces::glob_match("f??", "foo"));
        assert!(!Namespaces::glob_match("f??", "fo"));
    }
}
