use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::error::VarError;

/// A host-opaque tag naming a registered foreign type (spec §4.9).
pub type ForeignTypeTag = Rc<str>;

/// An opaque reference to a host-owned payload behind a foreign `Obj`
/// (spec §4.9). The engine never inspects the payload; it only stores and
/// forwards it.
#[derive(Clone)]
pub struct ForeignHandle(pub Rc<dyn std::any::Any>);

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ForeignHandle(..)")
    }
}

/// The typed internal representation of an [`Obj`] (spec §3, §9).
///
/// Exactly one of these, or none, is cached alongside the string form at
/// any moment.
#[derive(Clone, Debug)]
pub enum IntRep {
    Int(i64),
    Double(f64),
    List(Vec<Obj>),
    Dict(IndexMap<String, Obj>),
    Foreign(ForeignTypeTag, ForeignHandle),
}

impl IntRep {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Foreign(_, _) => "foreign",
        }
    }
}

struct ObjData {
    string: Option<String>,
    intrep: Option<IntRep>,
}

/// A single TCL value: a string form and/or a typed internal form
/// (spec §3). Cheap to clone — `Obj` is a reference-counted handle to
/// shared mutable data, matching the "container, not a copy" rule for
/// lists/dicts in spec §3 and the native-reference guidance of spec §9.
#[derive(Clone)]
pub struct Obj(Rc<RefCell<ObjData>>);

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj").field("string", &self.0.borrow().string).finish()
    }
}

impl Obj {
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: Some(s.into()), intrep: None })))
    }

    #[must_use]
    pub fn from_int(n: i64) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: None, intrep: Some(IntRep::Int(n)) })))
    }

    #[must_use]
    pub fn from_double(d: f64) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: None, intrep: Some(IntRep::Double(d)) })))
    }

    #[must_use]
    pub fn from_list(items: Vec<Obj>) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: None, intrep: Some(IntRep::List(items)) })))
    }

    #[must_use]
    pub fn from_dict(map: IndexMap<String, Obj>) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: None, intrep: Some(IntRep::Dict(map)) })))
    }

    #[must_use]
    pub fn from_foreign(tag: ForeignTypeTag, handle: ForeignHandle) -> Self {
        Self(Rc::new(RefCell::new(ObjData { string: None, intrep: Some(IntRep::Foreign(tag, handle)) })))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::from_string(String::new())
    }

    /// Identity comparison: do these two `Obj`s refer to the same shared
    /// cell? Used by cycle-avoidance checks on list/dict mutation
    /// (spec §9).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `Type()`: the internal form's tag name, or `"string"` if none
    /// (spec §3).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.0.borrow().intrep {
            Some(rep) => rep.type_name(),
            None => "string",
        }
    }

    #[must_use]
    pub fn is_foreign(&self) -> bool {
        matches!(self.0.borrow().intrep, Some(IntRep::Foreign(_, _)))
    }

    #[must_use]
    pub fn foreign(&self) -> Option<(ForeignTypeTag, ForeignHandle)> {
        match &self.0.borrow().intrep {
            Some(IntRep::Foreign(tag, handle)) => Some((tag.clone(), handle.clone())),
            _ => None,
        }
    }

    /// Replaces the string form directly, dropping any cached internal
    /// form (spec §4.2: "setting the string form must drop the
    /// internal").
    pub fn set_string(&self, s: impl Into<String>) {
        let mut data = self.0.borrow_mut();
        data.string = Some(s.into());
        data.intrep = None;
    }

    /// `as_string(v)` (spec §4.2): returns the cached string, or
    /// regenerates and caches it from the internal form.
    #[must_use]
    pub fn as_string(&self) -> String {
        {
            let data = self.0.borrow();
            if let Some(s) = &data.string {
                return s.clone();
            }
        }
        let formatted = {
            let data = self.0.borrow();
            match data.intrep.as_ref().expect("Obj must have string or intrep") {
                IntRep::Int(n) => n.to_string(),
                IntRep::Double(d) => format_double(*d),
                IntRep::List(items) => format_list(items),
                IntRep::Dict(map) => format_list(&map.iter().flat_map(|(k, v)| [Obj::from_string(k.clone()), v.clone()]).collect::<Vec<_>>()),
                IntRep::Foreign(tag, _) => format!("foreign:{tag}"),
            }
        };
        self.0.borrow_mut().string = Some(formatted.clone());
        formatted
    }

    /// `as_int(v)` (spec §4.2): integer internal form returned directly;
    /// double form truncated; else the string is parsed strictly
    /// (optional sign, decimal digits only — no hex, no floats).
    pub fn as_int(&self) -> Result<i64, VarError> {
        {
            let data = self.0.borrow();
            match &data.intrep {
                Some(IntRep::Int(n)) => return Ok(*n),
                Some(IntRep::Double(d)) => return Ok(*d as i64),
                _ => {}
            }
        }
        let s = self.as_string();
        let trimmed = s.trim();
        let valid = {
            let mut chars = trimmed.chars();
            match chars.next() {
                Some('+' | '-') => chars.clone().next().is_some() && chars.all(|c| c.is_ascii_digit()),
                Some(c) if c.is_ascii_digit() => chars.all(|c| c.is_ascii_digit()),
                _ => false,
            }
        };
        if !valid {
            return Err(VarError::CannotRead { name: s.clone(), reason: format!("expected integer but got \"{s}\"") });
        }
        let n: i64 = trimmed
            .parse()
            .map_err(|_| VarError::CannotRead { name: s.clone(), reason: format!("expected integer but got \"{s}\"") })?;
        self.0.borrow_mut().intrep = Some(IntRep::Int(n));
        Ok(n)
    }

    /// `as_double(v)` (spec §4.2).
    pub fn as_double(&self) -> Result<f64, VarError> {
        {
            let data = self.0.borrow();
            match &data.intrep {
                Some(IntRep::Double(d)) => return Ok(*d),
                Some(IntRep::Int(n)) => return Ok(*n as f64),
                _ => {}
            }
        }
        let s = self.as_string();
        let trimmed = s.trim();
        let d: f64 = trimmed
            .parse()
            .map_err(|_| VarError::CannotRead { name: s.clone(), reason: format!("expected floating-point number but got \"{s}\"") })?;
        self.0.borrow_mut().intrep = Some(IntRep::Double(d));
        Ok(d)
    }

    /// `as_list(v)` (spec §4.2): if the internal form is already a list,
    /// returns its items; else parses the string as a TCL list and caches
    /// the result.
    pub fn as_list(&self) -> Result<Vec<Obj>, VarError> {
        {
            let data = self.0.borrow();
            if let Some(IntRep::List(items)) = &data.intrep {
                return Ok(items.clone());
            }
        }
        let s = self.as_string();
        let items = parse_list(&s).map_err(|msg| VarError::CannotRead { name: s.clone(), reason: msg })?;
        self.0.borrow_mut().intrep = Some(IntRep::List(items.clone()));
        Ok(items)
    }

    /// `as_dict(v)` (spec §4.2): coerces through the list form; odd
    /// element counts are an error; duplicate keys overwrite the value
    /// but keep the original position (first-seen key order).
    pub fn as_dict(&self) -> Result<IndexMap<String, Obj>, VarError> {
        {
            let data = self.0.borrow();
            if let Some(IntRep::Dict(map)) = &data.intrep {
                return Ok(map.clone());
            }
        }
        let items = self.as_list()?;
        if items.len() % 2 != 0 {
            return Err(VarError::CannotRead {
                name: self.as_string(),
                reason: "missing value to go with key".to_string(),
            });
        }
        let mut map = IndexMap::new();
        for pair in items.chunks(2) {
            let key = pair[0].as_string();
            map.insert(key, pair[1].clone());
        }
        self.0.borrow_mut().intrep = Some(IntRep::Dict(map.clone()));
        Ok(map)
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        if let Ok(n) = self.as_int() {
            return n != 0;
        }
        if let Ok(d) = self.as_double() {
            return d != 0.0;
        }
        matches!(self.as_string().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    }

    // --- list mutators: each invalidates the string cache of *this*
    // handle's internal form only (spec §4.2). ---

    pub fn list_len(&self) -> Result<usize, VarError> {
        Ok(self.as_list()?.len())
    }

    pub fn list_get(&self, index: usize) -> Result<Option<Obj>, VarError> {
        Ok(self.as_list()?.get(index).cloned())
    }

    pub fn list_append(&self, value: Obj) -> Result<(), VarError> {
        let mut items = self.as_list()?;
        items.push(value);
        self.set_list(items);
        Ok(())
    }

    pub fn list_insert(&self, index: usize, values: Vec<Obj>) -> Result<(), VarError> {
        let mut items = self.as_list()?;
        let index = index.min(items.len());
        for (offset, value) in values.into_iter().enumerate() {
            items.insert(index + offset, value);
        }
        self.set_list(items);
        Ok(())
    }

    pub fn list_set_at(&self, index: usize, value: Obj) -> Result<(), VarError> {
        let mut items = self.as_list()?;
        if index >= items.len() {
            items.resize_with(index + 1, Obj::empty);
        }
        items[index] = value;
        self.set_list(items);
        Ok(())
    }

    pub fn list_range(&self, start: usize, end: usize) -> Result<Vec<Obj>, VarError> {
        let items = self.as_list()?;
        let start = start.min(items.len());
        let end = end.min(items.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(items[start..end].to_vec())
    }

    /// Replaces the internal form with a list and invalidates the string
    /// cache, per the strict invalidation rule of spec §4.2.
    pub fn set_list(&self, items: Vec<Obj>) {
        let mut data = self.0.borrow_mut();
        data.intrep = Some(IntRep::List(items));
        data.string = None;
    }

    pub fn set_dict(&self, map: IndexMap<String, Obj>) {
        let mut data = self.0.borrow_mut();
        data.intrep = Some(IntRep::Dict(map));
        data.string = None;
    }

    pub fn dict_set(&self, key: String, value: Obj) -> Result<(), VarError> {
        let mut map = self.as_dict()?;
        map.insert(key, value);
        self.set_dict(map);
        Ok(())
    }

    pub fn dict_get(&self, key: &str) -> Result<Option<Obj>, VarError> {
        Ok(self.as_dict()?.get(key).cloned())
    }

    pub fn dict_remove(&self, key: &str) -> Result<(), VarError> {
        let mut map = self.as_dict()?;
        map.shift_remove(key);
        self.set_dict(map);
        Ok(())
    }
}

impl From<&str> for Obj {
    fn from(s: &str) -> Self {
        Obj::from_string(s)
    }
}

impl From<String> for Obj {
    fn from(s: String) -> Self {
        Obj::from_string(s)
    }
}

impl From<i64> for Obj {
    fn from(n: i64) -> Self {
        Obj::from_int(n)
    }
}

fn format_double(d: f64) -> String {
    if d.fract() == 0.0 && d.is_finite() {
        format!("{d:.1}")
    } else {
        let mut s = format!("{d}");
        if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("nan") {
            s.push_str(".0");
        }
        s
    }
}

/// Formats a list of `Obj` into TCL's list string format (spec §4.2):
/// space-separated, with elements containing whitespace, braces, or
/// backslashes (or that are empty) wrapped in `{…}`.
#[must_use]
pub fn format_list(items: &[Obj]) -> String {
    items.iter().map(|item| format_element(&item.as_string())).collect::<Vec<_>>().join(" ")
}

fn needs_braces(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '{' || c == '}' || c == '\\' || c == '[' || c == ']' || c == '"' || c == ';' || c == '$')
}

fn format_element(s: &str) -> String {
    if needs_braces(s) {
        format!("{{{s}}}")
    } else {
        s.to_string()
    }
}

/// Parses a TCL list string (spec §4.2): whitespace-separated elements;
/// `{…}` and `"…"` group an element (honoring nested braces); unbalanced
/// groups are an error.
pub fn parse_list(s: &str) -> Result<Vec<Obj>, String> {
    let mut items = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let n = chars.len();
    while i < n {
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= n {
            break;
        }
        if chars[i] == '{' {
            let start = i + 1;
            let mut depth = 1;
            i += 1;
            while i < n && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                i += 1;
            }
            if depth != 0 {
                return Err("unmatched open brace in list".to_string());
            }
            let elem: String = chars[start..i - 1].iter().collect();
            items.push(Obj::from_string(elem));
        } else if chars[i] == '"' {
            let start = i + 1;
            i += 1;
            while i < n && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < n {
                    i += 1;
                }
                i += 1;
            }
            if i >= n {
                return Err("unmatched open quote in list".to_string());
            }
            let elem: String = chars[start..i].iter().collect();
            i += 1;
            items.push(Obj::from_string(unescape(&elem)));
        } else {
            let start = i;
            while i < n && !chars[i].is_whitespace() {
                if chars[i] == '\\' && i + 1 < n {
                    i += 1;
                }
                i += 1;
            }
            let elem: String = chars[start..i].iter().collect();
            items.push(Obj::from_string(unescape(&elem)));
        }
    }
    Ok(items)
}

/// Backslash-escape handling shared by the list parser and the word
/// scanner (spec §4.1): `\n`, `\t`, `\xNN`, `\uNNNN`, backslash-newline
/// collapses to a space, otherwise identity (the backslash is dropped and
/// the following character is kept literally).
#[must_use]
pub fn unescape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 1;
            match chars[i] {
                'n' => {
                    out.push('\n');
                    i += 1;
                }
                't' => {
                    out.push('\t');
                    i += 1;
                }
                'r' => {
                    out.push('\r');
                    i += 1;
                }
                '\n' => {
                    out.push(' ');
                    i += 1;
                    while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
                        i += 1;
                    }
                }
                'x' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && i - start < 2 && chars[i].is_ascii_hexdigit() {
                        i += 1;
                    }
                    let hex: String = chars[start..i].iter().collect();
                    if let Ok(value) = u8::from_str_radix(&hex, 16) {
                        out.push(value as char);
                    }
                }
                'u' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && i - start < 4 && chars[i].is_ascii_hexdigit() {
                        i += 1;
                    }
                    let hex: String = chars[start..i].iter().collect();
                    if let Ok(value) = u32::from_str_radix(&hex, 16)
                        && let Some(c) = char::from_u32(value)
                    {
                        out.push(c);
                    }
                }
                other => {
                    out.push(other);
                    i += 1;
                }
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_only_computes_typed_views_on_demand() {
        let v = Obj::from_string("42");
        assert_eq!(v.as_int().unwrap(), 42);
        assert_eq!(v.type_name(), "int");
    }

    #[test]
    fn shimmering_does_not_mutate_string_form() {
        let v = Obj::from_string("007");
        let before = v.as_string();
        let _ = v.as_int().unwrap();
        assert_eq!(v.as_string(), before);
    }

    #[test]
    fn list_mutation_invalidates_string_cache() {
        let v = Obj::from_string("a b c");
        let _ = v.as_list().unwrap();
        v.list_append(Obj::from_string("d")).unwrap();
        assert_eq!(v.as_string(), "a b c d");
    }

    #[test]
    fn list_round_trips_through_format() {
        let items = vec![Obj::from_string("has space"), Obj::from_string("plain"), Obj::from_string("")];
        let formatted = format_list(&items);
        let parsed = parse_list(&formatted).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].as_string(), "has space");
        assert_eq!(parsed[1].as_string(), "plain");
        assert_eq!(parsed[2].as_string(), "");
    }

    #[test]
    fn dict_preserves_first_seen_key_order_on_duplicate() {
        let v = Obj::from_string("a 1 b 2 a 3");
        let map = v.as_dict().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a").unwrap().as_string(), "3");
    }

    #[test]
    fn as_int_rejects_hex_and_float() {
        assert!(Obj::from_string("0x10").as_int().is_err());
        assert!(Obj::from_string("1.5").as_int().is_err());
    }
}
