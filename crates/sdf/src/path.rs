//! Hierarchical scene description paths.
//!
//! A path addresses a spec within a layer. Paths are either absolute
//! (`/World/Chair.size`), relative (`../Table`, `.size`, `Chair`) or empty.
//!
//! Supported elements:
//! - prim names separated by `/`
//! - variant selections `{set=selection}` following a prim
//! - a property name `.name` (namespaced with `:`)
//! - a target path `[/Some/Path]` following a property
//! - leading `..` elements in relative paths

use std::fmt;
use std::str::FromStr;

use crate::error::PathParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Anchor {
    Empty,
    Absolute,
    Relative,
}

/// One component of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// `..` in a relative path.
    Parent,
    /// A prim name.
    Prim(String),
    /// A variant selection `{set=selection}`.
    VariantSelection { set: String, selection: String },
    /// A property name.
    Property(String),
    /// A relationship target or attribute connection path `[...]`.
    Target(Box<Path>),
}

/// A scene description path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    anchor: Anchor,
    elements: Vec<PathElement>,
}

impl Default for Path {
    fn default() -> Self {
        Self::empty()
    }
}

impl Path {
    /// The empty path.
    pub fn empty() -> Self {
        Self {
            anchor: Anchor::Empty,
            elements: Vec::new(),
        }
    }

    /// The absolute root path `/`.
    pub fn absolute_root() -> Self {
        Self {
            anchor: Anchor::Absolute,
            elements: Vec::new(),
        }
    }

    /// The relative path `.`.
    pub fn reflexive() -> Self {
        Self {
            anchor: Anchor::Relative,
            elements: Vec::new(),
        }
    }

    /// Parses a path from text. The empty string yields the empty path.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        if text.is_empty() {
            return Ok(Self::empty());
        }
        let mut parser = Parser { text, pos: 0 };
        let path = parser.parse_path()?;
        match parser.peek() {
            None => Ok(path),
            Some(']') => Err(PathParseError::UnbalancedBrackets {
                text: text.to_string(),
            }),
            Some(found) => Err(parser.unexpected(found)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == Anchor::Empty
    }

    pub fn is_absolute(&self) -> bool {
        self.anchor == Anchor::Absolute
    }

    pub fn is_absolute_root(&self) -> bool {
        self.anchor == Anchor::Absolute && self.elements.is_empty()
    }

    /// Returns true for prim paths, including `.` and paths ending in `..`.
    pub fn is_prim_path(&self) -> bool {
        match self.elements.last() {
            Some(PathElement::Prim(_)) | Some(PathElement::Parent) => true,
            None => self.anchor == Anchor::Relative,
            _ => false,
        }
    }

    pub fn is_absolute_root_or_prim_path(&self) -> bool {
        self.is_absolute_root() || self.is_prim_path()
    }

    pub fn is_property_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::Property(_)))
    }

    pub fn is_target_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::Target(_)))
    }

    pub fn is_prim_variant_selection_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::VariantSelection { .. }))
    }

    /// Returns true if any prim element of this path carries a variant selection.
    pub fn contains_prim_variant_selection(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, PathElement::VariantSelection { .. }))
    }

    /// Returns the target path if this is a target path.
    pub fn target_path(&self) -> Option<&Path> {
        match self.elements.last() {
            Some(PathElement::Target(target)) => Some(target),
            _ => None,
        }
    }

    /// Returns the name of the leaf prim or property, `..` for a parent
    /// element, and `""` otherwise.
    pub fn name(&self) -> &str {
        match self.elements.last() {
            Some(PathElement::Prim(name)) | Some(PathElement::Property(name)) => name,
            Some(PathElement::Parent) => "..",
            _ => "",
        }
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Returns the parent path. The parent of `/` is empty; the parent of a
    /// relative path that climbs is one more `..`.
    pub fn parent_path(&self) -> Path {
        match self.anchor {
            Anchor::Empty => Path::empty(),
            Anchor::Absolute => {
                if self.elements.is_empty() {
                    return Path::empty();
                }
                let mut parent = self.clone();
                parent.elements.pop();
                parent
            }
            Anchor::Relative => {
                let mut parent = self.clone();
                match self.elements.last() {
                    None | Some(PathElement::Parent) => parent.elements.push(PathElement::Parent),
                    Some(_) => {
                        parent.elements.pop();
                    }
                }
                parent
            }
        }
    }

    /// Strips properties, targets and trailing variant selections, leaving
    /// the leafmost prim path.
    pub fn prim_path(&self) -> Path {
        if self.is_empty() {
            return Path::empty();
        }
        let keep = self
            .elements
            .iter()
            .rposition(|e| matches!(e, PathElement::Prim(_) | PathElement::Parent))
            .map_or(0, |i| i + 1);
        Path {
            anchor: self.anchor,
            elements: self.elements[..keep].to_vec(),
        }
    }

    /// Appends a child prim name.
    pub fn append_child(&self, name: &str) -> Option<Path> {
        if !is_valid_identifier(name) {
            return None;
        }
        self.append_element(PathElement::Prim(name.to_string()))
    }

    /// Appends a property name.
    pub fn append_property(&self, name: &str) -> Option<Path> {
        if !is_valid_namespaced_identifier(name) {
            return None;
        }
        self.append_element(PathElement::Property(name.to_string()))
    }

    /// Appends a variant selection to a prim path.
    pub fn append_variant_selection(&self, set: &str, selection: &str) -> Option<Path> {
        if !is_valid_identifier(set) || !selection.chars().all(is_variant_char) {
            return None;
        }
        self.append_element(PathElement::VariantSelection {
            set: set.to_string(),
            selection: selection.to_string(),
        })
    }

    /// Appends a target path to a property path.
    pub fn append_target(&self, target: &Path) -> Option<Path> {
        if target.is_empty() {
            return None;
        }
        self.append_element(PathElement::Target(Box::new(target.clone())))
    }

    /// Appends the relative path `suffix`, resolving its leading `..`
    /// elements against this path.
    pub fn append_path(&self, suffix: &Path) -> Option<Path> {
        if self.is_empty() || suffix.anchor != Anchor::Relative {
            return None;
        }
        let mut result = self.clone();
        for element in &suffix.elements {
            if *element == PathElement::Parent {
                match result.elements.last() {
                    Some(PathElement::Prim(_)) | Some(PathElement::VariantSelection { .. }) => {
                        result.elements.pop();
                    }
                    None | Some(PathElement::Parent) if result.anchor == Anchor::Relative => {
                        result.elements.push(PathElement::Parent);
                    }
                    _ => return None,
                }
            } else {
                result = result.append_element(element.clone())?;
            }
        }
        Some(result)
    }

    /// Resolves a relative path against an absolute `anchor`. Absolute paths
    /// are returned unchanged.
    pub fn make_absolute(&self, anchor: &Path) -> Option<Path> {
        if self.is_absolute() {
            return Some(self.clone());
        }
        if self.is_empty() || !anchor.is_absolute() {
            return None;
        }
        anchor.append_path(self)
    }

    /// Returns true if `prefix` is a leading sub-path of this path.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        !self.is_empty()
            && self.anchor == prefix.anchor
            && self.elements.len() >= prefix.elements.len()
            && self.elements[..prefix.elements.len()] == prefix.elements[..]
    }

    /// Replaces the prefix `old` with `new`, also fixing up target paths in
    /// the remaining elements.
    pub fn replace_prefix(&self, old: &Path, new: &Path) -> Path {
        let (mut result, fixed_from) = if self.has_prefix(old) {
            let mut elements = new.elements.clone();
            elements.extend_from_slice(&self.elements[old.elements.len()..]);
            (
                Path {
                    anchor: new.anchor,
                    elements,
                },
                new.elements.len(),
            )
        } else {
            (self.clone(), 0)
        };
        for element in &mut result.elements[fixed_from..] {
            if let PathElement::Target(target) = element {
                **target = target.replace_prefix(old, new);
            }
        }
        result
    }

    fn append_element(&self, element: PathElement) -> Option<Path> {
        if !can_follow(self.anchor, self.elements.last(), &element) {
            return None;
        }
        let mut result = self.clone();
        result.elements.push(element);
        Some(result)
    }
}

fn can_follow(anchor: Anchor, prev: Option<&PathElement>, next: &PathElement) -> bool {
    use PathElement::*;
    if anchor == Anchor::Empty {
        return false;
    }
    match (prev, next) {
        (_, Parent) => false,
        (None, Prim(_)) => true,
        (Some(Prim(_) | Parent | VariantSelection { .. }), Prim(_)) => true,
        (Some(Prim(_) | VariantSelection { .. }), VariantSelection { .. }) => true,
        (None, Property(_)) => anchor == Anchor::Relative,
        (Some(Prim(_) | Parent | VariantSelection { .. } | Target(_)), Property(_)) => true,
        (Some(Property(_)), Target(_)) => true,
        _ => false,
    }
}

/// Returns true if `name` is a valid prim or variant set identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` is a valid, possibly `:`-namespaced, property name.
pub fn is_valid_namespaced_identifier(name: &str) -> bool {
    !name.is_empty() && name.split(':').all(is_valid_identifier)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_variant_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '|')
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn rest_starts_with(&self, prefix: &str) -> bool {
        self.text[self.pos..].starts_with(prefix)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, found: char) -> PathParseError {
        PathParseError::UnexpectedChar {
            text: self.text.to_string(),
            offset: self.pos,
            found,
        }
    }

    fn expect(&mut self, c: char, context: &'static str) -> Result<(), PathParseError> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(self.unexpected(found)),
            None => Err(PathParseError::UnexpectedEnd {
                text: self.text.to_string(),
                context,
            }),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn identifier(&mut self, namespaced: bool, context: &'static str) -> Result<String, PathParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(found) => return Err(self.unexpected(found)),
            None => {
                return Err(PathParseError::UnexpectedEnd {
                    text: self.text.to_string(),
                    context,
                });
            }
        }
        let name = self
            .take_while(|c| is_ident_char(c) || (namespaced && c == ':'))
            .to_string();
        if namespaced && !is_valid_namespaced_identifier(&name) {
            return Err(PathParseError::UnexpectedChar {
                text: self.text.to_string(),
                offset: start,
                found: ':',
            });
        }
        Ok(name)
    }

    fn push(&self, path: &mut Path, element: PathElement, at: usize) -> Result<(), PathParseError> {
        if !can_follow(path.anchor, path.elements.last(), &element) {
            let found = self.text[at..].chars().next().unwrap_or(' ');
            return Err(PathParseError::UnexpectedChar {
                text: self.text.to_string(),
                offset: at,
                found,
            });
        }
        path.elements.push(element);
        Ok(())
    }

    fn parse_path(&mut self) -> Result<Path, PathParseError> {
        let mut path = if self.eat('/') {
            Path::absolute_root()
        } else {
            Path::reflexive()
        };

        if path.anchor == Anchor::Relative {
            while self.rest_starts_with("..") {
                self.pos += 2;
                path.elements.push(PathElement::Parent);
                if !self.eat('/') {
                    break;
                }
            }
        }

        loop {
            let at = self.pos;
            match self.peek() {
                None | Some(']') => break,
                Some('.') => {
                    if self.rest_starts_with("..") {
                        return Err(PathParseError::MisplacedParent {
                            text: self.text.to_string(),
                        });
                    }
                    self.pos += 1;
                    if path.anchor == Anchor::Relative
                        && path.elements.is_empty()
                        && matches!(self.peek(), None | Some(']'))
                    {
                        break;
                    }
                    let name = self.identifier(true, "property name")?;
                    self.push(&mut path, PathElement::Property(name), at)?;
                }
                Some('/') => {
                    if path.elements.is_empty() && path.anchor == Anchor::Absolute {
                        return Err(self.unexpected('/'));
                    }
                    self.pos += 1;
                    if self.rest_starts_with("..") {
                        return Err(PathParseError::MisplacedParent {
                            text: self.text.to_string(),
                        });
                    }
                    let name = self.identifier(false, "prim name")?;
                    if !matches!(path.elements.last(), Some(PathElement::Prim(_) | PathElement::Parent)) {
                        return Err(self.unexpected('/'));
                    }
                    self.push(&mut path, PathElement::Prim(name), at)?;
                }
                Some('{') => {
                    self.pos += 1;
                    let set = self.identifier(false, "variant set name")?;
                    self.expect('=', "variant selection")?;
                    let selection = self.take_while(is_variant_char).to_string();
                    self.expect('}', "variant selection")?;
                    self.push(&mut path, PathElement::VariantSelection { set, selection }, at)?;
                }
                Some('[') => {
                    self.pos += 1;
                    let target = self.parse_path()?;
                    if !self.eat(']') {
                        return Err(PathParseError::UnbalancedBrackets {
                            text: self.text.to_string(),
                        });
                    }
                    if target.is_empty() || (target.is_relative_reflexive()) {
                        return Err(self.unexpected(']'));
                    }
                    self.push(&mut path, PathElement::Target(Box::new(target)), at)?;
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let name = self.identifier(false, "prim name")?;
                    self.push(&mut path, PathElement::Prim(name), at)?;
                }
                Some(found) => return Err(self.unexpected(found)),
            }
        }
        Ok(path)
    }
}

impl Path {
    fn is_relative_reflexive(&self) -> bool {
        self.anchor == Anchor::Relative && self.elements.is_empty()
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Empty => return Ok(()),
            Anchor::Absolute => f.write_str("/")?,
            Anchor::Relative if self.elements.is_empty() => return f.write_str("."),
            Anchor::Relative => {}
        }
        let mut prev: Option<&PathElement> = None;
        for element in &self.elements {
            match element {
                PathElement::Parent => {
                    if prev.is_some() {
                        f.write_str("/")?;
                    }
                    f.write_str("..")?;
                }
                PathElement::Prim(name) => {
                    if matches!(prev, Some(PathElement::Prim(_) | PathElement::Parent)) {
                        f.write_str("/")?;
                    }
                    f.write_str(name)?;
                }
                PathElement::VariantSelection { set, selection } => {
                    write!(f, "{{{set}={selection}}}")?;
                }
                PathElement::Property(name) => write!(f, ".{name}")?,
                PathElement::Target(target) => write!(f, "[{target}]")?,
            }
            prev = Some(element);
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{self}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for text in [
            "/",
            ".",
            "/World",
            "/World/Chair",
            "/World/Chair.size",
            "/World.rel[/Other/Prim]",
            "/World.rel[/Other.attr]",
            "/Model{shading=red}Geom",
            "/Model{lod=}",
            "../Sibling",
            "../..",
            ".attr",
            "Child/Grandchild.ns:attr",
        ] {
            assert_eq!(p(text).to_string(), text, "roundtrip of {text}");
        }
        assert!(p("").is_empty());
    }

    #[test]
    fn test_parse_errors() {
        for text in ["//A", "/A/", "/A.b/C", "/A[/B]", "/A/../B", "/A.rel[/B", "/A.rel]", "/1A", "/A.b:"] {
            assert!(Path::parse(text).is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn test_classification() {
        assert!(p("/").is_absolute_root());
        assert!(!p("/").is_prim_path());
        assert!(p("/A").is_prim_path());
        assert!(p(".").is_prim_path());
        assert!(p("/A.b").is_property_path());
        assert!(p("/A.b[/C]").is_target_path());
        assert_eq!(p("/A.b[/C]").target_path(), Some(&p("/C")));
        assert!(p("/A{v=x}B").contains_prim_variant_selection());
        assert!(p("/A{v=x}").is_prim_variant_selection_path());
        assert_eq!(p("/A/B.c").name(), "c");
        assert_eq!(p("/A/B").name(), "B");
    }

    #[test]
    fn test_parent_and_prim_path() {
        assert_eq!(p("/A/B").parent_path(), p("/A"));
        assert_eq!(p("/A").parent_path(), p("/"));
        assert!(p("/").parent_path().is_empty());
        assert_eq!(p("A").parent_path(), p("."));
        assert_eq!(p(".").parent_path(), p(".."));
        assert_eq!(p("..").parent_path(), p("../.."));
        assert_eq!(p("/A/B.rel[/C]").prim_path(), p("/A/B"));
        assert_eq!(p("/A{v=x}").prim_path(), p("/A"));
        assert_eq!(p("/A.b").prim_path(), p("/A"));
        assert_eq!(p("/").prim_path(), p("/"));
    }

    #[test]
    fn test_append() {
        assert_eq!(p("/").append_child("A"), Some(p("/A")));
        assert_eq!(p("/A").append_property("ns:b"), Some(p("/A.ns:b")));
        assert_eq!(p("/A.rel").append_target(&p("/B")), Some(p("/A.rel[/B]")));
        assert_eq!(p("/A").append_variant_selection("v", "x"), Some(p("/A{v=x}")));
        assert_eq!(p("/A.b").append_child("C"), None);
        assert_eq!(p("/A").append_target(&p("/B")), None);
        assert_eq!(p("/A").append_child("not valid"), None);
    }

    #[test]
    fn test_make_absolute() {
        let anchor = p("/Foo");
        assert_eq!(p("Bar").make_absolute(&anchor), Some(p("/Foo/Bar")));
        assert_eq!(p("../Bar").make_absolute(&anchor), Some(p("/Bar")));
        assert_eq!(p(".attr").make_absolute(&anchor), Some(p("/Foo.attr")));
        assert_eq!(p(".").make_absolute(&anchor), Some(p("/Foo")));
        assert_eq!(p("/Abs").make_absolute(&anchor), Some(p("/Abs")));
        assert_eq!(p("../../X").make_absolute(&anchor), None);
        assert_eq!(p("Bar").make_absolute(&p("Rel")), None);
    }

    #[test]
    fn test_prefixes() {
        assert!(p("/A/B.c").has_prefix(&p("/A")));
        assert!(p("/A").has_prefix(&p("/")));
        assert!(!p("/AB").has_prefix(&p("/A")));
        assert!(!p("A").has_prefix(&p("/")));
        assert_eq!(p("/A/B.c").replace_prefix(&p("/A"), &p("/X")), p("/X/B.c"));
        assert_eq!(
            p("/Other.rel[/A/B]").replace_prefix(&p("/A"), &p("/X")),
            p("/Other.rel[/X/B]")
        );
        assert_eq!(p("/Q").replace_prefix(&p("/A"), &p("/X")), p("/Q"));
    }

    #[test]
    fn test_ordering_is_total() {
        let mut paths = vec![p("/B"), p("/A/C"), p("/A"), p("/A.x")];
        paths.sort();
        assert_eq!(paths[0], p("/A"));
    }
}
