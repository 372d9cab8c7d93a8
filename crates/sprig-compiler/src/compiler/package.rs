// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package tree and subroutine signatures.

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::Label;
use crate::compiler::codegen::CodeGen;
use crate::types::TypeInfo;

/// Index of a package in the tree.
pub type PackageId = usize;

/// Separator between package path components.
pub const PATH_SEPARATOR: &str = "::";

/// Namespace kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Plain package
    Package,
    /// Module; may export subroutines
    Module,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SubParam {
    /// Name with sigil
    pub name: String,
    /// Static type, `TypeInfo::None` if unannotated
    pub ty: TypeInfo,
    /// The caller's value is copied before binding
    pub copy: bool,
}

/// Everything known about one subroutine.
#[derive(Debug, Clone)]
pub struct SubroutineInfo {
    /// Set once the body has been emitted
    pub marked: bool,
    /// Set once a declaration has been seen (pre-pass or body)
    pub declared: bool,
    /// Entry point
    pub label: Label,
    /// Undecorated name
    pub name: String,
    /// Declared parameters
    pub params: Vec<SubParam>,
    /// Declared return type
    pub return_type: TypeInfo,
    /// The body reads `@_`
    pub uses_arg_list: bool,
}

impl SubroutineInfo {
    fn new(name: &str, label: Label) -> Self {
        Self {
            marked: false,
            declared: false,
            label,
            name: name.to_string(),
            params: Vec::new(),
            return_type: TypeInfo::None,
            uses_arg_list: false,
        }
    }
}

#[derive(Debug)]
struct Package {
    name: String,
    kind: PackageKind,
    parent: Option<PackageId>,
    subs: FxHashMap<String, SubroutineInfo>,
    children: FxHashMap<String, PackageId>,
}

/// Arena of packages rooted at [`PackageTree::ROOT`].
#[derive(Debug)]
pub struct PackageTree {
    packages: Vec<Package>,
}

impl Default for PackageTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips every package qualifier from `name`.
pub fn strip_packages(name: &str) -> &str {
    name.rsplit(PATH_SEPARATOR).next().unwrap_or(name)
}

impl PackageTree {
    /// The unnamed root package.
    pub const ROOT: PackageId = 0;

    /// Creates a tree holding only the root package.
    pub fn new() -> Self {
        Self {
            packages: vec![Package {
                name: String::new(),
                kind: PackageKind::Package,
                parent: None,
                subs: FxHashMap::default(),
                children: FxHashMap::default(),
            }],
        }
    }

    /// Kind of a package.
    pub fn kind(&self, id: PackageId) -> PackageKind {
        self.packages[id].kind
    }

    /// Parent of a package; `None` for the root.
    pub fn parent(&self, id: PackageId) -> Option<PackageId> {
        self.packages[id].parent
    }

    /// Absolute path, empty for the root.
    pub fn path(&self, id: PackageId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(index) = current {
            let package = &self.packages[index];
            if package.parent.is_some() {
                parts.push(package.name.as_str());
            }
            current = package.parent;
        }
        parts.reverse();
        parts.join(PATH_SEPARATOR)
    }

    /// Absolute name of `name` declared in `id`.
    pub fn qualify(&self, id: PackageId, name: &str) -> String {
        let path = self.path(id);
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", path, PATH_SEPARATOR, name)
        }
    }

    fn child(&self, id: PackageId, name: &str) -> Option<PackageId> {
        self.packages[id].children.get(name).copied()
    }

    /// Enters (creating as needed) the package at `path` relative to `from`.
    ///
    /// Intermediate components are created as plain packages; the final one
    /// gets `kind`, and an existing package is upgraded to a module when a
    /// module declaration names it.
    pub fn enter_path(&mut self, from: PackageId, path: &str, kind: PackageKind) -> PackageId {
        let components: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let last = components.len() - 1;
        let mut current = from;
        for (i, component) in components.into_iter().enumerate() {
            let wanted = if i == last { kind } else { PackageKind::Package };
            current = match self.child(current, component) {
                Some(existing) => {
                    if wanted == PackageKind::Module {
                        self.packages[existing].kind = PackageKind::Module;
                    }
                    existing
                }
                None => {
                    let id = self.packages.len();
                    self.packages.push(Package {
                        name: component.to_string(),
                        kind: wanted,
                        parent: Some(current),
                        subs: FxHashMap::default(),
                        children: FxHashMap::default(),
                    });
                    self.packages[current]
                        .children
                        .insert(component.to_string(), id);
                    id
                }
            };
        }
        current
    }

    /// Returns the signature of `name` in `id`, creating an unmarked one if absent.
    pub fn get_or_create_sub(
        &mut self,
        id: PackageId,
        name: &str,
        codegen: &mut CodeGen,
    ) -> &mut SubroutineInfo {
        self.packages[id]
            .subs
            .entry(name.to_string())
            .or_insert_with(|| SubroutineInfo::new(name, codegen.create_label()))
    }

    /// Mutable access to a signature declared directly in `id`.
    pub fn sub_mut(&mut self, id: PackageId, name: &str) -> Option<&mut SubroutineInfo> {
        self.packages[id].subs.get_mut(name)
    }

    /// Looks `name` up in `id` without walking outward.
    ///
    /// A qualified name first descends through the named sub-packages. The
    /// package that owns the match is returned with it.
    pub fn find_sub(&self, id: PackageId, name: &str) -> Option<(PackageId, &SubroutineInfo)> {
        let (owner, base) = match name.rsplit_once(PATH_SEPARATOR) {
            Some((path, base)) => {
                let mut current = id;
                for component in path.split(PATH_SEPARATOR) {
                    current = self.child(current, component)?;
                }
                (current, base)
            }
            None => (id, name),
        };
        self.packages[owner]
            .subs
            .get(base)
            .filter(|info| info.declared)
            .map(|info| (owner, info))
    }

    /// Resolves a call from `from`, trying each enclosing package in turn.
    pub fn resolve_sub(&self, from: PackageId, name: &str) -> Option<(PackageId, &SubroutineInfo)> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(found) = self.find_sub(id, name) {
                return Some(found);
            }
            current = self.packages[id].parent;
        }
        None
    }

    /// Nearest module at or above `from`.
    pub fn find_enclosing_module(&self, from: PackageId) -> Option<PackageId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.packages[id].kind == PackageKind::Module {
                return Some(id);
            }
            current = self.packages[id].parent;
        }
        None
    }

    /// Every signature in the tree with the package that owns it.
    pub fn iter_subroutines(&self) -> impl Iterator<Item = (PackageId, &SubroutineInfo)> {
        self.packages
            .iter()
            .enumerate()
            .flat_map(|(id, package)| package.subs.values().map(move |info| (id, info)))
    }
}
