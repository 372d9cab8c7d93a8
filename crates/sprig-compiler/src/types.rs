// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static type descriptors and the compatibility check.
//!
//! Deduction is best-effort: `TypeInfo::None` means the compiler could not
//! tell, and every check against a known type then falls back to a runtime
//! coercion instead of an error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A static type tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeInfo {
    /// Statically unknown
    #[default]
    None,
    /// Any value
    Any,
    /// Integer
    Int,
    /// Floating point number
    Num,
    /// String
    Str,
    /// Boolean
    Bool,
    /// Array with an element type
    Array(Box<TypeInfo>),
    /// Hash
    Hash,
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// No conversion needed
    Identical,
    /// A runtime coercion must be emitted
    Castable,
    /// Compile-time error
    Incompatible,
}

impl TypeInfo {
    /// Array of the given element type.
    pub fn array_of(elem: TypeInfo) -> Self {
        TypeInfo::Array(Box::new(elem))
    }

    /// Whether the type is statically unknown.
    pub fn is_none(&self) -> bool {
        matches!(self, TypeInfo::None)
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeInfo::Int | TypeInfo::Num | TypeInfo::Str | TypeInfo::Bool
        )
    }

    /// Checks whether a value of this type can be used where `target` is expected.
    pub fn check_compatibility(&self, target: &TypeInfo) -> Compatibility {
        if matches!(target, TypeInfo::None | TypeInfo::Any) || self == target {
            return Compatibility::Identical;
        }

        match (self, target) {
            (TypeInfo::None | TypeInfo::Any, _) => Compatibility::Castable,
            (TypeInfo::Array(from), TypeInfo::Array(to)) => from.check_compatibility(to),
            (from, to) if from.is_scalar() && to.is_scalar() => Compatibility::Castable,
            _ => Compatibility::Incompatible,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::None => write!(f, "unknown"),
            TypeInfo::Any => write!(f, "Any"),
            TypeInfo::Int => write!(f, "Int"),
            TypeInfo::Num => write!(f, "Num"),
            TypeInfo::Str => write!(f, "Str"),
            TypeInfo::Bool => write!(f, "Bool"),
            TypeInfo::Array(elem) if elem.is_none() => write!(f, "Array"),
            TypeInfo::Array(elem) => write!(f, "Array[{}]", elem),
            TypeInfo::Hash => write!(f, "Hash"),
        }
    }
}
