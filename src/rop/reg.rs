//! Register descriptors and local-variable bindings.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::rop::types::{Type, TypeBearer};

/// A string interner backed by a concurrent map.
///
/// Local-variable names and signatures repeat heavily across the methods of
/// a translation unit; interning them keeps [`RegisterSpec`] cloning cheap
/// (an `Arc` bump) and makes name equality a pointer comparison in the
/// common case. The interner is shared across worker threads.
#[derive(Debug, Default)]
pub struct Interner {
    strings: DashMap<Arc<str>, ()>,
}

impl Interner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning a shared handle to the canonical copy.
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(entry) = self.strings.get(s) {
            return Arc::clone(entry.key());
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc), ());
        arc
    }

    /// Returns the number of distinct strings interned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// A debug binding tying a register to a source-level local variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalInfo {
    /// The variable's source name.
    pub name: Arc<str>,
    /// The variable's declared type signature.
    pub signature: Arc<str>,
}

impl LocalInfo {
    /// Creates a new local binding from interned strings.
    #[must_use]
    pub fn new(name: Arc<str>, signature: Arc<str>) -> Self {
        Self { name, signature }
    }
}

impl fmt::Display for LocalInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\":{}", self.name, self.signature)
    }
}

/// A register operand: a register number, the type (or constant) it bears,
/// and an optional local-variable binding.
///
/// Register specs are immutable values; passes that change a register's
/// bearer or binding build a fresh spec with the `with_*` helpers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterSpec {
    /// The register number.
    pub reg: u32,
    /// The type or constant carried by the register.
    pub bearer: TypeBearer,
    /// Source-level variable bound to this register, if known.
    pub local: Option<LocalInfo>,
}

impl RegisterSpec {
    /// Creates a spec with no local binding.
    #[must_use]
    pub fn new(reg: u32, bearer: TypeBearer) -> Self {
        Self {
            reg,
            bearer,
            local: None,
        }
    }

    /// Creates a spec bound to a local variable.
    #[must_use]
    pub fn new_local(reg: u32, bearer: TypeBearer, local: LocalInfo) -> Self {
        Self {
            reg,
            bearer,
            local: Some(local),
        }
    }

    /// Returns the type carried by this register.
    #[must_use]
    pub fn get_type(&self) -> Type {
        self.bearer.get_type()
    }

    /// Returns the value category of the carried type.
    #[must_use]
    pub fn category(&self) -> u32 {
        self.get_type().category()
    }

    /// Returns a copy renumbered to `reg`, keeping bearer and binding.
    #[must_use]
    pub fn with_reg(&self, reg: u32) -> Self {
        Self {
            reg,
            bearer: self.bearer.clone(),
            local: self.local.clone(),
        }
    }

    /// Returns a copy with a different bearer, keeping number and binding.
    #[must_use]
    pub fn with_bearer(&self, bearer: TypeBearer) -> Self {
        Self {
            reg: self.reg,
            bearer,
            local: self.local.clone(),
        }
    }

    /// Returns a copy carrying the given local binding.
    #[must_use]
    pub fn with_local(&self, local: Option<LocalInfo>) -> Self {
        Self {
            reg: self.reg,
            bearer: self.bearer.clone(),
            local,
        }
    }

    /// Returns `true` if the two specs name the same register.
    #[must_use]
    pub const fn same_reg(&self, other: &Self) -> bool {
        self.reg == other.reg
    }

    /// Returns the first register number past this operand, accounting for
    /// category-2 values occupying a register pair.
    #[must_use]
    pub fn next_reg(&self) -> u32 {
        self.reg + self.category()
    }
}

impl fmt::Display for RegisterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.reg)?;
        if let Some(local) = &self.local {
            write!(f, "({local})")?;
        }
        write!(f, ":{}", self.bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::types::Constant;

    #[test]
    fn test_interner_dedup() {
        let interner = Interner::new();
        let a = interner.intern("x");
        let b = interner.intern("x");
        let c = interner.intern("y");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_spec_renumber_keeps_binding() {
        let interner = Interner::new();
        let local = LocalInfo::new(interner.intern("i"), interner.intern("I"));
        let spec = RegisterSpec::new_local(3, TypeBearer::Type(Type::Int), local.clone());

        let renumbered = spec.with_reg(17);
        assert_eq!(renumbered.reg, 17);
        assert_eq!(renumbered.local, Some(local));
        assert_eq!(renumbered.get_type(), Type::Int);
    }

    #[test]
    fn test_next_reg_wide() {
        let narrow = RegisterSpec::new(4, TypeBearer::Type(Type::Int));
        let wide = RegisterSpec::new(4, TypeBearer::Type(Type::Long));
        assert_eq!(narrow.next_reg(), 5);
        assert_eq!(wide.next_reg(), 6);
    }

    #[test]
    fn test_display() {
        let spec = RegisterSpec::new(2, TypeBearer::Constant(Constant::Int(5)));
        assert_eq!(spec.to_string(), "v2:Int=#5");
    }
}
