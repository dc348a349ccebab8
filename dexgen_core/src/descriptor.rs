//! DEX type descriptors and method prototypes.
//!
//! Both types order lexicographically over their descriptor representation,
//! so they can serve as keys in the ordered interning maps: two identical
//! signatures collapse to one interned id no matter where in the program
//! they were first mentioned.

use smallvec::SmallVec;
use std::fmt;

/// A canonical DEX type descriptor, such as `I` or `Ljava/lang/Object;`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeDescriptor {
    descriptor: String,
}

impl TypeDescriptor {
    /// The `int` primitive.
    pub fn int() -> Self {
        Self {
            descriptor: "I".to_owned(),
        }
    }

    /// The `void` pseudo-type.
    pub fn void() -> Self {
        Self {
            descriptor: "V".to_owned(),
        }
    }

    /// The `boolean` primitive.
    pub fn boolean() -> Self {
        Self {
            descriptor: "Z".to_owned(),
        }
    }

    /// `java.lang.Object`.
    pub fn object() -> Self {
        Self::from_classname("java.lang.Object")
    }

    /// Build a class descriptor from a fully-qualified class name, turning
    /// `java.lang.Object` into `Ljava/lang/Object;`.
    pub fn from_classname(name: &str) -> Self {
        let mut descriptor = String::with_capacity(name.len() + 2);
        descriptor.push('L');
        for c in name.chars() {
            descriptor.push(if c == '.' { '/' } else { c });
        }
        descriptor.push(';');
        Self { descriptor }
    }

    /// The full descriptor string.
    #[inline]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The one-character short form: `I` for `I`, `L` for any class type.
    #[inline]
    pub fn short_descriptor(&self) -> char {
        self.descriptor.chars().next().unwrap_or('V')
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

/// Parameter lists are short in practice; four fit inline.
type ParamVec = SmallVec<[TypeDescriptor; 4]>;

/// A method signature: a return type and an ordered parameter list.
///
/// `Prototype::new(TypeDescriptor::void(), [TypeDescriptor::int()])`
/// represents the function type `(int) -> void`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prototype {
    return_type: TypeDescriptor,
    param_types: ParamVec,
}

impl Prototype {
    /// Create a prototype from a return type and parameter types.
    pub fn new(
        return_type: TypeDescriptor,
        param_types: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Self {
        Self {
            return_type,
            param_types: param_types.into_iter().collect(),
        }
    }

    /// The return type.
    #[inline]
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// The parameter types, in declaration order.
    #[inline]
    pub fn param_types(&self) -> &[TypeDescriptor] {
        &self.param_types
    }

    /// Derive the shorty signature string: return type first, then one
    /// character per parameter. `(int, int) -> void` yields `VII`.
    pub fn shorty(&self) -> String {
        let mut shorty = String::with_capacity(self.param_types.len() + 1);
        shorty.push(self.return_type.short_descriptor());
        for param in &self.param_types {
            shorty.push(param.short_descriptor());
        }
        shorty
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.param_types {
            f.write_str(param.descriptor())?;
        }
        write!(f, "){}", self.return_type)
    }
}
