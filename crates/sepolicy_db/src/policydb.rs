//! In-memory policy database.
//!
//! Types and attributes share one symbol table. Values are dense and start
//! at 1; the bit index used by both bitmap matrices is `value - 1`, and the
//! table's insertion order is its value order, so the value→name lookup is
//! a positional lookup.

use indexmap::IndexMap;
use sepolicy_core::{CoreError, CoreResult, Ebitmap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy version stamped on freshly created databases
pub const DEFAULT_POLICY_VERSION: u32 = 30;

/// Kind of a type table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFlavor {
    /// A concrete type
    Type,
    /// A named group of types
    Attribute,
}

impl fmt::Display for TypeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Attribute => write!(f, "attribute"),
        }
    }
}

/// Type table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDatum {
    /// Dense value, starting at 1
    pub value: u32,
    /// Type or attribute
    pub flavor: TypeFlavor,
}

impl TypeDatum {
    /// Bit index of this entry in the bitmap matrices
    #[must_use]
    pub const fn bit(&self) -> u32 {
        self.value - 1
    }

    /// Check whether this entry is a concrete type
    #[must_use]
    pub const fn is_type(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Type)
    }

    /// Check whether this entry is an attribute
    #[must_use]
    pub const fn is_attribute(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Attribute)
    }
}

/// Decoded policy database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDatabase {
    /// Policy version
    version: u32,
    /// Type table, in value order
    types: IndexMap<String, TypeDatum>,
    /// Attributes of each type, indexed by type bit
    type_attr_map: Vec<Ebitmap>,
    /// Types of each attribute, indexed by attribute bit
    attr_type_map: Vec<Ebitmap>,
}

impl PolicyDatabase {
    /// Create an empty database
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            types: IndexMap::new(),
            type_attr_map: Vec::new(),
            attr_type_map: Vec::new(),
        }
    }

    /// Policy version
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Number of type table entries
    #[must_use]
    pub fn type_count(&self) -> u32 {
        // Bounded by `declare`, which refuses to grow past u32::MAX entries
        self.types.len() as u32
    }

    /// Look up a type table entry by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&TypeDatum> {
        self.types.get(name)
    }

    /// Resolve a bit index back to its name
    #[must_use]
    pub fn type_val_to_name(&self, bit: u32) -> Option<&str> {
        self.types
            .get_index(bit as usize)
            .map(|(name, _)| name.as_str())
    }

    /// Iterate the type table in value order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDatum)> {
        self.types.iter().map(|(name, datum)| (name.as_str(), datum))
    }

    /// Attributes assigned to the type at `bit`
    #[must_use]
    pub fn type_attr_map(&self, bit: u32) -> Option<&Ebitmap> {
        self.type_attr_map.get(bit as usize)
    }

    /// Types possessing the attribute at `bit`
    #[must_use]
    pub fn attr_type_map(&self, bit: u32) -> Option<&Ebitmap> {
        self.attr_type_map.get(bit as usize)
    }

    /// Declare a new type table entry, assigning the next value
    ///
    /// # Errors
    ///
    /// Returns error if the name is already declared
    pub fn declare(&mut self, name: &str, flavor: TypeFlavor) -> CoreResult<TypeDatum> {
        if self.types.contains_key(name) {
            return Err(CoreError::AlreadyExists {
                kind: flavor.to_string(),
                id: name.to_string(),
            });
        }
        let value = self
            .type_count()
            .checked_add(1)
            .ok_or_else(|| CoreError::Internal {
                message: "type table is full".to_string(),
            })?;

        let datum = TypeDatum { value, flavor };
        self.types.insert(name.to_string(), datum);
        self.type_attr_map.push(Ebitmap::new());
        self.attr_type_map.push(Ebitmap::new());

        tracing::trace!(name, value, %flavor, "declared");
        Ok(datum)
    }

    /// Declare a concrete type
    ///
    /// # Errors
    ///
    /// Returns error if the name is already declared
    pub fn declare_type(&mut self, name: &str) -> CoreResult<TypeDatum> {
        self.declare(name, TypeFlavor::Type)
    }

    /// Declare an attribute
    ///
    /// # Errors
    ///
    /// Returns error if the name is already declared
    pub fn declare_attribute(&mut self, name: &str) -> CoreResult<TypeDatum> {
        self.declare(name, TypeFlavor::Attribute)
    }

    /// Record that `type_name` has attribute `attr_name`
    ///
    /// Both matrices are updated together.
    ///
    /// # Errors
    ///
    /// Returns error if either name is unknown or has the wrong flavor
    pub fn assign_attribute(&mut self, type_name: &str, attr_name: &str) -> CoreResult<()> {
        let ty = self.expect_flavor(type_name, TypeFlavor::Type)?;
        let attr = self.expect_flavor(attr_name, TypeFlavor::Attribute)?;

        self.type_attr_map[ty.bit() as usize].set_bit(attr.bit(), true);
        self.attr_type_map[attr.bit() as usize].set_bit(ty.bit(), true);
        Ok(())
    }

    fn expect_flavor(&self, name: &str, flavor: TypeFlavor) -> CoreResult<TypeDatum> {
        let datum = *self.lookup(name).ok_or_else(|| CoreError::NotFound {
            kind: flavor.to_string(),
            id: name.to_string(),
        })?;
        if datum.flavor != flavor {
            return Err(CoreError::Validation {
                field: name.to_string(),
                reason: format!("is a {} not a {}", datum.flavor, flavor),
            });
        }
        Ok(datum)
    }

    /// Check structural consistency
    ///
    /// Values must be dense and in table order, both matrices must be sized
    /// to the table, every bit must point at an entry of the opposite
    /// flavor, and the matrices must be transposes of each other.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found
    pub fn validate(&self) -> CoreResult<()> {
        let count = self.types.len();

        for (index, (name, datum)) in self.types.iter().enumerate() {
            if datum.value as usize != index + 1 {
                return Err(CoreError::Validation {
                    field: name.clone(),
                    reason: format!("value {} at position {}", datum.value, index + 1),
                });
            }
        }

        if self.type_attr_map.len() != count || self.attr_type_map.len() != count {
            return Err(CoreError::Validation {
                field: "bitmaps".to_string(),
                reason: format!(
                    "{} types but {}/{} bitmap rows",
                    count,
                    self.type_attr_map.len(),
                    self.attr_type_map.len()
                ),
            });
        }

        self.validate_rows(&self.type_attr_map, TypeFlavor::Type, &self.attr_type_map)?;
        self.validate_rows(&self.attr_type_map, TypeFlavor::Attribute, &self.type_attr_map)
    }

    fn validate_rows(
        &self,
        rows: &[Ebitmap],
        row_flavor: TypeFlavor,
        transpose: &[Ebitmap],
    ) -> CoreResult<()> {
        let limit = self.type_count();

        for (row, ((name, datum), map)) in self.types.iter().zip(rows).enumerate() {
            map.validate()?;
            if datum.flavor != row_flavor && !map.is_empty() {
                return Err(CoreError::Validation {
                    field: name.clone(),
                    reason: format!("{} has a {} bitmap row", datum.flavor, row_flavor),
                });
            }

            for bit in map.iter() {
                let (_, target) = self
                    .types
                    .get_index(bit as usize)
                    .ok_or(CoreError::BitOutOfRange { bit, limit })?;
                if target.flavor == row_flavor {
                    return Err(CoreError::Validation {
                        field: name.clone(),
                        reason: format!("bit {} names another {}", bit, row_flavor),
                    });
                }
                if !transpose[bit as usize].get_bit(row as u32) {
                    return Err(CoreError::Validation {
                        field: name.clone(),
                        reason: format!("bit {} has no transposed entry", bit),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for PolicyDatabase {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_VERSION)
    }
}
