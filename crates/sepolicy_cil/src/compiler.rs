//! Module database: collects parsed modules, resolves them once, and
//! amends a base policy database with the result.

use crate::lang::{ModuleParser, ParseError, Statement};
use indexmap::IndexMap;
use sepolicy_core::CoreError;
use sepolicy_db::{PolicyDatabase, TypeDatum, TypeFlavor};
use std::path::{Path, PathBuf};

/// Module compilation and amend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CilError {
    /// Source is not valid UTF-8
    #[error("{}: source is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },

    /// Source failed to parse
    #[error("{}:{source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// Modules were added or compiled after compilation
    #[error("module database is already compiled")]
    AlreadyCompiled,

    /// Amend requested before compilation
    #[error("module database has not been compiled")]
    NotCompiled,

    /// Same name declared twice across modules
    #[error("{name} is declared in both {} and {}", first.display(), second.display())]
    Duplicate {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Name already present in the base policy
    #[error("{name} is already declared in the base policy")]
    AlreadyDeclared { name: String },

    /// Name could not be resolved
    #[error("{}: {name} is not declared", path.display())]
    Unresolved { name: String, path: PathBuf },

    /// Name resolved to the wrong flavor
    #[error("{}: {name} is a {actual} not a {expected}", path.display())]
    KindMismatch {
        name: String,
        expected: TypeFlavor,
        actual: TypeFlavor,
        path: PathBuf,
    },

    /// Attribute lists itself as a member
    #[error("{}: {name} cannot contain itself", path.display())]
    SelfMembership { name: String, path: PathBuf },

    /// Attribute set with no members
    #[error("{}: typeattributeset {name} has no members", path.display())]
    EmptyMembers { name: String, path: PathBuf },

    /// The policy database rejected a change
    #[error("policy database: {0}")]
    Database(#[from] CoreError),
}

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Originating path
    pub path: PathBuf,
    /// Statements in source order
    pub statements: Vec<Statement>,
}

/// A name introduced by the module set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declared name
    pub name: String,
    /// Type or attribute
    pub flavor: TypeFlavor,
    /// Module that declared it
    pub origin: PathBuf,
}

/// A `typeattributeset` to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Target attribute
    pub attr: String,
    /// Listed members, types or attributes
    pub members: Vec<String>,
    /// Module that contains it
    pub origin: PathBuf,
}

/// Resolved module set, ready to amend a base
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledModules {
    /// Declarations in module order
    pub declarations: Vec<Declaration>,
    /// Assignments in module order
    pub assignments: Vec<Assignment>,
}

/// Counts reported by a successful amend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmendSummary {
    /// Names added to the type table
    pub declared: usize,
    /// New type/attribute pairs
    pub assigned: usize,
}

/// Incremental module database
#[derive(Debug, Default)]
pub struct ModuleDb {
    parser: ModuleParser,
    modules: Vec<Module>,
    compiled: Option<CompiledModules>,
}

impl ModuleDb {
    /// Create an empty module database
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed modules in submission order
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Compiled form, once [`ModuleDb::compile`] succeeded
    #[must_use]
    pub fn compiled(&self) -> Option<&CompiledModules> {
        self.compiled.as_ref()
    }

    /// Parse a source buffer and append it to the module set
    ///
    /// # Errors
    ///
    /// Returns error if the source is not UTF-8, does not parse, or the
    /// database is already compiled
    pub fn add_file(&mut self, path: impl AsRef<Path>, source: &[u8]) -> Result<(), CilError> {
        let path = path.as_ref();
        if self.compiled.is_some() {
            return Err(CilError::AlreadyCompiled);
        }

        let text = std::str::from_utf8(source).map_err(|_| CilError::NotUtf8 {
            path: path.to_path_buf(),
        })?;
        let statements = self.parser.parse(text).map_err(|source| CilError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), statements = statements.len(), "added module");
        self.modules.push(Module {
            path: path.to_path_buf(),
            statements,
        });
        Ok(())
    }

    /// Resolve the module set
    ///
    /// Checks that need the base policy are left to [`ModuleDb::amend`].
    ///
    /// # Errors
    ///
    /// Returns error on duplicate declarations, malformed attribute sets,
    /// or if already compiled
    pub fn compile(&mut self) -> Result<&CompiledModules, CilError> {
        if self.compiled.is_some() {
            return Err(CilError::AlreadyCompiled);
        }

        let mut declared: IndexMap<String, Declaration> = IndexMap::new();
        let mut assignments = Vec::new();

        for module in &self.modules {
            for statement in &module.statements {
                match statement {
                    Statement::Type { name, .. } | Statement::TypeAttribute { name, .. } => {
                        let flavor = if matches!(statement, Statement::Type { .. }) {
                            TypeFlavor::Type
                        } else {
                            TypeFlavor::Attribute
                        };
                        if let Some(first) = declared.get(name) {
                            return Err(CilError::Duplicate {
                                name: name.clone(),
                                first: first.origin.clone(),
                                second: module.path.clone(),
                            });
                        }
                        declared.insert(
                            name.clone(),
                            Declaration {
                                name: name.clone(),
                                flavor,
                                origin: module.path.clone(),
                            },
                        );
                    }
                    Statement::TypeAttributeSet { attr, members, .. } => {
                        if let Some(decl) = declared.get(attr) {
                            if decl.flavor != TypeFlavor::Attribute {
                                return Err(CilError::KindMismatch {
                                    name: attr.clone(),
                                    expected: TypeFlavor::Attribute,
                                    actual: decl.flavor,
                                    path: module.path.clone(),
                                });
                            }
                        }
                        if members.is_empty() {
                            return Err(CilError::EmptyMembers {
                                name: attr.clone(),
                                path: module.path.clone(),
                            });
                        }
                        if members.contains(attr) {
                            return Err(CilError::SelfMembership {
                                name: attr.clone(),
                                path: module.path.clone(),
                            });
                        }
                        assignments.push(Assignment {
                            attr: attr.clone(),
                            members: members.clone(),
                            origin: module.path.clone(),
                        });
                    }
                }
            }
        }

        tracing::debug!(
            modules = self.modules.len(),
            declarations = declared.len(),
            assignments = assignments.len(),
            "compiled module set"
        );

        Ok(&*self.compiled.insert(CompiledModules {
            declarations: declared.into_values().collect(),
            assignments,
        }))
    }

    /// Merge the compiled module set into `base`
    ///
    /// Changes are staged on a copy and committed only if every
    /// declaration and assignment applies, so a failed amend leaves
    /// `base` untouched.
    ///
    /// # Errors
    ///
    /// Returns error if not compiled, or if a name clashes with or cannot
    /// be resolved against the base
    pub fn amend(&self, base: &mut PolicyDatabase) -> Result<AmendSummary, CilError> {
        let compiled = self.compiled.as_ref().ok_or(CilError::NotCompiled)?;
        let mut staged = base.clone();
        let mut summary = AmendSummary::default();

        for decl in &compiled.declarations {
            if staged.lookup(&decl.name).is_some() {
                return Err(CilError::AlreadyDeclared {
                    name: decl.name.clone(),
                });
            }
            staged.declare(&decl.name, decl.flavor)?;
            summary.declared += 1;
        }

        for assignment in &compiled.assignments {
            let attr = resolve(&staged, &assignment.attr, &assignment.origin)?;
            if !attr.is_attribute() {
                return Err(CilError::KindMismatch {
                    name: assignment.attr.clone(),
                    expected: TypeFlavor::Attribute,
                    actual: attr.flavor,
                    path: assignment.origin.clone(),
                });
            }

            for member in &assignment.members {
                for type_name in expand(&staged, member, &assignment.origin)? {
                    let ty = resolve(&staged, &type_name, &assignment.origin)?;
                    let already = staged
                        .type_attr_map(ty.bit())
                        .is_some_and(|map| map.get_bit(attr.bit()));
                    if !already {
                        staged.assign_attribute(&type_name, &assignment.attr)?;
                        summary.assigned += 1;
                    }
                }
            }
        }

        *base = staged;
        tracing::debug!(
            declared = summary.declared,
            assigned = summary.assigned,
            "amended policy database"
        );
        Ok(summary)
    }
}

fn resolve(
    db: &PolicyDatabase,
    name: &str,
    origin: &Path,
) -> Result<TypeDatum, CilError> {
    db.lookup(name).copied().ok_or_else(|| CilError::Unresolved {
        name: name.to_string(),
        path: origin.to_path_buf(),
    })
}

// A member attribute stands for the types it holds right now
fn expand(db: &PolicyDatabase, member: &str, origin: &Path) -> Result<Vec<String>, CilError> {
    let datum = resolve(db, member, origin)?;
    if datum.is_type() {
        return Ok(vec![member.to_string()]);
    }

    let types = db
        .attr_type_map(datum.bit())
        .map(|map| {
            map.iter()
                .filter_map(|bit| db.type_val_to_name(bit))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(types)
}
