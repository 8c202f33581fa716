//! Module compiler seam.
//!
//! The pipeline only sequences compiler calls; what a module means and how
//! it merges into a base policy belongs to the implementation behind
//! [`ModuleCompiler`].

use crate::error::CompilerError;
use sepolicy_cil::ModuleDb;
use sepolicy_db::PolicyDatabase;
use std::path::Path;

/// Incremental module compiler used by the pipeline
pub trait ModuleCompiler {
    /// Module database accumulating parsed sources
    type Modules;

    /// Create an empty module database
    fn create(&self) -> Self::Modules;

    /// Submit one source buffer and its originating path
    ///
    /// # Errors
    ///
    /// Returns error if the source is rejected
    fn add_file(
        &self,
        modules: &mut Self::Modules,
        path: &Path,
        source: &[u8],
    ) -> Result<(), CompilerError>;

    /// Compile the fully populated module database
    ///
    /// # Errors
    ///
    /// Returns error if the module set does not compile
    fn compile(&self, modules: &mut Self::Modules) -> Result<(), CompilerError>;

    /// Merge the compiled modules into `base`
    ///
    /// # Errors
    ///
    /// Returns error if the merge fails
    fn amend(&self, modules: &Self::Modules, base: &mut PolicyDatabase)
        -> Result<(), CompilerError>;
}

/// Compiler for the S-expression module language
#[derive(Debug, Clone, Copy, Default)]
pub struct CilCompiler;

impl CilCompiler {
    /// Create a new compiler
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ModuleCompiler for CilCompiler {
    type Modules = ModuleDb;

    fn create(&self) -> ModuleDb {
        ModuleDb::new()
    }

    fn add_file(
        &self,
        modules: &mut ModuleDb,
        path: &Path,
        source: &[u8],
    ) -> Result<(), CompilerError> {
        Ok(modules.add_file(path, source)?)
    }

    fn compile(&self, modules: &mut ModuleDb) -> Result<(), CompilerError> {
        modules.compile()?;
        Ok(())
    }

    fn amend(&self, modules: &ModuleDb, base: &mut PolicyDatabase) -> Result<(), CompilerError> {
        let summary = modules.amend(base)?;
        tracing::info!(
            declared = summary.declared,
            assigned = summary.assigned,
            "applied incremental modules"
        );
        Ok(())
    }
}
