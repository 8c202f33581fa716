//! Incremental module reader.

use crate::backend::ModuleCompiler;
use crate::error::AmendError;
use sepolicy_core::ByteBuffer;
use std::path::PathBuf;

/// Read every module file into a fresh module database, in order
///
/// Each buffer is dropped as soon as the compiler has taken it. The first
/// failing file stops the batch; the partially populated database is
/// dropped before the error is returned.
///
/// # Errors
///
/// Returns [`AmendError::ModuleRead`] naming the first file that could not
/// be read or was rejected by the compiler
pub fn read_modules<C: ModuleCompiler>(
    compiler: &C,
    paths: &[PathBuf],
) -> Result<C::Modules, AmendError> {
    let mut modules = compiler.create();

    for path in paths {
        let buffer = ByteBuffer::load(path).map_err(|e| AmendError::ModuleRead {
            path: path.clone(),
            source: Box::new(e),
        })?;

        tracing::debug!(path = %path.display(), size = buffer.len(), "read module");
        compiler
            .add_file(&mut modules, buffer.path(), buffer.as_bytes())
            .map_err(|source| AmendError::ModuleRead {
                path: path.clone(),
                source,
            })?;
    }

    Ok(modules)
}
