//! Policy amendment pipeline.
//!
//! Runs load base → decode → read modules → compile → amend → encode →
//! write, strictly in that order. Every intermediate value is owned by the
//! run and dropped on whichever path leaves it, and the output file is only
//! created once the encoded image is complete.

use crate::backend::{CilCompiler, ModuleCompiler};
use crate::config::AmendConfig;
use crate::error::AmendError;
use crate::reader::read_modules;
use sepolicy_core::ByteBuffer;
use sepolicy_db::{BinaryPolicyCodec, PolicyCodec, PolicyDatabase};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Pipeline progress; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Nothing done yet
    Idle,
    /// Base policy read and decoded
    BaseLoaded,
    /// All module files submitted
    ModulesRead,
    /// Module set compiled
    Compiled,
    /// Base amended in memory
    Amended,
    /// Output written
    Written,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BaseLoaded => "base-loaded",
            Self::ModulesRead => "modules-read",
            Self::Compiled => "compiled",
            Self::Amended => "amended",
            Self::Written => "written",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendReport {
    /// Number of module files applied
    pub modules: usize,
    /// Type table size of the base
    pub types_before: u32,
    /// Type table size of the result
    pub types_after: u32,
    /// Size of the written image
    pub bytes_written: usize,
}

/// Amendment pipeline over a codec and a module compiler
pub struct AmendPipeline<P = BinaryPolicyCodec, C = CilCompiler> {
    codec: P,
    compiler: C,
    state: PipelineState,
}

impl AmendPipeline {
    /// Create a pipeline with the built-in codec and compiler
    #[must_use]
    pub fn new() -> Self {
        Self::with_backends(BinaryPolicyCodec::new(), CilCompiler::new())
    }
}

impl Default for AmendPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PolicyCodec, C: ModuleCompiler> AmendPipeline<P, C> {
    /// Create a pipeline over custom backends
    #[must_use]
    pub fn with_backends(codec: P, compiler: C) -> Self {
        Self {
            codec,
            compiler,
            state: PipelineState::Idle,
        }
    }

    /// Last state reached by the most recent run
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Run one amendment
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; nothing is written in that case
    pub fn run(&mut self, config: &AmendConfig) -> Result<AmendReport, AmendError> {
        self.state = PipelineState::Idle;

        let result = self.execute(config);
        match &result {
            Ok(report) => tracing::info!(
                output = %config.output().display(),
                modules = report.modules,
                types = report.types_after,
                bytes = report.bytes_written,
                "wrote amended policy"
            ),
            Err(e) => tracing::error!(stage = %e.reached(), kind = ?e.kind(), "{}", e),
        }
        result
    }

    fn execute(&mut self, config: &AmendConfig) -> Result<AmendReport, AmendError> {
        config.validate()?;

        tracing::debug!(base = %config.base().display(), "loading base policy");
        let mut db = self.load_base(config.base())?;
        let types_before = db.type_count();
        self.advance(PipelineState::BaseLoaded);

        tracing::debug!(count = config.modules().len(), "reading modules");
        let mut modules = read_modules(&self.compiler, config.modules())?;
        self.advance(PipelineState::ModulesRead);

        tracing::debug!("compiling modules");
        self.compiler
            .compile(&mut modules)
            .map_err(AmendError::Compile)?;
        self.advance(PipelineState::Compiled);

        tracing::debug!("amending base policy");
        self.compiler
            .amend(&modules, &mut db)
            .map_err(AmendError::Amend)?;
        self.advance(PipelineState::Amended);

        tracing::debug!(output = %config.output().display(), "writing policy");
        let image = self.codec.encode_to_vec(&db).map_err(AmendError::encode)?;
        write_atomically(config.output(), &image)?;
        self.advance(PipelineState::Written);

        Ok(AmendReport {
            modules: config.modules().len(),
            types_before,
            types_after: db.type_count(),
            bytes_written: image.len(),
        })
    }

    fn load_base(&self, path: &Path) -> Result<PolicyDatabase, AmendError> {
        let buffer = ByteBuffer::load(path).map_err(AmendError::BaseRead)?;
        if buffer.is_empty() {
            return Err(AmendError::EmptyInput {
                path: path.to_path_buf(),
            });
        }

        let decoded = self.codec.decode(buffer.as_bytes());
        drop(buffer);
        decoded.map_err(AmendError::decode)
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(next > self.state);
        tracing::debug!(from = %self.state, to = %next, "stage complete");
        self.state = next;
    }
}

// Write to a sibling temporary file and rename it over `path`, so readers
// never observe a partial image. The result gets the mode a plain create
// would give it (0666 less the umask), or keeps the mode of the file it
// replaces.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), AmendError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let write_err = |source| AmendError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut file = builder.tempfile_in(dir).map_err(write_err)?;

    if let Ok(existing) = fs::metadata(path) {
        file.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_err)?;
    }

    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompilerError, ErrorKind};
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Compiler that records every call and can fail on demand
    #[derive(Default, Clone)]
    struct RecordingCompiler {
        calls: Rc<RefCell<Vec<String>>>,
        fail_compile: bool,
        fail_amend: bool,
    }

    impl ModuleCompiler for RecordingCompiler {
        type Modules = Vec<PathBuf>;

        fn create(&self) -> Vec<PathBuf> {
            self.calls.borrow_mut().push("create".to_string());
            Vec::new()
        }

        fn add_file(
            &self,
            modules: &mut Vec<PathBuf>,
            path: &Path,
            _source: &[u8],
        ) -> Result<(), CompilerError> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.calls.borrow_mut().push(format!("add {name}"));
            modules.push(path.to_path_buf());
            Ok(())
        }

        fn compile(&self, modules: &mut Vec<PathBuf>) -> Result<(), CompilerError> {
            self.calls
                .borrow_mut()
                .push(format!("compile {}", modules.len()));
            if self.fail_compile {
                return Err("type error".into());
            }
            Ok(())
        }

        fn amend(
            &self,
            _modules: &Vec<PathBuf>,
            base: &mut PolicyDatabase,
        ) -> Result<(), CompilerError> {
            self.calls.borrow_mut().push("amend".to_string());
            if self.fail_amend {
                return Err("merge conflict".into());
            }
            base.declare_type("amended_t")?;
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        base: PathBuf,
        output: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let base = dir.path().join("base.bin");
            let output = dir.path().join("out.bin");

            let mut db = PolicyDatabase::default();
            db.declare_type("domain_a").unwrap();
            db.declare_attribute("can_log").unwrap();
            db.assign_attribute("domain_a", "can_log").unwrap();
            fs::write(&base, BinaryPolicyCodec::new().encode_to_vec(&db).unwrap()).unwrap();

            Self { dir, base, output }
        }

        fn module(&self, name: &str, source: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, source).unwrap();
            path
        }

        fn config(&self, modules: Vec<PathBuf>) -> AmendConfig {
            AmendConfig::new(&self.base, &self.output, modules).unwrap()
        }
    }

    #[test]
    fn test_run_writes_amended_policy() {
        let fx = Fixture::new();
        let module = fx.module("a.cil", "(type domain_b)\n(typeattributeset can_log (domain_b))");

        let mut pipeline = AmendPipeline::new();
        let report = pipeline.run(&fx.config(vec![module])).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Written);
        assert_eq!(report.types_before, 2);
        assert_eq!(report.types_after, 3);

        let written = fs::read(&fx.output).unwrap();
        assert_eq!(written.len(), report.bytes_written);
        let db = BinaryPolicyCodec::new().decode(&written).unwrap();
        let can_log = db.lookup("can_log").unwrap().bit();
        assert_eq!(db.attr_type_map(can_log).unwrap().cardinality(), 2);
    }

    #[test]
    fn test_calls_follow_module_order() {
        let fx = Fixture::new();
        let a = fx.module("a.cil", "");
        let b = fx.module("b.cil", "");
        let c = fx.module("c.cil", "");
        let compiler = RecordingCompiler::default();

        let mut pipeline = AmendPipeline::with_backends(BinaryPolicyCodec::new(), compiler.clone());
        pipeline.run(&fx.config(vec![c, a, b])).unwrap();

        assert_eq!(
            *compiler.calls.borrow(),
            vec!["create", "add c.cil", "add a.cil", "add b.cil", "compile 3", "amend"]
        );
    }

    #[test]
    fn test_empty_base_stops_before_modules() {
        let fx = Fixture::new();
        fs::write(&fx.base, b"").unwrap();
        let module = fx.module("a.cil", "(type t)");
        let compiler = RecordingCompiler::default();

        let mut pipeline = AmendPipeline::with_backends(BinaryPolicyCodec::new(), compiler.clone());
        let err = pipeline.run(&fx.config(vec![module])).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(compiler.calls.borrow().is_empty());
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_missing_base_is_io() {
        let fx = Fixture::new();
        fs::remove_file(&fx.base).unwrap();
        let module = fx.module("a.cil", "(type t)");

        let err = AmendPipeline::new()
            .run(&fx.config(vec![module]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_corrupt_base_reports_codec_status() {
        let fx = Fixture::new();
        fs::write(&fx.base, b"definitely not a policy").unwrap();
        let module = fx.module("a.cil", "(type t)");

        let err = AmendPipeline::new()
            .run(&fx.config(vec![module]))
            .unwrap_err();
        assert!(matches!(err, AmendError::Decode { code: -1, .. }));
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_compile_failure() {
        let fx = Fixture::new();
        let module = fx.module("a.cil", "");
        let compiler = RecordingCompiler {
            fail_compile: true,
            ..RecordingCompiler::default()
        };

        let mut pipeline = AmendPipeline::with_backends(BinaryPolicyCodec::new(), compiler.clone());
        let err = pipeline.run(&fx.config(vec![module])).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Compile);
        assert_eq!(pipeline.state(), PipelineState::ModulesRead);
        assert!(!compiler.calls.borrow().contains(&"amend".to_string()));
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_failure_is_logged_with_stage() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let fx = Fixture::new();
        let module = fx.module("a.cil", "");
        let compiler = RecordingCompiler {
            fail_compile: true,
            ..RecordingCompiler::default()
        };

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::ERROR)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut pipeline =
                AmendPipeline::with_backends(BinaryPolicyCodec::new(), compiler);
            pipeline.run(&fx.config(vec![module])).unwrap_err();
        });

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("ERROR"));
        assert!(log.contains("stage=modules-read"));
        assert!(log.contains("kind=Compile"));
        assert!(log.contains("Failed to compile module set: type error"));
    }

    #[test]
    fn test_amend_failure() {
        let fx = Fixture::new();
        let module = fx.module("a.cil", "");
        let compiler = RecordingCompiler {
            fail_amend: true,
            ..RecordingCompiler::default()
        };

        let mut pipeline = AmendPipeline::with_backends(BinaryPolicyCodec::new(), compiler);
        let err = pipeline.run(&fx.config(vec![module])).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Amend);
        assert_eq!(pipeline.state(), PipelineState::Compiled);
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_unwritable_output() {
        let fx = Fixture::new();
        let module = fx.module("a.cil", "(type t)");
        let config = AmendConfig::new(
            &fx.base,
            fx.dir.path().join("no_such_dir").join("out.bin"),
            vec![module],
        )
        .unwrap();

        let mut pipeline = AmendPipeline::new();
        let err = pipeline.run(&config).unwrap_err();
        assert!(matches!(err, AmendError::Write { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(pipeline.state(), PipelineState::Amended);
    }

    #[test]
    fn test_failed_run_keeps_existing_output() {
        let fx = Fixture::new();
        fs::write(&fx.output, b"previous").unwrap();
        let module = fx.module("a.cil", "(typeattributeset can_log (missing_t))");

        let err = AmendPipeline::new()
            .run(&fx.config(vec![module]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Amend);
        assert_eq!(fs::read(&fx.output).unwrap(), b"previous");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::ModulesRead.to_string(), "modules-read");
        assert!(PipelineState::Idle < PipelineState::Written);
    }
}
