//! End-to-end amendment runs against real files.

use sepolicy_amend::{AmendConfig, AmendError, AmendPipeline, ErrorKind, PipelineState};
use sepolicy_db::{BinaryPolicyCodec, PolicyCodec, PolicyDatabase};
use std::fs;
use std::path::{Path, PathBuf};

fn write_base(dir: &Path) -> PathBuf {
    let mut db = PolicyDatabase::default();
    db.declare_type("domain_a").unwrap();
    db.declare_attribute("can_log").unwrap();
    db.assign_attribute("domain_a", "can_log").unwrap();

    let path = dir.join("base.bin");
    fs::write(&path, BinaryPolicyCodec::new().encode_to_vec(&db).unwrap()).unwrap();
    path
}

fn write_module(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

fn amend(base: &Path, output: &Path, modules: Vec<PathBuf>) -> Result<Vec<u8>, AmendError> {
    let config = AmendConfig::new(base, output, modules).unwrap();
    AmendPipeline::new().run(&config)?;
    Ok(fs::read(output).unwrap())
}

#[test]
fn test_same_inputs_give_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_base(dir.path());
    let a = write_module(dir.path(), "a.cil", "(type app_t)\n(typeattributeset can_log (app_t))");
    let b = write_module(dir.path(), "b.cil", "(typeattribute net)\n(typeattributeset net (app_t))");

    let first = amend(&base, &dir.path().join("one.bin"), vec![a.clone(), b.clone()]).unwrap();
    let second = amend(&base, &dir.path().join("two.bin"), vec![a, b]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_module_order_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_base(dir.path());
    let a = write_module(dir.path(), "a.cil", "(type a_t)");
    let b = write_module(dir.path(), "b.cil", "(type b_t)");

    let ab = amend(&base, &dir.path().join("ab.bin"), vec![a.clone(), b.clone()]).unwrap();
    let ba = amend(&base, &dir.path().join("ba.bin"), vec![b, a]).unwrap();
    assert_ne!(ab, ba);

    let codec = BinaryPolicyCodec::new();
    let ab = codec.decode(&ab).unwrap();
    let ba = codec.decode(&ba).unwrap();
    assert!(ab.lookup("a_t").unwrap().value < ab.lookup("b_t").unwrap().value);
    assert!(ba.lookup("b_t").unwrap().value < ba.lookup("a_t").unwrap().value);
}

#[test]
fn test_third_of_four_modules_failing_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_base(dir.path());
    let output = dir.path().join("out.bin");
    let modules = vec![
        write_module(dir.path(), "1.cil", "(type one_t)"),
        write_module(dir.path(), "2.cil", "(type two_t)"),
        write_module(dir.path(), "3.cil", "(type three_t"),
        write_module(dir.path(), "4.cil", "(type four_t)"),
    ];

    let config = AmendConfig::new(&base, &output, modules.clone()).unwrap();
    let mut pipeline = AmendPipeline::new();
    let err = pipeline.run(&config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ModuleRead);
    assert!(matches!(&err, AmendError::ModuleRead { path, .. } if *path == modules[2]));
    assert_eq!(pipeline.state(), PipelineState::BaseLoaded);
    assert!(!output.exists());
    // Only the base and the four modules remain in the directory
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 5);
}

#[test]
fn test_zero_byte_base_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("empty.bin");
    fs::write(&base, b"").unwrap();
    let module = write_module(dir.path(), "a.cil", "(type a_t)");
    let output = dir.path().join("out.bin");

    let err = amend(&base, &output, vec![module]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    assert_eq!(err.exit_code(), 3);
    assert!(!output.exists());
}

#[test]
fn test_output_may_replace_base() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_base(dir.path());
    let module = write_module(dir.path(), "a.cil", "(type app_t)");

    let written = amend(&base, &base, vec![module]).unwrap();
    let db = BinaryPolicyCodec::new().decode(&written).unwrap();
    assert!(db.lookup("app_t").is_some());
    assert!(db.lookup("domain_a").is_some());
}

#[cfg(unix)]
mod permissions {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_overwrite_keeps_existing_mode() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_base(dir.path());
        let module = write_module(dir.path(), "a.cil", "(type app_t)");
        let output = dir.path().join("out.bin");
        fs::write(&output, b"stale").unwrap();
        fs::set_permissions(&output, fs::Permissions::from_mode(0o644)).unwrap();

        amend(&base, &output, vec![module]).unwrap();
        assert_eq!(mode(&output), 0o644);
    }

    #[test]
    fn test_new_output_gets_plain_create_mode() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_base(dir.path());
        let module = write_module(dir.path(), "a.cil", "(type app_t)");
        let output = dir.path().join("out.bin");

        // Same umask applies to an ordinary create
        let reference = dir.path().join("reference");
        fs::File::create(&reference).unwrap();

        amend(&base, &output, vec![module]).unwrap();
        assert_eq!(mode(&output), mode(&reference));
    }
}
