use super::support::RecordingRegistry;
use gsrunner::registry::{load, load_file};
use gsrunner::RegistryError;
use std::fmt::Write as _;
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

#[test]
fn large_file_loads_completely() {
    let mut text = String::new();
    for i in 0..2000u32 {
        writeln!(text, "gsrpc.svc{}.Method_{}={}", i / 100, i, i * 30).unwrap();
    }

    let items = load(Cursor::new(text), "generated").unwrap();
    assert_eq!(items.len(), 2000);
    assert_eq!(items.get("gsrpc.svc19.Method_1999"), Some(&59970));
}

#[test]
fn invalid_line_after_valid_lines_publishes_nothing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("services.txt");
    fs::write(&path, "a.b=1\na.c=2\na.d=3\na-e=4\n").unwrap();

    let registry = RecordingRegistry::default();
    let err = load_file(&path, &registry).unwrap_err();

    match err {
        RegistryError::InvalidFormat { label, line } => {
            assert!(label.ends_with("services.txt"));
            assert_eq!(line, 3);
        }
        other => panic!("Expected format error, got {:?}", other),
    }
    assert!(registry.updates.lock().is_empty());
}

#[test]
fn blank_line_is_fatal() {
    let err = load(Cursor::new("a.b=1\n\nc.d=2\n"), "services.txt").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidFormat { line: 1, .. }));
}

#[test]
fn invalid_utf8_is_a_read_error() {
    let err = load(Cursor::new(vec![b'a', b'=', 0xff, b'\n']), "binary").unwrap_err();
    assert!(matches!(err, RegistryError::Read { .. }));
}

#[test]
fn error_message_names_source_and_index() {
    let err = load(Cursor::new("x.y=1\nx.z=65536\n"), "conf/services.txt").unwrap_err();
    assert_eq!(
        err.to_string(),
        "load registry file error:\n\tid out of range\n\tconf/services.txt(1)"
    );
}
