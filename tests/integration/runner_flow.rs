use super::support::{CapturedLogs, CountingBackend, RecordingRegistry};
use gsrunner::{Runner, RunnerError};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn runner(backend: &CountingBackend) -> Runner {
    Runner::new("mailhub").with_log_backend(Box::new(backend.clone()))
}

#[test]
fn command_line_overrides_json_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("mailhub.json");
    fs::write(
        &config,
        r#"{
            "mailhub": { "workers": 2, "ratio": 0.1, "name": "from-file" },
            "mailhub.flush": 30
        }"#,
    )
    .unwrap();

    let backend = CountingBackend::default();
    let seen = Arc::new(Mutex::new(None));
    let seen_in_main = seen.clone();

    runner(&backend)
        .flag_int("workers", "mailhub.workers", 1, "worker threads")
        .unwrap()
        .flag_float32("ratio", "mailhub.ratio", 0.5, "sample ratio")
        .unwrap()
        .flag_string("name", "mailhub.name", "default", "instance name")
        .unwrap()
        .seconds("flush", "mailhub.flush", 5, "flush interval")
        .unwrap()
        .run_with_args(
            [
                "mailhub",
                "-config",
                config.to_str().unwrap(),
                "-workers",
                "16",
                "--flush=45",
            ],
            move |runner| {
                let settings = runner.settings();
                *seen_in_main.lock() = Some((
                    settings.int("mailhub.workers", 0),
                    settings.float("mailhub.ratio", 0.0),
                    settings.string("mailhub.name", ""),
                    settings.seconds("mailhub.flush", Duration::ZERO),
                ));
                Ok(())
            },
        )
        .unwrap();

    let (workers, ratio, name, flush) = seen.lock().take().unwrap();
    assert_eq!(workers, 16);
    assert_eq!(flush, Duration::from_secs(45));
    // not given on the command line, so the file value stands
    assert_eq!(ratio, 0.1);
    assert_eq!(name, "from-file");
}

#[test]
fn unrecognized_config_extension_is_skipped() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("mailhub.yaml");
    fs::write(&config, "mailhub:\n  workers: 3\n").unwrap();

    let backend = CountingBackend::default();
    let workers = Arc::new(Mutex::new(0));
    let workers_in_main = workers.clone();

    let logs = CapturedLogs::default();
    logs.capture(|| {
        runner(&backend)
            .flag_int("workers", "mailhub.workers", 1, "worker threads")
            .unwrap()
            .run_with_args(["mailhub", "-config", config.to_str().unwrap()], move |runner| {
                *workers_in_main.lock() = runner.settings().int("mailhub.workers", 0);
                Ok(())
            })
            .unwrap()
    });

    assert_eq!(*workers.lock(), 1);
    assert_eq!(backend.joins(), 1);

    let expected = format!("can't load config file :{}", config.display());
    let warning = logs
        .contents()
        .lines()
        .find(|line| line.contains(&expected))
        .map(str::to_string);
    match warning {
        Some(line) => assert!(line.contains("WARN"), "line was: {}", line),
        None => panic!("no warning in:\n{}", logs.contents()),
    }
    assert!(logs.contents().contains("service started."));
}

#[test]
fn missing_json_config_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("absent.json");

    let backend = CountingBackend::default();
    let err = runner(&backend)
        .run_with_args(["mailhub", "-config", config.to_str().unwrap()], |_| Ok(()))
        .unwrap_err();

    assert!(matches!(err, RunnerError::Config { .. }));
    assert_eq!(backend.joins(), 1);
}

#[test]
fn duplicate_names_are_rejected_at_declaration() {
    let err = Runner::new("mailhub")
        .flag_string("level", "mailhub.level", "", "clashes with builtin short name")
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "duplicate flag name :level");

    let err = Runner::new("mailhub")
        .flag_float64("lvl", "gsrunner.log.level", 0.0, "clashes with builtin full name")
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "duplicate flag fullname :gsrunner.log.level");
}

#[test]
fn join_runs_once_per_exit_path() {
    let ok = CountingBackend::default();
    runner(&ok).run_with_args(["mailhub"], |_| Ok(())).unwrap();
    assert_eq!(ok.joins(), 1);

    let failed = CountingBackend::default();
    runner(&failed)
        .run_with_args(["mailhub"], |_| Err(anyhow::anyhow!("store offline")))
        .unwrap();
    assert_eq!(failed.joins(), 1);

    let panicked = CountingBackend::default();
    runner(&panicked)
        .run_with_args(["mailhub"], |_| -> anyhow::Result<()> { panic!("boom") })
        .unwrap();
    assert_eq!(panicked.joins(), 1);

    let bad_flag = CountingBackend::default();
    assert!(runner(&bad_flag)
        .run_with_args(["mailhub", "-nope"], |_| Ok(()))
        .is_err());
    assert_eq!(bad_flag.joins(), 1);
}

#[test]
fn registry_reaches_custom_consumer() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("services.txt");
    fs::write(&file, "gschat.MailHub=100\ngschat.Auth=101\n").unwrap();

    let backend = CountingBackend::default();
    let registry = Arc::new(RecordingRegistry::default());
    runner(&backend)
        .with_registry(registry.clone())
        .run_with_args(["mailhub", "-registry", file.to_str().unwrap()], |_| Ok(()))
        .unwrap();

    let updates = registry.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].get("gschat.MailHub"), Some(&100));
    assert_eq!(updates[0].get("gschat.Auth"), Some(&101));
}

#[test]
fn registry_path_from_config_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("services.txt");
    fs::write(&file, "gschat.Push=7\n").unwrap();
    let config = temp.path().join("mailhub.json");
    fs::write(
        &config,
        serde_json::json!({ "gsrunner.registry": file.to_str().unwrap() }).to_string(),
    )
    .unwrap();

    let backend = CountingBackend::default();
    let id = Arc::new(Mutex::new(None));
    let id_in_main = id.clone();
    runner(&backend)
        .run_with_args(["mailhub", "-config", config.to_str().unwrap()], move |runner| {
            *id_in_main.lock() = runner.registry().id_of("gschat.Push");
            Ok(())
        })
        .unwrap();

    assert_eq!(*id.lock(), Some(7));
}
