//! Full backups through the orchestrator with fake tools

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use test_utils::{
    failing_tool, fake_tools, hanging_tool, mongo_params, recorded_args, sql_params,
    ArtifactLocation, BackupError, EngineKind, Orchestrator, TestContext, SAMPLE_SQL_DUMP,
};
use db_backup_tool::utils::ExitInfo;
use db_backup_tool::BackendRegistry;

#[test]
fn test_mysql_backup_writes_stdout_to_file() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.path("out/mysql/shop.sql");

    let artifact = ctx
        .orchestrator(tools.clone())
        .run_backup("mysql", &sql_params(3306, "hunter2").with("backup-file", file.to_string_lossy()))
        .unwrap();

    assert_eq!(artifact.location, ArtifactLocation::SingleFile(file.clone()));
    assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE_SQL_DUMP);

    let args = recorded_args(&tools.mysqldump);
    assert!(args.contains(&"--user=backup".to_string()));
    assert!(args.contains(&"--port=3306".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("shop"));
}

#[test]
fn test_postgres_password_only_in_child_environment() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.path("pg/shop.sql");

    ctx.orchestrator(tools)
        .run_backup("postgresql", &sql_params(5432, "pg-secret").with("backup-file", file.to_string_lossy()))
        .unwrap();

    let dump = fs::read_to_string(&file).unwrap();
    assert!(dump.contains("-- PostgreSQL dump of shop"));
    assert!(dump.contains("-- password=pg-secret"));
    assert!(std::env::var_os("PGPASSWORD").is_none());
}

#[test]
fn test_concurrent_postgres_backups_keep_their_own_password() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let orchestrator = Arc::new(ctx.orchestrator(tools));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            let file = ctx.path(&format!("pg/shop-{}.sql", i));
            thread::spawn(move || {
                let config = sql_params(5432, &format!("password-{}", i))
                    .with("backup-file", file.to_string_lossy());
                orchestrator.run_backup("postgresql", &config).map(|_| file)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let file = handle.join().unwrap().unwrap();
        let dump = fs::read_to_string(file).unwrap();
        assert!(
            dump.contains(&format!("-- password=password-{}\n", i)),
            "backup {} saw the wrong password: {}",
            i,
            dump
        );
    }
    assert!(std::env::var_os("PGPASSWORD").is_none());
}

#[test]
fn test_failing_tool_reports_stderr_and_removes_partial_file() {
    let ctx = TestContext::new();
    let bin = ctx.bin_dir();
    let mut tools = fake_tools(&bin);
    tools.mysqldump = failing_tool(&bin, "mysqldump-broken", "Access denied for user backup", 2)
        .to_string_lossy()
        .to_string();
    let file = ctx.path("mysql/shop.sql");

    let err = ctx
        .orchestrator(tools)
        .run_backup("mysql", &sql_params(3306, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap_err();

    match err {
        BackupError::BackupExecutionFailed { engine, ref status, ref stderr } => {
            assert_eq!(engine, EngineKind::MySql);
            assert_eq!(*status, ExitInfo::Exited(2));
            assert!(stderr.contains("Access denied"));
        }
        ref other => panic!("expected BackupExecutionFailed, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 4);
    assert!(!file.exists());
}

#[test]
fn test_failed_dump_keeps_previous_backup() {
    let ctx = TestContext::new();
    let bin = ctx.bin_dir();
    let mut tools = fake_tools(&bin);
    tools.pg_dump = failing_tool(&bin, "pg_dump-refused", "connection to server failed", 1)
        .to_string_lossy()
        .to_string();
    let file = ctx.create_file("pg/shop.sql", "-- yesterday's dump\n");

    let err = ctx
        .orchestrator(tools)
        .run_backup("postgresql", &sql_params(5432, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap_err();

    assert!(matches!(err, BackupError::BackupExecutionFailed { .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), "-- yesterday's dump\n");
    assert!(!ctx.path("pg/shop.sql.partial").exists());
}

#[test]
fn test_successful_dump_replaces_previous_backup() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.create_file("mysql/shop.sql", "-- yesterday's dump\n");

    ctx.orchestrator(tools)
        .run_backup("mysql", &sql_params(3306, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap();

    assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE_SQL_DUMP);
    assert!(!ctx.path("mysql/shop.sql.partial").exists());
}

#[test]
fn test_hanging_tool_times_out() {
    let ctx = TestContext::new();
    let bin = ctx.bin_dir();
    let mut tools = fake_tools(&bin);
    tools.pg_dump = hanging_tool(&bin, "pg_dump-hang").to_string_lossy().to_string();

    let context = ctx
        .backend_context(tools)
        .with_timeout(Some(Duration::from_millis(300)));
    let orchestrator = Orchestrator::new(BackendRegistry::new(context));

    let start = Instant::now();
    let err = orchestrator
        .run_backup(
            "postgresql",
            &sql_params(5432, "pw").with("backup-file", ctx.path("pg/shop.sql").to_string_lossy()),
        )
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        err,
        BackupError::BackupExecutionFailed { status: ExitInfo::TimedOut(_), .. }
    ));
}

#[test]
fn test_missing_tool_is_execution_failure() {
    let ctx = TestContext::new();
    let mut tools = fake_tools(&ctx.bin_dir());
    tools.mongodump = ctx.path("bin/no-such-mongodump").to_string_lossy().to_string();

    let err = ctx
        .orchestrator(tools)
        .run_backup("mongodb", &mongo_params(27017).with("backup-path", ctx.path("dump").to_string_lossy()))
        .unwrap_err();

    assert!(matches!(
        err,
        BackupError::BackupExecutionFailed { status: ExitInfo::SpawnFailed(_), .. }
    ));
}

#[test]
fn test_mongodb_backup_produces_directory() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let dump_dir = ctx.path("dump");

    let artifact = ctx
        .orchestrator(tools.clone())
        .run_backup(
            "mongodb",
            &mongo_params(27017)
                .with("username", "admin")
                .with("password", "m0ngo")
                .with("backup-path", dump_dir.to_string_lossy()),
        )
        .unwrap();

    let expected = dump_dir.join("catalog");
    assert_eq!(artifact.location, ArtifactLocation::Directory(expected.clone()));
    assert!(expected.join("products.bson").exists());

    let args = recorded_args(&tools.mongodump);
    assert!(args.windows(2).any(|w| w[0] == "--authenticationDatabase" && w[1] == "admin"));
}

#[test]
fn test_default_root_backup_creates_directories() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let orchestrator = Orchestrator::new(BackendRegistry::new(ctx.backend_context_with_defaults(tools)));

    let artifact = orchestrator.run_backup("mysql", &sql_params(3306, "pw")).unwrap();

    assert_eq!(artifact.path(), ctx.path("backups/mysql/shop.sql"));
    assert!(artifact.path().exists());
}
