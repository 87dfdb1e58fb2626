//! Restores through the orchestrator with fake tools

use std::fs;
use test_utils::{
    failing_tool, fake_tools, mongo_params, recorded_args, sql_params, BackupError, EngineKind,
    TestContext, SAMPLE_SQL_DUMP,
};

#[test]
fn test_mysql_restore_reads_dump_on_stdin() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.create_file("shop.sql", SAMPLE_SQL_DUMP);

    ctx.orchestrator(tools.clone())
        .run_restore("mysql", &sql_params(3306, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap();

    let received = fs::read_to_string(format!("{}.stdin", tools.mysql)).unwrap();
    assert_eq!(received, SAMPLE_SQL_DUMP);
    assert_eq!(recorded_args(&tools.mysql).last().map(String::as_str), Some("shop"));
}

#[test]
fn test_postgres_restore_uses_file_argument() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.create_file("shop.sql", "CREATE TABLE t (id int);\n");

    ctx.orchestrator(tools.clone())
        .run_restore("postgresql", &sql_params(5432, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap();

    let restored = fs::read_to_string(format!("{}.restored", tools.psql)).unwrap();
    assert_eq!(restored, "CREATE TABLE t (id int);\n");

    let args = recorded_args(&tools.psql);
    assert!(args.windows(2).any(|w| w[0] == "-v" && w[1] == "ON_ERROR_STOP=1"));
}

#[test]
fn test_mongodb_restore_targets_database_directory() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    ctx.create_file("dump/catalog/products.bson", "products");

    ctx.orchestrator(tools.clone())
        .run_restore("mongodb", &mongo_params(27017).with("backup-path", ctx.path("dump").to_string_lossy()))
        .unwrap();

    let args = recorded_args(&tools.mongorestore);
    assert_eq!(
        args.last().map(String::as_str),
        Some(ctx.path("dump/catalog").to_string_lossy().as_ref())
    );
    assert!(!args.iter().any(|a| a == "--db"));

    let listing = fs::read_to_string(format!("{}.restored", tools.mongorestore)).unwrap();
    assert!(listing.contains("products.bson"));
}

#[test]
fn test_missing_artifact_never_invokes_tool() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());

    let err = ctx
        .orchestrator(tools.clone())
        .run_restore("mysql", &sql_params(3306, "pw").with("backup-file", ctx.path("absent.sql").to_string_lossy()))
        .unwrap_err();

    assert!(matches!(err, BackupError::ArtifactOpenFailed { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(recorded_args(&tools.mysql).is_empty());
}

#[test]
fn test_failed_restore_reports_stderr() {
    let ctx = TestContext::new();
    let bin = ctx.bin_dir();
    let mut tools = fake_tools(&bin);
    tools.psql = failing_tool(&bin, "psql-broken", "ERROR: relation already exists", 3)
        .to_string_lossy()
        .to_string();
    let file = ctx.create_file("shop.sql", "CREATE TABLE t (id int);\n");

    let err = ctx
        .orchestrator(tools)
        .run_restore("postgresql", &sql_params(5432, "pw").with("backup-file", file.to_string_lossy()))
        .unwrap_err();

    match err {
        BackupError::RestoreExecutionFailed { engine, ref stderr, .. } => {
            assert_eq!(engine, EngineKind::PostgreSql);
            assert!(stderr.contains("relation already exists"));
        }
        other => panic!("expected RestoreExecutionFailed, got {:?}", other),
    }
    // The dump itself is never touched
    assert!(file.exists());
}
