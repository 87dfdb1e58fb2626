//! Parameter contract properties for every engine

use rstest::rstest;
use std::sync::Arc;
use test_utils::{
    mongo_params, sql_params, BackendContext, BackendRegistry, BackupConfig, BackupError,
    EngineKind, MockExecutor,
};

fn registry(executor: &MockExecutor) -> BackendRegistry {
    BackendRegistry::new(BackendContext::new(Arc::new(executor.clone())))
}

/// A config that satisfies the engine's contract
fn complete(engine: EngineKind) -> BackupConfig {
    match engine {
        EngineKind::MongoDb => mongo_params(27017).with("backup-path", "/tmp/dump"),
        _ => sql_params(3306, "secret").with("backup-file", "/tmp/shop.sql"),
    }
}

#[rstest]
#[case(EngineKind::MySql, &["host", "port", "username", "password", "dbname", "backup-file"])]
#[case(EngineKind::PostgreSql, &["host", "port", "username", "password", "dbname", "backup-file"])]
#[case(EngineKind::MongoDb, &["host", "port", "dbname", "backup-path"])]
fn test_required_keys_in_declared_order(#[case] engine: EngineKind, #[case] expected: &[&str]) {
    let backend = registry(&MockExecutor::new()).resolve_kind(engine).unwrap();
    assert_eq!(backend.contract().required_keys(), expected);
}

#[rstest]
#[case(EngineKind::MySql)]
#[case(EngineKind::PostgreSql)]
#[case(EngineKind::MongoDb)]
fn test_complete_config_validates(#[case] engine: EngineKind) {
    let backend = registry(&MockExecutor::new()).resolve_kind(engine).unwrap();
    backend.validate(&complete(engine)).unwrap();
}

#[rstest]
#[case(EngineKind::MySql)]
#[case(EngineKind::PostgreSql)]
#[case(EngineKind::MongoDb)]
fn test_each_missing_key_is_reported_without_running_tools(#[case] engine: EngineKind) {
    let executor = MockExecutor::new();
    let backend = registry(&executor).resolve_kind(engine).unwrap();

    for key in backend.contract().required_keys() {
        let config = complete(engine).without(key);

        match backend.perform_full_backup(&config) {
            Err(BackupError::MissingParameter(missing)) => assert_eq!(missing, key),
            other => panic!("{}: expected MissingParameter({}), got {:?}", engine, key, other),
        }
        match backend.restore_backup(&config) {
            Err(BackupError::MissingParameter(missing)) => assert_eq!(missing, key),
            other => panic!("{}: expected MissingParameter({}), got {:?}", engine, key, other),
        }
    }

    assert!(executor.get_calls().is_empty());
}

#[rstest]
#[case(EngineKind::MySql)]
#[case(EngineKind::PostgreSql)]
#[case(EngineKind::MongoDb)]
fn test_first_missing_key_wins(#[case] engine: EngineKind) {
    let backend = registry(&MockExecutor::new()).resolve_kind(engine).unwrap();
    let config = complete(engine).without("dbname").without("host");

    assert!(matches!(
        backend.validate(&config),
        Err(BackupError::MissingParameter(ref key)) if key == "host"
    ));
}

#[rstest]
#[case("0")]
#[case("65536")]
#[case("mysql")]
#[case("-1")]
fn test_invalid_port(#[case] port: &str) {
    let backend = registry(&MockExecutor::new()).resolve("mysql").unwrap();
    let config = complete(EngineKind::MySql).with("port", port);

    match backend.validate(&config) {
        Err(BackupError::InvalidParameter { key, .. }) => assert_eq!(key, "port"),
        other => panic!("expected InvalidParameter(port), got {:?}", other),
    }
}

#[rstest]
#[case(EngineKind::PostgreSql, "../etc")]
#[case(EngineKind::MongoDb, "a/b")]
fn test_dbname_with_path_separator(#[case] engine: EngineKind, #[case] dbname: &str) {
    let backend = registry(&MockExecutor::new()).resolve_kind(engine).unwrap();
    let config = complete(engine).with("dbname", dbname);

    let err = backend.validate(&config).unwrap_err();
    assert!(matches!(err, BackupError::InvalidParameter { ref key, .. } if key == "dbname"));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_whitespace_value_counts_as_missing() {
    let backend = registry(&MockExecutor::new()).resolve("postgresql").unwrap();
    let config = complete(EngineKind::PostgreSql).with("password", "   ");

    assert!(matches!(
        backend.validate(&config),
        Err(BackupError::MissingParameter(ref key)) if key == "password"
    ));
}

#[test]
fn test_mongodb_accepts_backup_file_alias() {
    let backend = registry(&MockExecutor::new()).resolve("mongodb").unwrap();
    let config = mongo_params(27017).with("backup-file", "/tmp/mongo/catalog.archive");

    backend.validate(&config).unwrap();
}

#[rstest]
#[case("MySQL")]
#[case(" postgresql ")]
#[case("MONGODB")]
fn test_identifiers_are_case_insensitive(#[case] identifier: &str) {
    registry(&MockExecutor::new()).resolve(identifier).unwrap();
}

#[rstest]
#[case("oracle")]
#[case("")]
#[case("postgres")]
fn test_unknown_identifiers(#[case] identifier: &str) {
    match registry(&MockExecutor::new()).resolve(identifier) {
        Err(BackupError::UnsupportedEngine(id)) => assert_eq!(id, identifier),
        Err(other) => panic!("expected UnsupportedEngine, got {:?}", other),
        Ok(_) => panic!("expected UnsupportedEngine for '{}'", identifier),
    }
}
