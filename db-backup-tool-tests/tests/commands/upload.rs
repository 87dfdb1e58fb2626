//! Backup followed by upload, and re-uploading existing artifacts

use std::fs::{self, File};
use std::sync::Arc;
use test_utils::{
    fake_tools, mongo_params, sql_params, ArtifactLocation, BackupArtifact, BackupError,
    EngineKind, LocalObjectStore, TestContext, UploadDestination, SAMPLE_SQL_DUMP,
};
use db_backup_tool::storage::ArtifactUploader;

fn local_uploader(ctx: &TestContext) -> ArtifactUploader {
    ArtifactUploader::new(Arc::new(LocalObjectStore::new(ctx.path("store"))))
}

#[test]
fn test_mysql_backup_and_upload() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.path("mysql/shop.sql");

    let receipt = ctx
        .orchestrator(tools)
        .with_uploader(local_uploader(&ctx))
        .run_backup_and_upload(
            "mysql",
            &sql_params(3306, "pw").with("backup-file", file.to_string_lossy()),
            &UploadDestination::new("nightly").with_prefix("prod/"),
        )
        .unwrap();

    assert_eq!(receipt.target.bucket, "nightly");
    assert_eq!(receipt.target.key, "prod/mysql/shop.sql");
    assert_eq!(receipt.bytes, SAMPLE_SQL_DUMP.len() as u64);
    assert_eq!(
        fs::read_to_string(ctx.path("store/nightly/prod/mysql/shop.sql")).unwrap(),
        SAMPLE_SQL_DUMP
    );
    assert!(file.exists());
}

#[test]
fn test_mongodb_directory_uploaded_as_single_zip() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());

    let receipt = ctx
        .orchestrator(tools)
        .with_uploader(local_uploader(&ctx))
        .run_backup_and_upload(
            "mongodb",
            &mongo_params(27017).with("backup-path", ctx.path("dump").to_string_lossy()),
            &UploadDestination::new("nightly"),
        )
        .unwrap();

    assert_eq!(receipt.target.key, "mongodb/catalog.zip");
    assert_eq!(receipt.source, ctx.path("dump/catalog.zip"));

    let stored = File::open(ctx.path("store/nightly/mongodb/catalog.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(stored).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["products.bson", "products.metadata.json"]);

    // The dump directory is left as it was
    assert!(ctx.path("dump/catalog/products.bson").exists());
}

#[test]
fn test_upload_existing_retries_only_the_upload() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.create_file("shop.sql", SAMPLE_SQL_DUMP);
    let artifact = BackupArtifact::new(EngineKind::PostgreSql, "shop", ArtifactLocation::SingleFile(file));

    let receipt = ctx
        .orchestrator(tools.clone())
        .with_uploader(local_uploader(&ctx))
        .upload_existing(&artifact, &UploadDestination::new("nightly"))
        .unwrap();

    assert_eq!(receipt.target.key, "postgresql/shop.sql");
    assert!(ctx.path("store/nightly/postgresql/shop.sql").exists());
    assert!(!std::path::Path::new(&format!("{}.args", tools.pg_dump)).exists());
}

#[test]
fn test_upload_of_empty_artifact_fails() {
    let ctx = TestContext::new();
    let tools = fake_tools(&ctx.bin_dir());
    let file = ctx.create_file("shop.sql", "");
    let artifact = BackupArtifact::new(EngineKind::MySql, "shop", ArtifactLocation::SingleFile(file));

    let err = ctx
        .orchestrator(tools)
        .with_uploader(local_uploader(&ctx))
        .upload_existing(&artifact, &UploadDestination::new("nightly"))
        .unwrap_err();

    assert!(matches!(err, BackupError::EmptyArtifact { .. }));
    assert!(!ctx.path("store").exists());
}
