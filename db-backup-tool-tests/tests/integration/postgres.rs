//! PostgreSQL round trip: pg_dump, drop, psql restore

use super::common::*;
use test_utils::{sql_params, TestContext, ToolPaths};

const PORT: u16 = 54329;

#[test]
#[ignore] // Requires Docker and PostgreSQL client tools
fn test_postgres_backup_restore_round_trip() {
    if !prerequisites_met(&["pg_dump", "psql"]) {
        return;
    }

    let name = container_name("postgres");
    let container = start_container(
        &name,
        &[
            "-e",
            "POSTGRES_PASSWORD=testpass",
            "-e",
            "POSTGRES_DB=shop",
            "-p",
            &format!("{}:5432", PORT),
            "postgres:15-alpine",
        ],
    )
    .expect("Failed to start PostgreSQL container");
    wait_until_ready(container.name(), &["pg_isready", "-U", "postgres", "-h", "127.0.0.1"], 60)
        .expect("PostgreSQL did not become ready");

    let psql = |sql: &str| {
        docker_exec(container.name(), &["psql", "-U", "postgres", "-d", "shop", "-t", "-c", sql])
    };
    psql("CREATE TABLE orders (id INT PRIMARY KEY, item TEXT)").unwrap();
    psql("INSERT INTO orders VALUES (1, 'keyboard'), (2, 'mouse')").unwrap();

    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator(ToolPaths::default());
    let config = sql_params(PORT, "testpass")
        .with("username", "postgres")
        .with("backup-file", ctx.path("pg/shop.sql").to_string_lossy());

    let artifact = orchestrator.run_backup("postgresql", &config).unwrap();
    let dump = std::fs::read_to_string(artifact.path()).unwrap();
    assert!(dump.contains("CREATE TABLE public.orders"));

    psql("DROP TABLE orders").unwrap();
    orchestrator.run_restore("postgresql", &config).unwrap();

    let count = psql("SELECT count(*) FROM orders").unwrap();
    assert_eq!(count.trim(), "2");
}
