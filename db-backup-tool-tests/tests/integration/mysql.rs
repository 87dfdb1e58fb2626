//! MySQL round trip: mysqldump, drop, mysql restore

use super::common::*;
use test_utils::{sql_params, TestContext, ToolPaths};

const PORT: u16 = 33069;

#[test]
#[ignore] // Requires Docker and MySQL client tools
fn test_mysql_backup_restore_round_trip() {
    if !prerequisites_met(&["mysqldump", "mysql"]) {
        return;
    }

    let name = container_name("mysql");
    let container = start_container(
        &name,
        &[
            "-e",
            "MYSQL_ROOT_PASSWORD=testpass",
            "-e",
            "MYSQL_DATABASE=shop",
            "-p",
            &format!("{}:3306", PORT),
            "mysql:8.0",
        ],
    )
    .expect("Failed to start MySQL container");
    wait_until_ready(
        container.name(),
        &["mysql", "-uroot", "-ptestpass", "-h", "127.0.0.1", "-e", "SELECT 1"],
        90,
    )
    .expect("MySQL did not become ready");

    let sql = |statement: &str| {
        docker_exec(
            container.name(),
            &["mysql", "-uroot", "-ptestpass", "-N", "shop", "-e", statement],
        )
    };
    sql("CREATE TABLE orders (id INT PRIMARY KEY, item VARCHAR(32))").unwrap();
    sql("INSERT INTO orders VALUES (1, 'keyboard'), (2, 'mouse'), (3, 'monitor')").unwrap();

    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator(ToolPaths::default());
    let config = sql_params(PORT, "testpass")
        .with("username", "root")
        .with("backup-file", ctx.path("mysql/shop.sql").to_string_lossy());

    let artifact = orchestrator.run_backup("mysql", &config).unwrap();
    let dump = std::fs::read_to_string(artifact.path()).unwrap();
    assert!(dump.contains("CREATE TABLE `orders`"));

    sql("DROP TABLE orders").unwrap();
    orchestrator.run_restore("mysql", &config).unwrap();

    assert_eq!(sql("SELECT COUNT(*) FROM orders").unwrap(), "3");
}
