//! Test fixtures and sample data
//!
//! Fake dump and restore tools are small `/bin/sh` scripts. Each one records
//! its arguments in `<script>.args` next to itself so tests can inspect what
//! was invoked.

use db_backup_tool::engines::{BackupConfig, ToolPaths};
use std::fs;
use std::path::{Path, PathBuf};

/// Dump written by the fake `mysqldump`
pub const SAMPLE_SQL_DUMP: &str = "-- MySQL dump (fake)
CREATE TABLE orders (id INT PRIMARY KEY);
INSERT INTO orders VALUES (1),(2),(3);
";

/// Write an executable shell script into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create bin dir");
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("Failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
    }
    path
}

const RECORD_ARGS: &str = "printf '%s\\n' \"$@\" > \"$0.args\"\n";

/// Fake `mysqldump`: prints [`SAMPLE_SQL_DUMP`] on stdout
pub fn fake_mysqldump(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "mysqldump",
        &format!("{}cat <<'SQL'\n{}SQL\n", RECORD_ARGS, SAMPLE_SQL_DUMP),
    )
}

/// Fake `mysql`: copies stdin to `mysql.stdin`
pub fn fake_mysql(dir: &Path) -> PathBuf {
    write_script(dir, "mysql", &format!("{}cat > \"$0.stdin\"\n", RECORD_ARGS))
}

/// Fake `pg_dump`: writes the `-f` file, embedding the `PGPASSWORD` it saw
pub fn fake_pg_dump(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "pg_dump",
        &format!(
            r#"{}out=""
db=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) out="$2"; shift 2 ;;
    -d) db="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf -- '-- PostgreSQL dump of %s\n-- password=%s\n' "$db" "$PGPASSWORD" > "$out"
"#,
            RECORD_ARGS
        ),
    )
}

/// Fake `psql`: copies the `-f` file to `psql.restored`
pub fn fake_psql(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "psql",
        &format!(
            r#"{}file=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) file="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cp "$file" "$0.restored"
"#,
            RECORD_ARGS
        ),
    )
}

/// Fake `mongodump`: creates `<out>/<db>/` with two collections
pub fn fake_mongodump(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "mongodump",
        &format!(
            r#"{}out="."
db=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift 2 ;;
    --db) db="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$out/$db"
printf 'products' > "$out/$db/products.bson"
printf '{{"collection":"products"}}' > "$out/$db/products.metadata.json"
"#,
            RECORD_ARGS
        ),
    )
}

/// Fake `mongorestore`: lists the restored directory into `mongorestore.restored`
pub fn fake_mongorestore(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "mongorestore",
        &format!(
            r#"{}for last in "$@"; do :; done
ls "$last" > "$0.restored"
"#,
            RECORD_ARGS
        ),
    )
}

/// Tool that writes `stderr` and exits with `code`
pub fn failing_tool(dir: &Path, name: &str, stderr: &str, code: i32) -> PathBuf {
    write_script(
        dir,
        name,
        &format!("{}echo '{}' >&2\nexit {}\n", RECORD_ARGS, stderr, code),
    )
}

/// Tool that never finishes on its own
pub fn hanging_tool(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "exec sleep 30\n")
}

/// All six fake tools installed into `dir`
pub fn fake_tools(dir: &Path) -> ToolPaths {
    let path = |p: PathBuf| p.to_string_lossy().to_string();
    ToolPaths {
        mysqldump: path(fake_mysqldump(dir)),
        mysql: path(fake_mysql(dir)),
        pg_dump: path(fake_pg_dump(dir)),
        psql: path(fake_psql(dir)),
        mongodump: path(fake_mongodump(dir)),
        mongorestore: path(fake_mongorestore(dir)),
    }
}

/// Arguments the fake tool at `tool` was last invoked with
pub fn recorded_args(tool: &str) -> Vec<String> {
    fs::read_to_string(format!("{}.args", tool))
        .map(|s| s.lines().map(String::from).collect())
        .unwrap_or_default()
}

/// Connection parameters for a MySQL or PostgreSQL test database
pub fn sql_params(port: u16, password: &str) -> BackupConfig {
    BackupConfig::new()
        .with("host", "127.0.0.1")
        .with("port", port.to_string())
        .with("username", "backup")
        .with("password", password)
        .with("dbname", "shop")
}

/// Connection parameters for a MongoDB test database
pub fn mongo_params(port: u16) -> BackupConfig {
    BackupConfig::new()
        .with("host", "127.0.0.1")
        .with("port", port.to_string())
        .with("dbname", "catalog")
}
