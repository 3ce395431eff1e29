mod support;

use std::sync::Arc;
use std::time::Duration;

use crossdb::{BindParams, Engine, EngineOptions, MysqlDialect, OracleDialect, Page, SqlValue};
use support::{engine, fail, rows, FakeDb, MemoryLogger};

fn options() -> EngineOptions {
    EngineOptions::default()
}

#[test]
fn test_connect_retries_until_success() {
    let db = FakeDb::new();
    db.fail_connects(2);
    let mut engine = Engine::new(MysqlDialect::new(), db.connector("trials"), options());
    engine.connect().unwrap();
    assert!(engine.is_connected());
    assert_eq!(db.connects(), 3);
    assert!(engine.last_error().is_ok());
}

#[test]
fn test_connect_gives_up_after_attempts() {
    let db = FakeDb::new();
    db.fail_connects(5);
    let opts = EngineOptions {
        connect_attempts: 2,
        ..options()
    };
    let mut engine = Engine::new(MysqlDialect::new(), db.connector("trials"), opts);
    let err = engine.connect().unwrap_err();
    assert_eq!(err.code(), "DATABASE_CONNECTION_ERROR");
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(engine.last_error().code, "DATABASE_CONNECTION_ERROR");
    assert!(!engine.is_connected());
    assert_eq!(db.connects(), 2);
}

#[test]
fn test_connect_stops_at_timeout() {
    let db = FakeDb::new();
    db.fail_connects(10);
    let opts = EngineOptions {
        connect_attempts: 10,
        connect_timeout: Duration::from_millis(1),
        ..options()
    };
    let mut engine = Engine::new(MysqlDialect::new(), db.connector("trials"), opts);
    assert!(engine.connect().is_err());
    assert_eq!(db.connects(), 1);
}

#[test]
fn test_connect_is_idempotent() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());
    engine.connect().unwrap();
    assert_eq!(db.connects(), 1);
    assert_eq!(engine.database(), "trials");
}

#[test]
fn test_execute_requires_connection() {
    let db = FakeDb::new();
    let mut engine = Engine::new(MysqlDialect::new(), db.connector("trials"), options());
    let err = engine
        .execute_bind_query("SELECT 1", &BindParams::new())
        .unwrap_err();
    assert_eq!(err.code(), "DATABASE_NOT_CONNECTED");
    assert_eq!(engine.last_error().code, "DATABASE_NOT_CONNECTED");
}

#[test]
fn test_last_error_tracks_most_recent_call() {
    let db = FakeDb::new();
    db.once("nope", fail("1054", "Unknown column 'nope' in 'field list'"));
    let mut engine = engine(MysqlDialect::new(), &db, options());

    assert!(engine
        .execute_bind_query("SELECT nope FROM aliquots", &BindParams::new())
        .is_err());
    let last = engine.last_error().clone();
    assert_eq!(last.code, "DATABASE_EXECUTION_ERROR");
    assert!(last.message.contains("1054"));
    assert!(last.message.contains("Unknown column"));

    engine
        .execute_bind_query("SELECT 1", &BindParams::new())
        .unwrap();
    assert!(engine.last_error().is_ok());
}

#[test]
fn test_cursor_from_backend() {
    let db = FakeDb::new();
    db.on(
        "FROM aliquots",
        rows(
            &["id", "name"],
            vec![
                vec![SqlValue::Int(1), SqlValue::from("a")],
                vec![SqlValue::Int(2), SqlValue::Null],
            ],
        ),
    );
    let mut engine = engine(MysqlDialect::new(), &db, options());
    let mut cursor = engine
        .execute_bind_query("SELECT id, name FROM aliquots", &BindParams::new())
        .unwrap();
    assert!(cursor.advance());
    assert_eq!(cursor.field("ID"), Some(&SqlValue::Int(1)));
    assert_eq!(cursor.field("Name"), Some(&SqlValue::from("a")));
    assert!(cursor.advance());
    assert_eq!(cursor.field("name"), Some(&SqlValue::Null));
    assert!(!cursor.advance());
}

#[test]
fn test_read_only_rejects_writes() {
    let db = FakeDb::new();
    let opts = EngineOptions {
        read_only: true,
        ..options()
    };
    let mut engine = engine(MysqlDialect::new(), &db, opts);

    for sql in [
        "DELETE FROM aliquots",
        "insert into aliquots (id) values (1)",
        "UPDATE aliquots SET a = 1",
        "REPLACE INTO aliquots VALUES (1)",
    ] {
        let err = engine.execute_bind_query(sql, &BindParams::new()).unwrap_err();
        assert_eq!(err.code(), "READ_ONLY_MODE");
    }
    assert_eq!(engine.last_error().code, "READ_ONLY_MODE");
    assert!(db.sql().is_empty());

    engine
        .execute_bind_query("SELECT * FROM aliquots", &BindParams::new())
        .unwrap();
    engine
        .execute_bind_query("CREATE TABLE t (id INT)", &BindParams::new())
        .unwrap();
    assert_eq!(db.sql().len(), 2);
}

#[test]
fn test_read_only_rejects_hidden_writes() {
    let db = FakeDb::new();
    let opts = EngineOptions {
        read_only: true,
        ..options()
    };
    let mut mysql = engine(MysqlDialect::new(), &db, opts.clone());
    let err = mysql
        .execute_bind_query(
            "WITH old AS (SELECT id FROM t) DELETE t FROM t JOIN old ON t.id = old.id",
            &BindParams::new(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "READ_ONLY_MODE");

    let mut oracle = engine(OracleDialect::new(), &db, opts);
    let err = oracle
        .execute_bind_query("BEGIN DELETE FROM t; END;", &BindParams::new())
        .unwrap_err();
    assert_eq!(err.code(), "READ_ONLY_MODE");
    assert!(db.sql().is_empty());

    let cte = "WITH x AS (SELECT 1 AS a FROM DUAL) SELECT a FROM x";
    oracle.execute_bind_query(cte, &BindParams::new()).unwrap();
    assert_eq!(db.sql().len(), 1);
}

#[test]
fn test_unused_params_are_pruned() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());
    let params = BindParams::new().with("id", 5).with("unused", "x");
    engine
        .execute_bind_query("SELECT * FROM t WHERE id = :id AND note = ':unused'", &params)
        .unwrap();

    let executed = db.executed();
    assert_eq!(executed[0].params.len(), 1);
    assert_eq!(executed[0].params.get("id"), Some(&SqlValue::Int(5)));
}

#[test]
fn test_pruning_follows_dialect_string_syntax() {
    let sql = r"SELECT * FROM t WHERE path = 'C:\' AND id = :id";
    let params = BindParams::new().with("id", 7);

    // Oracle literals end at the quote after the backslash
    let db = FakeDb::new();
    let mut oracle = engine(OracleDialect::new(), &db, options());
    oracle.execute_bind_query(sql, &params).unwrap();
    assert_eq!(db.executed()[0].params.get("id"), Some(&SqlValue::Int(7)));

    let db = FakeDb::new();
    let mut mysql = engine(MysqlDialect::new(), &db, options());
    mysql
        .execute_bind_query(r"SELECT * FROM t WHERE note = 'it\'s' AND id = :id", &params)
        .unwrap();
    assert_eq!(db.executed()[0].params.get("id"), Some(&SqlValue::Int(7)));
}

#[test]
fn test_empty_string_binds_as_null() {
    let db = FakeDb::new();
    let mut engine = engine(OracleDialect::new(), &db, options());
    let params = BindParams::new().with("name", "").with("id", 1);
    engine
        .execute_bind_query("UPDATE t SET name = :name WHERE id = :id", &params)
        .unwrap();

    let executed = db.executed();
    assert_eq!(executed[0].params.get("name"), Some(&SqlValue::Null));
    assert_eq!(executed[0].params.get("id"), Some(&SqlValue::Int(1)));
}

#[test]
fn test_simulation_skips_non_reads() {
    let db = FakeDb::new();
    let logger = Arc::new(MemoryLogger::default());
    let opts = EngineOptions {
        simulate: true,
        ..options()
    };
    let mut engine =
        Engine::new(MysqlDialect::new(), db.connector("trials"), opts).with_logger(logger.clone());
    engine.connect().unwrap();

    let params = BindParams::new().with("a", 1);
    let cursor = engine
        .execute_bind_query("INSERT INTO t (a) VALUES (:a)", &params)
        .unwrap();
    assert_eq!(cursor.affected_rows(), 0);
    engine
        .execute_bind_query("DROP TABLE t", &BindParams::new())
        .unwrap();
    engine
        .execute_bind_query("SELECT * FROM t", &BindParams::new())
        .unwrap();

    assert_eq!(db.sql(), vec!["SELECT * FROM t".to_string()]);
    let entries = logger.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.simulated));
    assert_eq!(entries[0].sql, "INSERT INTO t (a) VALUES (:a)");
    assert_eq!(entries[0].params_display(), "a=1");
}

#[test]
fn test_query_log_records_caller() {
    let db = FakeDb::new();
    db.once("boom", fail("ORA-00942", "table or view does not exist"));
    let logger = Arc::new(MemoryLogger::default());
    let opts = EngineOptions {
        log_queries: true,
        log_param_max_len: 4,
        ..options()
    };
    let mut engine =
        Engine::new(OracleDialect::new(), db.connector("XEPDB1"), opts).with_logger(logger.clone());
    engine.connect().unwrap();

    let params = BindParams::new().with("note", "abcdefgh");
    engine
        .execute_bind_query("SELECT :note FROM DUAL", &params)
        .unwrap();
    engine
        .execute_quiet("SELECT 2 FROM DUAL", &BindParams::new())
        .unwrap();
    assert!(engine
        .execute_bind_query("SELECT * FROM boom", &BindParams::new())
        .is_err());

    let entries = logger.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].location.file().ends_with("engine_tests.rs"));
    assert_eq!(entries[0].params, vec![("note".to_string(), "abcd...".to_string())]);
    assert!(!entries[0].simulated);
    assert!(entries[0].error.is_none());
    assert!(entries[1].error.as_deref().unwrap().contains("ORA-00942"));
}

#[test]
fn test_pagination_is_one_based() {
    let db = FakeDb::new();
    let mut mysql = engine(MysqlDialect::new(), &db, options());
    mysql
        .execute_paged("SELECT * FROM t ORDER BY id", &BindParams::new(), Page::new(10, 21))
        .unwrap();
    let mut oracle = engine(OracleDialect::new(), &db, options());
    oracle
        .execute_paged("SELECT * FROM t ORDER BY id", &BindParams::new(), Page::new(10, 21))
        .unwrap();
    oracle
        .execute_paged("SELECT * FROM t ORDER BY id", &BindParams::new(), Page::default())
        .unwrap();

    let sql = db.sql();
    assert_eq!(sql[0], "SELECT * FROM t ORDER BY id LIMIT 10 OFFSET 20");
    assert_eq!(sql[1], "SELECT * FROM t ORDER BY id OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY");
    assert_eq!(sql[2], "SELECT * FROM t ORDER BY id");
}

#[test]
fn test_transactions() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());

    // no-ops without a transaction
    engine.commit().unwrap();
    engine.rollback().unwrap();
    assert!(db.events().is_empty());

    engine.begin_transaction().unwrap();
    engine.begin_transaction().unwrap();
    assert!(engine.transaction_in_course());
    engine
        .execute_bind_query("UPDATE t SET a = 1", &BindParams::new())
        .unwrap();
    engine.commit().unwrap();
    assert!(!engine.transaction_in_course());
    engine
        .execute_bind_query("UPDATE t SET a = 2", &BindParams::new())
        .unwrap();

    engine.begin_transaction().unwrap();
    engine.rollback().unwrap();

    assert_eq!(db.events(), vec!["begin", "commit", "begin", "rollback"]);
    let executed = db.executed();
    assert!(!executed[0].autocommit);
    assert!(executed[1].autocommit);
}

#[test]
fn test_disconnect_rolls_back_open_transaction() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());
    engine.begin_transaction().unwrap();
    engine.disconnect().unwrap();
    engine.disconnect().unwrap();
    assert!(!engine.is_connected());
    assert!(!engine.transaction_in_course());
    assert_eq!(db.events(), vec!["begin", "rollback", "close"]);
}

#[test]
fn test_drop_closes_connection() {
    let db = FakeDb::new();
    {
        let _engine = engine(MysqlDialect::new(), &db, options());
    }
    assert_eq!(db.events(), vec!["close"]);
}

#[test]
fn test_multiple_sql_mysql_script() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());
    engine
        .execute_multiple_sql(&["DELETE FROM a;", "DELETE FROM b"], &BindParams::new())
        .unwrap();
    assert_eq!(db.events(), vec!["batch"]);
    assert_eq!(db.sql(), vec!["DELETE FROM a;\nDELETE FROM b".to_string()]);
}

#[test]
fn test_multiple_sql_mysql_with_params_runs_sequentially() {
    let db = FakeDb::new();
    let mut engine = engine(MysqlDialect::new(), &db, options());
    let params = BindParams::new().with("id", 1).with("x", 2);
    engine
        .execute_multiple_sql(
            &["DELETE FROM a WHERE id = :id", "DELETE FROM b WHERE x = :x"],
            &params,
        )
        .unwrap();

    let executed = db.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].params.names(), vec!["id"]);
    assert_eq!(executed[1].params.names(), vec!["x"]);
}

#[test]
fn test_multiple_sql_oracle_block() {
    let db = FakeDb::new();
    let mut engine = engine(OracleDialect::new(), &db, options());
    engine
        .execute_multiple_sql(
            &["CREATE TABLE t (v VARCHAR2(10) DEFAULT 'x')", "INSERT INTO t VALUES ('y')"],
            &BindParams::new(),
        )
        .unwrap();

    let sql = db.sql();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].starts_with("BEGIN\n"));
    assert!(sql[0].contains("EXECUTE IMMEDIATE 'CREATE TABLE t (v VARCHAR2(10) DEFAULT ''x'')';"));
    assert!(sql[0].contains("  INSERT INTO t VALUES ('y');\n"));
    assert!(sql[0].ends_with("END;"));
}

#[test]
fn test_multiple_sql_read_only() {
    let db = FakeDb::new();
    let opts = EngineOptions {
        read_only: true,
        ..options()
    };
    let mut engine = engine(OracleDialect::new(), &db, opts);
    let err = engine
        .execute_multiple_sql(&["SELECT 1 FROM DUAL", "DELETE FROM t"], &BindParams::new())
        .unwrap_err();
    assert_eq!(err.code(), "READ_ONLY_MODE");
    assert!(db.sql().is_empty());
}

#[test]
fn test_sequence_helpers() {
    let db = FakeDb::new();
    db.on("NEXTVAL", rows(&["ID"], vec![vec![SqlValue::Int(7)]]));
    db.on("CURRVAL", rows(&["ID"], vec![vec![SqlValue::Int(6)]]));
    db.on("LAST_INSERT_ID", rows(&["ID"], vec![vec![SqlValue::Int(42)]]));

    let mut oracle = engine(OracleDialect::new(), &db, options());
    assert_eq!(oracle.next_sequence_value("aliquots_seq").unwrap(), Some(7));
    assert_eq!(oracle.last_insert_id("aliquots").unwrap(), 6);

    let mut mysql = engine(MysqlDialect::new(), &db, options());
    db.clear();
    assert_eq!(mysql.next_sequence_value("aliquots_seq").unwrap(), None);
    assert!(db.sql().is_empty());
    assert_eq!(mysql.last_insert_id("aliquots").unwrap(), 42);
}

#[test]
fn test_upsert_query_per_dialect() {
    let db = FakeDb::new();
    let mysql = engine(MysqlDialect::new(), &db, options());
    let sql = mysql.build_insert_or_update_query("aliquots", &["id"], &["name"]);
    assert!(sql.starts_with("INSERT INTO `aliquots` (`id`, `name`) VALUES (:id, :name)"));
    assert!(sql.ends_with("ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"));

    let oracle = engine(OracleDialect::new(), &db, options());
    let sql = oracle.build_insert_or_update_query("aliquots", &["id"], &[]);
    assert!(sql.starts_with("MERGE INTO \"ALIQUOTS\" t USING DUAL ON (t.\"ID\" = :id)"));
    assert!(!sql.contains("WHEN MATCHED"));
    assert!(sql.contains("WHEN NOT MATCHED THEN INSERT"));
}
