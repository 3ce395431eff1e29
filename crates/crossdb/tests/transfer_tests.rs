mod support;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crossdb::{
    dump_table, populate_table, EngineOptions, MysqlDialect, OracleDialect, SqlValue,
};
use support::{engine, fail, rows, FakeDb};

const COLUMN_INFO: [&str; 8] = [
    "COLUMN_NAME",
    "DATA_TYPE",
    "CHAR_LENGTH",
    "DATA_PRECISION",
    "DATA_SCALE",
    "NULLABLE",
    "DATA_DEFAULT",
    "EXTRA",
];

/// Script the catalog answer for one column.
fn column(
    db: &FakeDb,
    catalog: &str,
    name: &str,
    data_type: &str,
    length: i64,
    precision: i64,
    scale: i64,
) {
    db.on_bind(
        catalog,
        name,
        rows(
            &COLUMN_INFO,
            vec![vec![
                SqlValue::from(name),
                SqlValue::from(data_type),
                SqlValue::Int(length),
                SqlValue::Int(precision),
                SqlValue::Int(scale),
                SqlValue::from("YES"),
                SqlValue::Null,
                SqlValue::from(""),
            ]],
        ),
    );
}

fn created() -> SqlValue {
    SqlValue::DateTime(
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
    )
}

fn sample_rows() -> Vec<Vec<SqlValue>> {
    vec![
        vec![
            SqlValue::Int(1),
            SqlValue::from("alpha"),
            created(),
            SqlValue::Bytes(vec![0, 1, 2]),
            SqlValue::Decimal(Decimal::new(1250, 2)),
        ],
        vec![
            SqlValue::Int(2),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
        ],
    ]
}

#[test]
fn test_dump_table_writes_line_json() {
    let db = FakeDb::new();
    db.on(
        "SELECT * FROM `aliquots`",
        rows(&["ID", "NAME", "CREATED", "PAYLOAD", "AMOUNT"], sample_rows()),
    );
    let mut engine = engine(MysqlDialect::new(), &db, EngineOptions::default());

    let mut out = Vec::new();
    let stats = dump_table(&mut engine, "aliquots", &mut out).unwrap();
    assert_eq!(stats.rows, 2);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], r#"["ID","NAME","CREATED","PAYLOAD","AMOUNT"]"#);
    assert_eq!(lines[1], r#"[1,"alpha","2024-03-01 10:00:00","AAEC","12.50"]"#);
    assert_eq!(lines[2], "[2,null,null,null,null]");
}

#[test]
fn test_dump_then_populate_round_trip() {
    let source = FakeDb::new();
    source.on(
        "SELECT * FROM \"ALIQUOTS\"",
        rows(&["ID", "NAME", "CREATED", "PAYLOAD", "AMOUNT"], sample_rows()),
    );
    let mut oracle = engine(OracleDialect::new(), &source, EngineOptions::default());
    let mut dump = Vec::new();
    dump_table(&mut oracle, "aliquots", &mut dump).unwrap();

    let target = FakeDb::new();
    column(&target, "information_schema.COLUMNS", "ID", "bigint", 0, 19, 0);
    column(&target, "information_schema.COLUMNS", "NAME", "varchar", 64, 0, 0);
    column(&target, "information_schema.COLUMNS", "CREATED", "datetime", 0, 0, 0);
    column(&target, "information_schema.COLUMNS", "PAYLOAD", "longblob", 0, 0, 0);
    column(&target, "information_schema.COLUMNS", "AMOUNT", "decimal", 0, 8, 2);
    let mut mysql = engine(MysqlDialect::new(), &target, EngineOptions::default());

    let stats = populate_table(&mut mysql, "aliquots", dump.as_slice(), |_| {}).unwrap();
    assert_eq!(stats.rows, 2);

    let inserts: Vec<_> = target
        .executed()
        .into_iter()
        .filter(|e| e.sql.starts_with("INSERT"))
        .collect();
    assert_eq!(inserts.len(), 2);
    assert_eq!(
        inserts[0].sql,
        "INSERT INTO `aliquots` (`ID`, `NAME`, `CREATED`, `PAYLOAD`, `AMOUNT`) \
         VALUES (:c0, :c1, :c2, :blob_c3, :c4)"
    );
    let values: Vec<SqlValue> = inserts[0].params.iter().map(|(_, v)| v.clone()).collect();
    assert_eq!(values, sample_rows()[0]);
    let values: Vec<SqlValue> = inserts[1].params.iter().map(|(_, v)| v.clone()).collect();
    assert_eq!(values, sample_rows()[1]);
}

#[test]
fn test_populate_commits_every_ten_rows() {
    let db = FakeDb::new();
    column(&db, "information_schema.COLUMNS", "ID", "bigint", 0, 19, 0);
    column(&db, "information_schema.COLUMNS", "NAME", "varchar", 64, 0, 0);
    let mut engine = engine(MysqlDialect::new(), &db, EngineOptions::default());

    let mut input = String::from("[\"ID\",\"NAME\"]\n");
    for i in 0..25 {
        input.push_str(&format!("[{},\"row {}\"]\n", i, i));
    }

    let mut progress = Vec::new();
    let stats =
        populate_table(&mut engine, "aliquots", input.as_bytes(), |n| progress.push(n)).unwrap();

    assert_eq!(stats.rows, 25);
    assert_eq!(stats.commits, 3);
    assert_eq!(progress, vec![10, 20, 25]);
    assert_eq!(
        db.events(),
        vec!["begin", "commit", "begin", "commit", "begin", "commit"]
    );
    assert!(!engine.transaction_in_course());

    let inserts: Vec<_> = db
        .executed()
        .into_iter()
        .filter(|e| e.sql.starts_with("INSERT"))
        .collect();
    assert_eq!(inserts.len(), 25);
    assert!(inserts.iter().all(|e| !e.autocommit));
    assert_eq!(inserts[24].params.get("c1"), Some(&SqlValue::from("row 24")));
}

#[test]
fn test_populate_joins_open_transaction() {
    let db = FakeDb::new();
    column(&db, "information_schema.COLUMNS", "ID", "bigint", 0, 19, 0);
    let mut engine = engine(MysqlDialect::new(), &db, EngineOptions::default());

    let mut input = String::from("[\"ID\"]\n");
    for i in 0..12 {
        input.push_str(&format!("[{}]\n", i));
    }

    engine.begin_transaction().unwrap();
    let mut progress = Vec::new();
    let stats =
        populate_table(&mut engine, "aliquots", input.as_bytes(), |n| progress.push(n)).unwrap();

    assert_eq!(stats.commits, 0);
    assert_eq!(progress, vec![10, 12]);
    assert!(engine.transaction_in_course());
    assert_eq!(db.events(), vec!["begin"]);
}

#[test]
fn test_populate_rolls_back_on_failure() {
    let db = FakeDb::new();
    column(&db, "information_schema.COLUMNS", "ID", "bigint", 0, 19, 0);
    db.once("INSERT", fail("1062", "Duplicate entry '0' for key 'PRIMARY'"));
    let mut engine = engine(MysqlDialect::new(), &db, EngineOptions::default());

    let err = populate_table(&mut engine, "aliquots", "[\"ID\"]\n[0]\n".as_bytes(), |_| {})
        .unwrap_err();
    assert!(err.to_string().contains("1062"));
    assert_eq!(db.events(), vec!["begin", "rollback"]);
    assert!(!engine.transaction_in_course());
}

#[test]
fn test_populate_rejects_short_rows() {
    let db = FakeDb::new();
    column(&db, "information_schema.COLUMNS", "ID", "bigint", 0, 19, 0);
    column(&db, "information_schema.COLUMNS", "NAME", "varchar", 64, 0, 0);
    let mut engine = engine(MysqlDialect::new(), &db, EngineOptions::default());

    let err = populate_table(
        &mut engine,
        "aliquots",
        "[\"ID\",\"NAME\"]\n[1]\n".as_bytes(),
        |_| {},
    )
    .unwrap_err();
    assert!(err.to_string().contains("line 2"));
    assert_eq!(db.events(), vec!["begin", "rollback"]);
}

#[test]
fn test_populate_unknown_column() {
    let db = FakeDb::new();
    let mut engine = engine(OracleDialect::new(), &db, EngineOptions::default());
    let err = populate_table(&mut engine, "aliquots", "[\"NOPE\"]\n".as_bytes(), |_| {})
        .unwrap_err();
    assert_eq!(err.code(), "DATABASE_COLUMN_NOT_FOUND");
    assert!(db.events().is_empty());
}

#[test]
fn test_populate_oracle_lob_binds() {
    let db = FakeDb::new();
    column(&db, "USER_TAB_COLUMNS", "DOC", "CLOB", 0, 0, 0);
    column(&db, "USER_TAB_COLUMNS", "IMG", "BLOB", 0, 0, 0);
    let mut engine = engine(OracleDialect::new(), &db, EngineOptions::default());

    populate_table(
        &mut engine,
        "documents",
        "[\"DOC\",\"IMG\"]\n[\"long text\",\"AAEC\"]\n".as_bytes(),
        |_| {},
    )
    .unwrap();

    let insert = db
        .executed()
        .into_iter()
        .find(|e| e.sql.starts_with("INSERT"))
        .unwrap();
    assert_eq!(
        insert.sql,
        "INSERT INTO \"DOCUMENTS\" (\"DOC\", \"IMG\") VALUES (:clob_c0, :blob_c1)"
    );
    assert_eq!(insert.params.get("clob_c0"), Some(&SqlValue::from("long text")));
    assert_eq!(insert.params.get("blob_c1"), Some(&SqlValue::Bytes(vec![0, 1, 2])));
}
