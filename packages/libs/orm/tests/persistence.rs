//! bind / 저장 / 조회 흐름 테스트 (기록용 드라이버)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use clb_core::schema::{SchemaParser, SchemaSet, TableDefinition};
use clb_core::CqlValue;
use clb_cql::{Statement, TableState};
use clb_orm::{
    bind, BindOptions, DriverGateway, Error, ExecOptions, QueryOptions, Result, Row, SaveOptions,
};

const PERSON_YAML: &str = r#"
version: 1
models:
  person:
    fields:
      id: uuid
      name: { type: text, default: "no name" }
      surname: text
      age:
        type: int
        rule: { validator: "value > 0", message: "must be > 0, got {value}" }
      created: { type: timestamp, default: { $db_function: "toTimestamp(now())" } }
      complete_name: { type: text, virtual: { get: "name + ' ' + surname" } }
    key: [id]
    indexes: [surname]
"#;

const PERSON_ID: &str = "6c84fb90-12c4-11e1-840d-7b25c5ee775a";

/// 실행된 문장을 기록하고, INSERT된 행을 SELECT 결과로 돌려주는 드라이버
#[derive(Default)]
struct RecordingDriver {
    executed: Mutex<Vec<Statement>>,
    tables: Mutex<HashMap<String, TableDefinition>>,
    rows: Mutex<Vec<Row>>,
}

impl RecordingDriver {
    fn statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.cql.clone())
            .collect()
    }

    fn table_ddl(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|cql| cql.contains(" TABLE ") || cql.contains(" INDEX "))
            .collect()
    }

    fn set_live(&self, table: TableDefinition) {
        self.tables.lock().unwrap().insert(table.name.clone(), table);
    }

    fn clear(&self) {
        self.executed.lock().unwrap().clear();
    }

    /// `INSERT INTO t ("a", "b") VALUES (?, fn())` → 행
    fn store_insert(&self, statement: &Statement) {
        let cql = &statement.cql;
        let (Some(open), Some(values_at)) = (cql.find('('), cql.find(" VALUES (")) else {
            return;
        };
        let columns: Vec<String> = cql[open + 1..values_at - 1]
            .split(", ")
            .map(|c| c.trim_matches('"').to_string())
            .collect();
        let values_end = cql.rfind(')').unwrap_or(cql.len());
        let markers: Vec<&str> = cql[values_at + 9..values_end].split(", ").collect();

        let mut params = statement.params.iter();
        let mut row = Row::new();
        for (column, marker) in columns.into_iter().zip(markers) {
            let value = if marker == "?" {
                params.next().cloned().unwrap_or(CqlValue::Null)
            } else {
                // 스토어 함수 (toTimestamp(now()))
                CqlValue::Timestamp(1_700_000_000_000)
            };
            row.insert(column, value);
        }
        self.rows.lock().unwrap().push(row);
    }
}

#[async_trait]
impl DriverGateway for RecordingDriver {
    async fn execute(&self, statement: &Statement, _options: &ExecOptions) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(statement.clone());

        if statement.cql.starts_with("INSERT") {
            self.store_insert(statement);
        }
        if statement.cql.starts_with("SELECT") {
            return Ok(self.rows.lock().unwrap().clone());
        }
        Ok(Vec::new())
    }

    async fn describe_table(&self, _keyspace: &str, table: &str) -> Result<Option<TableDefinition>> {
        Ok(self.tables.lock().unwrap().get(table).cloned())
    }
}

fn schemas() -> SchemaSet {
    SchemaParser::parse_multiple(&[PERSON_YAML]).unwrap()
}

fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_bind_creates_absent_tables() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .unwrap();

    let statements = driver.statements();
    assert!(statements[0].starts_with("CREATE KEYSPACE IF NOT EXISTS \"app\""));
    assert_eq!(driver.table_ddl().len(), 2);
    assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS \"app\".\"person\""));
    assert!(statements[2].contains("\"person_surname_idx\""));
    assert_eq!(ctx.table_state("person"), Some(TableState::Created));
}

#[tokio::test]
async fn test_bind_is_idempotent() {
    let driver = Arc::new(RecordingDriver::default());
    let set = schemas();
    let live = set.get("person").unwrap().table_definition();

    bind(driver.clone(), BindOptions::new("app"), set.clone())
        .await
        .unwrap();

    driver.set_live(live);
    driver.clear();

    let ctx = bind(driver.clone(), BindOptions::new("app"), set)
        .await
        .unwrap();
    assert!(driver.table_ddl().is_empty());
    assert_eq!(ctx.table_state("person"), Some(TableState::InSync));
}

#[tokio::test]
async fn test_bind_divergence() {
    let mut live = schemas().get("person").unwrap().table_definition();
    live.columns.insert("age".to_string(), "text".to_string());

    // 재생성 비활성: SchemaMismatch, DDL 없음
    let driver = Arc::new(RecordingDriver::default());
    driver.set_live(live.clone());
    let err = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
    assert!(driver.table_ddl().is_empty());

    // 재생성 활성: DROP 후 CREATE
    let driver = Arc::new(RecordingDriver::default());
    driver.set_live(live);
    let ctx = bind(
        driver.clone(),
        BindOptions::new("app").destructive_recreate(true),
        schemas(),
    )
    .await
    .unwrap();

    let ddl = driver.table_ddl();
    assert_eq!(ddl[0], "DROP TABLE IF EXISTS \"app\".\"person\"");
    assert!(ddl[1].starts_with("CREATE TABLE"));
    assert_eq!(ctx.table_state("person"), Some(TableState::Recreated));
}

#[tokio::test]
async fn test_save_find_round_trip() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .unwrap();
    let person = ctx.model("person").unwrap();

    let instance = person
        .new_instance(obj(json!({
            "id": PERSON_ID,
            "name": "Alex",
            "surname": "Rubiks",
            "age": 32
        })))
        .unwrap();
    assert!(instance.is_deferred("created"));

    let applied = person.save(&instance, &SaveOptions::default()).await.unwrap();
    assert!(applied);

    let insert = driver
        .statements()
        .into_iter()
        .find(|cql| cql.starts_with("INSERT"))
        .unwrap();
    assert!(insert.contains("toTimestamp(now())"));

    // 저장 후에도 스토어 기본값은 클라이언트에 없음
    assert_eq!(instance.get("created").unwrap(), Value::Null);

    let found = person
        .find_one(&json!({ "id": PERSON_ID }), &QueryOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get("id").unwrap(), json!(PERSON_ID));
    assert_eq!(found.get("age").unwrap(), json!(32));
    assert_eq!(found.get("complete_name").unwrap(), json!("Alex Rubiks"));
    assert_eq!(found.get("created").unwrap(), json!("2023-11-14T22:13:20.000Z"));

    let select = driver
        .statements()
        .into_iter()
        .find(|cql| cql.starts_with("SELECT"))
        .unwrap();
    assert_eq!(
        select,
        "SELECT * FROM \"app\".\"person\" WHERE \"id\" = ? LIMIT ?"
    );
}

#[tokio::test]
async fn test_raw_rows() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .unwrap();
    let person = ctx.model("person").unwrap();

    let instance = person
        .new_instance(obj(json!({ "id": PERSON_ID, "surname": "Rubiks" })))
        .unwrap();
    person.save(&instance, &SaveOptions::default()).await.unwrap();

    let rows = person
        .find(
            &json!({ "surname": "Rubiks" }),
            &QueryOptions {
                raw: true,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("no name")));
    assert!(rows[0].get("complete_name").is_none());
}

#[tokio::test]
async fn test_validation_happens_before_driver_call() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .unwrap();
    let person = ctx.model("person").unwrap();
    driver.clear();

    let err = person
        .new_instance(obj(json!({ "id": PERSON_ID, "age": -15 })))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "validation failed for 'age': must be > 0, got -15"
    );

    let err = person
        .find(&json!({ "age": { "$gt": 1 } }), &QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQueryShape { .. }));

    let incomplete = person.new_instance(obj(json!({ "name": "Nobody" }))).unwrap();
    let err = person.delete(&incomplete).await.unwrap_err();
    assert!(matches!(err, Error::IncompleteKey { .. }));

    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_update_and_delete() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver.clone(), BindOptions::new("app"), schemas())
        .await
        .unwrap();
    let person = ctx.model("person").unwrap();
    driver.clear();

    person
        .update(
            &json!({ "id": PERSON_ID }),
            &json!({ "age": 33 }),
            &SaveOptions {
                ttl: Some(3600),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    person.delete_where(&json!({ "id": PERSON_ID })).await.unwrap();

    assert_eq!(
        driver.statements(),
        vec![
            "UPDATE \"app\".\"person\" USING TTL ? SET \"age\" = ? WHERE \"id\" = ?".to_string(),
            "DELETE FROM \"app\".\"person\" WHERE \"id\" = ?".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unknown_model() {
    let driver = Arc::new(RecordingDriver::default());
    let ctx = bind(driver, BindOptions::new("app").create_keyspace(false), schemas())
        .await
        .unwrap();
    assert!(matches!(ctx.model("animal"), Err(Error::UnknownModel { .. })));
    assert_eq!(ctx.table_state("animal"), None);
    assert_eq!(ctx.uuid().len(), 36);
    assert_eq!(ctx.model_names().collect::<Vec<_>>(), vec!["person"]);
}
