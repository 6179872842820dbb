//! End-to-end tests through the gateway against SQLite files.
//!
//! A temporary directory stands in for the FileMaker host: each database is a
//! `<name>.db` file inside it.

use filemaker_mcp_server::db::{ConnectionRegistry, QueryExecutor, SqliteDriver};
use filemaker_mcp_server::mcp::GatewayService;
use filemaker_mcp_server::models::ConnectionConfig;
use filemaker_mcp_server::tools::ToolContext;
use rmcp::model::{CallToolResult, ResourceContents};
use serde_json::{Value as JsonValue, json};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::sync::Arc;
use tempfile::TempDir;

const PATIENTS_DDL: &str = "CREATE TABLE Patients (
    \"patient id#\" INTEGER,
    \"Last Name\" VARCHAR(40),
    \"First Name\" VARCHAR(40),
    \"Middle Initial\" VARCHAR(1),
    \"Street Address\" VARCHAR(80),
    \"City\" VARCHAR(40),
    \"State\" VARCHAR(2),
    \"Zip\" VARCHAR(10),
    \"Home Phone\" VARCHAR(20),
    \"Work Phone\" VARCHAR(20),
    \"birth date\" DATE
);
INSERT INTO Patients VALUES (1, 'Smith', 'Anna', 'K', '1 Main St', 'Dayton', 'OH', '45402', '555-0101', NULL, '1980-02-03');
INSERT INTO Patients VALUES (2, 'Smith-Jones', 'Ben', NULL, '9 Oak Ave', 'Xenia', 'OH', '45385', NULL, NULL, '1975-11-30');
INSERT INTO Patients VALUES (3, 'Brown', 'Cara', NULL, '4 Elm Rd', 'Dayton', 'OH', '45402', NULL, NULL, NULL);";

const APPOINTMENTS_DDL: &str = "CREATE TABLE Appointments (
    \"patient id#\" INTEGER,
    dateappt TEXT,
    timeappt TEXT,
    reason TEXT
);
INSERT INTO Appointments VALUES (1, '2024-03-04', '10:00', 'Cleaning');
INSERT INTO Appointments VALUES (3, '2024-03-04', '09:00', 'Exam');
INSERT INTO Appointments VALUES (1, '2024-03-11', '14:00', 'Filling');";

async fn seed(dir: &TempDir, database: &str, ddl: &str) {
    let config = ConnectionConfig::new(dir.path().to_string_lossy());
    let mut conn = SqliteConnectOptions::new()
        .filename(SqliteDriver::database_path(&config, database))
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::raw_sql(ddl).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();
}

async fn setup() -> (TempDir, GatewayService) {
    let dir = TempDir::new().unwrap();
    seed(&dir, "Patients", PATIENTS_DDL).await;
    seed(&dir, "Appointments", APPOINTMENTS_DDL).await;

    let registry = Arc::new(ConnectionRegistry::new(
        Arc::new(SqliteDriver),
        ConnectionConfig::new(dir.path().to_string_lossy()),
    ));
    let databases = vec![
        "Patients".to_string(),
        "Appointments".to_string(),
        "Insurance".to_string(),
    ];
    let ctx = ToolContext::new(registry, QueryExecutor::new(), databases);
    (dir, GatewayService::new(ctx))
}

async fn call(service: &GatewayService, name: &str, arguments: JsonValue) -> JsonValue {
    let arguments = match arguments {
        JsonValue::Object(map) => Some(map),
        _ => None,
    };
    body(&service.call(name, arguments).await)
}

fn body(result: &CallToolResult) -> JsonValue {
    let text = &result.content[0].as_text().unwrap().text;
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_query_returns_rows() {
    let (_dir, service) = setup().await;
    let response = call(
        &service,
        "query",
        json!({
            "database": "Patients",
            "sql": "SELECT \"patient id#\", \"Last Name\" FROM Patients ORDER BY \"patient id#\""
        }),
    )
    .await;

    assert_eq!(response["success"], true);
    assert_eq!(response["row_count"], 3);
    assert_eq!(response["data"][0]["patient id#"], 1);
    assert_eq!(response["data"][2]["Last Name"], "Brown");
}

#[tokio::test]
async fn test_search_patients_matches_substring() {
    let (_dir, service) = setup().await;
    let response = call(&service, "search_patients", json!({"search_term": "Smith"})).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["row_count"], 2);
    let names: Vec<&str> = response["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["Last Name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Smith"));
    assert!(names.contains(&"Smith-Jones"));
    assert!(response["data"][0].get("patient id#").is_none());
}

#[tokio::test]
async fn test_search_patients_other_field() {
    let (_dir, service) = setup().await;
    let response = call(
        &service,
        "search_patients",
        json!({"search_term": "Dayton", "field": "\"City\"", "limit": 1}),
    )
    .await;

    assert_eq!(response["success"], true);
    assert_eq!(response["row_count"], 1);
    assert_eq!(response["data"][0]["City"], "Dayton");
}

#[tokio::test]
async fn test_insert_then_query() {
    let (_dir, service) = setup().await;
    let inserted = call(
        &service,
        "insert_record",
        json!({
            "database": "Patients",
            "table": "Patients",
            "data": {"\"patient id#\"": 4, "\"Last Name\"": "O'Brien", "\"City\"": "Kettering"}
        }),
    )
    .await;
    assert_eq!(inserted["success"], true);
    assert_eq!(inserted["data"]["rows_affected"], 1);

    let response = call(
        &service,
        "query",
        json!({
            "database": "Patients",
            "sql": "SELECT \"Last Name\", \"City\" FROM Patients WHERE \"patient id#\" = 4"
        }),
    )
    .await;
    assert_eq!(response["row_count"], 1);
    assert_eq!(response["data"][0]["Last Name"], "O'Brien");
}

#[tokio::test]
async fn test_update_record() {
    let (_dir, service) = setup().await;
    let updated = call(
        &service,
        "update_record",
        json!({
            "database": "Patients",
            "table": "Patients",
            "data": {"\"City\"": "Fairborn"},
            "where": "\"City\" = 'Dayton'"
        }),
    )
    .await;
    assert_eq!(updated["success"], true);
    assert_eq!(updated["data"]["rows_affected"], 2);
    assert_eq!(updated["data"]["message"], "Updated 2 record(s)");

    let response = call(
        &service,
        "query",
        json!({"database": "Patients", "sql": "SELECT * FROM Patients WHERE \"City\" = 'Fairborn'"}),
    )
    .await;
    assert_eq!(response["row_count"], 2);
}

#[tokio::test]
async fn test_bad_sql_is_query_error() {
    let (_dir, service) = setup().await;
    let response = call(
        &service,
        "query",
        json!({"database": "Patients", "sql": "SELECT * FROM Nowhere"}),
    )
    .await;

    assert_eq!(response["success"], false);
    assert_eq!(response["error_type"], "query");
}

#[tokio::test]
async fn test_appointments_for_day_in_time_order() {
    let (_dir, service) = setup().await;
    let response = call(&service, "get_appointments", json!({"date": "2024-03-04"})).await;

    assert_eq!(response["success"], true);
    assert_eq!(response["row_count"], 2);
    assert_eq!(response["data"][0]["timeappt"], "09:00");
    assert_eq!(response["data"][1]["timeappt"], "10:00");
}

#[tokio::test]
async fn test_describe_table() {
    let (_dir, service) = setup().await;
    let response = call(
        &service,
        "describe_table",
        json!({"database": "Patients", "table": "Patients"}),
    )
    .await;

    assert_eq!(response["success"], true);
    let columns = response["data"]["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 11);
    assert_eq!(columns[1]["name"], "Last Name");
    assert_eq!(columns[1]["type"], "VARCHAR(40)");
    assert_eq!(columns[1]["size"], 40);
}

#[tokio::test]
async fn test_list_all_databases_with_missing_file() {
    let (_dir, service) = setup().await;
    let response = call(&service, "list_all_databases", json!({})).await;

    let databases = &response["data"]["databases"];
    assert_eq!(databases["Patients"]["tables"], json!(["Patients"]));
    assert_eq!(databases["Appointments"]["count"], 1);
    assert!(databases["Insurance"]["error"].is_string());
}

#[tokio::test]
async fn test_schema_resource() {
    let (_dir, service) = setup().await;
    let result = service.read("filemaker://Appointments").await.unwrap();
    let ResourceContents::TextResourceContents { text, uri, .. } = &result.contents[0] else {
        panic!("expected text contents");
    };
    assert_eq!(uri, "filemaker://Appointments");

    let schema: JsonValue = serde_json::from_str(text).unwrap();
    assert_eq!(schema["database"], "Appointments");
    assert_eq!(schema["tables"][0]["name"], "Appointments");
    assert_eq!(schema["tables"][0]["columns"][1]["name"], "dateappt");
}

#[tokio::test]
async fn test_close_all_then_reopen() {
    let (_dir, service) = setup().await;
    call(&service, "list_tables", json!({"database": "Patients"})).await;
    assert_eq!(service.registry().connection_count().await, 1);

    service.registry().close_all().await;
    assert_eq!(service.registry().connection_count().await, 0);

    let response = call(&service, "list_tables", json!({"database": "Patients"})).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["tables"], json!(["Patients"]));
}

#[tokio::test]
async fn test_tally_patients_by_city() {
    let (_dir, service) = setup().await;
    let ctx = service.router().context();
    let rows = ctx
        .read(
            "Patients",
            "SELECT \"City\" FROM Patients ORDER BY \"patient id#\"",
            &[],
            100,
        )
        .await
        .unwrap();

    let counts = filemaker_mcp_server::db::tally(&rows, "City", "Unknown");
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].value, "Dayton");
    assert_eq!(counts[0].count, 2);
    assert_eq!(counts[1].value, "Xenia");
    assert_eq!(counts[1].count, 1);
}
