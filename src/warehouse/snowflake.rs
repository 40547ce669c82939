//! Snowflake SQL API (v2) client
//!
//! Each statement is a `POST /api/v2/statements`. A `202` means the
//! statement is still running and its status URL is polled until it
//! completes; large results arrive in partitions that are fetched in order.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use super::{QueryResult, Warehouse, WarehouseError};
use crate::config::ConnectionConfig;

const STATEMENTS_PATH: &str = "/api/v2/statements";

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    code: Option<String>,
    sql_state: Option<String>,
    message: Option<String>,
    statement_handle: Option<String>,
    statement_status_url: Option<String>,
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    stats: Option<DmlStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DmlStats {
    num_rows_inserted: Option<u64>,
    num_rows_updated: Option<u64>,
    num_rows_deleted: Option<u64>,
}

impl DmlStats {
    fn total(&self) -> u64 {
        self.num_rows_inserted.unwrap_or(0)
            + self.num_rows_updated.unwrap_or(0)
            + self.num_rows_deleted.unwrap_or(0)
    }
}

pub struct SnowflakeClient {
    client: Client,
    base_url: String,
    database: String,
    warehouse: Option<String>,
    role: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl SnowflakeClient {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let base_url = config.base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.password))
            .context("Password contains characters that cannot be sent in a header")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            "x-snowflake-authorization-token-type",
            HeaderValue::from_static(config.auth.token_type()),
        );

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs + 30))
            .build()
            .context("Failed to create HTTP client")?;

        debug!(url = %base_url, user = credentials.user, "Snowflake client ready");

        Ok(Self {
            client,
            base_url,
            database: config.database.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    fn submit(&self, sql: &str) -> Result<(StatusCode, StatementResponse), WarehouseError> {
        let request = StatementRequest {
            statement: sql,
            timeout: self.timeout.as_secs(),
            database: &self.database,
            warehouse: self.warehouse.as_deref(),
            role: self.role.as_deref(),
        };
        let url = format!(
            "{}{}?requestId={}",
            self.base_url,
            STATEMENTS_PATH,
            Uuid::new_v4()
        );

        let response = self.client.post(&url).json(&request).send()?;
        read_response(response)
    }

    /// Poll until the statement leaves the running state
    fn wait_for(&self, mut body: StatementResponse) -> Result<StatementResponse, WarehouseError> {
        let started = Instant::now();
        let handle = body.statement_handle.clone().unwrap_or_default();

        loop {
            if started.elapsed() > self.timeout {
                return Err(WarehouseError::Timeout {
                    handle,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            thread::sleep(self.poll_interval);

            let url = match &body.statement_status_url {
                Some(path) => format!("{}{}", self.base_url, path),
                None => format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle),
            };
            debug!(handle = %handle, "polling statement status");

            let (status, next) = read_response(self.client.get(&url).send()?)?;
            if status != StatusCode::ACCEPTED {
                return Ok(next);
            }
            body = next;
        }
    }

    fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<Vec<Option<String>>>, WarehouseError> {
        let url = format!(
            "{}{}/{}?partition={}",
            self.base_url, STATEMENTS_PATH, handle, partition
        );
        let (_, body) = read_response(self.client.get(&url).send()?)?;
        Ok(body.data)
    }
}

impl Warehouse for SnowflakeClient {
    fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError> {
        debug!(statement = %sql, "executing");

        let (status, mut body) = self.submit(sql)?;
        if status == StatusCode::ACCEPTED {
            body = self.wait_for(body)?;
        }

        let mut rows = std::mem::take(&mut body.data);
        let mut columns = Vec::new();

        if let Some(meta) = &body.result_set_meta_data {
            columns = meta.row_type.iter().map(|r| r.name.clone()).collect();

            if meta.partition_info.len() > 1 {
                let handle = body.statement_handle.as_deref().ok_or_else(|| {
                    WarehouseError::Decode("partitioned result without statement handle".to_string())
                })?;
                for partition in 1..meta.partition_info.len() {
                    rows.extend(self.fetch_partition(handle, partition)?);
                }
            }
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: body.stats.as_ref().map(DmlStats::total),
        })
    }
}

/// Turn an HTTP response into a parsed body or a typed API error
fn read_response(response: Response) -> Result<(StatusCode, StatementResponse), WarehouseError> {
    let status = response.status();
    let text = response.text()?;

    if status.is_success() {
        let body: StatementResponse = serde_json::from_str(&text)
            .map_err(|e| WarehouseError::Decode(format!("{}: {}", e, truncate(&text))))?;
        return Ok((status, body));
    }

    let body: StatementResponse = serde_json::from_str(&text).unwrap_or_default();
    Err(WarehouseError::Api {
        status: status.as_u16(),
        code: body.code.unwrap_or_default(),
        sql_state: body.sql_state.unwrap_or_default(),
        message: body.message.unwrap_or_else(|| truncate(&text)),
    })
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};

    struct Reply {
        status: u16,
        body: Vec<u8>,
        gzip: bool,
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status,
            body: body.as_bytes().to_vec(),
            gzip: false,
        }
    }

    /// Local HTTP server answering one connection per scripted reply.
    /// Returns its base URL and the raw requests it received.
    fn serve(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        thread::spawn(move || {
            for reply in replies {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                log.lock().unwrap().push(read_request(&mut reader));

                let mut stream = reader.into_inner();
                let encoding = if reply.gzip { "Content-Encoding: gzip\r\n" } else { "" };
                write!(
                    stream,
                    "HTTP/1.1 {} Reply\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n",
                    reply.status,
                    encoding,
                    reply.body.len()
                )
                .unwrap();
                stream.write_all(&reply.body).unwrap();
            }
        });

        (url, seen)
    }

    fn read_request(reader: &mut BufReader<TcpStream>) -> String {
        let mut head = String::new();
        let mut length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                length = value.trim().parse().unwrap();
            }
            head.push_str(&line);
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body).unwrap();
        head + &String::from_utf8_lossy(&body)
    }

    fn client(url: &str, timeout_secs: u64) -> SnowflakeClient {
        SnowflakeClient::connect(&ConnectionConfig {
            account: Some("test".to_string()),
            user: Some("loader".to_string()),
            password: Some("secret-token".to_string()),
            endpoint: Some(url.to_string()),
            timeout_secs,
            poll_interval_ms: 5,
            ..ConnectionConfig::default()
        })
        .unwrap()
    }

    /// Gzip member holding `data` in a single stored deflate block
    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut crc = !0u32;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }

        let len = data.len() as u16;
        let mut out = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff, 0x01];
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(&(!crc).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out
    }

    #[test]
    fn test_polls_running_statement_until_done() {
        let (url, seen) = serve(vec![
            reply(
                202,
                r#"{"code": "333334", "statementHandle": "h1", "statementStatusUrl": "/api/v2/statements/h1"}"#,
            ),
            reply(200, r#"{"statementHandle": "h1", "stats": {"numRowsInserted": 5}}"#),
        ]);

        let result = client(&url, 60).execute("INSERT INTO T VALUES (1)").unwrap();
        assert_eq!(result.rows_affected, Some(5));

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /api/v2/statements?requestId="));
        assert!(requests[0].contains(r#""statement":"INSERT INTO T VALUES (1)""#));

        let head = requests[0].to_ascii_lowercase();
        assert!(head.contains("authorization: bearer secret-token"));
        assert!(head.contains("x-snowflake-authorization-token-type: programmatic_access_token"));

        assert!(requests[1].starts_with("GET /api/v2/statements/h1 "));
    }

    #[test]
    fn test_api_error_keeps_code_and_sql_state() {
        let (url, _) = serve(vec![reply(
            422,
            r#"{"code": "002003", "sqlState": "42S02", "message": "Table 'X' does not exist"}"#,
        )]);

        match client(&url, 60).execute("SELECT * FROM X") {
            Err(WarehouseError::Api {
                status,
                code,
                sql_state,
                message,
            }) => {
                assert_eq!(status, 422);
                assert_eq!(code, "002003");
                assert_eq!(sql_state, "42S02");
                assert_eq!(message, "Table 'X' does not exist");
            }
            other => panic!("expected API error, got {:?}", other.map(|r| r.rows)),
        }
    }

    #[test]
    fn test_running_statement_times_out() {
        let running = r#"{"statementHandle": "h1", "statementStatusUrl": "/api/v2/statements/h1"}"#;
        let (url, _) = serve((0..4).map(|_| reply(202, running)).collect());

        match client(&url, 0).execute("SELECT SYSTEM$WAIT(10)") {
            Err(WarehouseError::Timeout {
                handle,
                timeout_secs,
            }) => {
                assert_eq!(handle, "h1");
                assert_eq!(timeout_secs, 0);
            }
            other => panic!("expected timeout, got {:?}", other.map(|r| r.rows)),
        }
    }

    #[test]
    fn test_fetches_remaining_partitions() {
        let first = r#"{
            "statementHandle": "h1",
            "resultSetMetaData": {
                "rowType": [{"name": "ID"}],
                "partitionInfo": [{"rowCount": 1}, {"rowCount": 1}]
            },
            "data": [["1"]]
        }"#;
        let (url, seen) = serve(vec![
            reply(200, first),
            Reply {
                status: 200,
                body: gzip(br#"{"data": [["2"]]}"#),
                gzip: true,
            },
        ]);

        let result = client(&url, 60).execute("SELECT ID FROM T").unwrap();
        assert_eq!(result.columns, vec!["ID"]);
        assert_eq!(
            result.rows,
            vec![vec![Some("1".to_string())], vec![Some("2".to_string())]]
        );

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("GET /api/v2/statements/h1?partition=1 "));
    }

    #[test]
    fn test_parse_result_set() {
        let body: StatementResponse = serde_json::from_str(
            r#"{
                "resultSetMetaData": {
                    "numRows": 2,
                    "format": "jsonv2",
                    "rowType": [{"name": "ID", "type": "fixed"}, {"name": "COUNTRY_DESC", "type": "text"}],
                    "partitionInfo": [{"rowCount": 2, "uncompressedSize": 40}]
                },
                "data": [["1", "Nepal"], ["2", null]],
                "code": "090001",
                "statementHandle": "01a2-b3",
                "message": "Statement executed successfully."
            }"#,
        )
        .unwrap();

        let meta = body.result_set_meta_data.unwrap();
        assert_eq!(meta.row_type[1].name, "COUNTRY_DESC");
        assert_eq!(meta.partition_info.len(), 1);
        assert_eq!(body.data[1][1], None);
        assert_eq!(body.statement_handle.as_deref(), Some("01a2-b3"));
    }

    #[test]
    fn test_parse_dml_stats() {
        let body: StatementResponse = serde_json::from_str(
            r#"{"stats": {"numRowsInserted": 3, "numRowsUpdated": 4}, "data": [["3", "4"]]}"#,
        )
        .unwrap();
        assert_eq!(body.stats.unwrap().total(), 7);
    }

    #[test]
    fn test_parse_running_statement() {
        let body: StatementResponse = serde_json::from_str(
            r#"{"code": "333334", "message": "Asynchronous execution in progress.",
                "statementHandle": "h1", "statementStatusUrl": "/api/v2/statements/h1"}"#,
        )
        .unwrap();
        assert_eq!(body.statement_status_url.as_deref(), Some("/api/v2/statements/h1"));
        assert!(body.result_set_meta_data.is_none());
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = StatementRequest {
            statement: "SELECT 1",
            timeout: 60,
            database: "DB",
            warehouse: None,
            role: Some("SYSADMIN"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("warehouse").is_none());
        assert_eq!(json["role"], "SYSADMIN");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        assert!(truncate(&"x".repeat(500)).ends_with("..."));
    }
}
