//! Shared fixtures for the session unit tests.

use crate::config::EngineConfig;
use crate::engine::EngineShared;
use crate::session::Session;
use sqlbean_cache::LruConfig;
use sqlbean_core::{
    Bean, Column, Connection, Cx, Error, FromValue, Outcome, Result, Row, SqlType, Value,
    unknown_field,
};
use sqlbean_query::Sqlite;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub active: bool,
    pub created: i64,
    pub updated: i64,
    pub version: i32,
    pub deleted: Option<i64>,
    /// Bean hooks that ran, in order; not a column.
    pub hook_log: Vec<String>,
}

static USER_COLUMNS: &[Column] = &[
    Column::new("id", SqlType::BigInt)
        .primary_key(true)
        .auto_increment(true),
    Column::new("name", SqlType::VarChar).length(64),
    Column::new("age", SqlType::Integer),
    Column::new("active", SqlType::Boolean),
    Column::new("created", SqlType::Timestamp).created(),
    Column::new("updated", SqlType::Timestamp).updated(),
    Column::new("version", SqlType::Integer).version(),
    Column::new("deleted", SqlType::Timestamp).deleted(),
];

impl Bean for User {
    const TABLE_NAME: &'static str = "users";

    fn columns() -> &'static [Column] {
        USER_COLUMNS
    }

    fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(vec![
            ("id", Value::from(self.id)),
            ("name", Value::from(&self.name)),
            ("age", Value::from(self.age)),
            ("active", Value::from(self.active)),
            ("created", Value::Timestamp(self.created)),
            ("updated", Value::Timestamp(self.updated)),
            ("version", Value::from(self.version)),
            ("deleted", self.deleted.map_or(Value::Null, Value::Timestamp)),
        ])
    }

    fn set_field(&mut self, field: &str, value: &Value) -> Result<()> {
        match field {
            "id" => self.id = FromValue::from_value(value)?,
            "name" => self.name = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            "active" => self.active = FromValue::from_value(value)?,
            "created" => self.created = FromValue::from_value(value)?,
            "updated" => self.updated = FromValue::from_value(value)?,
            "version" => self.version = FromValue::from_value(value)?,
            "deleted" => self.deleted = FromValue::from_value(value)?,
            other => return Err(unknown_field(Self::TABLE_NAME, other)),
        }
        Ok(())
    }

    fn before_insert(&mut self) -> Result<()> {
        self.hook_log.push("before_insert".to_string());
        Ok(())
    }

    fn after_insert(&mut self) -> Result<()> {
        self.hook_log.push("after_insert".to_string());
        Ok(())
    }
}

/// A two-column key table without any managed columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Membership {
    pub org: String,
    pub member: i64,
    pub role: String,
}

static MEMBERSHIP_COLUMNS: &[Column] = &[
    Column::new("org", SqlType::VarChar).primary_key(true),
    Column::new("member", SqlType::BigInt).primary_key(true),
    Column::new("role", SqlType::VarChar),
];

impl Bean for Membership {
    const TABLE_NAME: &'static str = "memberships";

    fn columns() -> &'static [Column] {
        MEMBERSHIP_COLUMNS
    }

    fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(vec![
            ("org", Value::from(&self.org)),
            ("member", Value::from(self.member)),
            ("role", Value::from(&self.role)),
        ])
    }

    fn set_field(&mut self, field: &str, value: &Value) -> Result<()> {
        match field {
            "org" => self.org = FromValue::from_value(value)?,
            "member" => self.member = FromValue::from_value(value)?,
            "role" => self.role = FromValue::from_value(value)?,
            other => return Err(unknown_field(Self::TABLE_NAME, other)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// Every statement the session sent, in order.
    pub executed: Vec<(String, Vec<Value>)>,
    /// Results handed out by `query`, front first; empty when exhausted.
    pub query_results: VecDeque<Vec<Row>>,
    /// Results handed out by `execute`; 1 when exhausted.
    pub execute_results: VecDeque<u64>,
    pub last_insert_id: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn record(&self, sql: &str, params: &[Value]) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().unwrap();
        state.executed.push((sql.to_string(), params.to_vec()));
        state
    }
}

#[allow(clippy::manual_async_fn)]
impl Connection for MockConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = self
            .record(sql, params)
            .query_results
            .pop_front()
            .unwrap_or_default();
        async move { Outcome::Ok(rows) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let affected = self
            .record(sql, params)
            .execute_results
            .pop_front()
            .unwrap_or(1);
        async move { Outcome::Ok(affected) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let mut state = self.record(sql, params);
        state.last_insert_id += 1;
        let id = state.last_insert_id;
        async move { Outcome::Ok(id) }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    async fn close(self, _cx: &Cx) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}

pub(crate) fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => std::panic::panic_any(format!("expected an error, got: {other:?}")),
    }
}

pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    let rt = asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

/// A session over a fresh mock connection, with or without the default cache.
pub(crate) fn mock_session(cached: bool) -> (Session<MockConnection>, Arc<Mutex<MockState>>) {
    let config = if cached {
        EngineConfig::default().cache(LruConfig::new())
    } else {
        EngineConfig::default()
    };
    let shared = Arc::new(EngineShared::new(Arc::new(Sqlite), config));
    let conn = MockConnection::default();
    let state = Arc::clone(&conn.state);
    (Session::new(conn, shared), state)
}

pub(crate) fn executed_sql(state: &Arc<Mutex<MockState>>) -> Vec<String> {
    state
        .lock()
        .unwrap()
        .executed
        .iter()
        .map(|(sql, _)| sql.clone())
        .collect()
}

pub(crate) fn user_row(id: i64, name: &str, version: i32) -> Row {
    Row::new(
        ["id", "name", "age", "active", "created", "updated", "version", "deleted"]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        vec![
            Value::BigInt(id),
            Value::from(name),
            Value::Int(30),
            Value::Int(1),
            Value::BigInt(10),
            Value::BigInt(20),
            Value::Int(version),
            Value::Null,
        ],
    )
}

pub(crate) fn push_rows(state: &Arc<Mutex<MockState>>, rows: Vec<Row>) {
    state.lock().unwrap().query_results.push_back(rows);
}
