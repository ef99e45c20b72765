//! Beans and helpers shared by the SQLite integration tests.
#![allow(dead_code)]

use asupersync::runtime::RuntimeBuilder;
use sqlbean::prelude::*;
use sqlbean::QuotePolicy;
use sqlbean_sqlite::SqliteConnection;
use std::future::Future;

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

pub fn block_on<F: Future>(f: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

/// One in-memory database behind a single-connection pool.
pub fn engine(config: EngineConfig) -> Engine<SqliteConnection> {
    let pool = Pool::new(PoolConfig::new(1), SqliteConnection::open_memory);
    Engine::new(Arc::new(Sqlite), pool, config)
}

pub async fn create_tables(cx: &Cx, engine: &Engine<SqliteConnection>) {
    let mut session = unwrap_outcome(engine.new_session(cx).await);
    for table in [engine.table_of::<Article>(), engine.table_of::<Membership>()] {
        let sql = CreateTable::new(&table).build(engine.dialect(), QuotePolicy::Always);
        unwrap_outcome(session.exec(cx, &sql, ()).await);
    }
    unwrap_outcome(session.close(cx).await);
}

/// A bean exercising every column kind the session manages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub views: i32,
    pub published: bool,
    pub tags: Vec<String>,
    pub cover: Vec<u8>,
    pub score: f64,
    pub secret: String,
    pub created: i64,
    pub updated: i64,
    pub version: i32,
    pub deleted: Option<i64>,
}

static ARTICLE_COLUMNS: &[Column] = &[
    Column::new("id", SqlType::BigInt)
        .primary_key(true)
        .auto_increment(true),
    Column::new("title", SqlType::VarChar).length(128),
    Column::new("views", SqlType::Integer),
    Column::new("published", SqlType::Boolean),
    Column::new("tags", SqlType::Json),
    Column::new("cover", SqlType::Blob).nullable(true),
    Column::new("score", SqlType::Double),
    Column::new("secret", SqlType::Text)
        .nullable(true)
        .map_type(MapType::WriteOnly),
    Column::new("created", SqlType::Timestamp).created(),
    Column::new("updated", SqlType::Timestamp).updated(),
    Column::new("version", SqlType::Integer).version(),
    Column::new("deleted", SqlType::Timestamp).deleted(),
];

impl Bean for Article {
    const TABLE_NAME: &'static str = "articles";

    fn columns() -> &'static [Column] {
        ARTICLE_COLUMNS
    }

    fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(vec![
            ("id", Value::from(self.id)),
            ("title", Value::from(&self.title)),
            ("views", Value::from(self.views)),
            ("published", Value::from(self.published)),
            ("tags", Value::json(&self.tags)?),
            ("cover", Value::from(self.cover.clone())),
            ("score", Value::from(self.score)),
            ("secret", Value::from(&self.secret)),
            ("created", Value::Timestamp(self.created)),
            ("updated", Value::Timestamp(self.updated)),
            ("version", Value::from(self.version)),
            ("deleted", self.deleted.map_or(Value::Null, Value::Timestamp)),
        ])
    }

    fn set_field(&mut self, field: &str, value: &Value) -> Result<()> {
        match field {
            "id" => self.id = FromValue::from_value(value)?,
            "title" => self.title = FromValue::from_value(value)?,
            "views" => self.views = FromValue::from_value(value)?,
            "published" => self.published = FromValue::from_value(value)?,
            "tags" => self.tags = value.decode_json()?,
            "cover" => self.cover = Option::<Vec<u8>>::from_value(value)?.unwrap_or_default(),
            "score" => self.score = FromValue::from_value(value)?,
            "secret" => self.secret = FromValue::from_value(value)?,
            "created" => self.created = FromValue::from_value(value)?,
            "updated" => self.updated = FromValue::from_value(value)?,
            "version" => self.version = FromValue::from_value(value)?,
            "deleted" => self.deleted = FromValue::from_value(value)?,
            other => return Err(unknown_field(Self::TABLE_NAME, other)),
        }
        Ok(())
    }
}

impl Article {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

/// A composite-key bean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Membership {
    pub org: String,
    pub member: i64,
    pub role: String,
}

static MEMBERSHIP_COLUMNS: &[Column] = &[
    Column::new("org", SqlType::VarChar).length(32).primary_key(true),
    Column::new("member", SqlType::BigInt).primary_key(true),
    Column::new("role", SqlType::VarChar).length(16),
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
