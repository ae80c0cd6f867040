//! Database access glue for the kanau command processors.
//!
//! Request/response-shaped queries are modeled as command structs with a
//! `Processor` impl on [`DbProcessor`]; multi-statement units use plain
//! `_tx` methods on the entity types instead.

use sqlx::PgPool;

pub trait DbAccessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_>;
}

/// Pool-backed processor for single-statement commands.
pub struct DbProcessor {
    pub pool: PgPool,
}

/// Transaction-backed processor for commands that must join a larger unit.
pub struct TxnProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl DbAccessor for DbProcessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &self.pool
    }
}

impl<'b> DbAccessor for TxnProcessor<'b> {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &mut *self.tx
    }
}

/// Current UTC wall-clock time as the naive timestamp type used in the
/// database schema.
pub fn now_utc() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

/// Current UTC time in unix milliseconds (admission-gate arithmetic).
pub fn now_unix_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
