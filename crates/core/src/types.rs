/// All primary keys are `BIGSERIAL`.
pub type DbId = i64;

/// All timestamps are stored as `TIMESTAMPTZ`.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar dates without a time component (`DATE`).
pub type Date = chrono::NaiveDate;

/// Monetary amounts (`NUMERIC(15,2)`).
pub type Money = rust_decimal::Decimal;
