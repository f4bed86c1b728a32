use super::DatastoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialects the ledger table can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MsSql,
    Oracle,
}

impl Dialect {
    /// Resolve a dialect from its configuration name.
    pub fn from_name(name: &str) -> Result<Self, DatastoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite3" | "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "mssql" => Ok(Dialect::MsSql),
            "oci8" | "oracle" => Ok(Dialect::Oracle),
            _ => Err(DatastoreError::UnknownDialect(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite3",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Oracle => "oci8",
        }
    }

    /// Quote an identifier, escaping embedded quote characters.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::MsSql => format!("[{}]", ident.replace(']', "]]")),
            Dialect::Sqlite | Dialect::Postgres | Dialect::Oracle => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }

    /// Bind parameter marker for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{n}"),
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql => "?".to_string(),
            Dialect::MsSql => format!("@p{n}"),
            Dialect::Oracle => format!(":{n}"),
        }
    }

    /// Idempotent DDL creating the ledger table.
    pub fn create_ledger_sql(&self, table: &str) -> String {
        let quoted = self.quote_identifier(table);
        match self {
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {quoted} (\
                 id TEXT NOT NULL PRIMARY KEY, \
                 applied_at DATETIME NOT NULL)"
            ),
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {quoted} (\
                 id TEXT NOT NULL PRIMARY KEY, \
                 applied_at TIMESTAMP WITH TIME ZONE NOT NULL)"
            ),
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {quoted} (\
                 id VARCHAR(255) NOT NULL PRIMARY KEY, \
                 applied_at DATETIME NOT NULL) \
                 ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
            ),
            Dialect::MsSql => format!(
                "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {quoted} (\
                 id NVARCHAR(255) NOT NULL PRIMARY KEY, \
                 applied_at DATETIMEOFFSET NOT NULL)",
                quoted.replace('\'', "''")
            ),
            // ORA-00955: name is already used by an existing object
            Dialect::Oracle => format!(
                "BEGIN EXECUTE IMMEDIATE 'CREATE TABLE {} (\
                 id VARCHAR2(255) NOT NULL PRIMARY KEY, \
                 applied_at TIMESTAMP WITH TIME ZONE NOT NULL)'; \
                 EXCEPTION WHEN OTHERS THEN IF SQLCODE != -955 THEN RAISE; END IF; END;",
                quoted.replace('\'', "''")
            ),
        }
    }

    pub fn insert_record_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (id, applied_at) VALUES ({}, {})",
            self.quote_identifier(table),
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    pub fn delete_record_sql(&self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE id = {}",
            self.quote_identifier(table),
            self.placeholder(1)
        )
    }

    pub fn max_id_sql(&self, table: &str) -> String {
        format!("SELECT MAX(id) FROM {}", self.quote_identifier(table))
    }

    pub fn select_records_sql(&self, table: &str) -> String {
        format!(
            "SELECT id, applied_at FROM {} ORDER BY id ASC",
            self.quote_identifier(table)
        )
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = DatastoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::from_name(s)
    }
}
