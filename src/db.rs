use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::config::Config;
use crate::error::{LedgerError, LedgerResult};

/// Handle to the ledger store.
///
/// Owns a small pool of SQLite connections to one database file. Every
/// mutating operation runs through [`Database::write`], which wraps the work in
/// a single `BEGIN IMMEDIATE` transaction.
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    pool_size: usize,
    code_attempts: u32,
    idle: Mutex<Vec<Connection>>,
    session_locks: Mutex<HashMap<i64, Weak<Mutex<()>>>>,
}

impl Database {
    pub fn open(config: &Config) -> LedgerResult<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Internal(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Database {
            path: config.database_path.clone(),
            busy_timeout: config.busy_timeout,
            pool_size: config.pool_size.max(1),
            code_attempts: config.code_attempts.max(1),
            idle: Mutex::new(Vec::new()),
            session_locks: Mutex::new(HashMap::new()),
        };

        // Fail fast on an unusable path.
        let conn = db.checkout()?;
        db.checkin(conn);

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn code_attempts(&self) -> u32 {
        self.code_attempts
    }

    fn checkout(&self) -> LedgerResult<Connection> {
        let pooled = self
            .idle
            .lock()
            .map_err(|_| LedgerError::Internal("connection pool poisoned".into()))?
            .pop();

        match pooled {
            Some(conn) => Ok(conn),
            None => self.connect(),
        }
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.pool_size {
                idle.push(conn);
            }
        }
    }

    /// Lend a pooled connection to `f`. The connection goes back to the pool
    /// afterwards; if `f` panics it is closed instead.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> LedgerResult<T>) -> LedgerResult<T> {
        let mut conn = self.checkout()?;
        let result = f(&mut conn);
        self.checkin(conn);
        result
    }

    fn connect(&self) -> LedgerResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Ok(conn)
    }

    /// Run `f` inside one immediate transaction. `Ok` commits, `Err` rolls back.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run read-only work inside one deferred transaction, so every query in
    /// `f` sees the same snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> LedgerResult<T>) -> LedgerResult<T> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    fn session_lock(&self, session_id: i64) -> LedgerResult<Arc<Mutex<()>>> {
        let mut locks = self
            .session_locks
            .lock()
            .map_err(|_| LedgerError::Internal("session lock map poisoned".into()))?;

        if locks.len() > 64 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(&session_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(session_id, Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Serialize `f` against other callers working on the same session.
    pub(crate) fn with_session_lock<T>(
        &self,
        session_id: i64,
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| LedgerError::Internal("session write lock poisoned".into()))?;
        f()
    }

    pub fn initialize(&self) -> LedgerResult<()> {
        self.with_conn(|conn| {
            Self::create_schema(conn)?;
            Self::migrate_conn(conn)
        })?;

        tracing::info!(path = %self.path.display(), "ledger schema ready");
        Ok(())
    }

    fn create_schema(conn: &Connection) -> LedgerResult<()> {
        conn.execute_batch(
            "
            -- Sales sessions
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                is_active INTEGER NOT NULL DEFAULT 0,
                last_sequence INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                created_by INTEGER
            );

            -- Products with box stock
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                created_by INTEGER,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            -- Orders
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                public_code TEXT NOT NULL UNIQUE,
                session_sequence INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                session_id INTEGER NOT NULL,
                phone TEXT,
                full_name TEXT,
                total_amount REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_session_sequence
                ON orders (session_id, session_sequence);

            -- Order items
            CREATE TABLE IF NOT EXISTS order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price REAL NOT NULL,
                FOREIGN KEY (order_id) REFERENCES orders(id)
            );

            CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items (order_id);

            -- Boxes counted toward the personal limit
            CREATE TABLE IF NOT EXISTS user_session_limits (
                user_id INTEGER NOT NULL,
                session_id INTEGER NOT NULL,
                completed_boxes INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, session_id)
            );

            -- Global knobs
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            INSERT OR IGNORE INTO settings (key, value) VALUES ('limit_per_person', '0');
            ",
        )?;
        Ok(())
    }

    fn migrate_conn(conn: &Connection) -> LedgerResult<()> {
        // Databases created before sessions carried their own sequence counter
        // or description get the columns added, seeded from existing orders.
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(sessions)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !columns.iter().any(|c| c == "description") {
            conn.execute("ALTER TABLE sessions ADD COLUMN description TEXT", [])?;
        }
        if !columns.iter().any(|c| c == "last_sequence") {
            conn.execute(
                "ALTER TABLE sessions ADD COLUMN last_sequence INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
            conn.execute(
                "UPDATE sessions SET last_sequence = COALESCE(
                    (SELECT MAX(session_sequence) FROM orders WHERE orders.session_id = sessions.id), 0)",
                [],
            )?;
        }

        Ok(())
    }
}
