/*!
 * SQLite handle shared by the state repository.
 *
 * rusqlite connections are blocking, so every statement runs on tokio's
 * blocking pool while holding the single connection lock.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;

/// State file name inside the data directory
const STATE_FILE: &str = "epubtrans.db";

/// Application folder inside the user's data directory
const STATE_DIR: &str = "epubtrans";

/// Label used in place of a path for in-memory databases
const IN_MEMORY: &str = ":memory:";

/// Cloneable handle on one schema-initialized connection
#[derive(Clone)]
pub struct DatabaseConnection {
    path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open (or create) the state database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("Cannot create state directory {:?}", dir))?;
        }

        info!("Opening state database at {:?}", path);
        let conn = Connection::open(&path).with_context(|| format!("Cannot open state database {:?}", path))?;
        Self::initialized(path, conn)
    }

    /// Open the state database in the user's data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Throwaway database, gone when the last handle drops
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory state database");
        let conn = Connection::open_in_memory().context("Cannot open in-memory state database")?;
        Self::initialized(PathBuf::from(IN_MEMORY), conn)
    }

    /// `<data dir>/epubtrans/epubtrans.db`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .context("No data directory available for the state database")?;
        Ok(data_dir.join(STATE_DIR).join(STATE_FILE))
    }

    fn initialized(path: PathBuf, conn: Connection) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || f(&connection.lock()))
            .await
            .context("State database task panicked")?
    }

    /// Run `f` inside a transaction; an `Err` from `f` rolls everything back
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connection.lock();
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .context("State database task panicked")?
    }
}
