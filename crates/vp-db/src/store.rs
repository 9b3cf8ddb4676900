use rusqlite::Connection;
use vp_core::error::ValetError;
use vp_core::store::Store;

use crate::event_repo::EventRepo;
use crate::help_repo::HelpRepo;
use crate::push_repo::PushRepo;
use crate::report_repo::ReportRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Help<'a>
        = HelpRepo<'a>
    where
        Self: 'a;
    type Reports<'a>
        = ReportRepo<'a>
    where
        Self: 'a;
    type Push<'a>
        = PushRepo<'a>
    where
        Self: 'a;
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;

    fn help(&self) -> Self::Help<'_> {
        HelpRepo::new(&self.conn)
    }

    fn reports(&self) -> Self::Reports<'_> {
        ReportRepo::new(&self.conn)
    }

    fn push(&self) -> Self::Push<'_> {
        PushRepo::new(&self.conn)
    }

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, ValetError>
    where
        F: FnOnce(&Self) -> Result<T, ValetError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(ValetError::internal)?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(ValetError::internal)?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rolling back transaction");
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(ValetError::internal)?;
                Err(err)
            }
        }
    }
}
