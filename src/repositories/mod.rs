use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod invoice_repository;

pub use invoice_repository::{AuditEntry, InvoiceRepository, SeaOrmInvoiceRepository};

#[cfg(test)]
pub use invoice_repository::MockInvoiceRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
