pub mod admin;
pub mod invoices;
pub mod menu;
pub mod order_requests;
pub mod payments;

use std::sync::Arc;

use crate::auth::AdminAuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::models::MenuCatalog;
use crate::repositories::{InvoiceRepository, SeaOrmInvoiceRepository};
use crate::services::{InvoiceQueryService, OrderRequestService, OrderStatusService, PaymentService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order_requests: Arc<OrderRequestService>,
    pub order_status: Arc<OrderStatusService>,
    pub payments: Arc<PaymentService>,
    pub invoices: Arc<InvoiceQueryService>,
    pub auth: Arc<AdminAuthService>,
    pub menu: Arc<MenuCatalog>,
}

impl AppServices {
    /// Wires every service over one SeaORM-backed invoice repository.
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        menu: Arc<MenuCatalog>,
        events: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let repo: Arc<dyn InvoiceRepository> = Arc::new(SeaOrmInvoiceRepository::new(db));
        Self::with_repository(repo, gateway, menu, events, config)
    }

    pub fn with_repository(
        repo: Arc<dyn InvoiceRepository>,
        gateway: Arc<dyn PaymentGateway>,
        menu: Arc<MenuCatalog>,
        events: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            order_requests: Arc::new(OrderRequestService::new(
                repo.clone(),
                menu.clone(),
                events.clone(),
                config,
            )),
            order_status: Arc::new(OrderStatusService::new(repo.clone(), events.clone(), config)),
            payments: Arc::new(PaymentService::new(repo.clone(), gateway, events, config)?),
            invoices: Arc::new(InvoiceQueryService::new(repo, config)),
            auth: Arc::new(AdminAuthService::new(config)),
            menu,
        })
    }
}
