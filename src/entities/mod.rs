pub mod invoice;
pub mod invoice_audit;
