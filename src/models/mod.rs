pub mod cart;
pub mod invoice;
pub mod menu;
pub mod money;

pub use cart::Cart;
pub use invoice::{
    generate_invoice_number, AmountBreakdown, CustomerSnapshot, FoodType, Invoice, InvoiceStatus,
    LineItem, PaymentStatus, RestaurantDetails, StatusChange, VisitOffset, VISIT_OFFSETS_MINUTES,
};
pub use menu::{MenuCatalog, MenuItem, MenuVariant};
pub use money::{Currency, Money, MoneyError};
