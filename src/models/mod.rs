pub mod customs_document;
pub mod ledger_entry;
pub mod log_entry;
pub mod manifest;
pub mod orm_request;
pub mod saved_recipient;
pub mod shipment;

pub use customs_document::{CustomsStatus, Entity as CustomsDocument};
pub use ledger_entry::Entity as LedgerEntry;
pub use log_entry::Entity as LogEntry;
pub use manifest::Entity as Manifest;
pub use orm_request::{Entity as OrmRequest, OrmStatus};
pub use saved_recipient::Entity as SavedRecipient;
pub use shipment::{Entity as Shipment, ShipmentStatus};
