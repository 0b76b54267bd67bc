//! Business services behind the HTTP handlers.

pub mod artifacts;
pub mod audit;
pub mod customs;
pub mod documents;
pub mod financial;
pub mod manifests;
pub mod orm;
pub mod payload;
pub mod recipients;
pub mod references;
pub mod shipment_form;
pub mod shipment_store;
pub mod shipments;
