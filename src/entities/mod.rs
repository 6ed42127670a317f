//! Persistent entities of the laboratory back office.

pub mod analisis_catalogo;
pub mod analysis;
pub mod category;
pub mod client;
pub mod company_settings;
pub mod informe;
pub mod method;
pub mod parameter;
pub mod proforma;
pub mod resultado;
pub mod technique;
pub mod tipo_muestra;

pub use category::Category;
pub use proforma::ProformaStatus;
