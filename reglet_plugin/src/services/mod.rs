//! Domain services.

mod integrity;

pub use integrity::IntegrityService;
