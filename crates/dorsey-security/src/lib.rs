mod integrity;

pub use integrity::{sha512_integrity, verify_integrity, IntegrityCheck};
