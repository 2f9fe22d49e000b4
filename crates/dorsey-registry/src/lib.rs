mod client;
mod document;
mod source;

pub use client::RegistryClient;
pub use document::{DistInfo, PackageDocument, VersionManifest};
pub use source::VersionSource;
