mod entry;
mod extract;
mod fetch;
mod fs_utils;
mod layout;
mod lock;
mod package;

pub use entry::{find_package_root, resolve_entry_point};
pub use extract::unpack_package_tarball;
pub use fetch::{PackageFetcher, RegistryFetcher};
pub use layout::StoreLayout;
pub use lock::EntryLock;
pub use package::{InstallOutcome, Package, UpdateOutcome};

#[cfg(test)]
mod tests;
