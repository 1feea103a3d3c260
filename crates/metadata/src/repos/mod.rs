//! Repository traits for metadata operations.

pub mod members;
pub mod packages;

pub use members::MembershipRepo;
pub use packages::PackageRepo;
