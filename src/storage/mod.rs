//! The two interchangeable `BlobStorage` variants.

mod azure;
mod local;

pub use azure::AzureBlobStorage;
pub use local::LocalBlobStorage;
