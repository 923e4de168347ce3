pub mod error;
pub mod fake;
pub mod real_s3;
pub mod store;

#[allow(unused_imports)]
pub use error::StorageError;
pub use fake::FakeStore;
pub use real_s3::S3Store;
pub use store::{ListPage, ListedObject, ObjectStore};
