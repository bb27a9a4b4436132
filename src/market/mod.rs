pub mod codec;
pub mod datastore;
pub mod protocol;
