pub mod deployment;

pub use deployment::{check, create, teardown};
