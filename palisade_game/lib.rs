pub mod models;
pub mod ports;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
