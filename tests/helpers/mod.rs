// ==========================================
// Integration test helpers
// ==========================================
// Each test binary pulls in the subset it needs.
#![allow(dead_code)]

pub mod mock_config;
pub mod test_data_builder;
pub mod test_env;
