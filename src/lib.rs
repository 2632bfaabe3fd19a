//! Football match aggregation with a daily disk cache and supervision of
//! the prediction subprocess.

pub mod config;
pub mod services;
pub mod sources;
pub mod types;

#[cfg(test)]
mod test_support;
