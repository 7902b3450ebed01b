//! Test fixtures

mod cluster;

pub use cluster::Cluster;
