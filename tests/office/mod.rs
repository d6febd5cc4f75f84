//! Office integration tests.

mod pipeline_test;
