//! Integration tests for Shardline
//!
//! `client_tests` drives the HTTP channel client against wiremock servers;
//! `run_tests` drives whole runs through a scripted channel client.

mod client_tests;
mod run_tests;
mod support;
