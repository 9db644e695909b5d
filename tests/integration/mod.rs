//! Integration tests for the gsrunner bootstrap sequence

mod registry_file;
mod runner_flow;
mod support;
