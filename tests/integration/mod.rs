//! Integration tests for Holocene data directories

mod cli_contracts;
mod commit_scenario;
mod drop_semantics;
mod lock_contention;
mod stream_writes;
mod support;
