//! Shared test infrastructure for snmp-credcheck.
//!
//! Provides TestAgent (in-process SNMP agent), fixtures, and utilities.

// Not every test file uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod agent;
pub mod fixtures;

pub use agent::{TestAgent, TestAgentBuilder, V3User};
pub use fixtures::{
    AUTH_PASS, COMMUNITY, ENGINE_ID, PRIV_PASS, SYS_DESCR, closed_port, fast, silent_socket,
    system_mib, validator,
};
