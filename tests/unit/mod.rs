//! Unit tests for threatscope modules
//!
//! These tests cover individual stages without network I/O.

mod test_collector;
mod test_extractor;
mod test_risk;
mod test_scanner;
mod test_synthesis;
