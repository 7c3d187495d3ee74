//! Test support
//!
//! In-process stand-ins for the external collaborators threatscope talks to,
//! shared by unit tests and the `tests/` suites.

pub mod mock_api;
