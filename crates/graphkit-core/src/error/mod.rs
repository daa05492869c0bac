//! Error conversion helpers.

mod boundary;
