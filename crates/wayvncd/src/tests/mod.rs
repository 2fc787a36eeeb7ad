//! Test suites for the control daemon.
