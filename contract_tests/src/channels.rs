//! Channel identifier and log level contract tests
