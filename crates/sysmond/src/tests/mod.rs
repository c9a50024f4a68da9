//! Test suites for the collector bootstrap and launch sequence.

mod support;
