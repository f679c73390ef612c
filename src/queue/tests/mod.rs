//! Unit tests for queue domain and administration.

mod domain_tests;
