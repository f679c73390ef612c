//! Unit tests for the work-item domain and services.

mod dependency_service_tests;
mod domain_tests;
mod lease_service_tests;
