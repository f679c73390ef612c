//! Unit tests for desk routing and staged automation.

mod automation_service_tests;
