/*
 * Application logic layer. `PrunerAppLogic` acts as the presenter between the
 * command line front end and the editing session in `core`.
 * Unit tests for `PrunerAppLogic` are in `handler_tests.rs`.
 */
pub mod handler;


pub use handler::{AppCommand, AppEvent, MessageSeverity, PrunerAppLogic, PrunerEventHandler};
