//! todo-sync library
//!
//! A todo list that works without an account. Guest tasks live in local
//! named-entry storage; once a user signs in with an emailed code they are
//! moved into the shared database under that user, and all further reads
//! and writes go there.

pub mod accessor;
pub mod app;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod guest;
pub mod logging;
pub mod migration;
pub mod order;
pub mod remote;
pub mod storage;
pub mod subscriptions;
pub mod types;
