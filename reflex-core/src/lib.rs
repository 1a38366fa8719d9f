//! Reflex Core
//!
//! This crate provides the dependency-tracking core of the Reflex reactive
//! runtime. It implements:
//!
//! - A dependency store mapping each target field to its subscribers
//! - Re-runnable effects that rediscover their dependencies on every run
//! - A tracking coordinator that subscribes on read and re-runs on write
//! - Tracked wrappers (cells, records, lists) built on that coordinator
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: Targets, keys, Deps and the trigger-selection policy
//! - `reactive`: Effects, the tracking context and the coordinator
//! - `config`: Tracker configuration
//! - `error`: Configuration errors
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use reflex_core::reactive::{effect, ReactiveRecord};
//!
//! let x: ReactiveRecord<i32> = [("a", 1)].into_iter().collect();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let (reader, sink) = (x.clone(), log.clone());
//! let _runner = effect(move || sink.borrow_mut().push(reader.get("a")));
//!
//! x.insert("a", 2); // re-runs the effect
//! x.insert("b", 3); // the effect never read `b`
//!
//! assert_eq!(*log.borrow(), vec![Some(1), Some(2)]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod store;

pub use error::{Result, TrackError};
