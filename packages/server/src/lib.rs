//! Bleachers chat server library.
//!
//! Stateless chat instances behind a load balancer. Room membership, admission
//! tickets and traffic counters live in a cluster-shared key-value store, chat
//! events travel over a pub/sub broker, and authorization is delegated to the
//! user service over a durable queue.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// composition
pub mod config;
pub mod node;
