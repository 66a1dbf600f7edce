//! Sprint board with per-sprint epic ranking.
//!
//! Epics are ordered inside each sprint by a dense 1-based rank. Dragging an
//! epic onto another epic or onto a sprint column is turned into a complete
//! set of rank and assignment writes by [`ranking`], committed through the
//! [`store::SprintStore`] by [`board::BoardController`], and served over HTTP
//! by [`api`].

pub mod api;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ranking;
pub mod store;

pub use error::{BoardError, Result};
