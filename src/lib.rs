//! sessiongate: client-side authentication session coordination.
//!
//! An identity client trait with in-memory and GoTrue implementations, an
//! observable session store, route classification, a navigation guard and
//! the login/logout flows, plus the axum app shell that hosts them.

pub mod auth;
pub mod config;
pub mod identity;
pub mod routes;
pub mod state;
