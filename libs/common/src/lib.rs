//! Common library for the Petinder backend
//!
//! This crate provides shared functionality used by the auth and api
//! services: database connectivity, domain models, the user and pet stores,
//! token issuing/verification and password hashing.

pub mod database;
pub mod error;
pub mod http;
pub mod jwt;
pub mod models;
pub mod password;
pub mod repositories;
pub mod validation;
