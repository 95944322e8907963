/*!
 * Database module for persistent translation state.
 *
 * This module provides SQLite-based persistence for:
 * - The progress record that drives resume
 * - Translated chunks, so completed work is never translated twice
 */

pub mod connection;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
