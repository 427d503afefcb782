//! AR Asset Processing Service
//!
//! This library backs the jewelry storefront's 3D pipeline: uploaded models
//! are processed asynchronously (polygon optimization, 360° renders,
//! thumbnails, dimension extraction) into AR-ready assets by either a
//! headless Blender invocation or an embedded software renderer, with job
//! state tracked in PostgreSQL and work distributed over a Redis queue.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
