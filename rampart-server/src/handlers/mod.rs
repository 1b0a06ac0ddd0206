//! HTTP request handlers organized by functionality

pub mod consumer;
pub mod health;
pub mod jobs;
