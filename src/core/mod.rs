//! Core infrastructure shared by the probe components.

pub mod http_client;
