//! Schema, CMS metadata, access rules and seed import for the Rovereto
//! school-orientation directory.

pub mod access;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
mod migrations;
pub mod seed;
