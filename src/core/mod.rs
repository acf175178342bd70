//! Core domain modules for the certification platform

pub mod auth;
pub mod authz;
pub mod catalog;
pub mod config;
pub mod db;
pub mod exams;
pub mod mail;
pub mod users;
