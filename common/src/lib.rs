// Shared library for the Tenantry api and worker binaries

pub mod action;
pub mod auth;
pub mod billing;
pub mod bootstrap;
pub mod campaigns;
pub mod config;
pub mod contacts;
pub mod crm;
pub mod db;
pub mod email;
pub mod errors;
pub mod importance;
pub mod llm;
pub mod lock;
pub mod models;
pub mod onboarding;
pub mod organizations;
pub mod rate_limit;
pub mod reminders;
pub mod retry;
pub mod screening;
pub mod telemetry;
pub mod webhook;
