//! Data access for the exchange platform.
//!
//! - `BackendClient`: bearer-authenticated JSON over the REST backend
//! - `SupabaseClient`: PostgREST tables and object storage
//! - `Connectivity`: the online flag both clients report into
//! - `ApiService`: typed CRUD per entity on top of both
//! - `SmartApiService`: online tracking, session recovery and the
//!   cache/fallback ladder for reads

pub mod auth;
pub mod connectivity;
pub mod envelope;
pub mod error;
pub mod fallback;
pub mod http;
pub mod service;
pub mod smart;
pub mod supabase;
pub mod types;

pub use auth::{AuthEvent, ClearSessionPolicy, IgnoreUnauthorized, UnauthorizedPolicy};
pub use error::ApiError;
pub use http::BackendClient;
pub use service::ApiService;
pub use smart::{DemoCredentials, SmartApiService, SmartOptions};
pub use supabase::SupabaseClient;
