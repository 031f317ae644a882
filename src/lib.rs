// ABOUTME: Main library entry point for the oauth2-engine token lifecycle crate
// ABOUTME: Wires grant handling, token stores, and credential validation modules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # OAuth2 Engine
//!
//! An OAuth2 grant and token-lifecycle engine for a multi-client identity
//! provider. The engine issues, validates and revokes access tokens, refresh
//! tokens and authorization codes, backed by a relational store.
//!
//! Supported grant types: `authorization_code`, `client_credentials`,
//! `password` and `refresh_token`, plus bearer-token authentication and
//! RFC 7662-style introspection.
//!
//! The crate is deliberately HTTP-agnostic: a token endpoint collaborator
//! parses the request, performs Basic auth extraction, and hands the engine a
//! [`api::TokenRequest`]. Errors carry an [`errors::Error::http_status`]
//! mapping so the collaborator can translate failures without inspecting
//! variants one by one.

/// Wire-facing request and response types for the token endpoint collaborator
pub mod api;

/// Bearer-token authentication with rolling refresh-token extension
pub mod authenticator;

/// Environment-driven engine configuration
pub mod config;

/// Opaque token generation and password hashing strategies
pub mod crypto;

/// SQLite-backed persistence for clients, users, scopes and tokens
pub mod database;

/// Resource-owner user management and authentication
pub mod directory;

/// Signed email-token side channel (password reset, email confirmation)
pub mod email_token;

/// Engine error taxonomy and HTTP status mapping
pub mod errors;

/// Grant-type state machines over the token store
pub mod grants;

/// Token introspection responses for either token kind
pub mod introspect;

/// Structured logging initialization
pub mod logging;

/// Persistent entities and their constructors
pub mod models;

/// OAuth client registration, lookup and authentication
pub mod registry;

/// Scope catalog validation and scope-set algebra
pub mod scope;

pub use errors::{Error, Result};
