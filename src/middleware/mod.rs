// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Middleware modules (session guards, security headers).

pub mod auth;
pub mod security;

pub use auth::{require_browser_session, require_session, CurrentSession, SESSION_COOKIE};
