// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Auth context: the reconciliation orchestrator and its entry points.

mod context;
mod entry;
mod state;

pub use context::AuthContext;
pub use entry::{OAuthStart, SignInOutcome, SignUpResult, OAUTH_PROVIDERS};
pub use state::{AuthState, AuthView, Phase};
