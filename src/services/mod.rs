// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Services module - the reconciliation components and backends.

pub mod memory;
pub mod metadata;
pub mod pending;
pub mod pkce;
pub mod profile;
pub mod roles;
pub mod session;
pub mod subscription;
pub mod supabase;

pub use memory::MemoryBackend;
pub use metadata::MetadataSync;
pub use pending::{PendingActionProcessor, PendingTake};
pub use pkce::{OAuthIntent, PkceFlows, PkcePair};
pub use profile::{FetchedProfile, ProfileRepository};
pub use roles::AdminRoleResolver;
pub use session::{AuthEvent, SessionStore};
pub use subscription::SubscriptionEvaluator;
pub use supabase::SupabaseClient;
