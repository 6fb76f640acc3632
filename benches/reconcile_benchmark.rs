use criterion::{criterion_group, criterion_main, Criterion};
use pullup_club::auth::AuthContext;
use pullup_club::config::Config;
use pullup_club::models::{IdentityMetadata, Plan, Profile, SignInRequest};
use pullup_club::ports::Backends;
use pullup_club::services::metadata::plan_patch;
use pullup_club::services::pkce::FLOW_TTL;
use pullup_club::services::{MemoryBackend, OAuthIntent};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const SIGNING_KEY: &[u8] = b"bench_state_key_32_bytes_minimum";

fn benchmark_intent_signing(c: &mut Criterion) {
    let intent = OAuthIntent::new("/signup", Some(Plan::Annual)).expect("Failed to build intent");
    let encoded = intent.sign(SIGNING_KEY).expect("Failed to sign intent");

    let mut group = c.benchmark_group("oauth_intent");

    group.bench_function("sign", |b| {
        b.iter(|| black_box(&intent).sign(SIGNING_KEY))
    });

    group.bench_function("verify", |b| {
        b.iter(|| OAuthIntent::verify(black_box(&encoded), SIGNING_KEY, FLOW_TTL))
    });

    group.finish();
}

fn benchmark_metadata(c: &mut Criterion) {
    let app = json!({ "provider": "email", "is_paid": true });
    let user = json!({ "stripe_customer_id": "cus_bench", "full_name": "Bench Press" });
    let profile = Profile::new_for_user(uuid::Uuid::new_v4(), "bench@example.com");
    let metadata = IdentityMetadata::from_sources(Some(&app), Some(&user));

    let mut group = c.benchmark_group("metadata");

    group.bench_function("merge_sources", |b| {
        b.iter(|| IdentityMetadata::from_sources(black_box(Some(&app)), black_box(Some(&user))))
    });

    group.bench_function("plan_patch", |b| {
        b.iter(|| plan_patch(black_box(&profile), black_box(&metadata)))
    });

    group.finish();
}

fn benchmark_sign_in_pass(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to build runtime");

    let backend = Arc::new(MemoryBackend::new());
    let user = backend.add_account("bench@example.com", "bench-password");
    backend.activate_subscription(user.id);

    let auth = rt.block_on(async {
        let auth = Arc::new(AuthContext::new(
            &Config::test_default(),
            Backends::from_shared(backend.clone()),
        ));
        auth.init().await.expect("Failed to init auth context");
        auth
    });

    let request = SignInRequest {
        email: "bench@example.com".to_string(),
        password: "bench-password".to_string(),
        plan: None,
        location: Some("/login".to_string()),
    };

    c.bench_function("sign_in_full_pass", |b| {
        b.iter(|| rt.block_on(auth.sign_in(black_box(request.clone()))))
    });

    auth.dispose();
}

criterion_group!(
    benches,
    benchmark_intent_signing,
    benchmark_metadata,
    benchmark_sign_in_pass
);
criterion_main!(benches);
