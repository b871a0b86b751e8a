use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::Utc;
use sesame_auth::password::{DEFAULT_COST, MIN_COST};
use sesame_auth::{Hs256TokenService, NewIdentity, PasswordHasher, Profile, Role, TokenVerifier};
use sesame_core::IdentityId;

/// Hashing cost per work factor. The default factor bounds login latency.
fn bench_password_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("password_hash");
    group.sample_size(10);

    for cost in [MIN_COST, 8, DEFAULT_COST] {
        let hasher = PasswordHasher::with_cost(cost);
        group.bench_with_input(BenchmarkId::from_parameter(cost), &hasher, |b, hasher| {
            b.iter(|| hasher.hash(black_box("Secret123")).unwrap());
        });
    }

    group.finish();
}

fn bench_password_verify(c: &mut Criterion) {
    let hasher = PasswordHasher::default();
    let hash = hasher.hash("Secret123").unwrap();

    let mut group = c.benchmark_group("password_verify");
    group.sample_size(10);
    group.bench_function("match", |b| {
        b.iter(|| hasher.verify(black_box("Secret123"), black_box(&hash)))
    });
    group.bench_function("mismatch", |b| {
        b.iter(|| hasher.verify(black_box("wrong"), black_box(&hash)))
    });
    group.finish();
}

/// Token issue + verify should stay far below hashing cost.
fn bench_token_round_trip(c: &mut Criterion) {
    let svc = Hs256TokenService::new("bench-secret");
    let now = Utc::now();
    let mut identity = NewIdentity {
        email: "alice@example.com".to_string(),
        username: "alice".to_string(),
        password_hash: String::new(),
        profile: Profile::default(),
    }
    .into_identity(IdentityId::new(), now);
    identity.roles = vec![Role::new("editor"), Role::new("backoffice")];

    c.bench_function("token_issue", |b| {
        b.iter(|| svc.issue(black_box(&identity), now).unwrap())
    });

    let token = svc.issue(&identity, now).unwrap();
    c.bench_function("token_verify", |b| {
        b.iter(|| svc.verify(black_box(&token), now).unwrap())
    });
}

criterion_group!(
    benches,
    bench_password_hashing,
    bench_password_verify,
    bench_token_round_trip
);
criterion_main!(benches);
