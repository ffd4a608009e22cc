use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use std::sync::Arc;

use warden::authz::{
    AuthorizationMiddleware, CallContext, MemoryPolicyEngine, OperationMeta, PermissionDescriptor, PermissionRegistry,
    PolicyEngine,
};
use warden::identity::{JwtVerifier, TokenMaker};

fn synthetic_ops(n: usize) -> Vec<OperationMeta> {
    (0..n)
        .map(|i| {
            let op = format!("/svc{}.v1.Service/Method{}", i % 64, i);
            if i % 4 == 0 { OperationMeta::public(op) } else { OperationMeta::protected(op, PermissionDescriptor::new(format!("obj{}", i % 32), "call", ["admin"])) }
        })
        .collect()
}

fn bench_lookup(c: &mut Criterion) {
    let ns = [100usize, 10_000usize];
    let mut group = c.benchmark_group("registry_lookup");
    group.sampling_mode(SamplingMode::Flat);

    for &n in &ns {
        let ops = synthetic_ops(n);
        let names: Vec<String> = ops.iter().map(|o| o.operation.clone()).collect();
        let registry = PermissionRegistry::from_source(&ops).expect("registry");

        group.throughput(Throughput::Elements(names.len() as u64));
        group.bench_with_input(BenchmarkId::new("lookup_all", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let mut hits = 0usize;
                for name in &names {
                    if registry.lookup(name).is_some() { hits += 1; }
                }
                criterion::black_box(hits);
            });
        });

        // Misses exercise the public fast path.
        group.bench_with_input(BenchmarkId::new("lookup_miss", n.to_string()), &n, |b, _| {
            b.iter(|| criterion::black_box(registry.lookup("/unknown.v1.Service/Nothing")));
        });

        group.bench_with_input(BenchmarkId::new("rebuild_publish", n.to_string()), &n, |b, _| {
            b.iter(|| criterion::black_box(registry.reload(&ops).expect("reload")));
        });
    }
    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().expect("runtime");
    let secret = "bench-secret";
    let op = "/user.v1.UserService/DeleteUser";
    let registry = Arc::new(
        PermissionRegistry::from_source(&vec![OperationMeta::protected(op, PermissionDescriptor::new("user", "delete", ["admin"]))])
            .expect("registry"),
    );
    let engine = Arc::new(MemoryPolicyEngine::new());
    let uid = uuid::Uuid::new_v4();
    rt.block_on(async {
        engine.add_policy("admin", "user", "delete").await.expect("policy");
        engine.add_grouping_policy(&uid.to_string(), "admin").await.expect("grouping");
    });
    let mw = AuthorizationMiddleware::new(registry, Arc::new(JwtVerifier::new(secret)), engine);
    let token = TokenMaker::with_defaults(secret).create_access_token(&uid, &uuid::Uuid::new_v4()).expect("token");
    let ctx = CallContext::new(op).with_assertion(format!("Bearer {}", token));

    let mut group = c.benchmark_group("authorization");
    group.bench_function("decide_allow", |b| {
        b.iter(|| criterion::black_box(rt.block_on(mw.decide(&ctx)).is_allow()));
    });
    group.bench_function("decide_public", |b| {
        let public = CallContext::new("/auth.v1.AuthService/Login");
        b.iter(|| criterion::black_box(rt.block_on(mw.decide(&public)).is_allow()));
    });
    group.finish();
}

criterion_group!(benches, bench_lookup, bench_decide);
criterion_main!(benches);
