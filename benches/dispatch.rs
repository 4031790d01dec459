use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hookline::router::{RouteMethod, RouteTable};
use hookline::schema::{JsonSchema, RouteDef};
use hookline::{App, HookOutcome, Reply};
use http::{Method, Request};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const PATTERNS: &[(Method, &str)] = &[
    (Method::GET, "/"),
    (Method::GET, "/zoo/animals"),
    (Method::POST, "/zoo/animals"),
    (Method::GET, "/zoo/animals/:id"),
    (Method::PUT, "/zoo/animals/:id"),
    (Method::DELETE, "/zoo/animals/:id"),
    (Method::GET, "/zoo/animals/:id/toys/:toy_id"),
    (Method::GET, "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id"),
    (Method::POST, "/inventory/:warehouse/feeds/:feed/items/:item/batches/:batch"),
    (Method::GET, "/static/*"),
];

fn bench_route_match(c: &mut Criterion) {
    let mut table = RouteTable::new();
    for (method, pattern) in PATTERNS {
        let _ = table.insert(RouteMethod::Exact(method.clone()), pattern, Arc::new(()));
    }
    let router = table.compile();
    let paths = [
        (Method::GET, "/zoo/animals/123"),
        (Method::GET, "/zoo/animals/123/toys/456"),
        (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
        (Method::GET, "/static/css/site.css"),
        (Method::GET, "/nowhere"),
    ];

    c.bench_function("route_match", |b| {
        b.iter(|| {
            for (method, path) in &paths {
                black_box(router.route(method, path));
            }
        })
    });
}

fn demo_app(hooks: usize) -> App {
    let mut app = App::new();
    for i in 0..hooks {
        app = app.on_before_handle(move |_ctx| {
            Box::pin(async move { Ok(HookOutcome::patch(format!("hook{i}"), i)) })
        });
    }
    app.get("/health", |_ctx| {
        Box::pin(async { Ok(Reply::from(json!({"status": "ok"}))) })
    })
    .get_with(
        "/items/:id",
        RouteDef::new().params(JsonSchema::new(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        }))
        .expect("valid schema")),
        |ctx| {
            let id = ctx.param("id").cloned();
            Box::pin(async move { Ok(Reply::from(json!({ "id": id }))) })
        },
    )
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    let mut group = c.benchmark_group("dispatch");
    for hooks in [0usize, 4, 16] {
        let dispatcher = demo_app(hooks).build().expect("demo app builds");

        group.bench_with_input(BenchmarkId::new("health", hooks), &dispatcher, |b, d| {
            b.to_async(&runtime).iter(|| async {
                let request = Request::get("/health")
                    .body(Bytes::new())
                    .expect("request");
                black_box(d.dispatch(request).await)
            })
        });

        group.bench_with_input(BenchmarkId::new("validated_param", hooks), &dispatcher, |b, d| {
            b.to_async(&runtime).iter(|| async {
                let request = Request::get("/items/42")
                    .body(Bytes::new())
                    .expect("request");
                black_box(d.dispatch(request).await)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_route_match, bench_dispatch);
criterion_main!(benches);
