//! `hookline-demo`: a small application served over HTTP.

use clap::Parser;
use hookline::logging::{init_logging_with_config, LogConfig};
use hookline::plugins::{cors, request_logger, CorsOptions};
use hookline::{App, AppOptions, HttpError, JsonSchema, Reply, RouteDef, RuntimeConfig};
use serde_json::json;
use tracing::info;

/// Serve the hookline demo application
#[derive(Parser)]
#[command(name = "hookline-demo")]
#[command(about = "hookline demo server", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOOKLINE_ADDR", default_value = "127.0.0.1:8080")]
    addr: String,

    /// Pretty, debug level logs instead of JSON lines
    #[arg(long, default_value_t = false)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_config = if cli.dev {
        LogConfig::default_dev()
    } else {
        LogConfig::from_env()
    };
    init_logging_with_config(&log_config)?;

    let app = demo_app()?;
    for route in app.routes() {
        info!(method = %route.method, path = %route.path, mounted = route.mounted, "Route");
    }
    app.listen(cli.addr.as_str()).await
}

fn demo_app() -> anyhow::Result<App> {
    let item_schema = JsonSchema::new(json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "price": { "type": "number", "minimum": 0 }
        }
    }))?;
    let id_params = JsonSchema::new(json!({
        "type": "object",
        "properties": { "id": { "type": "integer" } },
        "required": ["id"]
    }))?;

    let items = App::with_prefix("/items")
        .get_with("/:id", RouteDef::new().params(id_params), |ctx| {
            Box::pin(async move {
                let id = ctx.param("id").and_then(|v| v.as_i64()).unwrap_or_default();
                if id == 999 {
                    return Err(HttpError::not_found()
                        .with_message(format!("Item {id} does not exist"))
                        .into());
                }
                Ok(Reply::from(json!({ "id": id, "name": format!("item-{id}") })))
            })
        })
        .post_with("/", RouteDef::new().body(item_schema), |ctx| {
            Box::pin(async move {
                let body = ctx.body.to_value();
                Ok(ctx.status(http::StatusCode::CREATED, json!({ "created": body })))
            })
        });

    let users = App::with_prefix("/users")
        .get("/", |_ctx| {
            Box::pin(async { Ok(Reply::from(json!([{ "id": "1", "name": "Ada" }]))) })
        })
        .get("/:id", |ctx| {
            Box::pin(async move {
                let id = ctx.param_str("id").unwrap_or_default().to_string();
                Ok(Reply::from(json!({ "id": id })))
            })
        });

    let api = App::with_options(
        AppOptions::new()
            .prefix("/api")
            .config(RuntimeConfig::from_env()),
    )
    .use_app(&users);

    Ok(App::new()
        .use_app(&cors(CorsOptions::permissive())?)
        .use_app(&request_logger())
        .get("/health", |_ctx| {
            Box::pin(async { Ok(Reply::from(json!({ "status": "ok" }))) })
        })
        .use_app(&items)
        .use_app(&api))
}
