//! Demo server.
//!
//! Reads `somnolence.toml` from the working directory when present, then
//! `SOMNOLENCE__*` environment overrides.
//!
//! ```text
//! curl 'localhost:8080/hello?name=World'
//! curl -H 'Authorization: Bearer 1234' localhost:8080/authorized
//! curl localhost:8080/__schema
//! ```

use std::process::ExitCode;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use somnolence::prelude::*;

#[derive(Debug, Deserialize, Describe)]
#[describe(crate = "somnolence::core")]
struct HelloInput {
    name: String,
}

#[derive(Debug, Serialize, Describe)]
#[describe(crate = "somnolence::core")]
struct HelloOutput {
    message: String,
}

fn text(reply: &'static str) -> Route<(), String> {
    Route::new(move |(): ()| async move { Ok::<_, HandlerError>(reply.to_string()) })
}

fn routes() -> anyhow::Result<Registry> {
    let mut routes = Registry::builder();

    routes.register("/", text("I am root!"))?;
    routes.register(
        "/hello",
        Route::new(|input: HelloInput| async move {
            Ok::<_, HandlerError>(HelloOutput {
                message: format!("Hello, {}!", input.name),
            })
        }),
    )?;

    let mut child = Registry::builder();
    child.register("/", text("Child route"))?;
    child.register("/grandchild", text("Grandchild route"))?;

    let mut parent = Registry::builder();
    parent.register("/", text("Parent route"))?;
    parent.nest("/child", child)?;
    routes.nest("/parent", parent)?;

    routes.register(
        "/authorized",
        text("Authorized route").authorizer(|ctx, _| ctx.bearer_token() == Some("1234")),
    )?;
    routes.register(
        "/lifecycle",
        text("Lifecycle route")
            .on_start(|ctx| tracing::info!(request_id = %ctx.request_id(), "Starting"))
            .on_finish(|ctx, outcome| {
                tracing::info!(request_id = %ctx.request_id(), %outcome, "Finishing");
            }),
    )?;

    Ok(routes.build())
}

async fn run() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_optional_file("somnolence.toml")?
        .with_env_prefix("SOMNOLENCE")
        .load()
        .context("failed to load configuration")?;

    init_telemetry(&config.telemetry_config()).context("failed to initialize telemetry")?;

    let registry = routes().context("failed to register routes")?;

    Server::new(config.server_config(), registry)
        .run()
        .await
        .context("server failed")?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Exiting");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
