mod calc;
mod config;
mod db;
mod edit_buffer;
mod ipc;
mod store;
mod telemetry;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let settings = config::Settings::load().context("reading configuration")?;
    telemetry::init_tracing(&settings)?;

    let mut state = ipc::AppState::default();
    if let Some(path) = settings.workspace.as_ref() {
        let conn = db::open_db(path)
            .with_context(|| format!("opening workspace {}", path.display()))?;
        tracing::info!(workspace = %path.display(), "workspace opened from environment");
        state.select_workspace(path.clone(), conn);
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradebookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                tracing::debug!(id = %req.id, method = %req.method, "request");
                ipc::handle_request(&mut state, req)
            }
            Err(e) => {
                tracing::warn!(error = %e, "bad request line");
                json!({
                    "id": null,
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };

        writeln!(stdout, "{}", resp).context("writing response")?;
        stdout.flush().context("flushing response")?;
    }

    Ok(())
}
