//! Shared helpers for the CLI end-to-end tests: a command builder with an
//! isolated environment and a mocked results API.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::{Value, json};
use std::cell::Cell;
use std::path::Path;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const TOKEN: &str = "e2e-secret-token";

/// `drawsync` run inside `dir` with no ambient credential or user config.
pub fn drawsync_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("drawsync"));
    cmd.current_dir(dir);
    cmd.env_remove("LOT_TOKEN");
    cmd.env_remove("DRAWSYNC_BASE_URL");
    cmd.env_remove("DRAWSYNC_OUT_DIR");
    cmd.env_remove("DRAWSYNC_FORMAT");
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("HOME", dir);
    cmd.env("DRAWSYNC_LOG", "error");
    cmd
}

/// Project config with a fast retry schedule.
pub fn write_fast_config(dir: &Path) {
    std::fs::write(
        dir.join("drawsync.toml"),
        "[fetch]\nattempts = 2\nbase_delay_ms = 1\ntimeout_secs = 5\n",
    )
    .expect("write drawsync.toml");
}

pub fn read_json(path: &Path) -> Value {
    let bytes = std::fs::read(path).expect("read json file");
    serde_json::from_slice(&bytes).expect("valid json")
}

pub fn draw_payload(contest: u64) -> Value {
    json!({
        "concurso": contest,
        "data": format!("{:02}/03/2026", contest % 28 + 1),
        "dezenas": ["01", "07", "13", "19", "25", format!("{:02}", contest % 60 + 1)],
    })
}

const RESULTS_PATH: &str = "/app/v2/resultado";

/// Mocked results API. Serves `latest` per series and every contest up to
/// it, answers 500 for contests marked broken, and 404 for anything else
/// (unknown series, wrong token, contests past the latest).
pub struct StubApi {
    pub base_url: String,
    server: MockServer,
    runtime: Runtime,
    /// Later `set_latest` calls must outrank earlier ones.
    next_priority: Cell<u8>,
}

impl StubApi {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build tokio runtime");
        let server = runtime.block_on(MockServer::start());
        Self {
            base_url: format!("{}{RESULTS_PATH}", server.uri()),
            server,
            runtime,
            next_priority: Cell::new(200),
        }
    }

    fn series_request(series: &str) -> MockBuilder {
        Mock::given(method("GET"))
            .and(path(RESULTS_PATH))
            .and(query_param("loteria", series))
            .and(query_param("token", TOKEN))
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    pub fn set_latest(&self, series: &str, contest: u64) {
        let priority = self.next_priority.get();
        self.next_priority.set(priority.saturating_sub(1).max(2));

        self.mount(
            Self::series_request(series)
                .and(query_param_is_missing("concurso"))
                .respond_with(ResponseTemplate::new(200).set_body_json(draw_payload(contest)))
                .with_priority(priority),
        );
        for n in 1..=contest {
            self.mount(
                Self::series_request(series)
                    .and(query_param("concurso", n.to_string()))
                    .respond_with(ResponseTemplate::new(200).set_body_json(draw_payload(n)))
                    .with_priority(priority),
            );
        }
    }

    pub fn break_contest(&self, series: &str, contest: u64) {
        self.mount(
            Self::series_request(series)
                .and(query_param("concurso", contest.to_string()))
                .respond_with(
                    ResponseTemplate::new(500).set_body_json(json!({"erro": "indisponivel"})),
                )
                .with_priority(1),
        );
    }

    /// Query strings received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .map(|request| request.url.query().unwrap_or_default().to_string())
            .collect()
    }
}
