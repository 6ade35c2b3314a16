// Library root
// ------------
// The `globus` binary (`main.rs`) parses arguments and hands off to
// `commands`. The rest is split by concern:
// - `api` / `auth`: the Globus Transfer and Auth services.
// - `endpoints` / `activation`: endpoint snapshots and the three-stage
//   activation engine.
// - `wait`: the bounded task-wait loop.
// - `jobs`: HTCondor job ads and the bridge that records endpoints needing
//   manual activation on a running job.
// - `settings` / `config`: the TOML settings file and environment.
// - `ui` / `formatting` / `submit`: terminal prompts, tables, and submit
//   descriptions.
pub mod activation;
pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod formatting;
pub mod jobs;
pub mod logging;
pub mod mock;
pub mod settings;
pub mod submit;
pub mod transfer_spec;
pub mod ui;
pub mod wait;
