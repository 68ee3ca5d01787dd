mod report;

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yadisk_api::{AccountClient, ScenarioKind, ScenarioRunner, ScenarioSettings, YadiskClient};

use report::{AccountSnapshot, ProbeReport, ScenarioEntry};

const DEFAULT_API_BASE: &str = "https://cloud-api.yandex.net";
const DEFAULT_LOGIN_BASE: &str = "https://login.yandex.ru";

/// Checks which Yandex Disk operations a token may perform and prints a JSON report.
///
/// Scenarios: disk-info, folder-lifecycle, file-upload, publish, complete-workflow.
#[derive(Parser, Debug)]
#[command(name = "yadisk-probe", version)]
struct Cli {
    /// OAuth token for the Disk REST API
    #[arg(long, env = "YADISK_TOKEN", hide_env_values = true)]
    token: String,

    /// Disk REST API base URL
    #[arg(long, env = "YADISK_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Yandex ID base URL used by --check-account
    #[arg(long, env = "YADISK_LOGIN_BASE", default_value = DEFAULT_LOGIN_BASE)]
    login_base: String,

    /// Per-request timeout in seconds
    #[arg(
        long,
        env = "YADISK_PROBE_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,

    /// Remote folder to run scenarios under (disk root when empty)
    #[arg(long, env = "YADISK_PROBE_ROOT", default_value = "")]
    root: String,

    /// Scenario to run; repeat to run several (default: all)
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<ScenarioKind>,

    /// Also ask Yandex ID which account the token belongs to
    #[arg(long)]
    check_account: bool,
}

impl Cli {
    fn selected_scenarios(&self) -> Vec<ScenarioKind> {
        if self.scenarios.is_empty() {
            ScenarioKind::ALL.to_vec()
        } else {
            self.scenarios.clone()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let report = run(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failures = report.summary.failures();
    if failures > 0 {
        bail!("{failures} scenario(s) failed");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<ProbeReport> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let account = if cli.check_account {
        let client = AccountClient::with_http(http.clone(), &cli.login_base, cli.token.as_str())
            .context("invalid account client configuration")?;
        Some(check_account(&client).await)
    } else {
        None
    };

    let client = YadiskClient::with_http(http, &cli.api_base, cli.token.as_str())
        .context("invalid disk client configuration")?;
    let settings = ScenarioSettings {
        root: cli.root.clone(),
        ..ScenarioSettings::default()
    };
    let runner = ScenarioRunner::with_settings(&client, settings);

    let mut entries = Vec::new();
    for kind in cli.selected_scenarios() {
        info!(scenario = kind.name(), "running scenario");
        let entry = match runner.run(kind).await {
            Ok(report) => ScenarioEntry::Completed(report),
            Err(err) => {
                warn!(scenario = kind.name(), error = %err, "scenario did not complete");
                ScenarioEntry::Errored {
                    scenario: kind,
                    error: err.to_string(),
                }
            }
        };
        entries.push(entry);
    }

    Ok(ProbeReport::new(cli.api_base.clone(), account, entries))
}

async fn check_account(client: &AccountClient) -> AccountSnapshot {
    let response = match client.get_login_info().await {
        Ok(response) => response,
        Err(err) => {
            return AccountSnapshot {
                status: None,
                login: None,
                error: Some(err.to_string()),
            };
        }
    };
    let status = Some(response.status().as_u16());
    if !response.outcome().is_success() {
        return AccountSnapshot {
            status,
            login: None,
            error: None,
        };
    }
    match response.json::<yadisk_api::LoginInfo>() {
        Ok(info) => AccountSnapshot {
            status,
            login: info.login,
            error: None,
        },
        Err(err) => AccountSnapshot {
            status,
            login: None,
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_scenarios() {
        let cli = Cli::try_parse_from(["yadisk-probe", "--token", "t"]).unwrap();
        assert_eq!(cli.selected_scenarios(), ScenarioKind::ALL.to_vec());
        assert!(!cli.check_account);
    }

    #[test]
    fn accepts_repeated_scenarios() {
        let cli = Cli::try_parse_from([
            "yadisk-probe",
            "--token",
            "t",
            "--scenario",
            "publish",
            "--scenario",
            "disk-info",
        ])
        .unwrap();
        assert_eq!(
            cli.selected_scenarios(),
            vec![ScenarioKind::Publish, ScenarioKind::DiskInfo]
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = Cli::try_parse_from(["yadisk-probe", "--token", "t", "--timeout-secs", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["yadisk-probe", "--token", "t", "--timeout-secs", "1"])
            .unwrap();
        assert_eq!(cli.timeout_secs, 1);
    }

    #[test]
    fn rejects_unknown_scenario() {
        let err = Cli::try_parse_from(["yadisk-probe", "--token", "t", "--scenario", "nope"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown scenario"));
    }
}
