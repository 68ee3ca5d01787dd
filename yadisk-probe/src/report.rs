use serde::Serialize;
use yadisk_api::{ScenarioKind, ScenarioReport, Verdict};

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountSnapshot>,
    pub scenarios: Vec<ScenarioEntry>,
    pub summary: Summary,
}

#[derive(Debug, Serialize)]
pub struct AccountSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScenarioEntry {
    Completed(ScenarioReport),
    /// The scenario could not finish because of a transport or local error.
    Errored {
        scenario: ScenarioKind,
        error: String,
    },
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub partial: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    pub fn tally(entries: &[ScenarioEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry {
                ScenarioEntry::Completed(report) => match report.verdict {
                    Verdict::Passed => summary.passed += 1,
                    Verdict::Partial { .. } => summary.partial += 1,
                    Verdict::Skipped { .. } => summary.skipped += 1,
                    Verdict::Aborted { .. } => summary.aborted += 1,
                    Verdict::Failed { .. } => summary.failed += 1,
                },
                ScenarioEntry::Errored { .. } => summary.errored += 1,
            }
        }
        summary
    }

    /// Skipped, partial and aborted runs are expected with scoped tokens.
    pub fn failures(&self) -> usize {
        self.failed + self.errored
    }
}

impl ProbeReport {
    pub fn new(
        api_base: String,
        account: Option<AccountSnapshot>,
        scenarios: Vec<ScenarioEntry>,
    ) -> Self {
        let summary = Summary::tally(&scenarios);
        Self {
            api_base,
            account,
            scenarios,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadisk_api::{Outcome, Step};

    fn completed(scenario: ScenarioKind, verdict: Verdict) -> ScenarioEntry {
        ScenarioEntry::Completed(ScenarioReport {
            scenario,
            verdict,
            steps: Vec::new(),
        })
    }

    #[test]
    fn only_failed_and_errored_count_as_failures() {
        let entries = vec![
            completed(ScenarioKind::DiskInfo, Verdict::Passed),
            completed(
                ScenarioKind::FolderLifecycle,
                Verdict::Skipped {
                    step: Step::DiskInfo,
                    outcome: Outcome::Forbidden,
                },
            ),
            completed(
                ScenarioKind::Publish,
                Verdict::Partial {
                    step: Step::Publish,
                    outcome: Outcome::Unknown,
                },
            ),
            completed(
                ScenarioKind::FileUpload,
                Verdict::Aborted {
                    step: Step::Upload,
                    outcome: Outcome::RateLimited,
                },
            ),
        ];
        let summary = Summary::tally(&entries);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.aborted, 1);
        assert_eq!(summary.failures(), 0);
    }

    #[test]
    fn errored_scenarios_fail_the_run() {
        let entries = vec![
            ScenarioEntry::Errored {
                scenario: ScenarioKind::CompleteWorkflow,
                error: "request failed: connection refused".into(),
            },
            completed(
                ScenarioKind::DiskInfo,
                Verdict::Failed {
                    step: Step::DiskInfo,
                    reason: "missing field `total_space`".into(),
                },
            ),
        ];
        let summary = Summary::tally(&entries);
        assert_eq!(summary.failures(), 2);
    }

    #[test]
    fn report_serializes_entries_inline() {
        let report = ProbeReport::new(
            "https://cloud-api.yandex.net".into(),
            None,
            vec![completed(ScenarioKind::DiskInfo, Verdict::Passed)],
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["scenarios"][0]["scenario"], "disk-info");
        assert_eq!(value["scenarios"][0]["verdict"]["state"], "passed");
        assert_eq!(value["summary"]["passed"], 1);
        assert!(value.get("account").is_none());
    }
}
