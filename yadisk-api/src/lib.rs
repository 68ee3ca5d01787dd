mod account;
mod client;
pub mod outcome;
mod response;
pub mod scenario;

pub use account::AccountClient;
pub use client::{Credential, YadiskClient, YadiskError};
pub use outcome::{NextAction, Outcome, classify_status};
pub use response::{ApiResponse, DiskInfo, LoginInfo, Resource, ResourceType, TransferLink};
pub use scenario::{
    ScenarioKind, ScenarioReport, ScenarioRunner, ScenarioSettings, Step, StepRecord, Verdict,
};
