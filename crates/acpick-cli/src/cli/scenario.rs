//! Scenario files for `acpick run`.
//!
//! A scenario describes the device (accounts, device class, primary
//! account), what the scripted collaborators answer, and the user actions to
//! replay:
//!
//! ```toml
//! mode = "choose-account"
//!
//! [[accounts]]
//! id = "bob"
//! email = "bob@x.com"
//! managed = true
//!
//! [script]
//! signin = ["aborted"]
//!
//! [[steps]]
//! action = "select"
//! account = "bob"
//!
//! [[steps]]
//! action = "wait"
//! view = "general-error"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use acpick_core::collaborators::{SigninController, SigninOutcome};
use acpick_core::memory::{
    AddedAccountScript, MemoryDirectory, MemoryProfileCache, RecordingTelemetry, ScriptedDelegate,
    ScriptedDeviceGate,
};
use acpick_core::telemetry::{PromoAction, Telemetry, TracingTelemetry};
use acpick_core::{Account, AccountId, LaunchMode};
use acpick_sheet::{Collaborators, ViewState};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub mode: Option<LaunchMode>,
    /// Preferred account id, or the seamless sign-in target.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub device_requires_unlock: Option<bool>,
    #[serde(default)]
    pub delegate_adds_accounts: bool,
    /// Account already signed in when the picker opens.
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    #[serde(default)]
    pub script: Script,
    /// Results of the system add-account flow, in order.
    #[serde(default)]
    pub added_accounts: Vec<AddedAccountSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSpec {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub managed: bool,
}

impl AccountSpec {
    pub fn to_account(&self) -> Account {
        Account {
            id: AccountId::new(&self.id),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            given_name: self.given_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddedAccountSpec {
    #[serde(flatten)]
    pub account: AccountSpec,
    #[serde(default = "default_true")]
    pub visible_immediately: bool,
}

fn default_true() -> bool {
    true
}

/// Scripted collaborator answers. Empty queues fall back to the happy path.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub managed_checks: Vec<bool>,
    #[serde(default)]
    pub signin: Vec<SigninOutcome>,
    #[serde(default)]
    pub signin_delay_ms: Option<u64>,
    #[serde(default)]
    pub unlock: Vec<bool>,
    #[serde(default)]
    pub refresh: Vec<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Select {
        account: String,
    },
    Expand,
    Continue,
    Back,
    AddAccount,
    Dismiss,
    /// Wait until the picker shows `view`.
    Wait {
        view: ViewState,
    },
    /// Wait until the delegate saw `count` completions.
    WaitSignedIn {
        #[serde(default = "default_count")]
        count: usize,
    },
    InsertAccount(AccountSpec),
    RemoveAccount {
        account: String,
    },
    SetProfile {
        account: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
    },
    ShowGeneralError,
    ShowAuthError,
}

fn default_count() -> usize {
    1
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Select { .. } => "select",
            Step::Expand => "expand",
            Step::Continue => "continue",
            Step::Back => "back",
            Step::AddAccount => "add-account",
            Step::Dismiss => "dismiss",
            Step::Wait { .. } => "wait",
            Step::WaitSignedIn { .. } => "wait-signed-in",
            Step::InsertAccount(_) => "insert-account",
            Step::RemoveAccount { .. } => "remove-account",
            Step::SetProfile { .. } => "set-profile",
            Step::ShowGeneralError => "show-general-error",
            Step::ShowAuthError => "show-auth-error",
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse scenario from {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.id.as_str()) {
                anyhow::bail!("duplicate account id '{}'", account.id);
            }
        }
        Ok(())
    }

    /// Builds the scripted collaborators described by this scenario.
    pub fn world(&self, requires_unlock: bool) -> World {
        let directory = MemoryDirectory::new(self.accounts.iter().map(AccountSpec::to_account).collect());
        for added in &self.added_accounts {
            directory.queue_added_account(AddedAccountScript {
                account: added.account.to_account(),
                visible_immediately: added.visible_immediately,
            });
        }

        let mut delegate = ScriptedDelegate::new();
        if self.delegate_adds_accounts {
            delegate = delegate.handling_add_account();
        }
        let managed = self
            .accounts
            .iter()
            .chain(self.added_accounts.iter().map(|added| &added.account));
        for account in managed {
            delegate.set_managed(AccountId::new(&account.id), account.managed);
        }
        for managed in &self.script.managed_checks {
            delegate.queue_managed_check(*managed);
        }
        for outcome in &self.script.signin {
            delegate.queue_signin(*outcome);
        }
        for success in &self.script.refresh {
            delegate.queue_refresh(*success);
        }
        delegate.set_signin_delay(self.script.signin_delay_ms.map(Duration::from_millis));
        delegate.set_primary(self.primary.as_deref().map(AccountId::new));

        let gate = ScriptedDeviceGate::new(requires_unlock);
        for unlocked in &self.script.unlock {
            gate.queue_unlock(*unlocked);
        }

        World {
            directory: Arc::new(directory),
            profiles: Arc::new(MemoryProfileCache::new()),
            delegate: Arc::new(delegate),
            gate: Arc::new(gate),
            telemetry: Arc::new(ScenarioTelemetry::default()),
        }
    }
}

/// The scripted collaborators of one run.
pub struct World {
    pub directory: Arc<MemoryDirectory>,
    pub profiles: Arc<MemoryProfileCache>,
    pub delegate: Arc<ScriptedDelegate>,
    pub gate: Arc<ScriptedDeviceGate>,
    pub telemetry: Arc<ScenarioTelemetry>,
}

impl World {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            directory: Arc::<MemoryDirectory>::clone(&self.directory),
            profiles: Arc::<MemoryProfileCache>::clone(&self.profiles),
            delegate: Arc::<ScriptedDelegate>::clone(&self.delegate),
            device_gate: Arc::<ScriptedDeviceGate>::clone(&self.gate),
            telemetry: Arc::<ScenarioTelemetry>::clone(&self.telemetry),
        }
    }

    /// Looks an account up in the current directory snapshot.
    pub fn account(&self, id: &str) -> Result<Account> {
        let id = AccountId::new(id);
        Account::find_by_id(&self.directory.snapshot(), &id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown account '{id}'"))
    }

    /// Controller the delegate received with its latest completion.
    pub fn controller(&self) -> Result<Arc<dyn SigninController>> {
        self.delegate
            .controller()
            .ok_or_else(|| anyhow!("no sign-in has completed yet"))
    }
}

/// Records telemetry for the run summary and logs it.
#[derive(Default)]
pub struct ScenarioTelemetry {
    recorded: RecordingTelemetry,
    log: TracingTelemetry,
}

impl ScenarioTelemetry {
    pub fn actions(&self) -> Vec<PromoAction> {
        self.recorded.actions()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.recorded.durations()
    }
}

impl Telemetry for ScenarioTelemetry {
    fn record_action(&self, action: PromoAction) {
        self.recorded.record_action(action);
        self.log.record_action(action);
    }

    fn record_signin_duration(&self, elapsed: Duration) {
        self.recorded.record_signin_duration(elapsed);
        self.log.record_signin_duration(elapsed);
    }
}
