//! `acpick run`: replay a scenario against the picker.

use std::path::PathBuf;
use std::time::Duration;

use acpick_core::config::Config;
use acpick_core::memory::DelegateCall;
use acpick_core::{AccountId, DisplayData, LaunchMode};
use acpick_sheet::{SheetHandle, SheetModel, SheetOutcome, SheetRequest, SheetRuntime, ViewState};
use anyhow::{Context, Result, bail};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::cli::scenario::{Scenario, Step, World};

pub struct RunOptions {
    pub scenario: PathBuf,
    pub mode: Option<String>,
    pub account: Option<String>,
    pub requires_unlock: bool,
    pub json: bool,
}

pub async fn run(config: &Config, options: RunOptions) -> Result<()> {
    let scenario = Scenario::load(&options.scenario)?;

    // Command line beats the scenario, the scenario beats the config file.
    let mode = match options.mode.as_deref() {
        Some(mode) => mode.parse::<LaunchMode>()?,
        None => scenario.mode.unwrap_or(config.sheet.launch_mode),
    };
    let requires_unlock = options.requires_unlock
        || scenario
            .device_requires_unlock
            .unwrap_or(config.device.requires_unlock);
    let account = options.account.or_else(|| scenario.target.clone());

    let world = scenario.world(requires_unlock);
    let output = Output { json: options.json };

    let mut request = SheetRequest::new(mode).on_reveal(move || output.revealed());
    if let Some(account) = account {
        request = request.with_account(AccountId::new(account));
    }
    info!(
        scenario = %options.scenario.display(),
        mode = mode.display_name(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let runtime = SheetRuntime::start(request, world.collaborators())
        .await
        .context("start account picker")?;
    let handle = runtime.handle();
    let models = runtime.subscribe();
    let printer = tokio::spawn(print_models(runtime.subscribe(), output));
    let sheet = tokio::spawn(runtime.run());

    let player = Player {
        world: &world,
        handle: &handle,
        models,
        wait_timeout: config.sheet.wait_timeout(),
        output,
    };
    let played = player.play(&scenario.steps).await;

    // The picker stays open until someone dismisses it.
    if handle.dismiss().is_err() {
        debug!("picker already closed");
    }
    let outcome = sheet.await.context("account picker task failed")?;
    printer.await.context("model printer task failed")?;
    played?;

    output.summary(&outcome, &world);
    Ok(())
}

struct Player<'a> {
    world: &'a World,
    handle: &'a SheetHandle,
    models: watch::Receiver<SheetModel>,
    wait_timeout: Duration,
    output: Output,
}

impl Player<'_> {
    async fn play(mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            debug!(step = index + 1, action = step.name(), "playing step");
            self.step(step)
                .await
                .with_context(|| format!("step {} ({})", index + 1, step.name()))?;
        }
        Ok(())
    }

    async fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Select { account } => self.handle.select_account(self.world.account(account)?)?,
            Step::Expand => self.handle.expand_account_list()?,
            Step::Continue => self.handle.continue_clicked()?,
            Step::Back => {
                let consumed = self.handle.back_pressed().await?;
                self.output.back(consumed);
            }
            Step::AddAccount => self.handle.add_account()?,
            Step::Dismiss => self.handle.dismiss()?,
            Step::Wait { view } => {
                let view = *view;
                let reached = timeout(
                    self.wait_timeout,
                    self.models.wait_for(|model| model.view_state == view),
                )
                .await
                .map(|seen| seen.is_ok());
                match reached {
                    Ok(true) => self.output.reached(view),
                    Ok(false) => bail!("picker closed before showing {}", view.as_str()),
                    Err(_elapsed) => {
                        let current = self.models.borrow().view_state;
                        bail!(
                            "timed out waiting for {} (picker shows {})",
                            view.as_str(),
                            current.as_str()
                        );
                    }
                }
            }
            Step::WaitSignedIn { count } => {
                let count = *count;
                let mut completions = self.world.delegate.completions();
                let reached = timeout(
                    self.wait_timeout,
                    completions.wait_for(|accounts| accounts.len() >= count),
                )
                .await
                .map(|seen| {
                    seen.ok()
                        .map(|accounts| accounts.last().map(|account| account.email.clone()))
                });
                match reached {
                    Ok(Some(email)) => self.output.signed_in(email.as_deref().unwrap_or_default()),
                    Ok(None) => bail!("delegate went away"),
                    Err(_elapsed) => bail!("timed out waiting for {count} completed sign-in(s)"),
                }
            }
            Step::InsertAccount(spec) => {
                self.world
                    .delegate
                    .set_managed(AccountId::new(&spec.id), spec.managed);
                self.world.directory.insert(spec.to_account());
            }
            Step::RemoveAccount { account } => {
                if !self.world.directory.remove(&AccountId::new(account)) {
                    bail!("unknown account '{account}'");
                }
            }
            Step::SetProfile {
                account,
                name,
                avatar,
            } => {
                let account = self.world.account(account)?;
                self.world.profiles.set(
                    account.id,
                    DisplayData {
                        name: name.clone(),
                        avatar: avatar.clone(),
                    },
                );
            }
            Step::ShowGeneralError => self.world.controller()?.show_general_error(),
            Step::ShowAuthError => self.world.controller()?.show_auth_error(),
        }
        Ok(())
    }
}

/// Prints every model the store hands out until the picker closes.
///
/// The store coalesces bursts, so only the states the printer gets to see
/// are printed.
async fn print_models(mut models: watch::Receiver<SheetModel>, output: Output) {
    let mut last = None;
    loop {
        let model = models.borrow_and_update().clone();
        let line = output.model_line(&model);
        if last.as_ref() != Some(&line) {
            println!("{line}");
            last = Some(line);
        }
        if models.changed().await.is_err() {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn model_line(self, model: &SheetModel) -> String {
        if self.json {
            return json!({ "event": "model", "model": model }).to_string();
        }
        let mut line = format!("view: {}", model.view_state.as_str());
        if let Some(selected) = &model.selected_account {
            line.push_str(&format!(" [{}]", selected.email));
        }
        if let Some(domain) = &model.managed_domain {
            line.push_str(&format!(" (managed by {domain})"));
        }
        line
    }

    fn revealed(self) {
        if self.json {
            println!("{}", json!({ "event": "revealed" }));
        } else {
            println!("revealed");
        }
    }

    fn reached(self, view: ViewState) {
        if self.json {
            println!("{}", json!({ "event": "reached", "view": view }));
        } else {
            println!("reached {}", view.as_str());
        }
    }

    fn back(self, consumed: bool) {
        if self.json {
            println!("{}", json!({ "event": "back", "consumed": consumed }));
        } else {
            println!("back consumed: {consumed}");
        }
    }

    fn signed_in(self, email: &str) {
        if self.json {
            println!("{}", json!({ "event": "signed-in", "email": email }));
        } else {
            println!("signed in: {email}");
        }
    }

    fn summary(self, outcome: &SheetOutcome, world: &World) {
        let signed_in = outcome.signed_in.as_ref().map(|account| account.email.as_str());
        let calls: Vec<String> = world.delegate.calls().iter().map(describe_call).collect();
        let actions: Vec<&str> = world
            .telemetry
            .actions()
            .iter()
            .map(|action| action.as_str())
            .collect();

        if self.json {
            let durations: Vec<u128> = world
                .telemetry
                .durations()
                .iter()
                .map(Duration::as_millis)
                .collect();
            println!(
                "{}",
                json!({
                    "event": "finished",
                    "view": outcome.view,
                    "signed_in": signed_in,
                    "delegate_calls": calls,
                    "actions": actions,
                    "signin_durations_ms": durations,
                })
            );
            return;
        }

        println!("finished: {}", outcome.view.as_str());
        println!("signed in: {}", signed_in.unwrap_or("none"));
        println!("delegate: {}", calls.join(", "));
        println!("telemetry: {}", actions.join(", "));
    }
}

fn describe_call(call: &DelegateCall) -> String {
    match call {
        DelegateCall::ManagedCheck(id) => format!("managed-check {id}"),
        DelegateCall::SetManagementAccepted(accepted) => format!("management-accepted {accepted}"),
        DelegateCall::SignoutBeforeSignin => "signout-before-signin".to_string(),
        DelegateCall::SignOut => "sign-out".to_string(),
        DelegateCall::SignIn(id) => format!("sign-in {id}"),
        DelegateCall::SigninComplete(id) => format!("signin-complete {id}"),
        DelegateCall::RefreshCredentials(id) => format!("refresh {id}"),
        DelegateCall::AddAccount => "add-account".to_string(),
        DelegateCall::Dismiss => "dismiss".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_delegate_calls() {
        assert_eq!(
            describe_call(&DelegateCall::SignIn(AccountId::new("bob"))),
            "sign-in bob"
        );
        assert_eq!(
            describe_call(&DelegateCall::SetManagementAccepted(true)),
            "management-accepted true"
        );
    }

    #[test]
    fn text_model_line_names_selection_and_domain() {
        let model = SheetModel {
            view_state: ViewState::ConfirmManagement,
            selected_account: Some(acpick_sheet::AccountItem::new(
                &acpick_core::Account::new("bob", "bob@corp.com"),
                None,
            )),
            accounts: Vec::new(),
            managed_domain: Some("corp.com".to_string()),
            revealed: true,
        };
        let line = Output { json: false }.model_line(&model);
        assert_eq!(line, "view: confirm-management [bob@corp.com] (managed by corp.com)");

        let line = Output { json: true }.model_line(&model);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["model"]["view_state"], "confirm-management");
    }
}
