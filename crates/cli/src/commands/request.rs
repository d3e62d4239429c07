use leadline_core::config::AppConfig;
use leadline_core::estimate_form::{EstimateForm, EstimateFormError, SUBMISSION_DELAY};
use serde_json::json;

use crate::commands::{load_config, CommandResult};

#[derive(Clone, Debug, Default)]
pub struct RequestArgs {
    pub service: String,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub details: Option<String>,
}

/// Walks the estimate form through all three steps and prints the
/// scheduling redirect it would send the visitor to.
pub fn run(args: RequestArgs) -> CommandResult {
    let config = match load_config("request") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    run_with_config(&config, args)
}

pub fn run_with_config(config: &AppConfig, args: RequestArgs) -> CommandResult {
    let mut form = EstimateForm::new();
    match fill(&mut form, args) {
        Ok(()) => {}
        Err(error) => {
            return CommandResult::failure("request", "form_validation", error.to_string(), 2)
        }
    }

    let redirect = match form.complete(&config.business.scheduling_url) {
        Ok(url) => url,
        Err(error) => {
            return CommandResult::failure("request", "scheduling_url", error.to_string(), 2)
        }
    };

    CommandResult::success_with(
        "request",
        format!("estimate request ready; redirecting to {}", redirect.as_str()),
        Some(json!({
            "redirect_url": redirect.as_str(),
            "notes": form.request().notes(),
            "submission_delay_ms": SUBMISSION_DELAY.as_millis() as u64,
        })),
    )
}

fn fill(form: &mut EstimateForm, args: RequestArgs) -> Result<(), EstimateFormError> {
    form.select_service(&args.service)?;
    if let Some(timeline) = args.timeline.as_deref() {
        form.select_timeline(timeline)?;
    }
    if let Some(budget) = args.budget.as_deref() {
        form.select_budget(budget)?;
    }
    form.next()?;

    let request = form.request_mut();
    request.name = args.name;
    request.email = args.email;
    request.phone = args.phone;
    form.next()?;

    form.request_mut().details = args.details.unwrap_or_default();
    form.begin_submit()
}
