//! The three-step estimate request form: project, contact, details.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const SERVICES: [&str; 7] = [
    "Kitchen Renovation",
    "Bathroom Remodel",
    "Full Home Renovation",
    "Flooring Installation",
    "Exterior Construction",
    "Commercial Build-Out",
    "Custom Project",
];

pub const TIMELINES: [&str; 5] =
    ["ASAP - Emergency", "Within 2 Weeks", "Within 1 Month", "1-3 Months", "Planning Phase"];

pub const BUDGETS: [&str; 5] =
    ["Under $5,000", "$5,000 - $15,000", "$15,000 - $30,000", "$30,000 - $50,000", "$50,000+"];

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 3;

/// Simulated submission latency before the form reports success.
pub const SUBMISSION_DELAY: Duration = Duration::from_millis(1500);
/// Pause on the success screen before redirecting to scheduling.
pub const REDIRECT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EstimateFormError {
    #[error("select a service before continuing")]
    ServiceRequired,
    #[error("unknown {field} `{value}`")]
    UnknownChoice { field: &'static str, value: String },
    #[error("missing required fields: {missing_fields:?}")]
    MissingFields { missing_fields: Vec<String> },
    #[error("the form was already submitted")]
    AlreadySubmitted,
    #[error("scheduling url `{url}` is invalid: {reason}")]
    InvalidSchedulingUrl { url: String, reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success,
}

/// Everything the visitor typed into the form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimateRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub timeline: String,
    pub budget: String,
    pub details: String,
}

impl EstimateRequest {
    /// Multi-line summary passed to the scheduling page.
    pub fn notes(&self) -> String {
        format!(
            "Service: {}\nTimeline: {}\nBudget: {}\nPhone: {}\nDetails: {}",
            self.service, self.timeline, self.budget, self.phone, self.details
        )
    }

    pub fn missing_contact_fields(&self) -> Vec<String> {
        [("name", &self.name), ("email", &self.email), ("phone", &self.phone)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field.to_string())
            .collect()
    }

    pub fn validate(&self) -> Result<(), EstimateFormError> {
        if self.service.trim().is_empty() {
            return Err(EstimateFormError::ServiceRequired);
        }
        let missing_fields = self.missing_contact_fields();
        if !missing_fields.is_empty() {
            return Err(EstimateFormError::MissingFields { missing_fields });
        }
        Ok(())
    }

    /// `base?name=&email=&notes=&phone=`, skipping empty name, email and phone.
    pub fn redirect_url(&self, base: &str) -> Result<Url, EstimateFormError> {
        let mut url = Url::parse(base).map_err(|error| EstimateFormError::InvalidSchedulingUrl {
            url: base.to_string(),
            reason: error.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            if !self.name.is_empty() {
                query.append_pair("name", &self.name);
            }
            if !self.email.is_empty() {
                query.append_pair("email", &self.email);
            }
            query.append_pair("notes", &self.notes());
            if !self.phone.is_empty() {
                query.append_pair("phone", &self.phone);
            }
        }

        Ok(url)
    }
}

/// Step navigation and submission state for one visitor's form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateForm {
    step: u8,
    request: EstimateRequest,
    submission: SubmissionState,
}

impl Default for EstimateForm {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimateForm {
    pub fn new() -> Self {
        Self {
            step: FIRST_STEP,
            request: EstimateRequest::default(),
            submission: SubmissionState::Idle,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn request(&self) -> &EstimateRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut EstimateRequest {
        &mut self.request
    }

    pub fn submission(&self) -> SubmissionState {
        self.submission
    }

    pub fn select_service(&mut self, service: &str) -> Result<(), EstimateFormError> {
        self.request.service = canonical("service", &SERVICES, service)?.to_string();
        Ok(())
    }

    pub fn select_timeline(&mut self, timeline: &str) -> Result<(), EstimateFormError> {
        self.request.timeline = canonical("timeline", &TIMELINES, timeline)?.to_string();
        Ok(())
    }

    pub fn select_budget(&mut self, budget: &str) -> Result<(), EstimateFormError> {
        self.request.budget = canonical("budget", &BUDGETS, budget)?.to_string();
        Ok(())
    }

    /// Moves forward one step, never past the last.
    pub fn next(&mut self) -> Result<u8, EstimateFormError> {
        match self.step {
            1 if self.request.service.trim().is_empty() => {
                return Err(EstimateFormError::ServiceRequired)
            }
            2 => {
                let missing_fields = self.request.missing_contact_fields();
                if !missing_fields.is_empty() {
                    return Err(EstimateFormError::MissingFields { missing_fields });
                }
            }
            _ => {}
        }
        self.step = (self.step + 1).min(LAST_STEP);
        Ok(self.step)
    }

    /// Moves back one step, never before the first.
    pub fn back(&mut self) -> u8 {
        self.step = self.step.saturating_sub(1).max(FIRST_STEP);
        self.step
    }

    pub fn begin_submit(&mut self) -> Result<(), EstimateFormError> {
        if self.submission != SubmissionState::Idle {
            return Err(EstimateFormError::AlreadySubmitted);
        }
        self.request.validate()?;
        self.submission = SubmissionState::Submitting;
        Ok(())
    }

    /// Marks the simulated submission as done and returns where to send the visitor.
    pub fn complete(&mut self, scheduling_url: &str) -> Result<Url, EstimateFormError> {
        let url = self.request.redirect_url(scheduling_url)?;
        self.submission = SubmissionState::Success;
        Ok(url)
    }
}

fn canonical(
    field: &'static str,
    choices: &[&'static str],
    value: &str,
) -> Result<&'static str, EstimateFormError> {
    let wanted = value.trim();
    choices
        .iter()
        .copied()
        .find(|choice| choice.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| EstimateFormError::UnknownChoice { field, value: value.to_string() })
}
