pub mod config;
pub mod domain;
pub mod engagement;
pub mod errors;
pub mod estimate_form;
pub mod flows;
pub mod i18n;
pub mod pricing;
pub mod session;

pub use config::AppConfig;
pub use domain::business::BusinessInfo;
pub use domain::contact::{ContactDetails, FormFields};
pub use domain::message::{ChatOption, Message, MessageBody, MessageId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use estimate_form::{EstimateForm, EstimateFormError, EstimateRequest};
pub use flows::{ChatPath, DialogEngine, DialogError, DialogInput, LeadCaptureFlow};
pub use i18n::Language;
pub use pricing::{EstimateRange, PricingRule, PricingTable};
pub use session::{DialogRuntime, DialogState, SessionCache, SessionStore};
