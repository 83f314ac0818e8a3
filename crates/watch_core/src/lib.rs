//! Watch core: pure extraction, fingerprinting, scheduling and templating.
mod extract;
mod record;
mod schedule;
mod template;

pub use extract::{
    split_paragraphs, title_case, ExtractionEngine, ExtractionRules, RulesError,
    AUTHORITY_PATTERN, HALF_STAFF_PATTERN,
};
pub use record::{Fingerprint, Record};
pub use schedule::{is_eligible, Clock, ManualClock, SystemClock};
pub use template::{
    Notification, NotificationTemplates, Template, TemplateError, DEFAULT_BODY, DEFAULT_SUBJECT,
};
