mod article;
mod report;

pub use article::Article;
pub use report::{FailureEntry, FailureReport, RunRecord, RunStatus, Severity};
