// Wire-level data model shared by the backend stages and the pipeline controller.
// Field names are camelCase on the wire.

pub mod research;
pub mod strategy;
pub mod validation;

pub use research::{Professor, ProfessorAnalysisResult, ResearchResult, Source};
pub use strategy::{CoreConcept, FullReport, InterviewQuestion, QuestionSet, StrategicPlan};
pub use validation::{AuditReport, AuditStatus, ValidationResult};
