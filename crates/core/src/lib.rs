pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod insight;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod rules;
pub mod snapshot;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, SourceMode};
pub use domain::{
    BoardCategory, Column, FieldValue, NormalizedRecord, RawRecord, RawRecordSet, RawValue,
    RecordStatus,
};
pub use errors::{ApplicationError, InterfaceError};
pub use insight::{Intent, Question, QuestionRouter, Response, SummarySource};
pub use metrics::{MetricEngine, MetricSet, MetricValue};
pub use normalize::Normalizer;
pub use pipeline::AnalysisPipeline;
pub use quality::{IssueKind, QualityAuditor, QualityIssue, QualityReport, Severity};
pub use rules::{RuleTables, RulesError};
pub use snapshot::{BoardSnapshot, DataOrigin, Freshness, Snapshot};
pub use source::{BoardSource, CacheError, RawRecordCache, SourceError, StaticSource};
