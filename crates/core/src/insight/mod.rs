//! Question routing and answer assembly.

pub mod composer;
pub mod router;

pub use composer::{
    BoardInput, DataUsed, DetailRow, InsightComposer, Response, SummarySource,
    DEFAULT_DETAILS_LIMIT,
};
pub use router::{Intent, Question, QuestionRouter};
