pub mod board;
pub mod record;

pub use board::BoardCategory;
pub use record::{
    Column, FieldState, FieldValue, NormalizedRecord, RawRecord, RawRecordSet, RawValue,
    RecordStatus,
};
