pub mod assessments;
pub mod core;
pub mod edit_buffer;
pub mod grading;
pub mod results;
pub mod roster;
pub mod setup;
pub mod transitions;
