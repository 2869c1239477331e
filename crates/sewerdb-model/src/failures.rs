//! Failures domain.

use chrono::NaiveDate;

entity! {
    /// A failure event on a pipe.
    Failure as "Failure" {
        key failure_id: Option<i64> => "Failure_ID";
        pipe_id: i64 => "Pipe_ID",
        /// The intervention the failure is attributed to, when known.
        intervention_id: Option<i64> => "Intervention_ID",
        type_of_failure: Option<String> => "Type_of_failure",
        date: Option<NaiveDate> => "Date",
        cause: Option<String> => "Cause",
        cause_location: Option<String> => "Cause_location",
        damage_caused: Option<String> => "Damage_caused",
        comments: Option<String> => "Comments",
    }
}

impl Failure {
    /// A failure of `pipe` with no known cause.
    pub fn new(pipe: i64) -> Self {
        Self {
            pipe_id: pipe,
            ..Default::default()
        }
    }
}
