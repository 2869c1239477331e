//! Defects domain: inspections and the anomalies they observe.

use crate::clock::ClockSpan;
use chrono::NaiveDate;

entity! {
    /// One CCTV or manual inspection of a pipe.
    Inspection as "Inspection" {
        key inspection_id: Option<i64> => "Inspection_ID";
        pipe_id: i64 => "Pipe_ID",
        date: Option<NaiveDate> => "Date",
        condition_rating: Option<i64> => "Condition_rating",
        survey_length: Option<f64> => "Survey_length",
        inspection_status: Option<String> => "Inspection_status",
        starting_manhole: Option<String> => "Starting_manhole",
        comments: Option<String> => "Comments",
    }
}

entity! {
    /// An anomaly observed during an inspection.
    Defect as "Defect" {
        key defect_id: Option<i64> => "Defect_ID";
        inspection_id: i64 => "Inspection_ID",
        main_defect_code: String => "Main_defect_code",
        characterization_code: Option<String> => "Characterization_code",
        quantification: Option<String> => "Quantification",
        /// Distance from the start of the survey, in metres.
        longitudinal_distance: Option<f64> => "Longitudinal_distance",
        /// Clock position where the defect begins (0 to 12).
        circumferential_start: Option<i64> => "Circumferential_start",
        /// Clock position where the defect ends. May be below the start when
        /// the defect wraps past twelve o'clock.
        circumferential_end: Option<i64> => "Circumferential_end",
        comments: Option<String> => "Comments",
    }
}

impl Defect {
    /// A defect with the given code found by `inspection`.
    pub fn new(inspection: i64, code: impl Into<String>) -> Self {
        Self {
            inspection_id: inspection,
            main_defect_code: code.into(),
            ..Default::default()
        }
    }

    /// Set the circumferential extent.
    pub fn at_clock(mut self, start: i64, end: i64) -> Self {
        self.circumferential_start = Some(start);
        self.circumferential_end = Some(end);
        self
    }

    /// Circumferential extent, when both positions are recorded and valid.
    pub fn clock_span(&self) -> Option<ClockSpan> {
        let start = u8::try_from(self.circumferential_start?).ok()?;
        let end = u8::try_from(self.circumferential_end?).ok()?;
        ClockSpan::new(start, end)
    }
}
