//! SewerDB Model - the sewer-pipe condition-monitoring entity model.
//!
//! Thirteen entities in three domains:
//! - **Factors**: pipes, manholes, weather stations and their observations,
//!   seismic events, hydraulic metrics and intervention history
//! - **Defects**: inspections and the defects they record
//! - **Failures**: failure events, optionally tied to an intervention
//!
//! Each entity is a typed record implementing [`Entity`]; [`sewer_schema`]
//! assembles their definitions, relations and deletion policies into a
//! [`sewerdb_core::SchemaBundle`].

#[macro_use]
mod record;

pub mod clock;
pub mod defects;
pub mod factors;
pub mod failures;
pub mod schema;

pub use clock::ClockSpan;
pub use defects::{Defect, Inspection};
pub use factors::{
    AirHumidity, AirTemperature, HydraulicProperties, InterventionHistory, Manhole, Pipe,
    PipeSeismicImpact, Rainfall, SeismicActivity, WeatherStation,
};
pub use failures::Failure;
pub use record::{Entity, FieldValue};
pub use schema::{constraints, relations, sewer_schema};
