//! The sewer condition-monitoring schema.
//!
//! Every relationship is declared once, on the entity holding the foreign
//! key. Lookups from the referenced side go through the inverse names.

use crate::clock::CLOCK_MAX;
use crate::defects::{Defect, Inspection};
use crate::factors::{
    AirHumidity, AirTemperature, HydraulicProperties, InterventionHistory, Manhole, Pipe,
    PipeSeismicImpact, Rainfall, SeismicActivity, WeatherStation,
};
use crate::failures::Failure;
use crate::Entity;
use sewerdb_core::{
    ConstraintDef, DeleteBehavior, RelationDecl, RelationKind, SchemaBuilder, SchemaBundle,
    SchemaError,
};

/// Relation names, as used by derived lookups.
pub mod relations {
    pub const PIPE_WEATHER_STATION: &str = "pipe_weather_station";
    pub const PIPE_UPSTREAM_MANHOLE: &str = "pipe_upstream_manhole";
    pub const PIPE_DOWNSTREAM_MANHOLE: &str = "pipe_downstream_manhole";
    pub const RAINFALL_STATION: &str = "rainfall_station";
    pub const AIR_HUMIDITY_STATION: &str = "air_humidity_station";
    pub const AIR_TEMPERATURE_STATION: &str = "air_temperature_station";
    pub const HYDRAULIC_PROPERTIES_PIPE: &str = "hydraulic_properties_pipe";
    pub const INTERVENTION_PIPE: &str = "intervention_pipe";
    pub const SEISMIC_IMPACT_PIPE: &str = "seismic_impact_pipe";
    pub const SEISMIC_IMPACT_ACTIVITY: &str = "seismic_impact_activity";
    pub const PIPE_SEISMIC_ACTIVITY: &str = "pipe_seismic_activity";
    pub const INSPECTION_PIPE: &str = "inspection_pipe";
    pub const DEFECT_INSPECTION: &str = "defect_inspection";
    pub const FAILURE_PIPE: &str = "failure_pipe";
    pub const FAILURE_INTERVENTION: &str = "failure_intervention";
}

/// Constraint names.
pub mod constraints {
    pub const DEFECT_CIRCUMFERENTIAL_START: &str = "defect_circumferential_start";
    pub const DEFECT_CIRCUMFERENTIAL_END: &str = "defect_circumferential_end";
}

fn many_to_one(
    name: &str,
    holder: &str,
    target: &str,
    field: &str,
    on_delete: DeleteBehavior,
    inverse: &str,
) -> RelationDecl {
    RelationDecl::new(name, holder, target, RelationKind::ManyToOne, field)
        .on_delete(on_delete)
        .inverse(inverse)
}

/// Assemble the full catalog: 13 entities in the Factors, Defects and
/// Failures domains.
pub fn sewer_schema() -> Result<SchemaBundle, SchemaError> {
    use relations::*;
    use DeleteBehavior::{Cascade, Restrict, SetNull};

    let mut b = SchemaBuilder::new();

    // Factors
    b.define(WeatherStation::definition())?
        .define(Manhole::definition())?
        .define(Pipe::definition())?
        .define(HydraulicProperties::definition())?
        .define(Rainfall::definition())?
        .define(AirHumidity::definition())?
        .define(AirTemperature::definition())?
        .define(SeismicActivity::definition())?
        .define(PipeSeismicImpact::definition())?
        .define(InterventionHistory::definition())?;

    b.relate(many_to_one(
        PIPE_WEATHER_STATION,
        Pipe::NAME,
        WeatherStation::NAME,
        "Weather_station_ID",
        SetNull,
        "pipes",
    ))?
    .relate(many_to_one(
        PIPE_UPSTREAM_MANHOLE,
        Pipe::NAME,
        Manhole::NAME,
        "Manhole_up_ID",
        SetNull,
        "pipes_upstream",
    ))?
    .relate(many_to_one(
        PIPE_DOWNSTREAM_MANHOLE,
        Pipe::NAME,
        Manhole::NAME,
        "Manhole_down_ID",
        SetNull,
        "pipes_downstream",
    ))?
    .relate(many_to_one(
        RAINFALL_STATION,
        Rainfall::NAME,
        WeatherStation::NAME,
        "Weather_station_ID",
        Restrict,
        "rainfall_records",
    ))?
    .relate(many_to_one(
        AIR_HUMIDITY_STATION,
        AirHumidity::NAME,
        WeatherStation::NAME,
        "Weather_station_ID",
        Restrict,
        "air_humidity_records",
    ))?
    .relate(many_to_one(
        AIR_TEMPERATURE_STATION,
        AirTemperature::NAME,
        WeatherStation::NAME,
        "Weather_station_ID",
        Restrict,
        "air_temperature_records",
    ))?
    .relate(
        RelationDecl::new(
            HYDRAULIC_PROPERTIES_PIPE,
            HydraulicProperties::NAME,
            Pipe::NAME,
            RelationKind::OneToOne,
            "Pipe_ID",
        )
        .on_delete(Cascade)
        .inverse("hydraulic_properties"),
    )?
    .relate(many_to_one(
        INTERVENTION_PIPE,
        InterventionHistory::NAME,
        Pipe::NAME,
        "Pipe_ID",
        Restrict,
        "interventions",
    ))?
    .relate(many_to_one(
        SEISMIC_IMPACT_PIPE,
        PipeSeismicImpact::NAME,
        Pipe::NAME,
        "Pipe_ID",
        Cascade,
        "seismic_impact",
    ))?
    .relate(many_to_one(
        SEISMIC_IMPACT_ACTIVITY,
        PipeSeismicImpact::NAME,
        SeismicActivity::NAME,
        "Seismic_activity_ID",
        Cascade,
        "pipe_impacts",
    ))?
    .relate(RelationDecl::many_to_many(
        PIPE_SEISMIC_ACTIVITY,
        Pipe::NAME,
        SeismicActivity::NAME,
        PipeSeismicImpact::NAME,
    ))?;

    // Defects
    b.define(Inspection::definition())?
        .define(Defect::definition())?
        .relate(many_to_one(
            INSPECTION_PIPE,
            Inspection::NAME,
            Pipe::NAME,
            "Pipe_ID",
            Restrict,
            "inspection",
        ))?
        .relate(many_to_one(
            DEFECT_INSPECTION,
            Defect::NAME,
            Inspection::NAME,
            "Inspection_ID",
            Cascade,
            "defects",
        ))?
        .constrain(ConstraintDef::range(
            constraints::DEFECT_CIRCUMFERENTIAL_START,
            Defect::NAME,
            "Circumferential_start",
            0.0,
            f64::from(CLOCK_MAX),
        ))?
        .constrain(ConstraintDef::range(
            constraints::DEFECT_CIRCUMFERENTIAL_END,
            Defect::NAME,
            "Circumferential_end",
            0.0,
            f64::from(CLOCK_MAX),
        ))?;

    // Failures
    b.define(Failure::definition())?
        .relate(many_to_one(
            FAILURE_PIPE,
            Failure::NAME,
            Pipe::NAME,
            "Pipe_ID",
            Restrict,
            "failures",
        ))?
        .relate(many_to_one(
            FAILURE_INTERVENTION,
            Failure::NAME,
            InterventionHistory::NAME,
            "Intervention_ID",
            SetNull,
            "failures",
        ))?;

    Ok(b.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sewerdb_core::{Cardinality, ConstraintDef};

    #[test]
    fn test_sewer_schema_shape() {
        let schema = sewer_schema().unwrap();

        assert_eq!(schema.entities.len(), 13);
        assert_eq!(schema.relations.len(), 15);
        assert_eq!(schema.constraints.len(), 2);
        for name in schema.entity_names() {
            assert!(
                schema.get_entity(name).unwrap().get_identity_field().is_some(),
                "{name}"
            );
        }
    }

    #[test]
    fn test_hydraulic_properties_shares_pipe_key() {
        let schema = sewer_schema().unwrap();
        let rel = schema.get_relation(relations::HYDRAULIC_PROPERTIES_PIPE).unwrap();

        assert_eq!(rel.cardinality, Cardinality::OneToOne);
        assert_eq!(rel.from_field, "Pipe_ID");
        assert_eq!(
            schema.get_entity("HydraulicProperties").unwrap().identity_field,
            rel.from_field
        );
    }

    #[test]
    fn test_manhole_roles_are_distinct_relations() {
        let schema = sewer_schema().unwrap();
        let roles: Vec<_> = schema
            .foreign_keys_from("Pipe")
            .into_iter()
            .filter(|r| r.to_entity == "Manhole")
            .map(|r| r.from_field.as_str())
            .collect();
        assert_eq!(roles, vec!["Manhole_down_ID", "Manhole_up_ID"]);

        assert_eq!(schema.find_lookup("pipes_upstream").len(), 1);
    }

    #[test]
    fn test_failure_lookup_is_ambiguous_by_inverse() {
        let schema = sewer_schema().unwrap();
        // Both Pipe and InterventionHistory expose "failures".
        assert_eq!(schema.find_lookup("failures").len(), 2);
    }

    #[test]
    fn test_seismic_link_goes_through_join() {
        let schema = sewer_schema().unwrap();
        let rel = schema.get_relation(relations::PIPE_SEISMIC_ACTIVITY).unwrap();
        assert!(rel.is_many_to_many());
        assert_eq!(rel.edge_entity.as_deref(), Some("PipeSeismicImpact"));

        // The informational column on Pipe is not a foreign key.
        assert!(schema
            .foreign_keys_from("Pipe")
            .iter()
            .all(|r| r.from_field != "Seismic_activity_ID"));
    }

    #[test]
    fn test_defect_clock_ranges() {
        let schema = sewer_schema().unwrap();
        let ranges: Vec<_> = schema
            .constraints_for("Defect")
            .into_iter()
            .filter_map(|c| match c {
                ConstraintDef::Range { field, min, max, .. } => Some((field.as_str(), *min, *max)),
                _ => None,
            })
            .collect();
        assert!(ranges.contains(&("Circumferential_start", 0.0, 12.0)));
        assert!(ranges.contains(&("Circumferential_end", 0.0, 12.0)));
    }

    #[test]
    fn test_schema_exports_as_json() {
        let schema = sewer_schema().unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["entities"]["Pipe"]["fields"].is_array());
    }
}
