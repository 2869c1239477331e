//! Delete behavior and unit-of-work atomicity.

use std::sync::Arc;
use std::thread;

use sewerdb::model::{
    relations, AirTemperature, Defect, Failure, HydraulicProperties, Inspection,
    InterventionHistory, Manhole, Pipe, PipeSeismicImpact, SeismicActivity, WeatherStation,
};
use sewerdb::{abort, ConstraintError, Database, Error, StorageConfig};

fn open() -> Database {
    Database::open_sewer(StorageConfig::temporary()).unwrap()
}

fn inspected_pipe(db: &Database) -> (i64, i64) {
    db.unit_of_work(|uow| {
        let pipe = uow.insert(&Pipe::default())?;
        let inspection = uow.insert(&Inspection {
            pipe_id: pipe,
            ..Default::default()
        })?;
        Ok((pipe, inspection))
    })
    .unwrap()
}

#[test]
fn test_inspection_delete_cascades_to_defects() {
    let db = open();
    let (_, inspection) = inspected_pipe(&db);
    let a = db.insert(&Defect::new(inspection, "FL")).unwrap();
    let b = db.insert(&Defect::new(inspection, "RF").at_clock(11, 1)).unwrap();

    let result = db.delete("Inspection", inspection).unwrap();
    assert_eq!(
        result.deleted,
        vec![
            ("Defect".to_string(), a),
            ("Defect".to_string(), b),
            ("Inspection".to_string(), inspection),
        ]
    );
    assert_eq!(db.count("Defect").unwrap(), 0);
    assert!(db.related("defects", inspection).unwrap().is_empty());
}

#[test]
fn test_pipe_with_inspection_is_restricted() {
    let db = open();
    let (pipe, _) = inspected_pipe(&db);
    db.insert(&HydraulicProperties::for_pipe(pipe)).unwrap();

    let err = db.delete("Pipe", pipe).unwrap_err();
    match err {
        Error::ConstraintViolation(ConstraintError::RestrictViolation {
            relation,
            referencing_entity,
            count,
            ..
        }) => {
            assert_eq!(relation, relations::INSPECTION_PIPE);
            assert_eq!(referencing_entity, "Inspection");
            assert_eq!(count, 1);
        }
        other => panic!("expected a restrict violation, got {other:?}"),
    }

    // The hydraulic row cascaded before the restriction was hit; the abort
    // must have rolled it back.
    assert!(db.get::<Pipe>(pipe).unwrap().is_some());
    assert!(db.get::<HydraulicProperties>(pipe).unwrap().is_some());
}

#[test]
fn test_pipe_delete_cascades_to_owned_rows() {
    let db = open();
    let pipe = db.insert(&Pipe::default()).unwrap();
    let quake = db.insert(&SeismicActivity::default()).unwrap();
    db.insert(&HydraulicProperties::for_pipe(pipe)).unwrap();
    db.insert(&PipeSeismicImpact::new(pipe, quake)).unwrap();
    db.insert(&PipeSeismicImpact::new(pipe, quake)).unwrap();

    let result = db.delete("Pipe", pipe).unwrap();
    assert_eq!(result.deleted.len(), 4);
    assert_eq!(db.count("HydraulicProperties").unwrap(), 0);
    assert_eq!(db.count("PipeSeismicImpact").unwrap(), 0);
    assert!(db.get::<SeismicActivity>(quake).unwrap().is_some());
    assert!(db.related("pipe_impacts", quake).unwrap().is_empty());
}

#[test]
fn test_seismic_activity_delete_cascades_to_impacts() {
    let db = open();
    let pipe = db.insert(&Pipe::default()).unwrap();
    let quake = db.insert(&SeismicActivity::default()).unwrap();
    db.insert(&PipeSeismicImpact::new(pipe, quake)).unwrap();

    db.delete("SeismicActivity", quake).unwrap();
    assert_eq!(db.count("PipeSeismicImpact").unwrap(), 0);
    assert!(db.get::<Pipe>(pipe).unwrap().is_some());
}

#[test]
fn test_intervention_delete_nulls_failures() {
    let db = open();
    let pipe = db.insert(&Pipe::default()).unwrap();
    let intervention = db
        .insert(&InterventionHistory {
            pipe_id: pipe,
            type_of_intervention: Some("Relining".into()),
            ..Default::default()
        })
        .unwrap();
    let failure = db
        .insert(&Failure {
            intervention_id: Some(intervention),
            cause: Some("Root intrusion".into()),
            ..Failure::new(pipe)
        })
        .unwrap();

    let result = db.delete("InterventionHistory", intervention).unwrap();
    assert_eq!(
        result.nullified,
        vec![("Failure".to_string(), failure, "Intervention_ID".to_string())]
    );

    let stored = db.get::<Failure>(failure).unwrap().unwrap();
    assert_eq!(stored.intervention_id, None);
    assert_eq!(stored.cause.as_deref(), Some("Root intrusion"));
    assert_eq!(db.related_from("Pipe", "failures", pipe).unwrap().len(), 1);
}

#[test]
fn test_manhole_delete_nulls_only_its_role() {
    let db = open();
    let up = db.insert(&Manhole::default()).unwrap();
    let down = db.insert(&Manhole::default()).unwrap();
    let pipe = db
        .insert(&Pipe {
            manhole_up_id: Some(up),
            manhole_down_id: Some(down),
            ..Default::default()
        })
        .unwrap();

    let result = db.delete("Manhole", up).unwrap();
    assert_eq!(result.affected_count(), 2);

    let stored = db.get::<Pipe>(pipe).unwrap().unwrap();
    assert_eq!(stored.manhole_up_id, None);
    assert_eq!(stored.manhole_down_id, Some(down));
    assert_eq!(db.related("pipes_downstream", down).unwrap().len(), 1);
}

#[test]
fn test_station_with_observations_is_restricted() {
    let db = open();
    let station = db.insert(&WeatherStation::default()).unwrap();
    let pipe = db
        .insert(&Pipe {
            weather_station_id: Some(station),
            ..Default::default()
        })
        .unwrap();
    db.insert(&AirTemperature {
        weather_station_id: Some(station),
        temperature_value: Some(-3.5),
        ..Default::default()
    })
    .unwrap();

    let err = db.delete("WeatherStation", station).unwrap_err();
    assert!(matches!(
        err,
        Error::ConstraintViolation(ConstraintError::RestrictViolation { .. })
    ));
    let stored = db.get::<Pipe>(pipe).unwrap().unwrap();
    assert_eq!(stored.weather_station_id, Some(station));
}

#[test]
fn test_delete_missing_row() {
    let db = open();
    assert!(matches!(
        db.delete("Pipe", 404),
        Err(Error::NotFound { id: 404, .. })
    ));
}

#[test]
fn test_failed_unit_leaves_no_partial_state() {
    let db = open();
    let pipe = db.insert(&Pipe::default()).unwrap();

    let result = db.unit_of_work(|uow| {
        let inspection = uow.insert(&Inspection {
            pipe_id: pipe,
            ..Default::default()
        })?;
        uow.insert(&Defect::new(inspection, "DE"))?;
        uow.insert(&Defect::new(inspection + 1000, "DE"))
    });

    assert!(matches!(
        result,
        Err(Error::ConstraintViolation(
            ConstraintError::ForeignKeyViolation { .. }
        ))
    ));
    assert_eq!(db.count("Inspection").unwrap(), 0);
    assert_eq!(db.count("Defect").unwrap(), 0);
    assert!(db.related("inspection", pipe).unwrap().is_empty());
}

#[test]
fn test_explicit_abort_rolls_back() {
    let db = open();

    let result: Result<(), Error> = db.unit_of_work(|uow| {
        uow.insert(&Manhole::default())?;
        abort(Error::InvalidData("survey rejected".into()))
    });

    assert!(matches!(result, Err(Error::InvalidData(_))));
    assert_eq!(db.count("Manhole").unwrap(), 0);
}

#[test]
fn test_unit_sees_its_own_writes() {
    let db = open();
    let (pipe, defects) = db
        .unit_of_work(|uow| {
            let pipe = uow.insert(&Pipe::default())?;
            let inspection = uow.insert(&Inspection {
                pipe_id: pipe,
                ..Default::default()
            })?;
            uow.insert(&Defect::new(inspection, "JD"))?;
            Ok((pipe, uow.children(relations::DEFECT_INSPECTION, inspection)?))
        })
        .unwrap();

    assert_eq!(defects.len(), 1);
    assert_eq!(db.related("inspection", pipe).unwrap().len(), 1);
}

#[test]
fn test_concurrent_inserts_get_distinct_ids() {
    let db = Arc::new(open());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                (0..25)
                    .map(|_| db.insert(&Manhole::default()).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 100);
    assert_eq!(db.count("Manhole").unwrap(), 100);
}

#[test]
fn test_insert_racing_parent_delete_leaves_no_orphan() {
    let db = Arc::new(open());

    for _ in 0..50 {
        let pipe = db.insert(&Pipe::default()).unwrap();

        let inserter = {
            let db = Arc::clone(&db);
            thread::spawn(move || db.insert(&Failure::new(pipe)))
        };
        let deleter = {
            let db = Arc::clone(&db);
            thread::spawn(move || db.delete("Pipe", pipe))
        };

        let inserted = inserter.join().unwrap();
        let deleted = deleter.join().unwrap();

        // Exactly one side wins: a committed failure blocks the delete,
        // a committed delete makes the failure's key dangle.
        assert_ne!(inserted.is_ok(), deleted.is_ok());

        let failures = db.related_from("Pipe", "failures", pipe).unwrap();
        if db.get::<Pipe>(pipe).unwrap().is_none() {
            assert!(failures.is_empty());
            assert!(matches!(
                inserted,
                Err(Error::ConstraintViolation(
                    ConstraintError::ForeignKeyViolation { .. }
                ))
            ));
        } else {
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                deleted,
                Err(Error::ConstraintViolation(
                    ConstraintError::RestrictViolation { .. }
                ))
            ));
        }
    }

    let orphans = db
        .scan::<Failure>()
        .unwrap()
        .into_iter()
        .filter(|f| db.get::<Pipe>(f.pipe_id).unwrap().is_none())
        .count();
    assert_eq!(orphans, 0);
}
