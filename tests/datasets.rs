use insight::catalog::{DatasetInfo, DatasetKind};
use insight::facade::InsightFacade;
use insight::store::Dataset;
use insight::value::{Record, Value};
use insight::InsightError;
use serde_json::{json, Value as Json};

fn sections() -> Vec<Json> {
    vec![
        json!({
            "Subject": "cpsc", "Course": "310", "Avg": 78.5, "Professor": "holmes, reid",
            "Title": "software eng", "Pass": 90, "Fail": 3, "Audit": 1,
            "id": 46405, "Year": "2015", "Section": "101"
        }),
        json!({
            "Subject": "cpsc", "Course": "310", "Avg": 77.1, "Professor": "",
            "Title": "software eng", "Pass": 180, "Fail": 6, "Audit": 2,
            "id": 46406, "Year": "2015", "Section": "overall"
        }),
        // Avg as text, skipped
        json!({
            "Subject": "math", "Course": "100", "Avg": "70", "Professor": "",
            "Title": "calculus", "Pass": 1, "Fail": 0, "Audit": 0,
            "id": 1, "Year": "2014", "Section": "101"
        }),
        // no Title, skipped
        json!({
            "Subject": "math", "Course": "100", "Avg": 70, "Professor": "",
            "Pass": 1, "Fail": 0, "Audit": 0, "id": 2, "Year": "2014", "Section": "101"
        }),
        json!("not a section"),
    ]
}

fn rooms() -> Vec<Json> {
    vec![
        json!({
            "fullname": "Hugh Dempster Pavilion", "shortname": "DMP", "number": "110",
            "address": "6245 Agronomy Road V6T 1Z4", "lat": 49.26125, "lon": -123.24807,
            "seats": 120, "type": "Tiered Large Group", "furniture": "Classroom-Fixed Tablets",
            "href": "http://students.ubc.ca/campus/discover/buildings-and-classrooms/room/DMP-110"
        }),
        json!({
            "fullname": "Woodward (Instructional Resources Centre-IRC)", "shortname": "WOOD", "number": "B75",
            "address": "2194 Health Sciences Mall", "lat": 49.26478, "lon": -123.24673,
            "seats": 20, "type": "Small Group", "furniture": "Classroom-Movable Tables & Chairs",
            "href": "http://students.ubc.ca/campus/discover/buildings-and-classrooms/room/WOOD-B75"
        }),
    ]
}

fn setup() -> InsightFacade {
    let mut facade = InsightFacade::new();
    facade.add_dataset("courses", DatasetKind::Courses, &sections()).unwrap();
    facade.add_dataset("rooms", DatasetKind::Rooms, &rooms()).unwrap();
    facade
}

#[test]
fn added_datasets_are_listed_in_load_order() {
    let facade = setup();
    assert_eq!(
        facade.list_datasets(),
        vec![
            DatasetInfo::new("courses", DatasetKind::Courses, 2),
            DatasetInfo::new("rooms", DatasetKind::Rooms, 2),
        ]
    );
    assert_eq!(
        serde_json::to_value(&facade.list_datasets()[1]).unwrap(),
        json!({ "id": "rooms", "kind": "rooms", "numRows": 2 })
    );
}

#[test]
fn adding_returns_every_loaded_id() {
    let mut facade = InsightFacade::new();
    assert_eq!(facade.add_dataset("rooms", DatasetKind::Rooms, &rooms()).unwrap(), vec!["rooms"]);
    assert_eq!(
        facade.add_dataset("other", DatasetKind::Rooms, &rooms()).unwrap(),
        vec!["rooms", "other"]
    );
}

#[test]
fn sections_are_converted() {
    let facade = setup();
    let rows = facade
        .perform_query(&json!({
            "WHERE": {},
            "OPTIONS": {
                "COLUMNS": ["courses_uuid", "courses_year", "courses_instructor", "courses_pass"],
                "ORDER": "courses_uuid"
            }
        }))
        .unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            { "courses_uuid": "46405", "courses_year": 2015, "courses_instructor": "holmes, reid", "courses_pass": 90 },
            { "courses_uuid": "46406", "courses_year": 1900, "courses_instructor": "", "courses_pass": 180 }
        ])
    );
}

#[test]
fn room_names_are_derived() {
    let facade = setup();
    let rows = facade
        .perform_query(&json!({
            "WHERE": { "LT": { "rooms_seats": 50 } },
            "OPTIONS": { "COLUMNS": ["rooms_name", "rooms_seats", "rooms_lat"] }
        }))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("rooms_name"), Some(&Value::from("WOOD_B75")));
    assert_eq!(rows[0].get("rooms_seats"), Some(&Value::Number(20.0)));
    assert_eq!(rows[0].get("rooms_lat"), Some(&Value::Number(49.26478)));
}

#[test]
fn illegal_ids_are_rejected() {
    let mut facade = InsightFacade::new();
    for id in ["", "   ", "my_rooms", "_"] {
        match facade.add_dataset(id, DatasetKind::Rooms, &rooms()) {
            Err(InsightError::InvalidDataset(_)) => {}
            other => panic!("'{}' gave {:?}", id, other),
        }
        match facade.remove_dataset(id) {
            Err(InsightError::InvalidDataset(_)) => {}
            other => panic!("'{}' gave {:?}", id, other),
        }
    }
    assert!(facade.list_datasets().is_empty());
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut facade = setup();
    match facade.add_dataset("rooms", DatasetKind::Rooms, &rooms()) {
        Err(InsightError::InvalidDataset(_)) => {}
        other => panic!("duplicate gave {:?}", other),
    }
    assert_eq!(facade.list_datasets().len(), 2);
}

#[test]
fn datasets_without_valid_rows_are_rejected() {
    let mut facade = InsightFacade::new();
    assert!(matches!(
        facade.add_dataset("rooms", DatasetKind::Rooms, &sections()),
        Err(InsightError::InvalidDataset(_))
    ));
    assert!(matches!(
        facade.add_dataset("courses", DatasetKind::Courses, &[]),
        Err(InsightError::InvalidDataset(_))
    ));
    assert!(facade.list_datasets().is_empty());
}

#[test]
fn removing_unknown_ids_is_not_found() {
    let mut facade = setup();
    assert!(matches!(facade.remove_dataset("missing"), Err(InsightError::NotFound(_))));
    assert_eq!(facade.remove_dataset("rooms").unwrap(), "rooms");
    assert!(matches!(facade.remove_dataset("rooms"), Err(InsightError::NotFound(_))));
    assert_eq!(facade.list_datasets(), vec![DatasetInfo::new("courses", DatasetKind::Courses, 2)]);
}

#[test]
fn removed_datasets_can_no_longer_be_queried() {
    let mut facade = setup();
    let query = json!({ "WHERE": {}, "OPTIONS": { "COLUMNS": ["rooms_name"] } });
    assert_eq!(facade.perform_query(&query).unwrap().len(), 2);
    facade.remove_dataset("rooms").unwrap();
    assert!(facade.perform_query(&query).unwrap_err().is_invalid_query());
    // and the id is free again
    facade.add_dataset("rooms", DatasetKind::Rooms, &rooms()).unwrap();
    assert_eq!(facade.perform_query(&query).unwrap().len(), 2);
}

#[test]
fn ids_are_free_text_apart_from_underscores() {
    let mut facade = InsightFacade::new();
    facade.add_dataset("ubc rooms", DatasetKind::Rooms, &rooms()).unwrap();
    let rows = facade
        .perform_query(&json!({
            "WHERE": { "IS": { "ubc rooms_shortname": "DMP" } },
            "OPTIONS": { "COLUMNS": ["ubc rooms_number"] }
        }))
        .unwrap();
    assert_eq!(rows[0].get("ubc rooms_number"), Some(&Value::from("110")));
}

#[test]
fn qualified_records_are_checked() {
    let record = |key: &str, value: Value| -> Record { [(key.to_string(), value)].into_iter().collect() };
    assert!(Dataset::new("courses", DatasetKind::Courses, vec![record("courses_avg", 90.0.into())]).is_ok());
    for bad in [
        record("rooms_avg", 90.0.into()),
        record("courses_avg", "90".into()),
        record("courses_dept", 90.0.into()),
        record("courses_seats", 90.0.into()),
        record("avg", 90.0.into()),
    ] {
        assert!(matches!(
            Dataset::new("courses", DatasetKind::Courses, vec![bad]),
            Err(InsightError::InvalidDataset(_))
        ));
    }
}
