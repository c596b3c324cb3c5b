use foresight_core::{
    ItemKind, ItemRecord, MemoryItemStore, NewItem, ScheduleError, ScheduleService,
};
use std::collections::HashSet;
use time::macros::date;

fn sample_records() -> Vec<ItemRecord> {
    vec![
        ItemRecord::project("root", "Company roadmap", None),
        ItemRecord::project("p1", "Website", Some("root")),
        ItemRecord::task("t1", "Design", Some("p1"), "2024-01-01", "2024-01-10"),
        ItemRecord::task("t2", "Build", Some("p1"), "2024-01-05", "2024-01-20"),
        ItemRecord::project("p2", "Mobile", Some("root")),
        ItemRecord::project("p3", "Prototype", Some("p2")),
        ItemRecord::task("t3", "Spike", Some("p3"), "2024-02-01", "2024-02-05"),
        ItemRecord::task("t4", "Kickoff", Some("root"), "2023-12-15", "2023-12-31"),
    ]
}

fn setup() -> ScheduleService<MemoryItemStore> {
    let service = ScheduleService::new(MemoryItemStore::new());
    service.ingest(sample_records()).unwrap();
    service
}

fn leaf_count_under(service: &ScheduleService<MemoryItemStore>, id: &str) -> usize {
    let index = foresight_core::HierarchyIndex::build(service.hierarchy().unwrap());
    index.leaf_descendants(id).unwrap().len()
}

#[test]
fn ingest_rolls_up_project_dates_from_all_descendant_tasks() {
    let service = setup();

    let p1 = service.get_item("p1").unwrap();
    assert_eq!(p1.start_date, Some(date!(2024 - 01 - 01)));
    assert_eq!(p1.end_date, Some(date!(2024 - 01 - 20)));

    let p2 = service.get_item("p2").unwrap();
    assert_eq!(p2.start_date, Some(date!(2024 - 02 - 01)));
    assert_eq!(p2.end_date, Some(date!(2024 - 02 - 05)));

    let root = service.get_item("root").unwrap();
    assert_eq!(root.start_date, Some(date!(2023 - 12 - 15)));
    assert_eq!(root.end_date, Some(date!(2024 - 02 - 05)));
}

#[test]
fn project_completion_follows_rolled_up_span() {
    let service = setup();

    assert_eq!(service.completion_status("p1", "2024-01-01").unwrap().percent(), 0);
    assert_eq!(service.completion_status("p1", "2024-01-20").unwrap().percent(), 95);
    assert_eq!(service.completion_status("p1", "2024-01-21").unwrap().percent(), 100);
    assert_eq!(
        service.completion_status("p1", "2024-01-20").unwrap().to_string(),
        "95%"
    );
}

#[test]
fn completion_status_reports_missing_item_and_bad_date() {
    let service = setup();

    let err = service.completion_status("nope", "2024-01-01").unwrap_err();
    assert!(matches!(&err, ScheduleError::NotFound(id) if id == "nope"));

    let err = service.completion_status("t1", "01/02/2024").unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidDate(value) if value == "01/02/2024"));
}

#[test]
fn hierarchy_round_trips_ingested_records() {
    let service = setup();
    let items = service.hierarchy().unwrap();

    let expected: HashSet<(String, ItemKind, Option<String>)> = sample_records()
        .into_iter()
        .map(|record| {
            let item = record.into_item().unwrap();
            (item.id, item.kind, item.parent_id)
        })
        .collect();
    let actual: HashSet<(String, ItemKind, Option<String>)> = items
        .iter()
        .map(|item| (item.id.clone(), item.kind, item.parent_id.clone()))
        .collect();
    assert_eq!(actual, expected);

    let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3", "root", "t1", "t2", "t3", "t4"]);
    assert!(items.iter().all(|item| item.date_span().is_some()));
}

#[test]
fn failing_ingest_leaves_previous_content_untouched() {
    let service = setup();

    let mut records = sample_records();
    records.push(ItemRecord::project("empty", "Empty", Some("root")));
    let err = service.ingest(records).unwrap_err();
    assert!(matches!(&err, ScheduleError::NoLeafDescendants(id) if id == "empty"));

    let records = vec![
        ItemRecord::project("root", "Root", None),
        ItemRecord::task("t1", "Bad", Some("root"), "2024-01-01", "2024-1-2"),
    ];
    let err = service.ingest(records).unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidDate(value) if value == "2024-1-2"));

    assert_eq!(service.hierarchy().unwrap().len(), 8);
    assert!(service.get_item("empty").is_err());
}

#[test]
fn ingest_rejects_duplicates_task_parents_and_cycles() {
    let service = ScheduleService::new(MemoryItemStore::new());

    let err = service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t1", "A", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::task("t1", "B", Some("root"), "2024-01-01", "2024-01-02"),
        ])
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::DuplicateId(id) if id == "t1"));

    let err = service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t1", "A", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::task("t2", "B", Some("t1"), "2024-01-01", "2024-01-02"),
        ])
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::ParentMustBeProject(id) if id == "t1"));

    let err = service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t0", "Anchor", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::project("a", "A", Some("b")),
            ItemRecord::project("b", "B", Some("a")),
            ItemRecord::task("t1", "Looped", Some("a"), "2024-01-01", "2024-01-02"),
        ])
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::CyclicHierarchy(_)));

    assert!(service.hierarchy().unwrap().is_empty());
}

#[test]
fn deleting_sole_task_of_project_is_rejected() {
    let service = setup();

    let err = service.delete_item("t3").unwrap_err();
    assert!(matches!(
        &err,
        ScheduleError::LastChildTask { task_id, parent_id } if task_id == "t3" && parent_id == "p3"
    ));
    assert_eq!(err.code(), "last_child_task");
    assert!(service.get_item("t3").is_ok());
}

#[test]
fn deleting_task_with_sibling_tasks_succeeds_without_refreshing_parent() {
    let service = setup();

    service.delete_item("t1").unwrap();
    assert!(matches!(
        service.get_item("t1").unwrap_err(),
        ScheduleError::NotFound(_)
    ));

    // Parent dates stay as last rolled up.
    let p1 = service.get_item("p1").unwrap();
    assert_eq!(p1.start_date, Some(date!(2024 - 01 - 01)));

    // With only t2 left, t2 is now protected.
    let err = service.delete_item("t2").unwrap_err();
    assert!(matches!(&err, ScheduleError::LastChildTask { .. }));
}

#[test]
fn deleting_project_reparents_children_one_level_up() {
    let service = setup();
    let before = leaf_count_under(&service, "p2");

    service.delete_item("p3").unwrap();

    assert!(service.get_item("p3").is_err());
    let t3 = service.get_item("t3").unwrap();
    assert_eq!(t3.parent_id.as_deref(), Some("p2"));
    assert_eq!(leaf_count_under(&service, "p2"), before);
}

#[test]
fn deleting_project_conserves_tasks_under_former_parent() {
    let service = setup();
    let before = leaf_count_under(&service, "root");

    service.delete_item("p1").unwrap();

    assert_eq!(leaf_count_under(&service, "root"), before);
    for id in ["t1", "t2"] {
        assert_eq!(
            service.get_item(id).unwrap().parent_id.as_deref(),
            Some("root")
        );
    }
    // Grandchildren are not flattened.
    service.delete_item("p2").unwrap();
    assert_eq!(
        service.get_item("p3").unwrap().parent_id.as_deref(),
        Some("root")
    );
    assert_eq!(
        service.get_item("t3").unwrap().parent_id.as_deref(),
        Some("p3")
    );
}

#[test]
fn deleting_root_fails_for_any_kind() {
    let service = setup();
    let err = service.delete_item("root").unwrap_err();
    assert!(matches!(&err, ScheduleError::RootDeletion(id) if id == "root"));

    let service = ScheduleService::new(MemoryItemStore::new());
    service
        .ingest(vec![ItemRecord::task(
            "solo",
            "Solo",
            None,
            "2024-01-01",
            "2024-01-02",
        )])
        .unwrap();
    let err = service.delete_item("solo").unwrap_err();
    assert_eq!(err.code(), "root_deletion");
}

#[test]
fn deleting_unknown_item_is_not_found() {
    let service = setup();
    let err = service.delete_item("ghost").unwrap_err();
    assert!(matches!(&err, ScheduleError::NotFound(id) if id == "ghost"));
}

#[test]
fn adding_project_without_tasks_is_rejected_and_not_stored() {
    let service = setup();

    let err = service
        .add_item(NewItem::project("p4", "Empty", Some("root".to_string())))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::NoLeafDescendants(id) if id == "p4"));
    assert!(service.get_item("p4").is_err());
}

#[test]
fn ingest_keeps_records_whose_project_is_not_yet_created() {
    let service = ScheduleService::new(MemoryItemStore::new());
    let count = service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t0", "Anchor", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::task("t9", "Waiting", Some("p9"), "2024-04-01", "2024-04-03"),
        ])
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        service.get_item("t9").unwrap().parent_id.as_deref(),
        Some("p9")
    );
    assert_eq!(
        service.get_item("root").unwrap().end_date,
        Some(date!(2024 - 01 - 02))
    );

    // Adding a task under the missing project is still rejected.
    let err = service
        .add_item(NewItem::task("t8", "Late", "p9", "2024-04-01", "2024-04-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::ParentNotFound(id) if id == "p9"));
}

#[test]
fn adding_project_adopts_items_already_linked_to_it() {
    let service = ScheduleService::new(MemoryItemStore::new());
    service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t0", "Anchor", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::task("t9", "Waiting", Some("p9"), "2024-04-01", "2024-04-03"),
            ItemRecord::task("t10", "Also waiting", Some("p9"), "2024-03-28", "2024-04-02"),
        ])
        .unwrap();

    let project = service
        .add_item(NewItem::project("p9", "Late project", Some("root".to_string())))
        .unwrap();
    assert_eq!(project.start_date, Some(date!(2024 - 03 - 28)));
    assert_eq!(project.end_date, Some(date!(2024 - 04 - 03)));
    assert_eq!(service.get_item("p9").unwrap(), project);
    assert_eq!(leaf_count_under(&service, "root"), 3);

    // Once the project exists its last task is protected.
    service.delete_item("t10").unwrap();
    let err = service.delete_item("t9").unwrap_err();
    assert!(matches!(
        &err,
        ScheduleError::LastChildTask { task_id, parent_id } if task_id == "t9" && parent_id == "p9"
    ));
}

#[test]
fn deleting_task_waiting_for_its_project_succeeds() {
    let service = ScheduleService::new(MemoryItemStore::new());
    service
        .ingest(vec![
            ItemRecord::project("root", "Root", None),
            ItemRecord::task("t0", "Anchor", Some("root"), "2024-01-01", "2024-01-02"),
            ItemRecord::task("t9", "Waiting", Some("p9"), "2024-04-01", "2024-04-03"),
        ])
        .unwrap();

    service.delete_item("t9").unwrap();
    assert!(matches!(
        &service.get_item("t9").unwrap_err(),
        ScheduleError::NotFound(id) if id == "t9"
    ));
}

#[test]
fn adding_task_does_not_refresh_ancestors_until_requested() {
    let service = setup();

    let task = service
        .add_item(NewItem::task(
            "t5",
            "Pilot",
            "p3",
            "2024-03-01",
            "2024-03-10",
        ))
        .unwrap();
    assert_eq!(task.kind, ItemKind::Task);

    assert_eq!(
        service.get_item("p3").unwrap().end_date,
        Some(date!(2024 - 02 - 05))
    );
    assert_eq!(
        service.get_item("root").unwrap().end_date,
        Some(date!(2024 - 02 - 05))
    );

    let recomputed = service.recompute_ancestors("t5").unwrap();
    assert_eq!(recomputed, vec!["p3", "p2", "root"]);
    assert_eq!(
        service.get_item("p3").unwrap().end_date,
        Some(date!(2024 - 03 - 10))
    );
    assert_eq!(
        service.get_item("root").unwrap().end_date,
        Some(date!(2024 - 03 - 10))
    );
    assert_eq!(
        service.get_item("p1").unwrap().end_date,
        Some(date!(2024 - 01 - 20))
    );
}

#[test]
fn recompute_ancestors_includes_project_itself() {
    let service = setup();
    assert_eq!(service.recompute_ancestors("p1").unwrap(), vec!["p1", "root"]);

    let err = service.recompute_ancestors("ghost").unwrap_err();
    assert!(matches!(&err, ScheduleError::NotFound(_)));
}

#[test]
fn adding_item_validates_identity_parent_and_dates() {
    let service = setup();

    let err = service
        .add_item(NewItem::task("t1", "Again", "p1", "2024-01-01", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::DuplicateId(id) if id == "t1"));

    let err = service
        .add_item(NewItem::task("t6", "Orphan", "ghost", "2024-01-01", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::ParentNotFound(id) if id == "ghost"));

    let err = service
        .add_item(NewItem::task("t6", "Under task", "t1", "2024-01-01", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::ParentMustBeProject(id) if id == "t1"));

    let err = service
        .add_item(NewItem::task("t6", "Bad", "p1", "tomorrow", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidDate(value) if value == "tomorrow"));

    let err = service
        .add_item(NewItem::task("t6", "Inverted", "p1", "2024-01-05", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidRange { .. }));

    assert!(service.get_item("t6").is_err());
}

#[test]
fn update_dates_enforce_range_and_do_not_cascade() {
    let service = setup();

    let err = service.update_start_date("t1", "2024-01-11").unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidRange { .. }));
    assert_eq!(err.code(), "invalid_range");

    let err = service.update_end_date("t1", "2023-12-31").unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidRange { .. }));

    let updated = service.update_start_date("t1", "2024-01-10").unwrap();
    assert_eq!(updated.start_date, Some(date!(2024 - 01 - 10)));
    assert_eq!(updated.end_date, Some(date!(2024 - 01 - 10)));

    let updated = service.update_end_date("t2", "2024-02-29").unwrap();
    assert_eq!(updated.end_date, Some(date!(2024 - 02 - 29)));
    assert_eq!(service.get_item("t2").unwrap(), updated);

    let p1 = service.get_item("p1").unwrap();
    assert_eq!(p1.start_date, Some(date!(2024 - 01 - 01)));
    assert_eq!(p1.end_date, Some(date!(2024 - 01 - 20)));

    let err = service.update_end_date("t2", "2024-02-30").unwrap_err();
    assert!(matches!(&err, ScheduleError::InvalidDate(_)));
    let err = service.update_end_date("ghost", "2024-02-01").unwrap_err();
    assert!(matches!(&err, ScheduleError::NotFound(_)));
}

#[test]
fn error_codes_are_distinct() {
    let errors = [
        ScheduleError::NotFound("a".into()),
        ScheduleError::RootDeletion("a".into()),
        ScheduleError::LastChildTask {
            task_id: "a".into(),
            parent_id: "b".into(),
        },
        ScheduleError::NoLeafDescendants("a".into()),
        ScheduleError::InvalidRange {
            id: "a".into(),
            start: date!(2024 - 01 - 02),
            end: date!(2024 - 01 - 01),
        },
        ScheduleError::InvalidDate("x".into()),
        ScheduleError::CyclicHierarchy("a".into()),
        ScheduleError::UnresolvedDates("a".into()),
        ScheduleError::DuplicateId("a".into()),
        ScheduleError::ParentNotFound("a".into()),
        ScheduleError::ParentMustBeProject("a".into()),
    ];
    let codes: HashSet<&str> = errors.iter().map(ScheduleError::code).collect();
    assert_eq!(codes.len(), errors.len());
}

#[test]
fn readers_never_observe_partial_reparenting() {
    let service = setup();
    let shared = &service;

    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    for _ in 0..200 {
                        let items = shared.hierarchy().unwrap();
                        let ids: HashSet<&str> =
                            items.iter().map(|item| item.id.as_str()).collect();
                        for item in &items {
                            if let Some(parent_id) = &item.parent_id {
                                assert!(
                                    ids.contains(parent_id.as_str()),
                                    "dangling parent {parent_id} for {}",
                                    item.id
                                );
                            }
                        }
                    }
                })
            })
            .collect();

        scope.spawn(move || {
            for id in ["p3", "p2", "p1"] {
                shared.delete_item(id).unwrap();
            }
        });

        for reader in readers {
            reader.join().unwrap();
        }
    });

    assert_eq!(leaf_count_under(&service, "root"), 4);
}
