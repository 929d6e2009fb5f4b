//! Room catalog refresh and lookups.

use nutler_app::{Command, RoomCatalog};
use nutler_harness::SimBackend;

#[tokio::test]
async fn refresh_populates_lookups() {
    let backend = SimBackend::seeded();
    let mut catalog = RoomCatalog::new();

    catalog.refresh_departments(&backend).await.unwrap();
    catalog.refresh_rooms(&backend).await.unwrap();

    assert_eq!(catalog.departments().len(), 2);
    assert_eq!(catalog.room(3).map(|room| room.name.as_str()), Some("Sales Floor"));
    assert_eq!(catalog.room_by_name("IT General").and_then(|room| room.id), Some(2));
    assert!(catalog.room(99).is_none());

    let it = catalog.rooms_in_department(1);
    let names: Vec<_> = it.into_iter().map(|room| room.name.as_str()).collect();
    assert_eq!(names, vec!["IT General"]);
    assert_eq!(catalog.room(2).and_then(|room| room.department_name.as_deref()), Some("IT"));
}

/// INVARIANT: a failed refresh keeps the previous snapshot.
#[tokio::test]
async fn failed_refresh_keeps_snapshot() {
    let backend = SimBackend::seeded();
    let mut catalog = RoomCatalog::new();
    catalog.refresh_rooms(&backend).await.unwrap();

    backend.add_room(4, "Ops", Some(1));
    backend.fail_next(Command::GetChatRooms, "database is locked");
    let err = catalog.refresh_rooms(&backend).await.unwrap_err();

    assert_eq!(err.command, Command::GetChatRooms);
    assert_eq!(catalog.rooms().len(), 3);
    assert_eq!(catalog.last_error(), Some(&err));

    catalog.refresh_rooms(&backend).await.unwrap();
    assert_eq!(catalog.rooms().len(), 4);
    assert!(catalog.last_error().is_none());
}
