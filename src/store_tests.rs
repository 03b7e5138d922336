//! Tests for the record store

use super::*;
use tempfile::TempDir;

fn create_test_store() -> (RecordStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = RecordStore::open(temp_dir.path()).unwrap();
    (store, temp_dir)
}

fn make_test_card(id: &str, name: &str) -> CardRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "set": "usg",
        "collector_number": "306",
        "mtgo_id": 12345,
        "type_line": "Artifact",
        "image_uris": { "png": "https://example.com/card.png" }
    }))
    .unwrap()
}

#[test]
fn test_open_creates_directory_and_database() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("app");

    let store = RecordStore::open(&root).unwrap();

    assert_eq!(store.root(), root.as_path());
    assert!(root.join(DATABASE_FILENAME).exists());
}

#[test]
fn test_store_and_load_round_trip() {
    let (store, _temp_dir) = create_test_store();
    let card = make_test_card("6875ce99-badd-44da-8e5d-509600efa1d0", "Phyrexian Processor");

    assert!(!store.has(&card.id).unwrap());
    store.store(&card).unwrap();

    assert!(store.has(&card.id).unwrap());
    let loaded = store.load(&card.id).unwrap().unwrap();
    assert_eq!(loaded, card);
}

#[test]
fn test_load_missing_returns_none() {
    let (store, _temp_dir) = create_test_store();
    assert!(store.load("no-such-card").unwrap().is_none());
}

#[test]
fn test_store_overwrites_existing() {
    let (store, _temp_dir) = create_test_store();
    store.store(&make_test_card("uuid-1", "Old Name")).unwrap();
    store.store(&make_test_card("uuid-1", "New Name")).unwrap();

    assert_eq!(store.load("uuid-1").unwrap().unwrap().name, "New Name");
    assert_eq!(store.stats().unwrap().cards, 1);
}

#[test]
fn test_corrupt_record_is_reported() {
    let (store, _temp_dir) = create_test_store();
    store.store(&make_test_card("uuid-1", "Card")).unwrap();

    store
        .conn()
        .unwrap()
        .execute(
            "UPDATE cards SET data = ?1 WHERE id = ?2",
            params!["{not json", "uuid-1"],
        )
        .unwrap();

    match store.load("uuid-1") {
        Err(CacheError::CorruptRecord { id, .. }) => assert_eq!(id, "uuid-1"),
        other => panic!("Expected CorruptRecord, got: {other:?}"),
    }
}

#[test]
fn test_store_maps_intrinsic_keys() {
    let (store, _temp_dir) = create_test_store();
    let card = make_test_card("uuid-1", "Phyrexian Processor");
    store.store(&card).unwrap();

    assert_eq!(
        store.resolve_key(&LookupKey::Mtgo(12345)).unwrap().as_deref(),
        Some("uuid-1")
    );
    assert_eq!(
        store
            .resolve_key(&LookupKey::set_number("USG", "306"))
            .unwrap()
            .as_deref(),
        Some("uuid-1")
    );
    // Names are only mapped when explicitly looked up
    assert!(store
        .resolve_key(&LookupKey::name("Phyrexian Processor"))
        .unwrap()
        .is_none());
}

#[test]
fn test_store_with_key_maps_name() {
    let (store, _temp_dir) = create_test_store();
    let card = make_test_card("bd8fa327-dd41-4737-8f19-2cf5eb1f7cdd", "Black Lotus");
    store
        .store_with_key(&LookupKey::name("Black Lotus"), &card)
        .unwrap();

    assert_eq!(
        store
            .resolve_key(&LookupKey::name("black lotus"))
            .unwrap()
            .as_deref(),
        Some("bd8fa327-dd41-4737-8f19-2cf5eb1f7cdd")
    );
}

#[test]
fn test_resolve_canonical_key_needs_no_mapping() {
    let (store, _temp_dir) = create_test_store();
    assert_eq!(
        store.resolve_key(&LookupKey::id("uuid-9")).unwrap().as_deref(),
        Some("uuid-9")
    );
}

#[test]
fn test_resolve_path_layout() {
    let (store, temp_dir) = create_test_store();

    let png = store.resolve_path("uuid-1", ImageFormat::Png);
    assert_eq!(
        png,
        temp_dir.path().join("art_cache").join("png").join("uuid-1.png")
    );

    let crop = store.resolve_path("uuid-1", ImageFormat::ArtCrop);
    assert!(crop.ends_with("art_cache/art_crop/uuid-1.jpg"));
}

#[test]
fn test_image_insert_and_load() {
    let (store, _temp_dir) = create_test_store();
    let test_data = vec![0x89, 0x50, 0x4E, 0x47]; // PNG magic bytes

    assert!(!store.has_image("uuid-1", ImageFormat::Png).unwrap());
    assert!(store.load_image("uuid-1", ImageFormat::Png).unwrap().is_none());

    let path = store
        .store_image("uuid-1", ImageFormat::Png, &test_data)
        .unwrap();

    assert_eq!(path, store.resolve_path("uuid-1", ImageFormat::Png));
    assert!(store.has_image("uuid-1", ImageFormat::Png).unwrap());
    assert_eq!(
        store.load_image("uuid-1", ImageFormat::Png).unwrap(),
        Some(test_data)
    );
    // Other formats of the same card are separate blobs
    assert!(!store.has_image("uuid-1", ImageFormat::Normal).unwrap());
}

#[test]
fn test_store_image_leaves_no_temp_files() {
    let (store, _temp_dir) = create_test_store();
    let path = store
        .store_image("uuid-1", ImageFormat::Large, &[0xFF, 0xD8, 0xFF])
        .unwrap();

    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("uuid-1.jpg")]);
}

#[test]
fn test_temp_paths_are_unique_per_write() {
    let path = PathBuf::from("/cache/art_cache/png/uuid-1.png");
    let first = temp_path(&path);
    let second = temp_path(&path);

    assert_ne!(first, second);
    assert_eq!(first.parent(), path.parent());
}

#[test]
fn test_two_stores_write_same_image_concurrently() {
    let temp_dir = TempDir::new().unwrap();
    let stores: Vec<_> = (0..2)
        .map(|_| RecordStore::open(temp_dir.path()).unwrap())
        .collect();

    std::thread::scope(|scope| {
        for store in &stores {
            scope.spawn(move || {
                for _ in 0..50 {
                    store
                        .store_image("uuid-1", ImageFormat::Png, &[0x89, 0x50, 0x4E, 0x47])
                        .unwrap();
                }
            });
        }
    });

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join(IMAGE_DIR).join("png"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("uuid-1.png")]);
}

#[test]
fn test_records_persist_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let card = make_test_card("uuid-1", "Card");

    {
        let store = RecordStore::open(temp_dir.path()).unwrap();
        store.store_with_key(&LookupKey::name("Card"), &card).unwrap();
        store.store_image("uuid-1", ImageFormat::Png, &[1, 2, 3]).unwrap();
    }

    {
        let store = RecordStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.load("uuid-1").unwrap(), Some(card));
        assert_eq!(
            store.resolve_key(&LookupKey::name("Card")).unwrap().as_deref(),
            Some("uuid-1")
        );
        assert_eq!(
            store.load_image("uuid-1", ImageFormat::Png).unwrap(),
            Some(vec![1, 2, 3])
        );
    }
}

#[test]
fn test_schema_version_mismatch_rebuilds_tables() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = RecordStore::open(temp_dir.path()).unwrap();
        store.store(&make_test_card("uuid-1", "Card")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE metadata SET value = '0' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
    }

    let store = RecordStore::open(temp_dir.path()).unwrap();
    assert!(!store.has("uuid-1").unwrap());
    assert_eq!(store.stats().unwrap(), StoreStats::default());
}

#[test]
fn test_stats_counts_everything() {
    let (store, _temp_dir) = create_test_store();
    store
        .store_with_key(&LookupKey::name("Phyrexian Processor"), &make_test_card("uuid-1", "Phyrexian Processor"))
        .unwrap();
    store.store_image("uuid-1", ImageFormat::Png, &[1]).unwrap();
    store.store_image("uuid-1", ImageFormat::ArtCrop, &[2]).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.cards, 1);
    // mtgo + set/number + name
    assert_eq!(stats.lookup_keys, 3);
    assert_eq!(stats.images, 2);
}
