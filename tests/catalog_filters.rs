//! Catalog Query Integration Tests
//!
//! Filtering, lookup and loading of the title catalog.

use titledl::catalog::{
    Catalog, CatalogError, Category, ContentFormat, Platform, Region, TitleEntry, TitleFilter,
    TitleId,
};

const CATALOG_JSON: &str = r#"
{
  "version": 1,
  "titles": [
    { "id": "00050000101C9500", "name": "Super Mario 3D World", "region": 2 },
    { "id": "00050000101C9400", "name": "Super Mario 3D World", "region": 4 },
    { "id": "0005000E101C9500", "name": "Super Mario 3D World Update", "region": 2 },
    { "id": "0005000C101C9500", "name": "Super Mario 3D World DLC", "region": ["usa", "europe"] },
    { "id": "0005000010145000", "name": "Mario Kart 8", "region": 7 },
    { "id": "0004000000055D00", "name": "Pokemon X", "region": 1 },
    { "id": "0100000000010000", "name": "Super Mario Odyssey", "region": 7 },
    { "id": "0001000052534245", "name": "Super Smash Bros. Brawl", "region": 2 },
    { "id": "0005001010040100", "name": "Wii U Menu", "region": 2 }
  ]
}
"#;

fn catalog() -> Catalog {
    Catalog::from_json(CATALOG_JSON).unwrap()
}

fn ids(entries: &[&TitleEntry]) -> Vec<String> {
    entries.iter().map(|e| e.id.to_hex()).collect()
}

#[test]
fn test_default_filter_lists_games_only() {
    let catalog = catalog();
    let games = catalog.filter(&TitleFilter::default());

    assert!(!games.is_empty());
    assert!(games.iter().all(|e| Category::Game.matches(e.id)));
    assert!(!ids(&games).contains(&"0005000E101C9500".to_string()));
    assert!(!ids(&games).contains(&"0005001010040100".to_string()));
}

#[test]
fn test_category_all_lists_everything() {
    let catalog = catalog();
    let all = catalog.filter(&TitleFilter::default().with_category(Category::All));
    assert_eq!(all.len(), catalog.len());
}

#[test]
fn test_region_filter_uses_overlap() {
    let catalog = catalog();
    let filter = TitleFilter::from_tokens(Some("all"), Some("europe"), None, None, None).unwrap();
    let result = ids(&catalog.filter(&filter));

    assert!(result.contains(&"00050000101C9400".to_string()));
    assert!(result.contains(&"0005000C101C9500".to_string()));
    assert!(result.contains(&"0005000010145000".to_string()));
    assert!(!result.contains(&"00050000101C9500".to_string()));
}

#[test]
fn test_platform_and_format_filters() {
    let catalog = catalog();

    let switch = TitleFilter::from_tokens(Some("all"), None, Some("switch"), None, None).unwrap();
    assert_eq!(ids(&catalog.filter(&switch)), vec!["0100000000010000"]);

    let cia = TitleFilter::from_tokens(Some("all"), None, None, Some("cia"), None).unwrap();
    let result = catalog.filter(&cia);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id.platform(), Platform::N3ds);
    assert_eq!(result[0].id.format(), ContentFormat::Cia);
}

#[test]
fn test_search_is_case_insensitive_substring() {
    let catalog = catalog();
    let filter = TitleFilter::from_tokens(None, None, None, None, Some("MARIO 3d")).unwrap();
    let result = ids(&catalog.filter(&filter));
    assert_eq!(result, vec!["00050000101C9500", "00050000101C9400"]);

    let none = TitleFilter::from_tokens(None, None, None, None, Some("zelda")).unwrap();
    assert!(catalog.filter(&none).is_empty());
}

#[test]
fn test_search_shorthand_spans_categories() {
    let catalog = catalog();
    let result = catalog.search("3d world");
    assert_eq!(result.len(), 4);
}

#[test]
fn test_filters_combine_as_conjunction() {
    let catalog = catalog();
    let filter = TitleFilter::from_tokens(
        Some("game"),
        Some("usa"),
        Some("wiiu"),
        Some("content"),
        Some("mario"),
    )
    .unwrap();

    let result = ids(&catalog.filter(&filter));
    assert_eq!(result, vec!["00050000101C9500", "0005000010145000"]);
}

#[test]
fn test_filtering_is_idempotent_for_every_token() {
    let catalog = catalog();
    let categories = ["game", "update", "dlc", "demo", "system", "all"];
    let regions = ["japan", "usa", "europe", "all"];
    let platforms = ["wiiu", "vwii", "wii", "3ds", "switch", "all"];

    for category in categories {
        for region in regions {
            for platform in platforms {
                let filter = TitleFilter::from_tokens(
                    Some(category),
                    Some(region),
                    Some(platform),
                    None,
                    None,
                )
                .unwrap();

                let first = catalog.filter(&filter);
                assert!(first.iter().all(|e| filter.matches(e)));

                let narrowed =
                    Catalog::from_entries(first.iter().map(|e| (*e).clone()).collect()).unwrap();
                let second = narrowed.filter(&filter);
                assert_eq!(
                    ids(&second),
                    ids(&first),
                    "{}/{}/{}",
                    category,
                    region,
                    platform
                );
            }
        }
    }
}

#[test]
fn test_region_narrows_a_single_usa_match() {
    let catalog = Catalog::from_entries(vec![
        TitleEntry::new(TitleId::new(0x00050000101C9500), "Super Mario 3D World", Region::USA),
        TitleEntry::new(TitleId::new(0x0005000010143500), "Zelda Wind Waker HD", Region::EUROPE),
        TitleEntry::new(TitleId::new(0x0004000000055D00), "Pokemon X", Region::ALL),
    ])
    .unwrap();

    let usa = TitleFilter::from_tokens(Some("game"), Some("usa"), None, None, Some("mario")).unwrap();
    assert_eq!(ids(&catalog.filter(&usa)), vec!["00050000101C9500"]);

    let europe =
        TitleFilter::from_tokens(Some("game"), Some("europe"), None, None, Some("mario")).unwrap();
    assert!(catalog.filter(&europe).is_empty());
}

#[test]
fn test_unknown_tokens_are_rejected() {
    assert!(matches!(
        TitleFilter::from_tokens(Some("movies"), None, None, None, None),
        Err(CatalogError::InvalidFilter { field: "category", .. })
    ));
    assert!(matches!(
        TitleFilter::from_tokens(None, Some("mars"), None, None, None),
        Err(CatalogError::InvalidFilter { field: "region", .. })
    ));
    assert!(matches!(
        TitleFilter::from_tokens(None, None, Some("gamecube"), None, None),
        Err(CatalogError::InvalidFilter { field: "platform", .. })
    ));
    assert!(matches!(
        TitleFilter::from_tokens(None, None, None, Some("zip"), None),
        Err(CatalogError::InvalidFilter { field: "format", .. })
    ));
}

#[test]
fn test_lookup_and_missing_title() {
    let catalog = catalog();

    let id: TitleId = "0x00050000101c9500".parse().unwrap();
    let entry = catalog.lookup(id).unwrap();
    assert_eq!(entry.name, "Super Mario 3D World");
    assert_eq!(entry.region, Region::USA);

    assert!(catalog.lookup(TitleId::new(0xDEADBEEF)).is_none());
}

#[test]
fn test_region_token_list_is_accepted() {
    let catalog = catalog();
    let dlc = catalog.lookup(TitleId::new(0x0005000C101C9500)).unwrap();
    assert_eq!(dlc.region, Region::USA | Region::EUROPE);
    assert_eq!(dlc.region.label(), "Europe, USA");
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let entries = vec![
        TitleEntry::new(TitleId::new(1), "A", Region::USA),
        TitleEntry::new(TitleId::new(1), "B", Region::USA),
    ];
    assert!(matches!(
        Catalog::from_entries(entries),
        Err(CatalogError::DuplicateTitle(_))
    ));
}

#[tokio::test]
async fn test_load_from_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("catalog.json");
    tokio::fs::write(&path, CATALOG_JSON).await.unwrap();

    let catalog = Catalog::load(&path).await.unwrap();
    assert_eq!(catalog.len(), 9);

    let missing = Catalog::load(&temp.path().join("nope.json")).await;
    assert!(missing.is_err());
}
