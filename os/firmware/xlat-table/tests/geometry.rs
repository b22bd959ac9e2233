use xlat_table::{
    DescriptorAttributes, Geometry, Granule, HeapPlatform, Mapping, MemoryRegionDescriptor, MmuConfig, PlatformEvent,
    RegionAttribute, TranslationTables, VirtualAddress, XlatError,
};

const GIB: u64 = 1 << 30;

/// 4 KiB pages with three levels, 16 KiB pages and 64 KiB pages.
const GEOMETRIES: [(Geometry, Granule); 3] = [
    (Geometry::new(12, 9, 3, 1), Granule::Size4K),
    (Geometry::new(14, 11, 4, 2), Granule::Size16K),
    (Geometry::new(16, 13, 3, 1), Granule::Size64K),
];

fn config(geometry: Geometry) -> MmuConfig {
    MmuConfig::default()
        .with_geometry(geometry)
        .with_physical_address_bits(32)
}

fn configure<'a>(
    platform: &'a mut HeapPlatform,
    geometry: Geometry,
    regions: &[MemoryRegionDescriptor],
) -> TranslationTables<&'a mut HeapPlatform> {
    TranslationTables::configure(platform, regions, &config(geometry)).unwrap()
}

fn ram() -> [MemoryRegionDescriptor; 1] {
    [MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)]
}

fn leaves(tables: &TranslationTables<&mut HeapPlatform>) -> Vec<Mapping> {
    let mut leaves = Vec::new();
    tables.for_each_leaf(|leaf| leaves.push(*leaf));
    leaves
}

fn va(address: u64) -> VirtualAddress {
    VirtualAddress::new(address)
}

#[test]
fn translation_granule_follows_the_page_size() {
    for (geometry, granule) in GEOMETRIES {
        let mut platform = HeapPlatform::with_page_shift(geometry.page_shift());
        let tables = configure(&mut platform, geometry, &ram());
        let table_count = tables.table_count();
        drop(tables);

        assert_eq!(platform.tcr().tg0(), granule, "{geometry:?}");
        let cleaned = platform
            .events()
            .iter()
            .filter(|e| matches!(e, PlatformEvent::WriteBackCache { length, .. } if *length == geometry.page_size()))
            .count();
        assert_eq!(cleaned, table_count, "{geometry:?}");
    }
}

#[test]
fn platform_pages_must_hold_the_tables() {
    let (geometry, _) = GEOMETRIES[1];
    let mut platform = HeapPlatform::new();

    let result = TranslationTables::configure(&mut platform, &ram(), &config(geometry));

    assert_eq!(
        result.err(),
        Some(XlatError::PageSizeMismatch {
            table_size: 0x4000,
            page_size: 0x1000
        })
    );
    assert_eq!(platform.live_pages(), 0);
    assert!(platform.events().is_empty());
}

#[test]
fn page_size_without_granule_is_rejected() {
    let geometry = Geometry::new(13, 10, 3, 1);
    let mut platform = HeapPlatform::with_page_shift(13);

    let result = TranslationTables::configure(&mut platform, &ram(), &config(geometry));

    assert_eq!(result.err(), Some(XlatError::UnsupportedGeometry(geometry)));
    assert!(platform.events().is_empty());
}

#[test]
fn split_block_collapses_back() {
    for (geometry, _) in GEOMETRIES {
        let page = geometry.page_size();
        let mut platform = HeapPlatform::with_page_shift(geometry.page_shift());
        let mut tables = configure(&mut platform, geometry, &ram());
        let original = tables.lookup(va(page)).unwrap();
        let table_count = tables.table_count();

        tables.set_read_only(va(page), page).unwrap();
        let split = tables.lookup(va(page)).unwrap();
        assert_eq!((split.length, split.level), (page, geometry.last_level()), "{geometry:?}");
        assert!(split.attributes.contains(DescriptorAttributes::AP_READ_ONLY));
        assert_eq!(tables.lookup(va(0)).unwrap().attributes, original.attributes);
        assert_eq!(tables.lookup(va(0)).unwrap().length, page);

        tables.set_region_attributes(va(0), GIB, original.attributes.bits(), 0).unwrap();

        assert_eq!(tables.lookup(va(page)), Some(original), "{geometry:?}");
        assert_eq!(tables.table_count(), table_count, "{geometry:?}");
        assert_eq!(tables.platform().live_pages(), table_count, "{geometry:?}");
    }
}

#[test]
fn updates_are_idempotent() {
    for (geometry, _) in GEOMETRIES {
        let page = geometry.page_size();
        let mut platform = HeapPlatform::with_page_shift(geometry.page_shift());
        let mut tables = configure(&mut platform, geometry, &ram());

        tables.set_read_only(va(page), 3 * page).unwrap();
        tables.set_no_exec(va(0), GIB / 2).unwrap();
        let once = leaves(&tables);
        let pages = tables.platform().live_pages();

        tables.set_read_only(va(page), 3 * page).unwrap();
        tables.set_no_exec(va(0), GIB / 2).unwrap();
        assert_eq!(leaves(&tables), once, "{geometry:?}");
        assert_eq!(tables.platform().live_pages(), pages, "{geometry:?}");
    }
}

#[test]
fn failed_allocations_leak_nothing() {
    for (geometry, _) in GEOMETRIES {
        let page = geometry.page_size();
        let root = geometry.root_table_info(config(geometry).t0sz());
        let needed = geometry.last_level() - root.level;

        // the root takes the first allocation
        for limit in 1..=needed as usize {
            let mut platform = HeapPlatform::with_page_shift(geometry.page_shift()).fail_after(limit);
            let mut tables = configure(&mut platform, geometry, &[]);

            let result = tables.set_read_only(va(page), page);

            assert_eq!(result, Err(XlatError::OutOfMemory), "{geometry:?} limit {limit}");
            assert_eq!(tables.platform().live_pages(), 1, "{geometry:?} limit {limit}");
            assert_eq!(tables.table_count(), 1);
            assert!(leaves(&tables).is_empty());
        }
    }
}
