use xlat_table::{
    ATTRIBUTES_MASK, DescriptorAttributes, Geometry, HeapPlatform, Mapping, MemoryRegionDescriptor, MmuConfig,
    PlatformEvent, RegionAttribute, TranslationRegime, TranslationTables, VirtualAddress, XlatError,
};

const GIB: u64 = 1 << 30;
const MIB2: u64 = 1 << 21;

fn configure<'a>(
    platform: &'a mut HeapPlatform,
    address_bits: u8,
    regions: &[MemoryRegionDescriptor],
) -> TranslationTables<&'a mut HeapPlatform> {
    let config = MmuConfig::default().with_physical_address_bits(address_bits);
    TranslationTables::configure(platform, regions, &config).unwrap()
}

fn leaves<P: xlat_table::PlatformOps>(tables: &TranslationTables<P>) -> Vec<Mapping> {
    let mut leaves = Vec::new();
    tables.for_each_leaf(|leaf| leaves.push(*leaf));
    leaves
}

fn va(address: u64) -> VirtualAddress {
    VirtualAddress::new(address)
}

#[test]
fn updates_are_idempotent() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)],
    );
    let ro = DescriptorAttributes::AP_READ_ONLY.bits();

    tables.set_region_attributes(va(0x1000), 0x3000, ro, !ro).unwrap();
    tables.set_region_attributes(va(0x20_0000), 0x40_0000, ro, !ro).unwrap();
    let once = leaves(&tables);
    let pages = tables.platform().live_pages();

    tables.set_region_attributes(va(0x1000), 0x3000, ro, !ro).unwrap();
    tables.set_region_attributes(va(0x20_0000), 0x40_0000, ro, !ro).unwrap();
    assert_eq!(leaves(&tables), once);
    assert_eq!(tables.platform().live_pages(), pages);
}

#[test]
fn disjoint_regions_do_not_interfere() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, 2 * GIB, RegionAttribute::WriteBack)],
    );

    let probes = [0, 0x3FFF_F000, 0x4000_0000, 0x4000_3000, 0x4020_0000, 0x7FFF_F000];
    let before: Vec<_> = probes.iter().map(|&p| tables.lookup(va(p)).unwrap()).collect();

    tables.set_no_exec(va(0x4000_1000), 0x2000).unwrap();

    for (&probe, old) in probes.iter().zip(&before) {
        let new = tables.lookup(va(probe)).unwrap();
        assert_eq!(new.attributes, old.attributes, "attributes at {probe:#x}");
    }
    // the first gigabyte is outside the update and keeps its block
    assert_eq!(tables.lookup(va(0)).unwrap().level, 1);

    let xn = TranslationRegime::El1.execute_never();
    assert!(tables.lookup(va(0x4000_1000)).unwrap().attributes.contains(xn));
    assert!(tables.lookup(va(0x4000_2000)).unwrap().attributes.contains(xn));
}

#[test]
fn split_block_collapses_back() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)],
    );
    let original = tables.lookup(va(0)).unwrap();
    assert_eq!(tables.table_count(), 1);

    let ro = DescriptorAttributes::AP_READ_ONLY.bits();
    tables.set_region_attributes(va(0x1000), 0x1000, ro, ATTRIBUTES_MASK).unwrap();
    assert_eq!(tables.table_count(), 3);
    assert_eq!(tables.lookup(va(0)).unwrap().attributes, original.attributes);

    tables.set_region_attributes(va(0), GIB, original.attributes.bits(), 0).unwrap();

    assert_eq!(tables.table_count(), 1);
    assert_eq!(tables.lookup(va(0x1000)), Some(original));
    assert_eq!(tables.platform().live_pages(), 1);
}

#[test]
fn unaligned_requests_change_nothing() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)],
    );
    let before = leaves(&tables);
    tables.platform_mut().clear_events();

    let ro = DescriptorAttributes::AP_READ_ONLY.bits();
    assert_eq!(
        tables.set_region_attributes(va(0x1800), 0x1000, ro, !ro),
        Err(XlatError::InvalidArgument {
            base: va(0x1800),
            length: 0x1000
        })
    );
    assert!(tables.set_region_attributes(va(0x1000), 0x800, ro, !ro).is_err());
    assert!(tables.set_region_attributes(va(0xFFFF_F000), 0x2000, ro, !ro).is_err());
    assert_eq!(
        tables.set_region_attributes(va(0x1000), 0x1000, 1 << 20, 0),
        Err(XlatError::InvalidAttributes(1 << 20))
    );

    assert!(tables.platform().events().is_empty());
    assert_eq!(leaves(&tables), before);
    assert_eq!(tables.platform().live_pages(), 1);
}

#[test]
fn empty_update_is_a_no_op() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(&mut platform, 32, &[]);
    tables.platform_mut().clear_events();

    tables.set_read_only(va(0x1000), 0).unwrap();
    assert!(tables.platform().events().is_empty());
}

#[test]
fn failed_allocations_leak_nothing() {
    let ro = DescriptorAttributes::AP_READ_ONLY.bits();

    // the root takes the first allocation; the update needs three more
    for limit in 1..=3 {
        let mut platform = HeapPlatform::new().fail_after(limit);
        let mut tables = configure(&mut platform, 48, &[]);

        let result = tables.set_region_attributes(va(0x1000), 0x1000, ro, !ro);

        assert_eq!(result, Err(XlatError::OutOfMemory), "limit {limit}");
        assert_eq!(tables.platform().live_pages(), 1, "limit {limit}");
        assert_eq!(tables.table_count(), 1);
        assert!(leaves(&tables).is_empty());
    }
}

#[test]
fn failed_split_keeps_the_block() {
    let mut platform = HeapPlatform::new().fail_after(2);
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)],
    );
    let block = tables.lookup(va(0)).unwrap();
    tables.platform_mut().clear_events();

    assert_eq!(tables.set_read_only(va(0x1000), 0x1000), Err(XlatError::OutOfMemory));

    assert_eq!(tables.lookup(va(0x1000)), Some(block));
    assert_eq!(tables.platform().live_pages(), 1);
    let events = tables.platform().events();
    assert!(!events.iter().any(|e| matches!(e, PlatformEvent::LiveReplace { .. })));
}

#[test]
fn out_of_memory_is_not_atomic() {
    // the root, then two tables for the first gigabyte
    let mut platform = HeapPlatform::new().fail_after(3);
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, 2 * GIB, RegionAttribute::WriteBack)],
    );

    let result = tables.set_read_only(va(GIB - 0x1000), 0x2000);
    assert_eq!(result, Err(XlatError::OutOfMemory));

    let ro = DescriptorAttributes::AP_READ_ONLY;
    let first = tables.lookup(va(GIB - 0x1000)).unwrap();
    assert!(first.attributes.contains(ro));
    let second = tables.lookup(va(GIB)).unwrap();
    assert!(!second.attributes.contains(ro));
    assert_eq!(second.level, 1);
    assert_eq!(tables.platform().live_pages(), 3);
}

#[test]
fn root_geometry() {
    let g = Geometry::AARCH64_4K;
    let root = g.root_table_info(16);
    assert_eq!((root.level, root.entry_count), (0, 512));
    let root = g.root_table_info(25);
    assert_eq!((root.level, root.entry_count), (1, 512));
    let root = g.root_table_info(30);
    assert_eq!((root.level, root.entry_count), (1, 16));
}

#[test]
fn single_page_in_a_two_level_tree() {
    // 30 address bits: the walk starts at level 2
    let mut platform = HeapPlatform::new();
    let mut tables = configure(&mut platform, 30, &[]);
    assert_eq!(tables.platform().tcr().t0sz(), 34);

    let ro = DescriptorAttributes::AP_READ_ONLY.bits();
    tables.set_region_attributes(va(0x1000), 0x1000, ro, !ro).unwrap();

    let leaves = leaves(&tables);
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].base, va(0x1000));
    assert_eq!(leaves[0].level, 3);
    assert_eq!(leaves[0].length, 0x1000);
    assert_eq!(leaves[0].attributes, DescriptorAttributes::AP_READ_ONLY);
    assert_eq!(tables.table_count(), 2);
}

#[test]
fn read_only_and_no_exec_toggle() {
    let mut platform = HeapPlatform::new();
    let mut tables = configure(
        &mut platform,
        32,
        &[MemoryRegionDescriptor::new(0, 4 * MIB2, RegionAttribute::WriteBack)],
    );
    let original = tables.lookup(va(MIB2)).unwrap().attributes;

    tables.set_read_only(va(MIB2), MIB2).unwrap();
    tables.set_no_exec(va(MIB2), MIB2).unwrap();
    let changed = tables.lookup(va(MIB2)).unwrap().attributes;
    assert!(changed.contains(DescriptorAttributes::AP_READ_ONLY | DescriptorAttributes::PXN | DescriptorAttributes::UXN));

    tables.clear_read_only(va(MIB2), MIB2).unwrap();
    tables.clear_no_exec(va(MIB2), MIB2).unwrap();
    assert_eq!(tables.lookup(va(MIB2)).unwrap().attributes, original);
    assert_eq!(tables.lookup(va(MIB2)).unwrap().level, 2);
}

#[test]
fn el2_uses_a_single_execute_never_bit() {
    let mut platform = HeapPlatform::new();
    let config = MmuConfig::default()
        .with_physical_address_bits(32)
        .with_regime(TranslationRegime::El2);
    let regions = [MemoryRegionDescriptor::new(0, GIB, RegionAttribute::WriteBack)];
    let mut tables = TranslationTables::configure(&mut platform, &regions, &config).unwrap();

    tables.set_no_exec(va(0), GIB).unwrap();
    let attributes = tables.lookup(va(0)).unwrap().attributes;
    assert!(attributes.contains(DescriptorAttributes::UXN));
    assert!(!attributes.contains(DescriptorAttributes::PXN));
}
