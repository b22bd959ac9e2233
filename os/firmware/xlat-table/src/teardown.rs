use crate::descriptor::Descriptor;
use crate::table::TranslationTable;
use crate::{Geometry, PlatformOps};
use xlat_addresses::PhysicalAddress;

/// Frees the table at `table` and every table below it.
///
/// Blocks and invalid entries own no memory. Works on linked subtrees after a
/// collapse as well as on subtrees that were never linked.
pub(crate) fn free_page_tables_recursive<P: PlatformOps + ?Sized>(
    platform: &mut P,
    geometry: &Geometry,
    table: PhysicalAddress,
    level: u32,
) {
    if level < geometry.last_level() {
        let view = unsafe { TranslationTable::open(&*platform, table, geometry.entries_per_table()) };
        for index in 0..view.len() {
            if let Descriptor::Table { next } = Descriptor::decode(view.get(index), level, geometry) {
                free_page_tables_recursive(platform, geometry, next, level + 1);
            }
        }
    }
    platform.free_page(table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapPlatform;
    use crate::table::allocate_table;

    #[test]
    fn frees_nested_tables() {
        let mut platform = HeapPlatform::new();
        let g = Geometry::AARCH64_4K;

        let l1 = allocate_table(&mut platform, &g, 1).unwrap();
        let l2 = allocate_table(&mut platform, &g, 2).unwrap();
        let l3a = allocate_table(&mut platform, &g, 3).unwrap();
        let l3b = allocate_table(&mut platform, &g, 3).unwrap();

        unsafe {
            let mut t1 = TranslationTable::open(&platform, l1, 512);
            t1.set(0, Descriptor::Table { next: l2 }.encode(1, &g));
            // a block next to the table must not be followed
            t1.set(1, 0x4000_0401);

            let mut t2 = TranslationTable::open(&platform, l2, 512);
            t2.set(7, Descriptor::Table { next: l3a }.encode(2, &g));
            t2.set(300, Descriptor::Table { next: l3b }.encode(2, &g));

            // pages at the last level carry the table tag
            let mut t3 = TranslationTable::open(&platform, l3a, 512);
            t3.set(0, 0x0000_0000_0000_0403);
        }

        assert_eq!(platform.live_pages(), 4);
        free_page_tables_recursive(&mut platform, &g, l1, 1);
        assert_eq!(platform.live_pages(), 0);
    }
}
