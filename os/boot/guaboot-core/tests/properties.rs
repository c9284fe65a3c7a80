mod common;

use common::{BufferMemory, Segment, build_elf64};
use guaboot_core::crc32::crc32;
use guaboot_core::elf::{ElfImage, ElfTarget};
use guaboot_core::loader::load_image;
use proptest::prelude::*;

const MIB: u64 = 0x10_0000;

proptest! {
    #[test]
    fn single_bit_flip_changes_crc(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        bit in any::<usize>(),
    ) {
        let bit = bit % (data.len() * 8);
        let mut flipped = data.clone();
        flipped[bit / 8] ^= 1 << (bit % 8);
        prop_assert_ne!(crc32(&data), crc32(&flipped));
        prop_assert_eq!(crc32(&data), crc32(&data));
    }

    #[test]
    fn loaded_bytes_match_source(
        first in proptest::collection::vec(any::<u8>(), 0..1024),
        first_bss in 0u64..1024,
        second in proptest::collection::vec(any::<u8>(), 1..512),
        second_bss in 0u64..512,
    ) {
        let first_mem = first.len() as u64 + first_bss;
        let second_addr = MIB + 0x1000;
        let second_mem = second.len() as u64 + second_bss;
        let mut segments = vec![Segment::load(second_addr, second.clone(), second_mem)];
        if first_mem > 0 {
            segments.insert(0, Segment::load(MIB, first.clone(), first_mem));
        }
        let bytes = build_elf64(MIB, &segments);
        let mut memory = BufferMemory::new(MIB, 0x2000);

        let elf = ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap();
        let image = load_image(&elf, &mut memory).unwrap();

        if first_mem > 0 {
            prop_assert_eq!(memory.at(MIB, first.len()), &first[..]);
            prop_assert!(memory
                .at(MIB + first.len() as u64, first_bss as usize)
                .iter()
                .all(|&b| b == 0));
            prop_assert_eq!(image.base.as_u64(), MIB);
        } else {
            prop_assert_eq!(image.base.as_u64(), second_addr);
        }
        prop_assert_eq!(memory.at(second_addr, second.len()), &second[..]);
        prop_assert!(memory
            .at(second_addr + second.len() as u64, second_bss as usize)
            .iter()
            .all(|&b| b == 0));
        prop_assert_eq!(image.end.as_u64(), second_addr + second_mem);
    }

    #[test]
    fn low_segment_leaves_memory_untouched(
        data in proptest::collection::vec(any::<u8>(), 1..256),
        low in 0u64..MIB,
    ) {
        let low = low.min(MIB - data.len() as u64);
        let bytes = build_elf64(
            MIB,
            &[
                Segment::load(MIB, data.clone(), data.len() as u64),
                Segment::load(low, data.clone(), data.len() as u64),
            ],
        );
        let mut memory = BufferMemory::new(MIB, 0x1000);
        let elf = ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap();
        prop_assert!(load_image(&elf, &mut memory).is_err());
        prop_assert!(memory.untouched());
    }
}
