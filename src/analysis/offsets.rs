//! Bitfield map of instruction start offsets.
//!
//! The [`BoundaryMap`] marks every byte offset at which a decoded instruction begins. Jump
//! target validation checks a single bit before resolving the instruction index, so targets
//! that land inside an instruction or outside of the body are rejected cheaply.

use crate::assembly::Instruction;

/// Marks the byte offsets at which instructions start and maps them back to indices.
#[derive(Debug, Clone, Default)]
pub struct BoundaryMap {
    data: Vec<usize>,
    elements: usize,
    starts: Vec<usize>,
}

const BITFIELD_SIZE: usize = usize::BITS as usize;

impl BoundaryMap {
    /// Builds the map for a decoded, ordered instruction sequence.
    #[must_use]
    pub fn new(instructions: &[Instruction<'_>]) -> Self {
        let elements = instructions.last().map_or(0, Instruction::end);
        let mut map = BoundaryMap {
            data: vec![0_usize; elements.div_ceil(BITFIELD_SIZE)],
            elements,
            starts: Vec::with_capacity(instructions.len()),
        };

        for instruction in instructions {
            map.set(instruction.offset);
            map.starts.push(instruction.offset);
        }

        map
    }

    /// Number of byte offsets covered, i.e. the end of the last instruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements
    }

    /// Returns `true` if the map covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }

    fn set(&mut self, element: usize) {
        if let Some(bitfield) = self.data.get_mut(element / BITFIELD_SIZE) {
            *bitfield |= 1_usize << (element % BITFIELD_SIZE);
        }
    }

    /// Returns `true` if an instruction starts at `element`.
    #[must_use]
    pub fn is_boundary(&self, element: usize) -> bool {
        if element >= self.elements {
            return false;
        }

        self.data
            .get(element / BITFIELD_SIZE)
            .is_some_and(|bitfield| (bitfield >> (element % BITFIELD_SIZE)) & 1 != 0)
    }

    /// Resolves an absolute, possibly negative, byte offset to the index of the instruction
    /// starting there.
    #[must_use]
    pub fn index_of(&self, target: i64) -> Option<usize> {
        let offset = usize::try_from(target).ok()?;
        if !self.is_boundary(offset) {
            return None;
        }

        self.starts.binary_search(&offset).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{decode, decode_from, registry};

    #[test]
    fn boundaries() {
        // ifle +0, returnvoid
        let instructions = decode(&[0x16, 0x00, 0x00, 0x00, 0x47], registry())
            .into_result()
            .unwrap();
        let map = BoundaryMap::new(&instructions);

        assert_eq!(map.len(), 5);
        assert!(map.is_boundary(0));
        assert!(!map.is_boundary(1));
        assert!(map.is_boundary(4));
        assert!(!map.is_boundary(5));

        assert_eq!(map.index_of(0), Some(0));
        assert_eq!(map.index_of(4), Some(1));
        assert_eq!(map.index_of(2), None);
        assert_eq!(map.index_of(-1), None);
        assert_eq!(map.index_of(5), None);
    }

    #[test]
    fn spans_several_words() {
        let code = vec![0x02; 200];
        let instructions = decode(&code, registry()).into_result().unwrap();
        let map = BoundaryMap::new(&instructions);

        assert!((0..200).all(|offset| map.is_boundary(offset)));
        assert_eq!(map.index_of(130), Some(130));
    }

    #[test]
    fn starting_cursor() {
        let instructions = decode_from(&[0xFF, 0xFF, 0x47], 2, registry())
            .into_result()
            .unwrap();
        let map = BoundaryMap::new(&instructions);
        assert_eq!(map.index_of(0), None);
        assert_eq!(map.index_of(2), Some(0));
    }

    #[test]
    fn empty() {
        let map = BoundaryMap::new(&[]);
        assert!(map.is_empty());
        assert_eq!(map.index_of(0), None);
    }
}
