//! Byte-accurate memory image of function bodies.

use std::collections::BTreeMap;

/// A mapped byte with the permissions of its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MappedByte {
    pub value: u8,
    pub writable: bool,
    pub executable: bool,
}

/// Contiguous bytes sharing the same permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryRun {
    pub start: u64,
    pub bytes: Vec<u8>,
    pub writable: bool,
    pub executable: bool,
}

impl MemoryRun {
    /// One past the last address of the run.
    pub fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }
}

/// Address to byte mapping, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteMap {
    bytes: BTreeMap<u64, MappedByte>,
}

impl ByteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a byte. Mapping an address twice keeps the latest value.
    pub fn map_byte(&mut self, addr: u64, value: u8, writable: bool, executable: bool) {
        self.bytes.insert(
            addr,
            MappedByte {
                value,
                writable,
                executable,
            },
        );
    }

    pub fn get(&self, addr: u64) -> Option<&MappedByte> {
        self.bytes.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate over mapped bytes in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &MappedByte)> {
        self.bytes.iter().map(|(addr, byte)| (*addr, byte))
    }

    /// Coalesce the map into maximal runs of adjacent bytes with equal
    /// permissions.
    pub fn runs(&self) -> Vec<MemoryRun> {
        let mut runs: Vec<MemoryRun> = Vec::new();
        for (addr, byte) in self.iter() {
            match runs.last_mut() {
                Some(run)
                    if run.end() == addr
                        && run.writable == byte.writable
                        && run.executable == byte.executable =>
                {
                    run.bytes.push(byte.value);
                }
                _ => runs.push(MemoryRun {
                    start: addr,
                    bytes: vec![byte.value],
                    writable: byte.writable,
                    executable: byte.executable,
                }),
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_get() {
        let mut map = ByteMap::new();
        map.map_byte(0x1000, 0x90, false, true);
        map.map_byte(0x1000, 0xc3, false, true);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(0x1000).map(|b| b.value), Some(0xc3));
        assert!(map.get(0x1001).is_none());
    }

    #[test]
    fn test_runs_split_on_gaps_and_permissions() {
        let mut map = ByteMap::new();
        map.map_byte(0x1000, 0x55, false, true);
        map.map_byte(0x1001, 0xc3, false, true);
        map.map_byte(0x1002, 0x00, true, false);
        map.map_byte(0x1010, 0x90, false, true);

        let runs = map.runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].start, 0x1000);
        assert_eq!(runs[0].bytes, vec![0x55, 0xc3]);
        assert_eq!(runs[0].end(), 0x1002);
        assert!(runs[1].writable && !runs[1].executable);
        assert_eq!(runs[2].start, 0x1010);
    }
}
