//! Per-slave data model: named blocks of coils/discrete inputs/holding
//! registers/input registers, addressed by a 16-bit range (§3, §4.5).

use std::collections::HashMap;

use crate::errors::DataModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
}

/// The element type a block of a given kind holds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Values {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
}

impl Values {
    fn len(&self) -> usize {
        match self {
            Self::Bits(v) => v.len(),
            Self::Registers(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    kind: Kind,
    start: u16,
    values: Values,
}

impl Block {
    fn end(&self) -> u32 {
        self.start as u32 + self.values.len() as u32
    }

    fn contains(&self, address: u16) -> bool {
        (self.start as u32..self.end()).contains(&(address as u32))
    }
}

/// A single Modbus slave: `slave_id ∈ [1, 247]` with a set of named blocks.
#[derive(Debug, Default)]
pub struct Slave {
    blocks: HashMap<String, Block>,
}

impl Slave {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a named block. Fails if the range overlaps an existing block
    /// of the same kind, or if `start + size` exceeds the 16-bit address
    /// space.
    pub fn create_block(
        &mut self,
        name: impl Into<String>,
        kind: Kind,
        start: u16,
        size: u16,
    ) -> Result<(), DataModelError> {
        let name = name.into();
        let end = start as u32 + size as u32;
        if end > 0x1_0000 {
            return Err(DataModelError::OutOfAddressSpace { name, start, size });
        }
        for (other_name, other) in &self.blocks {
            if other.kind == kind && ranges_overlap(start as u32, end, other.start as u32, other.end()) {
                return Err(DataModelError::Overlap {
                    name,
                    other: other_name.clone(),
                    start,
                    end,
                });
            }
        }
        let values = match kind {
            Kind::Coil | Kind::DiscreteInput => Values::Bits(vec![false; size as usize]),
            Kind::HoldingRegister | Kind::InputRegister => Values::Registers(vec![0; size as usize]),
        };
        self.blocks.insert(name, Block { kind, start, values });
        Ok(())
    }

    /// Returns the block of `kind` whose range covers `address`, if any.
    pub fn lookup(&self, kind: Kind, address: u16) -> Option<&Block> {
        self.blocks
            .values()
            .find(|b| b.kind == kind && b.contains(address))
    }

    /// Writes boolean values starting at `address` (absolute). Indexes
    /// outside the named block are silently discarded.
    pub fn set_bits(
        &mut self,
        block_name: &str,
        address: u16,
        values: &[bool],
    ) -> Result<(), DataModelError> {
        let block = self
            .blocks
            .get_mut(block_name)
            .ok_or_else(|| DataModelError::UnknownBlock(block_name.to_string()))?;
        let Values::Bits(target) = &mut block.values else {
            return Err(DataModelError::UnknownBlock(block_name.to_string()));
        };
        write_in_range(target, block.start, address, values);
        Ok(())
    }

    /// Writes register values starting at `address`, masked to 16 bits.
    pub fn set_registers(
        &mut self,
        block_name: &str,
        address: u16,
        values: &[u16],
    ) -> Result<(), DataModelError> {
        let block = self
            .blocks
            .get_mut(block_name)
            .ok_or_else(|| DataModelError::UnknownBlock(block_name.to_string()))?;
        let Values::Registers(target) = &mut block.values else {
            return Err(DataModelError::UnknownBlock(block_name.to_string()));
        };
        write_in_range(target, block.start, address, values);
        Ok(())
    }

    /// Reads `count` boolean elements starting at `address`. Indexes outside
    /// the block default to `false`.
    pub fn get_bits(&self, block_name: &str, address: u16, count: u16) -> Result<Vec<bool>, DataModelError> {
        let block = self
            .blocks
            .get(block_name)
            .ok_or_else(|| DataModelError::UnknownBlock(block_name.to_string()))?;
        let Values::Bits(source) = &block.values else {
            return Err(DataModelError::UnknownBlock(block_name.to_string()));
        };
        Ok(read_in_range(source, block.start, address, count, false))
    }

    /// Reads `count` register elements starting at `address`. Indexes outside
    /// the block default to `0`.
    pub fn get_registers(
        &self,
        block_name: &str,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, DataModelError> {
        let block = self
            .blocks
            .get(block_name)
            .ok_or_else(|| DataModelError::UnknownBlock(block_name.to_string()))?;
        let Values::Registers(source) = &block.values else {
            return Err(DataModelError::UnknownBlock(block_name.to_string()));
        };
        Ok(read_in_range(source, block.start, address, count, 0))
    }

    /// Reads `count` boolean elements by kind + absolute address, defaulting
    /// to `false` where no block covers the address. Used by the dispatcher,
    /// which only knows `(kind, address)`, not a block name.
    pub fn read_bits_by_address(&self, kind: Kind, address: u16, count: u16) -> Vec<bool> {
        read_by_address(self, kind, address, count, false, |b| match &b.values {
            Values::Bits(v) => Some(v.as_slice()),
            Values::Registers(_) => None,
        })
    }

    /// Reads `count` registers by kind + absolute address, defaulting to `0`
    /// where no block covers the address.
    pub fn read_registers_by_address(&self, kind: Kind, address: u16, count: u16) -> Vec<u16> {
        read_by_address(self, kind, address, count, 0, |b| match &b.values {
            Values::Registers(v) => Some(v.as_slice()),
            Values::Bits(_) => None,
        })
    }

    /// Writes boolean values by kind + absolute address. Bytes falling
    /// outside every block of that kind are silently discarded (§4.5).
    pub fn write_bits_by_address(&mut self, kind: Kind, address: u16, values: &[bool]) {
        for block in self.blocks.values_mut() {
            if block.kind == kind {
                if let Values::Bits(target) = &mut block.values {
                    write_in_range(target, block.start, address, values);
                }
            }
        }
    }

    /// Writes register values by kind + absolute address, masked to 16 bits
    /// implicitly by `u16`'s own width.
    pub fn write_registers_by_address(&mut self, kind: Kind, address: u16, values: &[u16]) {
        for block in self.blocks.values_mut() {
            if block.kind == kind {
                if let Values::Registers(target) = &mut block.values {
                    write_in_range(target, block.start, address, values);
                }
            }
        }
    }
}

fn ranges_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

/// Writes `values` into `target` (a block's storage starting at absolute
/// address `block_start`) beginning at absolute address `address`. Any index
/// that falls outside `target`'s range is skipped.
fn write_in_range<T: Copy>(target: &mut [T], block_start: u16, address: u16, values: &[T]) {
    for (offset, &value) in values.iter().enumerate() {
        let abs = address as u32 + offset as u32;
        if abs < block_start as u32 {
            continue;
        }
        let index = (abs - block_start as u32) as usize;
        if index < target.len() {
            target[index] = value;
        }
    }
}

/// Reads `count` elements from `source` starting at absolute address
/// `address`, filling `default` for any index outside `source`'s range.
fn read_in_range<T: Copy>(source: &[T], block_start: u16, address: u16, count: u16, default: T) -> Vec<T> {
    (0..count as u32)
        .map(|offset| {
            let abs = address as u32 + offset;
            if abs < block_start as u32 {
                return default;
            }
            let index = (abs - block_start as u32) as usize;
            source.get(index).copied().unwrap_or(default)
        })
        .collect()
}

fn read_by_address<T: Copy>(
    slave: &Slave,
    kind: Kind,
    address: u16,
    count: u16,
    default: T,
    as_slice: impl Fn(&Block) -> Option<&[T]>,
) -> Vec<T> {
    let mut out = vec![default; count as usize];
    for block in slave.blocks.values() {
        if block.kind != kind {
            continue;
        }
        let Some(source) = as_slice(block) else {
            continue;
        };
        for (i, slot) in out.iter_mut().enumerate() {
            let abs = address as u32 + i as u32;
            if abs < block.start as u32 {
                continue;
            }
            let index = (abs - block.start as u32) as usize;
            if let Some(&value) = source.get(index) {
                *slot = value;
            }
        }
    }
    out
}

/// Registry of slaves, keyed by `slave_id ∈ [1, 247]` (0 is broadcast and
/// never registered).
#[derive(Debug, Default)]
pub struct DataModel {
    slaves: HashMap<u8, Slave>,
}

impl DataModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_slave(&mut self, slave_id: u8) -> Result<&mut Slave, DataModelError> {
        if slave_id == 0 || slave_id > 247 {
            return Err(DataModelError::InvalidSlaveId(slave_id));
        }
        if self.slaves.contains_key(&slave_id) {
            return Err(DataModelError::DuplicateSlaveId(slave_id));
        }
        Ok(self.slaves.entry(slave_id).or_default())
    }

    pub fn slave(&self, slave_id: u8) -> Option<&Slave> {
        self.slaves.get(&slave_id)
    }

    pub fn slave_mut(&mut self, slave_id: u8) -> Option<&mut Slave> {
        self.slaves.get_mut(&slave_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_block_rejects_overlap_of_same_kind() {
        let mut slave = Slave::new();
        slave.create_block("a", Kind::HoldingRegister, 0, 10).unwrap();
        let err = slave
            .create_block("b", Kind::HoldingRegister, 5, 10)
            .unwrap_err();
        assert!(matches!(err, DataModelError::Overlap { .. }));
    }

    #[test]
    fn create_block_allows_overlap_across_kinds() {
        let mut slave = Slave::new();
        slave.create_block("coils", Kind::Coil, 0, 10).unwrap();
        slave
            .create_block("holding", Kind::HoldingRegister, 0, 10)
            .unwrap();
    }

    #[test]
    fn create_block_rejects_exceeding_address_space() {
        let mut slave = Slave::new();
        let err = slave
            .create_block("overflow", Kind::Coil, 0xFFF0, 0x20)
            .unwrap_err();
        assert!(matches!(err, DataModelError::OutOfAddressSpace { .. }));
    }

    #[test]
    fn read_coils_round_trip_scenario() {
        let mut slave = Slave::new();
        slave.create_block("c", Kind::Coil, 0, 16).unwrap();
        let values = [
            true, false, true, false, false, false, false, false, true, true, false, false,
            false, false, false, false,
        ];
        slave.set_bits("c", 0, &values).unwrap();
        let read = slave.get_bits("c", 0, 10).unwrap();
        assert_eq!(read, &values[..10]);
    }

    #[test]
    fn write_single_register_echo_scenario() {
        let mut slave = Slave::new();
        slave.create_block("holding", Kind::HoldingRegister, 0, 16).unwrap();
        slave.set_registers("holding", 7, &[0x1234]).unwrap();
        let read = slave.get_registers("holding", 7, 1).unwrap();
        assert_eq!(read, vec![0x1234]);
    }

    #[test]
    fn partial_range_read_falls_back_to_defaults_past_block_end() {
        let mut slave = Slave::new();
        slave
            .create_block("holding", Kind::HoldingRegister, 10, 4)
            .unwrap();
        slave.set_registers("holding", 10, &[11, 22, 33, 44]).unwrap();
        let read = slave.get_registers("holding", 12, 4).unwrap();
        assert_eq!(read, vec![33, 44, 0, 0]);
    }

    #[test]
    fn writes_crossing_block_boundary_only_apply_in_range() {
        let mut slave = Slave::new();
        slave.create_block("holding", Kind::HoldingRegister, 10, 4).unwrap();
        // Write 6 values starting at 12: only indices 12,13 land inside [10,14).
        slave
            .set_registers("holding", 12, &[100, 200, 300, 400, 500, 600])
            .unwrap();
        let read = slave.get_registers("holding", 10, 4).unwrap();
        assert_eq!(read, vec![0, 0, 100, 200]);
    }

    #[test]
    fn lookup_by_address_returns_none_outside_any_block() {
        let mut slave = Slave::new();
        slave.create_block("holding", Kind::HoldingRegister, 10, 4).unwrap();
        assert!(slave.lookup(Kind::HoldingRegister, 9).is_none());
        assert!(slave.lookup(Kind::HoldingRegister, 13).is_some());
        assert!(slave.lookup(Kind::HoldingRegister, 14).is_none());
    }

    #[test]
    fn read_by_address_defaults_when_no_block_covers_it() {
        let slave = Slave::new();
        let read = slave.read_registers_by_address(Kind::HoldingRegister, 0, 4);
        assert_eq!(read, vec![0, 0, 0, 0]);
        let read = slave.read_bits_by_address(Kind::Coil, 0, 4);
        assert_eq!(read, vec![false, false, false, false]);
    }

    #[test]
    fn add_slave_rejects_broadcast_and_out_of_range_ids() {
        let mut model = DataModel::new();
        assert!(matches!(
            model.add_slave(0).unwrap_err(),
            DataModelError::InvalidSlaveId(0)
        ));
        assert!(matches!(
            model.add_slave(248).unwrap_err(),
            DataModelError::InvalidSlaveId(248)
        ));
    }

    #[test]
    fn add_slave_rejects_duplicate_registration() {
        let mut model = DataModel::new();
        model.add_slave(9).unwrap();
        assert!(matches!(
            model.add_slave(9).unwrap_err(),
            DataModelError::DuplicateSlaveId(9)
        ));
    }
}
