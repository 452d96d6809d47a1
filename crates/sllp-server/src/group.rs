//! Ordered subsets of variables read and written as one batch.

use bytes::{BufMut, Bytes, BytesMut};
use sllp_frame::{BinaryOp, GroupInfo, MAX_PAYLOAD, RESERVED_GROUP_COUNT};
use tracing::debug;

use crate::error::DeviceError;
use crate::registry::VariableRegistry;

const KIND: &str = "group";

/// Member count travels in the low 7 bits of a group-list octet.
const MAX_MEMBERS: usize = 0x7F;

/// One group: member ids in declared order plus derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    members: Vec<u8>,
    len: usize,
    writable: bool,
}

impl Group {
    fn build(registry: &VariableRegistry, members: Vec<u8>) -> Result<Self, DeviceError> {
        let mut len = 0usize;
        let mut writable = true;
        for &id in &members {
            len += registry.width(id)?;
            writable &= registry.is_writable(id)?;
        }
        Ok(Self {
            members,
            len,
            writable,
        })
    }

    pub fn members(&self) -> &[u8] {
        &self.members
    }

    /// Sum of member widths.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Every member is writable.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn info(&self) -> GroupInfo {
        GroupInfo {
            writable: self.writable && !self.members.is_empty(),
            size: self.members.len() as u8,
        }
    }
}

/// The group table. Ids `0..3` are the reserved ALL, READ and WRITE
/// groups; user groups follow in creation order and are never edited.
#[derive(Debug, Clone)]
pub struct GroupManager {
    groups: Vec<Group>,
    capacity: usize,
}

impl GroupManager {
    /// Build the reserved groups over `registry`. `capacity` counts them.
    pub fn new(registry: &VariableRegistry, capacity: usize) -> Self {
        let all = Group {
            members: registry.ids().collect(),
            len: registry.ids().filter_map(|id| registry.width(id).ok()).sum(),
            writable: registry.writable_ids().count() == registry.len(),
        };
        // Every variable is readable.
        let read = all.clone();
        let writable_members: Vec<u8> = registry.writable_ids().collect();
        let write = Group {
            len: writable_members
                .iter()
                .filter_map(|&id| registry.width(id).ok())
                .sum(),
            members: writable_members,
            writable: true,
        };
        Self {
            groups: vec![all, read, write],
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: u8) -> Result<&Group, DeviceError> {
        self.groups
            .get(usize::from(id))
            .ok_or(DeviceError::InvalidId { kind: KIND, id })
    }

    /// Create a group from `ids` in the given order.
    pub fn create(&mut self, registry: &VariableRegistry, ids: &[u8]) -> Result<u8, DeviceError> {
        if self.groups.len() >= self.capacity {
            return Err(DeviceError::InsufficientMemory {
                what: "group table",
                capacity: self.capacity,
            });
        }
        if ids.len() > MAX_MEMBERS {
            return Err(DeviceError::InvalidPayloadSize {
                what: "group members",
                expected: MAX_MEMBERS,
                actual: ids.len(),
            });
        }
        let group = Group::build(registry, ids.to_vec())?;
        if group.len > MAX_PAYLOAD {
            return Err(DeviceError::InvalidPayloadSize {
                what: "group reading",
                expected: MAX_PAYLOAD,
                actual: group.len,
            });
        }
        let id = self.groups.len() as u8;
        debug!(id, members = ?group.members, bytes = group.len, "group created");
        self.groups.push(group);
        Ok(id)
    }

    /// Drop every user group. Reserved groups stay.
    pub fn remove_all(&mut self) {
        self.groups.truncate(usize::from(RESERVED_GROUP_COUNT));
    }

    /// Concatenated member values in declared order.
    pub fn read(&self, registry: &VariableRegistry, id: u8) -> Result<Bytes, DeviceError> {
        let group = self.get(id)?;
        let mut out = BytesMut::with_capacity(group.len);
        for &member in &group.members {
            out.put_slice(registry.read(member)?);
        }
        Ok(out.freeze())
    }

    /// Write concatenated values member by member in declared order.
    ///
    /// The total length is checked first. A member that then fails stops
    /// the write; members already written are not rolled back.
    pub fn write(
        &self,
        registry: &mut VariableRegistry,
        id: u8,
        values: &[u8],
    ) -> Result<(), DeviceError> {
        self.each_member(registry, id, values, |registry, member, chunk| {
            registry.write(member, chunk)
        })
    }

    /// Apply a bitwise operation to every member, same rules as [`write`](Self::write).
    pub fn apply(
        &self,
        registry: &mut VariableRegistry,
        id: u8,
        op: BinaryOp,
        mask: &[u8],
    ) -> Result<(), DeviceError> {
        self.each_member(registry, id, mask, |registry, member, chunk| {
            registry.apply(member, op, chunk)
        })
    }

    fn each_member(
        &self,
        registry: &mut VariableRegistry,
        id: u8,
        bytes: &[u8],
        mut f: impl FnMut(&mut VariableRegistry, u8, &[u8]) -> Result<(), DeviceError>,
    ) -> Result<(), DeviceError> {
        let group = self.get(id)?;
        if bytes.len() != group.len {
            return Err(DeviceError::InvalidPayloadSize {
                what: "group values",
                expected: group.len,
                actual: bytes.len(),
            });
        }
        let mut offset = 0usize;
        for (written, &member) in group.members.iter().enumerate() {
            let width = registry.width(member)?;
            let chunk = &bytes[offset..offset + width];
            f(registry, member, chunk).map_err(|source| DeviceError::PartialGroupWrite {
                group: id,
                member,
                written,
                source: Box::new(source),
            })?;
            offset += width;
        }
        Ok(())
    }

    /// Catalog entries for the group list.
    pub fn infos(&self) -> Vec<GroupInfo> {
        self.groups.iter().map(Group::info).collect()
    }
}
