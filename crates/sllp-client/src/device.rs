use std::collections::HashMap;

use bytes::Bytes;
use sllp_frame::{
    curve_checksum, escape_reply, BinaryOp, CurveInfo, GroupInfo, Request, Response, Value,
    ValueKind, VariableInfo, Version, MAX_PAYLOAD,
};
use sllp_transport::Transport;
use tracing::{debug, warn};

use crate::config::TransactionConfig;
use crate::engine::{TransactionEngine, VariableProtocol};
use crate::error::{ClientError, Result};
use crate::stats::Statistics;

/// Curve block header: curve id and block index.
const BLOCK_HEADER: usize = 3;

/// What the device reported about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub variables: Vec<VariableInfo>,
    pub groups: Vec<GroupInfo>,
    pub curves: Vec<CurveInfo>,
}

impl Catalog {
    pub fn width(&self, id: u8) -> Option<usize> {
        self.variables
            .get(usize::from(id))
            .map(|info| usize::from(info.width))
    }
}

/// Client for the variable / group / curve model.
///
/// Keeps the last confirmed raw value of every variable it has read or
/// written. Once the catalog is loaded, widths are checked locally before
/// a write and against every reading.
pub struct DeviceClient<T> {
    engine: TransactionEngine<VariableProtocol, T>,
    catalog: Option<Catalog>,
    members: HashMap<u8, Vec<u8>>,
    cache: HashMap<u8, Bytes>,
}

impl<T: Transport> DeviceClient<T> {
    pub fn new(transport: T, config: TransactionConfig) -> Self {
        Self {
            engine: TransactionEngine::new(VariableProtocol, transport, config),
            catalog: None,
            members: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn query_status(&mut self) -> Result<Version> {
        match self.call(Request::QueryStatus)? {
            Response::Status(version) => Ok(version),
            other => Err(self.unexpected(&other)),
        }
    }

    /// Query variables, groups and curves and keep the result.
    pub fn load_catalog(&mut self) -> Result<&Catalog> {
        let variables = match self.call(Request::QueryVariables)? {
            Response::VariableList(list) => list,
            other => return Err(self.unexpected(&other)),
        };
        let groups = self.query_groups()?;
        let curves = match self.call(Request::QueryCurves)? {
            Response::CurveList(list) => list,
            other => return Err(self.unexpected(&other)),
        };
        debug!(
            variables = variables.len(),
            groups = groups.len(),
            curves = curves.len(),
            "catalog loaded"
        );
        Ok(&*self.catalog.insert(Catalog {
            variables,
            groups,
            curves,
        }))
    }

    /// The loaded catalog, if any.
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    fn ensure_catalog(&mut self) -> Result<&Catalog> {
        if self.catalog.is_none() {
            self.load_catalog()?;
        }
        self.catalog
            .as_ref()
            .ok_or_else(|| ClientError::InvalidValue("device catalog unavailable".to_string()))
    }

    pub fn query_groups(&mut self) -> Result<Vec<GroupInfo>> {
        match self.call(Request::QueryGroups)? {
            Response::GroupList(list) => Ok(list),
            other => Err(self.unexpected(&other)),
        }
    }

    /// Member ids of a group, in declared order.
    pub fn group_members(&mut self, group: u8) -> Result<Vec<u8>> {
        if let Some(members) = self.members.get(&group) {
            return Ok(members.clone());
        }
        match self.call(Request::QueryGroup(group))? {
            Response::Group(ids) => {
                self.members.insert(group, ids.clone());
                Ok(ids)
            }
            other => Err(self.unexpected(&other)),
        }
    }

    pub fn read_variable(&mut self, id: u8) -> Result<Bytes> {
        let raw = match self.call(Request::ReadVariable(id))? {
            Response::VariableReading(raw) => raw,
            other => return Err(self.unexpected(&other)),
        };
        if let Some(width) = self.catalog.as_ref().and_then(|c| c.width(id)) {
            if raw.len() != width {
                return Err(self.bad_reply(
                    &raw,
                    format!("variable {id}: reading is {} bytes, width is {width}", raw.len()),
                ));
            }
        }
        self.cache.insert(id, raw.clone());
        Ok(raw)
    }

    pub fn write_variable(&mut self, id: u8, raw: &[u8]) -> Result<()> {
        if let Some(width) = self.catalog.as_ref().and_then(|c| c.width(id)) {
            if raw.len() != width {
                return Err(ClientError::InvalidValue(format!(
                    "variable {id}: value is {} bytes, width is {width}",
                    raw.len()
                )));
            }
        }
        let raw = Bytes::copy_from_slice(raw);
        self.expect_ok(Request::WriteVariable {
            id,
            value: raw.clone(),
        })?;
        self.cache.insert(id, raw);
        Ok(())
    }

    pub fn read_value(&mut self, id: u8, kind: ValueKind) -> Result<Value> {
        let raw = self.read_variable(id)?;
        Ok(Value::decode(kind, &raw)?)
    }

    pub fn write_value(&mut self, id: u8, value: Value) -> Result<()> {
        self.write_variable(id, &value.to_raw())
    }

    /// Raw concatenated reading of a group.
    pub fn read_group(&mut self, group: u8) -> Result<Bytes> {
        match self.call(Request::ReadGroup(group))? {
            Response::GroupReading(raw) => Ok(raw),
            other => Err(self.unexpected(&other)),
        }
    }

    /// Read a group and split it into per-member values, caching each.
    pub fn read_group_members(&mut self, group: u8) -> Result<Vec<(u8, Bytes)>> {
        let members = self.group_members(group)?;
        let widths = {
            let catalog = self.ensure_catalog()?;
            members
                .iter()
                .map(|&id| {
                    catalog.width(id).ok_or_else(|| {
                        ClientError::InvalidValue(format!("group {group}: unknown member {id}"))
                    })
                })
                .collect::<Result<Vec<usize>>>()?
        };
        let expected: usize = widths.iter().sum();

        let mut raw = self.read_group(group)?;
        if raw.len() != expected {
            return Err(self.bad_reply(
                &raw,
                format!("group {group}: reading is {} bytes, expected {expected}", raw.len()),
            ));
        }
        let values: Vec<(u8, Bytes)> = members
            .iter()
            .zip(widths)
            .map(|(&id, width)| (id, raw.split_to(width)))
            .collect();
        for (id, value) in &values {
            self.cache.insert(*id, value.clone());
        }
        Ok(values)
    }

    /// Write a group. A device may apply members before a failing one; the
    /// rejection does not say how far it got.
    pub fn write_group(&mut self, group: u8, values: &[u8]) -> Result<()> {
        let result = self.expect_ok(Request::WriteGroup {
            id: group,
            values: Bytes::copy_from_slice(values),
        });
        self.forget_members(group);
        result
    }

    pub fn binary_op_variable(&mut self, id: u8, op: BinaryOp, mask: &[u8]) -> Result<()> {
        self.expect_ok(Request::BinaryOpVariable {
            id,
            op,
            mask: Bytes::copy_from_slice(mask),
        })?;
        self.cache.remove(&id);
        Ok(())
    }

    pub fn binary_op_group(&mut self, group: u8, op: BinaryOp, mask: &[u8]) -> Result<()> {
        self.expect_ok(Request::BinaryOpGroup {
            id: group,
            op,
            mask: Bytes::copy_from_slice(mask),
        })?;
        self.forget_members(group);
        Ok(())
    }

    pub fn create_group(&mut self, ids: &[u8]) -> Result<()> {
        self.expect_ok(Request::CreateGroup(ids.to_vec()))?;
        self.invalidate_groups();
        Ok(())
    }

    pub fn remove_all_groups(&mut self) -> Result<()> {
        self.expect_ok(Request::RemoveAllGroups)?;
        self.invalidate_groups();
        Ok(())
    }

    /// Upload `data` to a curve block by block, then commit it with its
    /// checksum. A failure part-way leaves the transfer to be restarted
    /// from block 0.
    pub fn send_curve(&mut self, curve: u8, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(ClientError::InvalidValue(format!("curve {curve}: no data")));
        }
        let info = self
            .ensure_catalog()?
            .curves
            .get(usize::from(curve))
            .copied()
            .ok_or_else(|| ClientError::InvalidValue(format!("no curve with id {curve}")))?;
        if data.len() > info.capacity() {
            return Err(ClientError::InvalidValue(format!(
                "curve {curve}: {} bytes exceed capacity {}",
                data.len(),
                info.capacity()
            )));
        }

        let block_size = usize::from(info.block_size).min(MAX_PAYLOAD - BLOCK_HEADER);
        if block_size == 0 {
            return Err(ClientError::InvalidValue(format!(
                "curve {curve} has zero block size"
            )));
        }
        for (index, block) in data.chunks(block_size).enumerate() {
            let index = u16::try_from(index).map_err(|_| {
                ClientError::InvalidValue(format!("curve {curve}: too many blocks"))
            })?;
            self.expect_ok(Request::CurveBlock {
                curve,
                index,
                data: Bytes::copy_from_slice(block),
            })?;
        }

        let checksum = curve_checksum(data);
        self.expect_ok(Request::CurveTransmit { curve, checksum })?;
        if let Some(catalog) = self.catalog.as_mut() {
            if let Some(entry) = catalog.curves.get_mut(usize::from(curve)) {
                entry.checksum = checksum;
            }
        }
        debug!(curve, bytes = data.len(), "curve committed");
        Ok(())
    }

    pub fn recalc_curve_checksum(&mut self, curve: u8) -> Result<()> {
        self.expect_ok(Request::CurveRecalcChecksum(curve))
    }

    /// Last confirmed raw value of a variable.
    pub fn cached(&self, id: u8) -> Option<&Bytes> {
        self.cache.get(&id)
    }

    pub fn stats(&self) -> &Statistics {
        self.engine.stats()
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        self.engine.stats_mut()
    }

    pub fn engine(&self) -> &TransactionEngine<VariableProtocol, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransactionEngine<VariableProtocol, T> {
        &mut self.engine
    }

    /// Drop cached values of a group's members, or the whole cache when
    /// the membership has not been queried.
    fn forget_members(&mut self, group: u8) {
        match self.members.get(&group) {
            Some(members) => {
                for id in members {
                    self.cache.remove(id);
                }
            }
            None => self.cache.clear(),
        }
    }

    fn invalidate_groups(&mut self) {
        self.members.clear();
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.groups.clear();
        }
    }

    /// One transaction; a device rejection becomes an error.
    fn call(&mut self, request: Request) -> Result<Response> {
        let command = request.command();
        match self.engine.transact(&request)? {
            Response::Rejected(code) => {
                self.engine.stats_mut().rejections += 1;
                warn!(%command, %code, "request rejected");
                Err(ClientError::Rejected {
                    code,
                    request: command,
                })
            }
            response => Ok(response),
        }
    }

    fn expect_ok(&mut self, request: Request) -> Result<()> {
        match self.call(request)? {
            Response::Ok => Ok(()),
            other => Err(self.unexpected(&other)),
        }
    }

    fn bad_reply(&mut self, raw: &[u8], reason: String) -> ClientError {
        self.engine.stats_mut().bad_replies += 1;
        let reply = escape_reply(raw);
        warn!(%reply, %reason, "bad reply");
        ClientError::BadReply { reply, reason }
    }

    /// A well-formed reply of the wrong kind.
    fn unexpected(&mut self, response: &Response) -> ClientError {
        self.engine.stats_mut().bad_replies += 1;
        let reply = format!("{response:?}");
        let reason = format!("unexpected {}", response.command());
        warn!(%reply, %reason, "bad reply");
        ClientError::BadReply { reply, reason }
    }
}

#[cfg(test)]
mod tests {
    use sllp_frame::ErrorCode;

    use super::*;
    use crate::scripted::ScriptedTransport;

    fn client(transport: ScriptedTransport) -> DeviceClient<ScriptedTransport> {
        DeviceClient::new(transport, TransactionConfig::default())
    }

    #[test]
    fn write_then_read_updates_cache() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[0xE0, 0x00]);
        transport.push_reply(&[0x11, 0x01, 0x07]);
        let mut client = client(transport);

        client.write_variable(5, &[0x07]).unwrap();
        assert_eq!(client.cached(5).unwrap().as_ref(), &[0x07]);
        assert_eq!(client.read_variable(5).unwrap().as_ref(), &[0x07]);
        assert_eq!(
            client.engine().transport().requests()[0].as_ref(),
            &[0x20, 0x02, 0x05, 0x07]
        );
    }

    #[test]
    fn rejection_is_counted_and_not_retried() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[0xE4, 0x00]);
        let mut client = client(transport);

        let err = client.write_variable(5, &[0x07, 0x00]).unwrap_err();
        assert_eq!(err.rejection(), Some(ErrorCode::InvalidValue));
        assert_eq!(client.engine().transport().requests().len(), 1);
        assert_eq!(client.stats().rejections, 1);
        assert_eq!(client.stats().retries, 0);
        assert!(client.cached(5).is_none());
    }

    #[test]
    fn wrong_reply_kind_counts_as_bad_reply() {
        let mut client = client(ScriptedTransport::new());
        let err = client.unexpected(&Response::Ok);
        assert!(matches!(err, ClientError::BadReply { .. }));
        assert_eq!(client.stats().bad_replies, 1);
    }

    #[test]
    fn catalog_width_checks() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[0x03, 0x02, 0x88, 0x81]);
        transport.push_reply(&[0x05, 0x00]);
        transport.push_reply(&[0x09, 0x00]);
        transport.push_reply(&[0x11, 0x02, 0x01, 0x02]);
        let mut client = client(transport);

        let catalog = client.load_catalog().unwrap();
        assert_eq!(catalog.width(0), Some(8));
        assert_eq!(catalog.width(1), Some(1));

        assert!(matches!(
            client.write_variable(1, &[1, 2]),
            Err(ClientError::InvalidValue(_))
        ));
        assert_eq!(client.engine().transport().requests().len(), 3);

        let err = client.read_variable(1).unwrap_err();
        assert!(matches!(err, ClientError::BadReply { .. }));
        assert_eq!(client.stats().bad_replies, 1);
        assert!(client.cached(1).is_none());
    }

    #[test]
    fn typed_values_round_trip_through_raw() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(&[0xE0, 0x00]);
        let mut raw = vec![0x11, 0x08];
        raw.extend_from_slice(&2.5f64.to_le_bytes());
        transport.push_reply(&raw);
        let mut client = client(transport);

        client.write_value(0, Value::F64(2.5)).unwrap();
        assert_eq!(client.read_value(0, ValueKind::F64).unwrap(), Value::F64(2.5));
        assert!(matches!(
            client.read_value(0, ValueKind::U8),
            Err(ClientError::NoReply { .. })
        ));
    }
}
