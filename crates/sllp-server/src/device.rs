use bytes::Bytes;
use sllp_frame::{
    decode_frame, CommandCode, ErrorCode, Frame, FrameError, Framing, Request, Response, Version,
    MAX_PAYLOAD,
};
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::curve::CurveStore;
use crate::error::{DeviceError, Result};
use crate::group::GroupManager;
use crate::handler::Handler;
use crate::registry::VariableRegistry;

const OVERFLOW_REPLY: [u8; 2] = [CommandCode::ErrInsufficientMemory as u8, 0x00];

/// The remote side of the variable protocol: decodes a frame, dispatches
/// it to the registry, group table or curve store, and encodes the reply.
#[derive(Debug, Clone)]
pub struct Device {
    registry: VariableRegistry,
    groups: GroupManager,
    curves: CurveStore,
}

impl Device {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        config.validate()?;
        let registry = VariableRegistry::new(&config.variables);
        let groups = GroupManager::new(&registry, config.max_groups);
        let curves = CurveStore::new(&config.curves);
        Ok(Self {
            registry,
            groups,
            curves,
        })
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut VariableRegistry {
        &mut self.registry
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn curves(&self) -> &CurveStore {
        &self.curves
    }

    /// Answer one decoded frame. Every outcome, including a rejection,
    /// is a reply frame.
    pub fn process(&mut self, frame: &Frame) -> Frame {
        let request = match Request::from_frame(frame) {
            Ok(request) => request,
            Err(err) => {
                let code = match err {
                    FrameError::UnknownCommand(_) => ErrorCode::OperationNotSupported,
                    FrameError::PayloadSize { .. } => ErrorCode::InvalidPayloadSize,
                    FrameError::InvalidValue(_) => ErrorCode::InvalidValue,
                    _ => ErrorCode::MalformedMessage,
                };
                warn!(command = frame.command, %err, ?code, "request rejected");
                return Frame::empty(code.command());
            }
        };

        let command = request.command();
        match self.execute(request) {
            Ok(response) => {
                debug!(%command, reply = %response.command(), "request served");
                response.to_frame()
            }
            Err(err) => {
                let code = err.code();
                warn!(%command, %err, ?code, "request rejected");
                Frame::empty(code.command())
            }
        }
    }

    fn execute(&mut self, request: Request) -> std::result::Result<Response, DeviceError> {
        let response = match request {
            Request::QueryStatus => Response::Status(Version::CURRENT),
            Request::QueryVariables => Response::VariableList(self.registry.infos()),
            Request::QueryGroups => Response::GroupList(self.groups.infos()),
            Request::QueryGroup(id) => Response::Group(self.groups.get(id)?.members().to_vec()),
            Request::QueryCurves => Response::CurveList(self.curves.infos()),
            Request::ReadVariable(id) => {
                Response::VariableReading(Bytes::copy_from_slice(self.registry.read(id)?))
            }
            Request::ReadGroup(id) => {
                let reading = self.groups.read(&self.registry, id)?;
                if reading.len() > MAX_PAYLOAD {
                    return Err(DeviceError::InsufficientMemory {
                        what: "reply frame",
                        capacity: MAX_PAYLOAD,
                    });
                }
                Response::GroupReading(reading)
            }
            Request::WriteVariable { id, value } => {
                self.registry.write(id, &value)?;
                Response::Ok
            }
            Request::WriteGroup { id, values } => {
                self.groups.write(&mut self.registry, id, &values)?;
                Response::Ok
            }
            Request::BinaryOpVariable { id, op, mask } => {
                self.registry.apply(id, op, &mask)?;
                Response::Ok
            }
            Request::BinaryOpGroup { id, op, mask } => {
                self.groups.apply(&mut self.registry, id, op, &mask)?;
                Response::Ok
            }
            Request::CreateGroup(ids) => {
                self.groups.create(&self.registry, &ids)?;
                Response::Ok
            }
            Request::RemoveAllGroups => {
                self.groups.remove_all();
                Response::Ok
            }
            Request::CurveBlock { curve, index, data } => {
                self.curves.begin_block(curve, index, &data)?;
                Response::Ok
            }
            Request::CurveTransmit { curve, checksum } => {
                self.curves.finish(curve, &checksum)?;
                Response::Ok
            }
            Request::CurveRecalcChecksum(curve) => {
                self.curves.recalc_checksum(curve)?;
                Response::Ok
            }
        };
        Ok(response)
    }
}

impl Handler for Device {
    fn framing(&self) -> Framing {
        Framing::Variable
    }

    fn handle(&mut self, request: &[u8]) -> Bytes {
        let reply = match decode_frame(request) {
            Ok(frame) => self.process(&frame),
            Err(err) => {
                warn!(%err, "undecodable frame");
                Frame::empty(CommandCode::ErrMalformedMessage)
            }
        };
        match reply.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "reply does not fit a frame");
                Bytes::from_static(&OVERFLOW_REPLY)
            }
        }
    }
}
