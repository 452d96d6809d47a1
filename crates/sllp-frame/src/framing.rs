use std::fmt;
use std::str::FromStr;

use sllp_transport::MessageEnd;

use crate::codec::VARIABLE_MESSAGE_END;
use crate::control::CONTROL_MESSAGE_END;
use crate::error::FrameError;

/// Which framing discipline a connection speaks. Chosen when the
/// connection is built, never per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Framing {
    /// `FDB:` text records for scalar supply control.
    Control,
    /// `[command][length][payload]` frames for variables, groups and curves.
    #[default]
    Variable,
}

impl Framing {
    /// How a message of this framing ends on the stream.
    pub fn message_end(self) -> MessageEnd {
        match self {
            Framing::Control => CONTROL_MESSAGE_END,
            Framing::Variable => VARIABLE_MESSAGE_END,
        }
    }
}

impl FromStr for Framing {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "control" | "fdb" => Ok(Framing::Control),
            "variable" | "binary" => Ok(Framing::Variable),
            other => Err(FrameError::InvalidValue(format!("unknown framing '{other}'"))),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Control => f.write_str("control"),
            Framing::Variable => f.write_str("variable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("control".parse::<Framing>().unwrap(), Framing::Control);
        assert_eq!("FDB".parse::<Framing>().unwrap(), Framing::Control);
        assert_eq!("binary".parse::<Framing>().unwrap(), Framing::Variable);
        assert!("serial".parse::<Framing>().is_err());
    }

    #[test]
    fn message_ends_differ() {
        assert_eq!(Framing::Control.message_end(), MessageEnd::Terminator(b'\r'));
        assert_eq!(
            Framing::Variable.message_end(),
            MessageEnd::LengthPrefixed {
                header_len: 2,
                length_offset: 1
            }
        );
    }
}
