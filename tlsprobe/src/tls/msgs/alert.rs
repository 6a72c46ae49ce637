use crate::{
    codec::{Codec, Reader},
    tls::msgs::enums::{AlertDescription, AlertLevel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertMessagePayload {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl AlertMessagePayload {
    /// Only a WARNING is tolerated; unknown levels count as fatal.
    pub fn is_fatal(&self) -> bool {
        self.level != AlertLevel::Warning
    }
}

impl Codec for AlertMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.level.encode(bytes);
        self.description.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let level = AlertLevel::read(r)?;
        let description = AlertDescription::read(r)?;

        Some(Self { level, description })
    }
}
