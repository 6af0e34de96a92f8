use core::fmt;

type ProtoLicenseType = drm_widevine_proto::LicenseType;

/**
    Client platform recorded in a WVD file header.

    Chrome devices draw request ids from the RNG; Android devices use the
    counter-based layout (see `session::generate_request_id`).
*/
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Chrome = 1,
    Android = 2,
}

impl DeviceType {
    pub const fn from_u8(u: u8) -> Option<Self> {
        Some(match u {
            1 => Self::Chrome,
            2 => Self::Android,
            _ => return None,
        })
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Chrome => "chrome",
            Self::Android => "android",
        };
        f.write_str(label)
    }
}

/**
    Robustness tier of the device. Informational only; nothing in the
    exchange depends on it.
*/
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    L1 = 1,
    L2 = 2,
    L3 = 3,
}

impl SecurityLevel {
    pub const fn from_u8(u: u8) -> Option<Self> {
        Some(match u {
            1 => Self::L1,
            2 => Self::L2,
            3 => Self::L3,
            _ => return None,
        })
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.to_u8())
    }
}

/**
    Which license flavour a challenge asks for. Absent or unrecognised
    wire values read as [`LicenseType::Streaming`].
*/
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseType {
    #[default]
    Streaming,
    Offline,
    Automatic,
}

impl LicenseType {
    pub fn from_proto_raw(raw: Option<i32>) -> Self {
        match raw.map(ProtoLicenseType::try_from) {
            Some(Ok(proto)) => proto.into(),
            _ => Self::default(),
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ProtoLicenseType::from(*self).as_str_name())
    }
}

impl From<LicenseType> for ProtoLicenseType {
    fn from(lt: LicenseType) -> Self {
        match lt {
            LicenseType::Streaming => Self::Streaming,
            LicenseType::Offline => Self::Offline,
            LicenseType::Automatic => Self::Automatic,
        }
    }
}

impl From<ProtoLicenseType> for LicenseType {
    fn from(proto: ProtoLicenseType) -> Self {
        match proto {
            ProtoLicenseType::Streaming => Self::Streaming,
            ProtoLicenseType::Offline => Self::Offline,
            ProtoLicenseType::Automatic => Self::Automatic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_header_bytes() {
        assert_eq!(DeviceType::from_u8(2), Some(DeviceType::Android));
        assert_eq!(DeviceType::Chrome.to_u8(), 1);
        assert!(DeviceType::from_u8(0).is_none());
        assert_eq!(SecurityLevel::from_u8(3), Some(SecurityLevel::L3));
        assert!(SecurityLevel::from_u8(4).is_none());
    }

    #[test]
    fn display_labels() {
        assert_eq!(DeviceType::Android.to_string(), "android");
        assert_eq!(SecurityLevel::L1.to_string(), "L1");
        assert_eq!(LicenseType::Offline.to_string(), "OFFLINE");
    }

    #[test]
    fn missing_or_unknown_license_type_is_streaming() {
        assert_eq!(LicenseType::from_proto_raw(None), LicenseType::Streaming);
        assert_eq!(LicenseType::from_proto_raw(Some(0)), LicenseType::Streaming);
        assert_eq!(LicenseType::from_proto_raw(Some(99)), LicenseType::Streaming);
        assert_eq!(LicenseType::from_proto_raw(Some(2)), LicenseType::Offline);
        assert_eq!(LicenseType::from_proto_raw(Some(3)), LicenseType::Automatic);
    }
}
