use core::fmt;
use core::str::FromStr;

use drm_core::{ContentKey, ParseError};

/**
    Receives the CONTENT keys of every completed exchange, once per license.
*/
pub trait KeySink: Send + Sync {
    fn receive(&self, keys: &[ContentKey]);
}

impl<F> KeySink for F
where
    F: Fn(&[ContentKey]) + Send + Sync,
{
    fn receive(&self, keys: &[ContentKey]) {
        self(keys)
    }
}

/**
    Textual form of extracted keys.
*/
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// One `[CONTENT] kid:key` line per key.
    #[default]
    Default,
    /// `--key kid:key` arguments on one line.
    Mp4decrypt,
    /// `--keys key_id=kid:key=key` arguments on one line.
    ShakaPackager,
}

impl KeyFormat {
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Mp4decrypt => "mp4decrypt",
            Self::ShakaPackager => "shaka-packager",
        }
    }

    /**
        Render `keys` as lines of output.
    */
    pub fn render(self, keys: &[ContentKey]) -> Vec<String> {
        match self {
            Self::Default => keys.iter().map(|key| format!("{key:?}")).collect(),
            Self::Mp4decrypt => vec![join(keys, |key| format!("--key {key}"))],
            Self::ShakaPackager => vec![join(keys, |key| {
                format!("--keys key_id={}:key={}", key.kid_hex(), key.key_hex())
            })],
        }
    }
}

fn join(keys: &[ContentKey], arg: impl Fn(&ContentKey) -> String) -> String {
    keys.iter().map(arg).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

impl FromStr for KeyFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "mp4decrypt" => Ok(Self::Mp4decrypt),
            "shaka-packager" | "shaka" => Ok(Self::ShakaPackager),
            _ => Err(ParseError {
                kind: "key format",
                value: s.to_owned(),
            }),
        }
    }
}

/**
    Logs every key at info level in the configured format.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    format: KeyFormat,
}

impl LogSink {
    pub fn new(format: KeyFormat) -> Self {
        Self { format }
    }
}

impl KeySink for LogSink {
    fn receive(&self, keys: &[ContentKey]) {
        if keys.is_empty() {
            tracing::warn!("license carried no content keys");
            return;
        }
        for line in self.format.render(keys) {
            tracing::info!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn keys() -> Vec<ContentKey> {
        vec![
            ContentKey::new(
                hex!("00000000000000000000000000000001"),
                hex!("0102030405060708090a0b0c0d0e0f10"),
            )
            .unwrap(),
            ContentKey::new(hex!("aa000000000000000000000000000000"), [0xFF; 16]).unwrap(),
        ]
    }

    #[test]
    fn default_format_one_line_per_key() {
        assert_eq!(
            KeyFormat::Default.render(&keys()),
            vec![
                "[CONTENT] 00000000000000000000000000000001:0102030405060708090a0b0c0d0e0f10",
                "[CONTENT] aa000000000000000000000000000000:ffffffffffffffffffffffffffffffff",
            ]
        );
    }

    #[test]
    fn mp4decrypt_format() {
        assert_eq!(
            KeyFormat::Mp4decrypt.render(&keys()),
            vec![
                "--key 00000000000000000000000000000001:0102030405060708090a0b0c0d0e0f10 \
                 --key aa000000000000000000000000000000:ffffffffffffffffffffffffffffffff"
            ]
        );
    }

    #[test]
    fn shaka_format() {
        let rendered = KeyFormat::ShakaPackager.render(&keys()[..1]);
        assert_eq!(
            rendered,
            vec![
                "--keys key_id=00000000000000000000000000000001:key=0102030405060708090a0b0c0d0e0f10"
            ]
        );
    }

    #[test]
    fn parse_names() {
        assert_eq!("default".parse::<KeyFormat>().unwrap(), KeyFormat::Default);
        assert_eq!("MP4DECRYPT".parse::<KeyFormat>().unwrap(), KeyFormat::Mp4decrypt);
        assert_eq!("shaka-packager".parse::<KeyFormat>().unwrap(), KeyFormat::ShakaPackager);
        assert!("ffmpeg".parse::<KeyFormat>().is_err());
        for format in [KeyFormat::Default, KeyFormat::Mp4decrypt, KeyFormat::ShakaPackager] {
            assert_eq!(format.to_string().parse::<KeyFormat>().unwrap(), format);
        }
    }

    #[test]
    fn closures_are_sinks() {
        let count = std::sync::atomic::AtomicUsize::new(0);
        let sink = |keys: &[ContentKey]| {
            count.fetch_add(keys.len(), std::sync::atomic::Ordering::Relaxed);
        };
        sink.receive(&keys());
        assert_eq!(count.into_inner(), 2);
    }
}
