//! Compression options in their string form.
//!
//! Syntax: `<mode>:<key>=<value>;<key>=<value>`, e.g. `"zstd1:ExplicitLevel=2"`.
//! The parameter list may be empty (`"zstd0:"`). The options only travel with
//! each tile to the storage engine; nothing here compresses data.

use std::fmt;
use std::str::FromStr;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    #[default]
    Uncompressed,
    Zstd0,
    Zstd1,
}

impl CompressionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CompressionMode::Uncompressed => "uncompressed",
            CompressionMode::Zstd0 => "zstd0",
            CompressionMode::Zstd1 => "zstd1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressionOptions {
    pub mode: CompressionMode,
    /// Explicit zstd level.
    pub explicit_level: Option<i32>,
    /// Split 16-bit samples into low and high byte planes before compressing.
    pub hi_lo_byte_unpack: bool,
}

impl CompressionOptions {
    #[must_use]
    pub fn uncompressed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn zstd1(level: Option<i32>) -> Self {
        Self {
            mode: CompressionMode::Zstd1,
            explicit_level: level,
            hi_lo_byte_unpack: false,
        }
    }
}

impl FromStr for CompressionOptions {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidCompression(s.to_string());

        let (mode, params) = s.trim().split_once(':').ok_or_else(invalid)?;
        let mode = match mode.trim().to_ascii_lowercase().as_str() {
            "uncompressed" => CompressionMode::Uncompressed,
            "zstd0" => CompressionMode::Zstd0,
            "zstd1" => CompressionMode::Zstd1,
            _ => return Err(invalid()),
        };

        let mut options = Self {
            mode,
            ..Self::default()
        };
        for param in params.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = param.split_once('=').ok_or_else(invalid)?;
            match key.trim() {
                "ExplicitLevel" => {
                    options.explicit_level = Some(value.trim().parse().map_err(|_| invalid())?);
                }
                "PreProcess" if value.trim() == "HiLoByteUnpack" => {
                    options.hi_lo_byte_unpack = true;
                }
                _ => return Err(invalid()),
            }
        }
        Ok(options)
    }
}

impl fmt::Display for CompressionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.mode.as_str())?;
        let mut params = Vec::new();
        if let Some(level) = self.explicit_level {
            params.push(format!("ExplicitLevel={level}"));
        }
        if self.hi_lo_byte_unpack {
            params.push("PreProcess=HiLoByteUnpack".to_string());
        }
        f.write_str(&params.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        for (text, mode) in [
            ("uncompressed:", CompressionMode::Uncompressed),
            ("zstd0:", CompressionMode::Zstd0),
            ("zstd1:", CompressionMode::Zstd1),
        ] {
            let opts: CompressionOptions = text.parse().unwrap();
            assert_eq!(opts.mode, mode);
            assert_eq!(opts.explicit_level, None);
        }
    }

    #[test]
    fn test_parse_parameters() {
        let opts: CompressionOptions = "zstd1:ExplicitLevel=2;PreProcess=HiLoByteUnpack".parse().unwrap();
        assert_eq!(opts.mode, CompressionMode::Zstd1);
        assert_eq!(opts.explicit_level, Some(2));
        assert!(opts.hi_lo_byte_unpack);
        assert_eq!(opts.to_string(), "zstd1:ExplicitLevel=2;PreProcess=HiLoByteUnpack");

        let opts: CompressionOptions = "zstd0:ExplicitLevel=0".parse().unwrap();
        assert_eq!(opts.explicit_level, Some(0));
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["hello", "lzw:", "zstd1:Level=2", "zstd1:ExplicitLevel=abc", "zstd0:foo"] {
            let err = text.parse::<CompressionOptions>().unwrap_err();
            assert!(err.to_string().contains("could not be processed"), "{text}");
        }
    }
}
