//! # Loader Configuration
//!
//! A small `key = value` file, one setting per line:
//!
//! ```text
//! # \boot\guaboot.conf
//! kernel  = \boot\kernel.elf
//! cmdline = console=ttyS0 loglevel=7
//! module  = \boot\uk_space.elf
//! module  = \boot\uk_time.elf
//! verbose = no
//! ```
//!
//! Blank lines and lines starting with `#` are ignored, as are unknown keys
//! (with a warning). Everything the file does not set keeps its default.

use guaboot_info::boot::MAX_MODULES;
use log::{LevelFilter, warn};

/// Where both firmware paths look for the kernel by default.
pub const DEFAULT_KERNEL_PATH: &str = "\\boot\\kernel.elf";

/// Where the UEFI loader looks for its configuration file.
pub const CONFIG_PATH: &str = "\\boot\\guaboot.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Line {line} is not a `key = value` pair")]
    MalformedLine { line: usize },
    #[error("Line {line} has a value that cannot be parsed")]
    UnknownValue { line: usize },
    #[error("Line {line} adds more than {MAX_MODULES} modules")]
    TooManyModules { line: usize },
}

/// Run-time loader settings, borrowing from the configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig<'a> {
    pub kernel_path: &'a str,
    pub command_line: &'a str,
    pub modules: heapless::Vec<&'a str, MAX_MODULES>,
    pub verbose: bool,
    /// Overrides the firmware-reported boot device.
    pub boot_device: Option<u32>,
}

impl<'a> LoaderConfig<'a> {
    /// Defaults with the given kernel command line.
    #[must_use]
    pub const fn new(command_line: &'a str) -> Self {
        Self {
            kernel_path: DEFAULT_KERNEL_PATH,
            command_line,
            modules: heapless::Vec::new(),
            verbose: true,
            boot_device: None,
        }
    }

    /// Apply the settings in `text` on top of `self`.
    ///
    /// # Errors
    /// The first malformed line, unparsable value or module past
    /// [`MAX_MODULES`].
    pub fn parse(mut self, text: &'a str) -> Result<Self, ConfigError> {
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or(ConfigError::MalformedLine { line })?;
            if key.is_empty() {
                return Err(ConfigError::MalformedLine { line });
            }

            match key {
                "kernel" => self.kernel_path = value,
                "cmdline" => self.command_line = value,
                "module" => self
                    .modules
                    .push(value)
                    .map_err(|_| ConfigError::TooManyModules { line })?,
                "verbose" => {
                    self.verbose = parse_bool(value).ok_or(ConfigError::UnknownValue { line })?;
                }
                "boot_device" => {
                    self.boot_device =
                        Some(parse_u32(value).ok_or(ConfigError::UnknownValue { line })?);
                }
                _ => warn!("Ignoring unknown configuration key `{key}` on line {line}"),
            }
        }
        Ok(self)
    }

    /// `Debug` when verbose, `Info` otherwise.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoaderConfig::new("console=ttyS0");
        assert_eq!(config.kernel_path, "\\boot\\kernel.elf");
        assert_eq!(config.command_line, "console=ttyS0");
        assert!(config.modules.is_empty());
        assert!(config.verbose);
        assert_eq!(config.boot_device, None);
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn empty_text_keeps_defaults() {
        let config = LoaderConfig::new("x").parse("").unwrap();
        assert_eq!(config, LoaderConfig::new("x"));
    }

    #[test]
    fn full_file() {
        let text = "\
# loader settings
kernel = \\efi\\guardbsd\\kernel.elf

cmdline = root=/dev/ram0 debug=true
module = \\boot\\uk_space.elf
module=\\boot\\uk_time.elf
verbose = off
boot_device = 0x80
";
        let config = LoaderConfig::new("console=ttyS0").parse(text).unwrap();
        assert_eq!(config.kernel_path, "\\efi\\guardbsd\\kernel.elf");
        assert_eq!(config.command_line, "root=/dev/ram0 debug=true");
        assert_eq!(
            config.modules.as_slice(),
            &["\\boot\\uk_space.elf", "\\boot\\uk_time.elf"]
        );
        assert!(!config.verbose);
        assert_eq!(config.log_level(), LevelFilter::Info);
        assert_eq!(config.boot_device, Some(0x80));
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let config = LoaderConfig::new("").parse("cmdline = a=b c=d").unwrap();
        assert_eq!(config.command_line, "a=b c=d");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = LoaderConfig::new("").parse("autoboot_delay = 3").unwrap();
        assert_eq!(config, LoaderConfig::new(""));
    }

    #[test]
    fn line_without_equals_is_malformed() {
        assert_eq!(
            LoaderConfig::new("").parse("# ok\nkernel"),
            Err(ConfigError::MalformedLine { line: 2 })
        );
        assert_eq!(
            LoaderConfig::new("").parse(" = value"),
            Err(ConfigError::MalformedLine { line: 1 })
        );
    }

    #[test]
    fn bad_values() {
        assert_eq!(
            LoaderConfig::new("").parse("verbose = maybe"),
            Err(ConfigError::UnknownValue { line: 1 })
        );
        assert_eq!(
            LoaderConfig::new("").parse("boot_device = 0xZZ"),
            Err(ConfigError::UnknownValue { line: 1 })
        );
        assert_eq!(
            LoaderConfig::new("").parse("boot_device = 128").unwrap().boot_device,
            Some(128)
        );
    }

    #[test]
    fn module_limit() {
        let mut text = String::new();
        for i in 0..=MAX_MODULES {
            text.push_str(&format!("module = m{i}\n"));
        }
        assert_eq!(
            LoaderConfig::new("").parse(&text),
            Err(ConfigError::TooManyModules {
                line: MAX_MODULES + 1
            })
        );
    }
}
