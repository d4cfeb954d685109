//! Configuration for the cbmimage crate.
//!
//! Settings are layered the same way the rest of this codebase layers
//! them: defaults, an optional TOML file, then an `APP_`-prefixed
//! environment override (see [`Configuration::load`]).
#![warn(missing_docs)]
#![warn(unsafe_code)]

use crate::error;

#[cfg(feature = "commodore")]
use forbidden_bands::{self, petscii::PetsciiString, Configuration as ForbiddenBandsConfiguration};

/// Settings that influence parsing and validation policy.
///
/// These are library-level toggles, not a CLI's flags: the interactive
/// driver itself is out of scope for this crate (see SPEC_FULL.md §1), but
/// a caller embedding the engine still needs a place to put "be lenient
/// about this" switches.
pub struct Config {
    /// Version of the configuration root.
    pub version: String,

    /// The general settings, loaded via the `config` crate.
    pub settings: config::Config,

    /// A mapping for PETSCII systems, used when rendering disk/file names.
    #[cfg(feature = "commodore")]
    pub forbidden_bands_config: forbidden_bands::Config,
}

impl Config {
    /// When set, a length match against the error-map variant of a format
    /// is accepted even when the trailing bytes look implausible. Default
    /// `false`.
    pub fn ignore_checksums(&self) -> bool {
        self.settings.get_bool("ignore-checksums").unwrap_or(false)
    }

    /// When set, directory entries naming a sub-partition are followed by
    /// `chdir`. Default `true`; set to `false` to treat every
    /// partition-table entry as opaque.
    pub fn allow_partition_traversal(&self) -> bool {
        self.settings
            .get_bool("allow-partition-traversal")
            .unwrap_or(true)
    }

    /// When set, the `"GEOS format V1."` header probe is attempted at
    /// open time. Default `true`.
    pub fn geos_probe(&self) -> bool {
        self.settings.get_bool("geos-probe").unwrap_or(true)
    }

    /// Render a raw 16-byte PETSCII disk or file name for display,
    /// stripping trailing shifted-space (`0xA0`) padding.
    ///
    /// Grounded on `d64_file_entry_parser`/`D64BlockAvailabilityMap::parse`
    /// (`examples/jgerrish-image-rider/src/disk_format/commodore/d64.rs`).
    #[cfg(feature = "commodore")]
    pub fn render_petscii_name(&self, raw: &[u8; 16]) -> String {
        let ps: PetsciiString<'_, 16> = PetsciiString::from_byte_slice_strip_shifted_space_with_config(
            raw,
            &self.forbidden_bands_config.petscii,
        );
        ps.to_string()
    }
}

/// Trait that defines a set of methods that allow loading and unloading
/// configuration data.
pub trait Configuration {
    /// Load the configuration data from a pre-built `config::Config`.
    fn load(settings: config::Config) -> std::result::Result<Config, error::Error>;
}

impl Configuration for Config {
    fn load(settings: config::Config) -> std::result::Result<Config, error::Error> {
        #[cfg(feature = "commodore")]
        let forbidden_bands_config =
            forbidden_bands::Config::load().expect("Error loading forbidden bands config");

        let config = Config {
            version: String::from("0.1.0"),
            settings,
            #[cfg(feature = "commodore")]
            forbidden_bands_config,
        };

        Ok(config)
    }
}

/// Build settings from an optional TOML file plus `APP_`-prefixed
/// environment overrides, mirroring the teacher's example loader.
pub fn load_settings(config_name: &str) -> std::result::Result<config::Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name(config_name).required(false))
        .add_source(config::Environment::with_prefix("APP"))
        .build()
}
