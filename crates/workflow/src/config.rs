//! Behaviour switches for one import dialog variant.

use mde_core::upload::ExtractionOptions;

/// Controller configuration.
///
/// | Field | Default | Effect |
/// |---|---|---|
/// | `allow_folder_upload` | `true` | Accept folder selections besides archives |
/// | `require_destination_selection` | `true` | Resolve a project/system before extraction |
/// | `show_advanced_options` | `true` | Honour [`ExtractionOptions`] set by the user |
/// | `default_include_method_dependencies` | `true` | Value used when options are hidden |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub allow_folder_upload: bool,
    pub require_destination_selection: bool,
    pub show_advanced_options: bool,
    pub default_include_method_dependencies: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            allow_folder_upload: true,
            require_destination_selection: true,
            show_advanced_options: true,
            default_include_method_dependencies: true,
        }
    }
}

impl ControllerConfig {
    /// Archive upload straight to extraction, no destination picker and no
    /// options.
    pub fn archive_only() -> Self {
        Self {
            allow_folder_upload: false,
            require_destination_selection: false,
            show_advanced_options: false,
            ..Self::default()
        }
    }

    pub fn default_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            include_method_dependencies: self.default_include_method_dependencies,
        }
    }

    /// The options actually sent: user choices when they are shown,
    /// otherwise the default.
    pub fn effective_options(&self, chosen: ExtractionOptions) -> ExtractionOptions {
        if self.show_advanced_options {
            chosen
        } else {
            self.default_options()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_options_pin_default() {
        let config = ControllerConfig {
            show_advanced_options: false,
            default_include_method_dependencies: true,
            ..ControllerConfig::default()
        };
        let chosen = ExtractionOptions {
            include_method_dependencies: false,
        };
        assert!(config.effective_options(chosen).include_method_dependencies);
    }

    #[test]
    fn shown_options_are_honoured() {
        let config = ControllerConfig::default();
        let chosen = ExtractionOptions {
            include_method_dependencies: false,
        };
        assert_eq!(config.effective_options(chosen), chosen);
    }

    #[test]
    fn archive_only_preset() {
        let config = ControllerConfig::archive_only();
        assert!(!config.allow_folder_upload);
        assert!(!config.require_destination_selection);
        assert!(config.default_options().include_method_dependencies);
    }
}
