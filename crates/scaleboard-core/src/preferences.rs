//! Dashboard preferences: UI language, color theme and an optional custom logo.
//!
//! Preferences are stored alongside the credentials but are updated
//! independently and never require a connectivity probe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreferenceError;

/// Maximum decoded size of a custom logo (1 MiB).
pub const MAX_LOGO_BYTES: usize = 1024 * 1024;

/// Required prefix of a custom logo.
const LOGO_PREFIX: &str = "data:image/";

/// Supported UI languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
    Es,
    Ja,
    Zh,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
            Self::Es => "es",
            Self::Ja => "ja",
            Self::Zh => "zh",
        }
    }
}

impl FromStr for Language {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fr" => Ok(Self::Fr),
            "en" => Ok(Self::En),
            "es" => Ok(Self::Es),
            "ja" => Ok(Self::Ja),
            "zh" => Ok(Self::Zh),
            other => Err(PreferenceError::InvalidLanguage {
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported color themes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Green,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Green => "green",
        }
    }
}

impl FromStr for Theme {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            "green" => Ok(Self::Green),
            other => Err(PreferenceError::InvalidTheme {
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub language: Language,
    pub theme: Theme,
    pub custom_logo: Option<String>,
}

/// A partial preferences update. `None` means "leave unchanged".
///
/// `custom_logo` is doubly optional: `Some(None)` clears the logo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub language: Option<Language>,
    pub theme: Option<Theme>,
    pub custom_logo: Option<Option<String>>,
}

impl PreferencesUpdate {
    /// Build an update from raw request values, validating each one.
    ///
    /// Empty language or theme strings are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns the first [`PreferenceError`] encountered.
    pub fn parse(
        language: Option<&str>,
        theme: Option<&str>,
        custom_logo: Option<Option<String>>,
    ) -> Result<Self, PreferenceError> {
        let language = language
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()?;
        let theme = theme.filter(|s| !s.is_empty()).map(str::parse).transpose()?;
        if let Some(Some(logo)) = &custom_logo {
            validate_logo(logo)?;
        }
        Ok(Self {
            language,
            theme,
            custom_logo,
        })
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.theme.is_none() && self.custom_logo.is_none()
    }
}

impl Preferences {
    /// Merge the provided fields of `update` into `self`.
    pub fn apply(&mut self, update: &PreferencesUpdate) {
        if let Some(language) = update.language {
            self.language = language;
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(logo) = &update.custom_logo {
            self.custom_logo.clone_from(logo);
        }
    }
}

/// Check that a logo is an image data URI no larger than [`MAX_LOGO_BYTES`].
///
/// The size is estimated from the base64 length (`len * 3 / 4`).
///
/// # Errors
///
/// Returns [`PreferenceError::InvalidLogoFormat`] or
/// [`PreferenceError::LogoTooLarge`].
pub fn validate_logo(logo: &str) -> Result<(), PreferenceError> {
    if !logo.starts_with(LOGO_PREFIX) {
        return Err(PreferenceError::InvalidLogoFormat);
    }
    let size = logo.len().saturating_mul(3) / 4;
    if size > MAX_LOGO_BYTES {
        return Err(PreferenceError::LogoTooLarge {
            size,
            max: MAX_LOGO_BYTES,
        });
    }
    Ok(())
}
