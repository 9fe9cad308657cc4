//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable ({}) is not set", crate::host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

/// A parameter whose value cannot be used.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid value for `{name}`: {reason}")]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `$ROVER_SW_ROOT/params` directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_from_path<P, T>(path: T) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    T: AsRef<Path>
{
    // Load the file into a string
    let params_str = read_to_string(path)
        .map_err(LoadError::FileLoadError)?;

    from_str(&params_str)
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

/// Check that `value` is finite and strictly positive, as is required of rates and scales.
pub fn check_positive(name: &str, value: f64) -> Result<(), InvalidParam> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("expected a positive number, found {}", value)))
    }
}

/// Check that `value` is finite and not negative.
pub fn check_non_negative(name: &str, value: f64) -> Result<(), InvalidParam> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("expected a non-negative number, found {}", value)))
    }
}

/// Check that a count is not zero.
pub fn check_non_zero(name: &str, value: usize) -> Result<(), InvalidParam> {
    if value > 0 {
        Ok(())
    } else {
        Err(invalid(name, "must not be zero".into()))
    }
}

fn invalid(name: &str, reason: String) -> InvalidParam {
    InvalidParam {
        name: name.into(),
        reason,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestParams {
        rate_hz: f64,

        #[serde(default)]
        name: String,
    }

    #[test]
    fn test_from_str() {
        let p: TestParams = from_str("rate_hz = 30.0\nname = \"link\"").unwrap();
        assert_eq!(p, TestParams { rate_hz: 30.0, name: "link".into() });

        let p: TestParams = from_str("rate_hz = 2.5").unwrap();
        assert_eq!(p.name, "");

        assert!(matches!(
            from_str::<TestParams>("rate_hz = \"fast\""),
            Err(LoadError::DeserialiseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_from_path::<TestParams, _>("/definitely/not/a/params.toml"),
            Err(LoadError::FileLoadError(_))
        ));
    }

    #[test]
    fn test_checks() {
        assert!(check_positive("rate_hz", 0.5).is_ok());
        assert!(check_positive("rate_hz", 0.0).is_err());
        assert!(check_positive("rate_hz", -1.0).is_err());
        assert!(check_positive("rate_hz", f64::NAN).is_err());
        assert!(check_positive("rate_hz", f64::INFINITY).is_err());

        assert!(check_non_negative("timeout_s", 0.0).is_ok());
        assert!(check_non_negative("timeout_s", -0.1).is_err());

        assert!(check_non_zero("size", 1).is_ok());
        assert_eq!(
            check_non_zero("size", 0),
            Err(InvalidParam {
                name: "size".into(),
                reason: "must not be zero".into()
            })
        );
    }
}
