//! # Ground Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::LinkParams;
use util::params::{check_positive, InvalidParam};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GndExecParams {
    /// The ground end of the link, which connects to the rover.
    pub link: LinkParams,

    /// Units: Hz
    pub main_rate_hz: f64,

    /// Rate at which RC demands are repeated while RC is active.
    ///
    /// Units: Hz
    pub rc_send_rate_hz: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for GndExecParams {
    fn default() -> Self {
        Self {
            link: LinkParams::default(),
            main_rate_hz: 50.0,
            rc_send_rate_hz: 10.0,
        }
    }
}

impl GndExecParams {
    pub fn validate(&self) -> Result<(), InvalidParam> {
        self.link.validate()?;
        check_positive("main_rate_hz", self.main_rate_hz)?;
        check_positive("rc_send_rate_hz", self.rc_send_rate_hz)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p: GndExecParams = util::params::from_str(
            r#"
            [link]
            host = "192.168.0.42"
            "#,
        )
        .unwrap();

        assert_eq!(p.link.host, "192.168.0.42");
        assert!(!p.link.bind);
        assert_eq!(p.rc_send_rate_hz, 10.0);
    }

    #[test]
    fn test_validate() {
        assert!(GndExecParams::default().validate().is_ok());

        let p: GndExecParams = util::params::from_str("rc_send_rate_hz = 0.0").unwrap();
        assert_eq!(p.validate().unwrap_err().name, "rc_send_rate_hz");

        let p: GndExecParams = util::params::from_str("[link]\nslow_rate_hz = 0.0").unwrap();
        assert_eq!(p.validate().unwrap_err().name, "link.slow_rate_hz");
    }
}
