use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

/// Boxed, sendable future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Build mode, substituted into path templates as `#MODE_NAME#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn from_production_flag(production: bool) -> Self {
        if production {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!(
                "invalid mode: {other} (expected \"development\" or \"production\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_flag_maps_to_mode_name() {
        assert_eq!(Mode::from_production_flag(true).as_str(), "production");
        assert_eq!(Mode::from_production_flag(false).as_str(), "development");
    }

    #[test]
    fn parses_short_names() {
        assert_eq!("prod".parse::<Mode>(), Ok(Mode::Production));
        assert_eq!(" Development ".parse::<Mode>(), Ok(Mode::Development));
        assert!("staging".parse::<Mode>().is_err());
    }
}
