//! Calibration sequence descriptions read from per-user settings.

use super::{generators, Segment};
use crate::{
    constants::{DEFAULT_GRID_SIZE, DEFAULT_PULSE_TIME, MAX_GRID_SIZE, MIN_GRID_SIZE},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Named sweep speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl Speed {
    /// Seconds taken to sweep across the full screen
    #[must_use]
    pub const fn scan_time(self) -> f64 {
        match self {
            Self::Slow => 6.0,
            Self::Medium => 4.0,
            Self::Fast => 2.0,
        }
    }
}

impl FromStr for Speed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "medium" => Ok(Self::Medium),
            "fast" => Ok(Self::Fast),
            _ => Err(Error::ConfigError(format!("Unknown calibration speed: {s}"))),
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Fast => "fast",
        };
        f.write_str(name)
    }
}

/// Pattern the targets follow after the introductory messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceTemplate {
    /// Horizontal sweeps followed by vertical sweeps
    #[default]
    ScanXy,
    ScanX,
    ScanY,
    Grid,
    Zigzag,
}

impl FromStr for SequenceTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "scan_xy" | "scanxy" => Ok(Self::ScanXy),
            "scan_x" | "scanx" => Ok(Self::ScanX),
            "scan_y" | "scany" => Ok(Self::ScanY),
            "grid" => Ok(Self::Grid),
            "zigzag" => Ok(Self::Zigzag),
            _ => Err(Error::ConfigError(format!("Unknown sequence template: {s}"))),
        }
    }
}

impl SequenceTemplate {
    /// Canonical name, also used to tag the samples it elicits
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScanXy => "scan_xy",
            Self::ScanX => "scan_x",
            Self::ScanY => "scan_y",
            Self::Grid => "grid",
            Self::Zigzag => "zigzag",
        }
    }
}

impl fmt::Display for SequenceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message shown before the targets start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub text: String,
    /// Hold time in seconds, excluding the fades
    pub time: f64,
    /// Append the elapsed whole seconds to the text
    #[serde(default)]
    pub show_elapsed: bool,
}

/// Everything needed to derive a calibration timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceSpec {
    /// Grid density
    pub size: usize,
    pub speed: Speed,
    pub template: SequenceTemplate,
    /// Seconds each pulse lasts
    pub pulse_time: f64,
    pub intro: Option<MessageSpec>,
    pub instructions: Option<MessageSpec>,
}

impl Default for SequenceSpec {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            speed: Speed::default(),
            template: SequenceTemplate::default(),
            pulse_time: DEFAULT_PULSE_TIME,
            intro: Some(MessageSpec {
                text: "Calibration is about to start. Keep your head still.".to_string(),
                time: 2.0,
                show_elapsed: false,
            }),
            instructions: Some(MessageSpec {
                text: "Follow the dot with your eyes".to_string(),
                time: 3.0,
                show_elapsed: true,
            }),
        }
    }
}

impl SequenceSpec {
    /// Check the description before expanding it
    ///
    /// # Errors
    ///
    /// Returns an error for a grid size outside the accepted range or
    /// non-positive timings
    pub fn validate(&self) -> Result<()> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.size) {
            return Err(Error::SequenceError(format!(
                "Grid size must be between {MIN_GRID_SIZE} and {MAX_GRID_SIZE}, got {}",
                self.size
            )));
        }
        if !(self.pulse_time.is_finite() && self.pulse_time > 0.0) {
            return Err(Error::SequenceError(format!(
                "Pulse time must be positive, got {}",
                self.pulse_time
            )));
        }
        for message in self.intro.iter().chain(self.instructions.iter()) {
            if !(message.time.is_finite() && message.time >= 0.0) {
                return Err(Error::SequenceError(format!(
                    "Message time must be non-negative, got {}",
                    message.time
                )));
            }
        }
        Ok(())
    }

    /// Expand into the segment tree: messages first, then the template
    #[must_use]
    pub fn expand(&self) -> Segment {
        let scan_time = self.speed.scan_time();
        let mut children: Vec<Segment> = self
            .intro
            .iter()
            .chain(self.instructions.iter())
            .map(|m| generators::message(&m.text, m.time, m.show_elapsed))
            .collect();

        match self.template {
            SequenceTemplate::ScanXy => {
                children.push(generators::scan_x(self.size, scan_time, self.pulse_time));
                children.push(generators::scan_y(self.size, scan_time, self.pulse_time));
            }
            SequenceTemplate::ScanX => children.push(generators::scan_x(self.size, scan_time, self.pulse_time)),
            SequenceTemplate::ScanY => children.push(generators::scan_y(self.size, scan_time, self.pulse_time)),
            SequenceTemplate::Grid => children.push(generators::grid(self.size, scan_time / 2.0)),
            SequenceTemplate::Zigzag => children.push(generators::zigzag(self.size, scan_time, self.pulse_time)),
        }

        Segment::list(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_names() {
        assert_eq!("slow".parse::<Speed>().unwrap().scan_time(), 6.0);
        assert_eq!("Medium".parse::<Speed>().unwrap().scan_time(), 4.0);
        assert_eq!("fast".parse::<Speed>().unwrap().scan_time(), 2.0);
        assert!("warp".parse::<Speed>().is_err());
    }

    #[test]
    fn test_default_sequence_duration() {
        let spec = SequenceSpec::default();
        // intro 2+1, instructions 3+1, scan_x and scan_y 4 * (2 * 0.75 + 4) each
        let expected = 3.0 + 4.0 + 2.0 * 22.0;
        assert!((spec.expand().duration() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_validate_grid_size() {
        let mut spec = SequenceSpec::default();
        spec.size = 2;
        assert!(spec.validate().is_err());
        spec.size = 8;
        assert!(spec.validate().is_err());
        spec.size = 7;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_template_parse() {
        assert_eq!("scan-xy".parse::<SequenceTemplate>().unwrap(), SequenceTemplate::ScanXy);
        assert_eq!("zigzag".parse::<SequenceTemplate>().unwrap(), SequenceTemplate::Zigzag);
        assert!("spiral".parse::<SequenceTemplate>().is_err());
    }
}
