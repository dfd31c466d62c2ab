// SPDX-License-Identifier: GPL-3.0-only

//! Sysfs torch LEDs
//!
//! Phones wire the rear flash as a separate LED class device instead of a
//! V4L2 control. Such LEDs show up as `/sys/class/leds/<colour>:flash` or
//! `<colour>:torch`; writing the `brightness` file lights them steadily.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LEDS_DIR: &str = "/sys/class/leds";
const LED_SUFFIXES: [&str; 2] = [":flash", ":torch"];

/// A writable flash or torch LED
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorchLed {
    dir: PathBuf,
    name: String,
    max_brightness: u32,
}

impl TorchLed {
    /// All usable LEDs on this system, ordered by name
    pub fn discover() -> Vec<TorchLed> {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// All usable LEDs below `leds_dir`, ordered by name
    pub fn discover_in(leds_dir: &Path) -> Vec<TorchLed> {
        let entries = match std::fs::read_dir(leds_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %leds_dir.display(), error = %e, "No LED class directory");
                return Vec::new();
            }
        };

        let mut leds: Vec<TorchLed> = entries
            .flatten()
            .filter_map(|entry| match Self::open(&entry.path()) {
                Ok(led) => Some(led),
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "LED skipped");
                    None
                }
            })
            .collect();
        leds.sort_by(|a, b| a.name.cmp(&b.name));
        leds
    }

    /// Probe one LED class directory
    pub fn open(dir: &Path) -> io::Result<TorchLed> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| LED_SUFFIXES.iter().any(|suffix| n.ends_with(suffix)))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a flash LED"))?
            .to_string();

        let max_brightness = std::fs::read_to_string(dir.join("max_brightness"))?
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|max| *max > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad max_brightness"))?;

        // Needs the feedbackd group on most phone distributions
        std::fs::OpenOptions::new()
            .write(true)
            .open(dir.join("brightness"))?;

        info!(%name, max_brightness, "Found torch LED");
        Ok(TorchLed {
            dir: dir.to_path_buf(),
            name,
            max_brightness,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    /// Light the LED at full brightness, or switch it off
    pub fn set(&self, on: bool) -> io::Result<()> {
        let level = if on { self.max_brightness } else { 0 };
        std::fs::write(self.dir.join("brightness"), level.to_string())?;
        debug!(name = %self.name, level, "Torch LED written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("max_brightness"), max).unwrap();
        std::fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let root = tempfile::tempdir().unwrap();
        make_led(root.path(), "yellow:flash", "10\n");
        make_led(root.path(), "white:torch", "255\n");
        make_led(root.path(), "input0::capslock", "1\n");
        make_led(root.path(), "red:flash", "0\n");

        let names: Vec<String> = TorchLed::discover_in(root.path())
            .into_iter()
            .map(|led| led.name().to_string())
            .collect();
        assert_eq!(names, ["white:torch", "yellow:flash"]);
    }

    #[test]
    fn test_set_writes_full_or_zero() {
        let root = tempfile::tempdir().unwrap();
        let dir = make_led(root.path(), "white:flash", "200");
        let led = TorchLed::open(&dir).unwrap();
        assert_eq!(led.max_brightness(), 200);

        led.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "200");
        led.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "0");
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        assert!(TorchLed::discover_in(Path::new("/nonexistent/leds")).is_empty());
    }
}
