//! Named, bounded layout parameters that a host can expose as sliders.

use crate::error::{Error, Result};

pub const SHORT_RANGE_REPULSE_TERM: &str = "ShortRangeRepulseTerm";
pub const LONG_RANGE_REPULSE_TERM: &str = "LongRangeRepulseTerm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleType {
    #[default]
    Linear,
    /// Slider positions map to powers of ten.
    Log,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSetting {
    name: String,
    display_name: String,
    minimum: f32,
    maximum: f32,
    default: f32,
    value: f32,
    scale_type: ScaleType,
}

impl LayoutSetting {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        minimum: f32,
        maximum: f32,
        default: f32,
        scale_type: ScaleType,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            minimum,
            maximum,
            default,
            value: default,
            scale_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    pub fn maximum(&self) -> f32 {
        self.maximum
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    fn range(&self) -> f32 {
        self.maximum - self.minimum
    }

    /// Position of the current value on a [0, 1] slider.
    pub fn normalised_value(&self) -> f32 {
        match self.scale_type {
            ScaleType::Linear => {
                if self.range() == 0.0 {
                    0.0
                } else {
                    (self.value - self.minimum) / self.range()
                }
            }
            ScaleType::Log => {
                let log_min = self.minimum.log10();
                let log_range = self.maximum.log10() - log_min;
                if log_range == 0.0 {
                    0.0
                } else {
                    (self.value.log10() - log_min) / log_range
                }
            }
        }
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.minimum, self.maximum);
    }

    pub fn set_normalised_value(&mut self, normalised: f32) {
        let normalised = normalised.clamp(0.0, 1.0);
        let value = match self.scale_type {
            ScaleType::Linear => self.minimum + normalised * self.range(),
            ScaleType::Log => {
                let log_min = self.minimum.log10();
                let log_range = self.maximum.log10() - log_min;
                10.0f32.powf(log_min + normalised * log_range)
            }
        };
        self.set_value(value);
    }

    pub fn reset(&mut self) {
        self.value = self.default;
    }
}

/// Settings in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSettings {
    settings: Vec<LayoutSetting>,
}

impl LayoutSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The knobs of the force directed layout.
    pub fn force_directed() -> Self {
        let mut settings = Self::new();
        settings.register(LayoutSetting::new(
            SHORT_RANGE_REPULSE_TERM,
            "Local",
            1000.0,
            1_000_000_000.0,
            1_000_000.0,
            ScaleType::Log,
        ));
        settings.register(LayoutSetting::new(
            LONG_RANGE_REPULSE_TERM,
            "Global",
            0.0,
            20.0,
            10.0,
            ScaleType::Linear,
        ));
        settings
    }

    /// Adds a setting, replacing any existing one with the same name.
    pub fn register(&mut self, setting: LayoutSetting) {
        match self.settings.iter_mut().find(|s| s.name == setting.name) {
            Some(existing) => *existing = setting,
            None => self.settings.push(setting),
        }
    }

    pub fn get(&self, name: &str) -> Result<&LayoutSetting> {
        self.settings
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnknownSetting(name.to_owned()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut LayoutSetting> {
        self.settings
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnknownSetting(name.to_owned()))
    }

    pub fn value(&self, name: &str) -> Result<f32> {
        self.get(name).map(LayoutSetting::value)
    }

    pub fn set_value(&mut self, name: &str, value: f32) -> Result<()> {
        self.get_mut(name)?.set_value(value);
        Ok(())
    }

    pub fn set_normalised_value(&mut self, name: &str, normalised: f32) -> Result<()> {
        self.get_mut(name)?.set_normalised_value(normalised);
        Ok(())
    }

    pub fn reset_value(&mut self, name: &str) -> Result<()> {
        self.get_mut(name)?.reset();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayoutSetting> {
        self.settings.iter()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3 * b.abs().max(1.0)
    }

    #[test]
    fn force_directed_defaults() {
        let settings = LayoutSettings::force_directed();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.value(SHORT_RANGE_REPULSE_TERM).unwrap(), 1_000_000.0);
        assert_eq!(settings.value(LONG_RANGE_REPULSE_TERM).unwrap(), 10.0);
        let names: Vec<_> = settings.iter().map(LayoutSetting::display_name).collect();
        assert_eq!(names, ["Local", "Global"]);
    }

    #[test]
    fn log_scale_slider() {
        let mut settings = LayoutSettings::force_directed();
        let short = settings.get(SHORT_RANGE_REPULSE_TERM).unwrap();
        // 10^6 is half way between 10^3 and 10^9
        assert!(close(short.normalised_value(), 0.5));

        settings
            .set_normalised_value(SHORT_RANGE_REPULSE_TERM, 1.0 / 3.0)
            .unwrap();
        assert!(close(
            settings.value(SHORT_RANGE_REPULSE_TERM).unwrap(),
            100_000.0
        ));
    }

    #[test]
    fn linear_scale_slider_and_clamping() {
        let mut settings = LayoutSettings::force_directed();
        settings
            .set_normalised_value(LONG_RANGE_REPULSE_TERM, 0.25)
            .unwrap();
        assert!(close(settings.value(LONG_RANGE_REPULSE_TERM).unwrap(), 5.0));

        settings.set_value(LONG_RANGE_REPULSE_TERM, 50.0).unwrap();
        assert_eq!(settings.value(LONG_RANGE_REPULSE_TERM).unwrap(), 20.0);

        settings.reset_value(LONG_RANGE_REPULSE_TERM).unwrap();
        assert_eq!(settings.value(LONG_RANGE_REPULSE_TERM).unwrap(), 10.0);
    }

    #[test]
    fn unknown_setting_is_an_error() {
        let mut settings = LayoutSettings::force_directed();
        assert!(matches!(
            settings.set_value("Gravity", 1.0),
            Err(Error::UnknownSetting(name)) if name == "Gravity"
        ));
    }
}
