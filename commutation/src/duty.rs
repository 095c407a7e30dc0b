//! Throttle to PWM compare value

/// 12-bit ADC full scale
pub const ADC_MAX: u16 = 4095;

/// Linear throttle-to-duty mapping
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyMapper {
    pwm_period: u16,
    adc_max: u16,
}

impl DutyMapper {
    /// # Arguments
    /// * `pwm_period` - Compare value that corresponds to 100 % duty
    /// * `adc_max` - Raw sample that corresponds to full throttle (must be non-zero)
    pub const fn new(pwm_period: u16, adc_max: u16) -> Self {
        Self {
            pwm_period,
            adc_max,
        }
    }

    /// Map a raw analog sample to a compare value
    ///
    /// `raw × pwm_period / adc_max`, clamped to `pwm_period`. Samples above `adc_max`
    /// saturate at full duty.
    #[inline(always)]
    pub fn map(&self, raw: u16) -> u16 {
        if self.adc_max == 0 {
            return 0;
        }
        let duty = raw as u32 * self.pwm_period as u32 / self.adc_max as u32;
        duty.min(self.pwm_period as u32) as u16
    }

    pub fn pwm_period(&self) -> u16 {
        self.pwm_period
    }
}
