use crate::error::DecodeError;

/// Sentinel for values the current meter variant does not report.
pub const NOT_APPLICABLE: i64 = -1;

/// Number of bytes a notification must carry before it can be decoded.
pub const MIN_FRAME_LEN: usize = 0x1a;

const VARIANT_OFFSET: usize = 0x03;
const AC_METER_TAG: u8 = 0x01;

/// Which kind of instrument produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterVariant {
    /// Electronic load / discharge meter.
    DcLoad,
    /// Mains power meter.
    AcMeter,
}

impl MeterVariant {
    pub fn is_ac(self) -> bool {
        self == MeterVariant::AcMeter
    }
}

/// One measurement as reported by the device.
///
/// Fields that do not apply to the frame's variant carry `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedMeasurement {
    pub variant: MeterVariant,
    /// Voltage in V
    pub voltage_v: f64,
    /// Current in mA
    pub current_ma: i64,
    /// Power in W
    pub power_w: f64,
    /// Load resistance in Ohm, -1 when voltage or current is zero
    pub resistance_ohm: f64,
    /// Capacity counter of the device in mAh, -1 on AC meters
    pub capacity_mah: i64,
    /// Energy counter of the device in Wh
    pub energy_wh: i64,
    /// Mains frequency in Hz, -1 on DC loads
    pub frequency_hz: f64,
    /// Power factor, -1 on DC loads
    pub power_factor: f64,
    /// Device temperature in degrees C
    pub temperature_c: i64,
}

/// Decode a raw notification payload.
///
/// The layout is a fixed set of big endian fields:
///
/// Start Byte | End Byte | Meaning
/// 0x03       | 0x03     | Variant tag, 0x01 for AC meters
/// 0x04       | 0x06     | Voltage in V/10
/// 0x07       | 0x09     | Current in mA
/// 0x0a       | 0x0c     | AC: power in W/10, DC: capacity in mAh/10
/// 0x0d       | 0x10     | Energy in Wh/10
/// 0x14       | 0x15     | AC only: frequency in Hz/10
/// 0x16       | 0x17     | AC only: power factor /1000
/// 0x18       | 0x19     | Temperature in C
pub fn decode(raw: &[u8]) -> Result<DecodedMeasurement, DecodeError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(DecodeError { len: raw.len(), required: MIN_FRAME_LEN });
    }

    let variant = if raw[VARIANT_OFFSET] == AC_METER_TAG {
        MeterVariant::AcMeter
    } else {
        MeterVariant::DcLoad
    };

    let voltage_v = be_uint(&raw[0x04..0x07]) as f64 / 10.0;
    let current_ma = be_uint(&raw[0x07..0x0a]) as i64;
    let third = be_uint(&raw[0x0a..0x0d]) as i64;

    let (power_w, capacity_mah) = match variant {
        MeterVariant::AcMeter => (third as f64 / 10.0, NOT_APPLICABLE),
        MeterVariant::DcLoad => (voltage_v * current_ma as f64 / 1000.0, third * 10),
    };

    let resistance_ohm = if voltage_v > 0.0 && current_ma > 0 {
        voltage_v / (current_ma as f64 / 1000.0)
    } else {
        NOT_APPLICABLE as f64
    };

    let (frequency_hz, power_factor) = match variant {
        MeterVariant::AcMeter => (
            be_uint(&raw[0x14..0x16]) as f64 / 10.0,
            be_uint(&raw[0x16..0x18]) as f64 / 1000.0,
        ),
        MeterVariant::DcLoad => (NOT_APPLICABLE as f64, NOT_APPLICABLE as f64),
    };

    Ok(DecodedMeasurement {
        variant,
        voltage_v,
        current_ma,
        power_w,
        resistance_ohm,
        capacity_mah,
        energy_wh: be_uint(&raw[0x0d..0x11]) as i64 * 10,
        frequency_hz,
        power_factor,
        temperature_c: be_uint(&raw[0x18..0x1a]) as i64,
    })
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
pub(crate) fn dc_frame(voltage_dv: u32, current_ma: u32, capacity_dmah: u32) -> Vec<u8> {
    let mut frame = vec![0u8; 36];
    frame[0] = 0xff;
    frame[1] = 0x55;
    frame[2] = 0x01;
    frame[3] = 0x02;
    frame[0x04..0x07].copy_from_slice(&voltage_dv.to_be_bytes()[1..]);
    frame[0x07..0x0a].copy_from_slice(&current_ma.to_be_bytes()[1..]);
    frame[0x0a..0x0d].copy_from_slice(&capacity_dmah.to_be_bytes()[1..]);
    frame
}

#[cfg(test)]
pub(crate) fn ac_frame(voltage_dv: u32, current_ma: u32, power_dw: u32) -> Vec<u8> {
    let mut frame = dc_frame(voltage_dv, current_ma, power_dw);
    frame[3] = AC_METER_TAG;
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dc_load() {
        let frame = dc_frame(0x000140, 0x0001f4, 12);
        let m = decode(&frame).unwrap();
        assert_eq!(m.variant, MeterVariant::DcLoad);
        assert_eq!(m.voltage_v, 32.0);
        assert_eq!(m.current_ma, 500);
        assert_eq!(m.power_w, 16.0);
        assert_eq!(m.resistance_ohm, 64.0);
        assert_eq!(m.capacity_mah, 120);
        assert_eq!(m.frequency_hz, -1.0);
        assert_eq!(m.power_factor, -1.0);
    }

    #[test]
    fn test_decode_ac_meter() {
        let mut frame = ac_frame(2301, 435, 987);
        frame[0x14..0x16].copy_from_slice(&500u16.to_be_bytes());
        frame[0x16..0x18].copy_from_slice(&985u16.to_be_bytes());
        let m = decode(&frame).unwrap();
        assert_eq!(m.variant, MeterVariant::AcMeter);
        assert!((m.voltage_v - 230.1).abs() < 1e-9);
        assert_eq!(m.current_ma, 435);
        assert!((m.power_w - 98.7).abs() < 1e-9);
        assert_eq!(m.capacity_mah, -1);
        assert!((m.frequency_hz - 50.0).abs() < 1e-9);
        assert!((m.power_factor - 0.985).abs() < 1e-9);
    }

    #[test]
    fn test_decode_device_capture() {
        // Full 37 byte DC load frame: 20.8V at 1A, 500mAh, 100Wh, 25C.
        let frame = hex::decode(
            "ff5501020000d00003e80000320000000a000000000000000019000000000000000000003c",
        )
        .unwrap();
        let m = decode(&frame).unwrap();
        assert_eq!(m.variant, MeterVariant::DcLoad);
        assert!((m.voltage_v - 20.8).abs() < 1e-9);
        assert_eq!(m.current_ma, 1000);
        assert!((m.power_w - 20.8).abs() < 1e-9);
        assert!((m.resistance_ohm - 20.8).abs() < 1e-9);
        assert_eq!(m.capacity_mah, 500);
        assert_eq!(m.energy_wh, 100);
        assert_eq!(m.temperature_c, 25);
    }

    #[test]
    fn test_decode_energy_and_temperature() {
        let mut frame = dc_frame(0, 0, 0);
        frame[0x0d..0x11].copy_from_slice(&0x0001_0203u32.to_be_bytes());
        frame[0x18..0x1a].copy_from_slice(&41u16.to_be_bytes());
        let m = decode(&frame).unwrap();
        assert_eq!(m.energy_wh, 0x0001_0203 * 10);
        assert_eq!(m.temperature_c, 41);
    }

    #[test]
    fn test_resistance_not_applicable() {
        let m = decode(&dc_frame(0, 500, 0)).unwrap();
        assert_eq!(m.resistance_ohm, -1.0);
        let m = decode(&dc_frame(120, 0, 0)).unwrap();
        assert_eq!(m.resistance_ohm, -1.0);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let frame = ac_frame(2299, 1234, 2750);
        assert_eq!(decode(&frame).unwrap(), decode(&frame).unwrap());
    }

    #[test]
    fn test_decode_short_frame() {
        let result = decode(&[0u8; 10]);
        assert_eq!(result, Err(DecodeError { len: 10, required: MIN_FRAME_LEN }));
        assert!(decode(&[0u8; MIN_FRAME_LEN - 1]).is_err());
        assert!(decode(&[0u8; MIN_FRAME_LEN]).is_ok());
    }
}
