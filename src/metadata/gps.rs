//! Conversions between decimal degrees and EXIF GPS rationals.

use crate::exif::tiff::{
    TAG_GPS_ALTITUDE, TAG_GPS_ALTITUDE_REF, TAG_GPS_LATITUDE, TAG_GPS_LATITUDE_REF,
    TAG_GPS_LONGITUDE, TAG_GPS_LONGITUDE_REF, TAG_GPS_MAP_DATUM, TAG_GPS_VERSION_ID,
};
use crate::exif::{ExifValues, Ifd, TagValue, Tiff};

use super::record::Location;

pub type Rational = (u32, u32);

/// Denominator bound for every rational this crate writes.
pub const MAX_DENOMINATOR: u32 = 99_999;

const MAP_DATUM: &str = "WGS-84";
const GPS_VERSION: [u8; 4] = [2, 2, 0, 0];

/// Degrees, minutes and seconds to signed decimal degrees.
/// A reference starting with S or W (either case) makes the result negative.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: &str) -> f64 {
    let sign = match reference.chars().next() {
        Some('S' | 'W' | 's' | 'w') => -1.0,
        _ => 1.0,
    };
    sign * (degrees + minutes / 60.0 + seconds / 3600.0)
}

/// Decimal degrees to three rationals (degrees, minutes, seconds) of the
/// absolute value. The hemisphere goes in the separate reference tag.
pub fn decimal_to_dms(decimal: f64) -> [Rational; 3] {
    let value = decimal.abs();
    let degrees = value.trunc();
    let minutes_full = value.fract() * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = minutes_full.fract() * 60.0;
    [
        approximate(degrees, MAX_DENOMINATOR),
        approximate(minutes, MAX_DENOMINATOR),
        approximate(seconds, MAX_DENOMINATOR),
    ]
}

/// Closest fraction to a non-negative `value` with denominator at most
/// `max_denominator`, computed exactly from the binary value of the float.
pub fn approximate(value: f64, max_denominator: u32) -> Rational {
    if !value.is_finite() || value <= 0.0 {
        return (0, 1);
    }
    // Keep the numerator inside u32.
    let bound = (u32::MAX as f64 / value.max(1.0)).floor() as u32;
    let max = u128::from(max_denominator.min(bound).max(1));

    let Some((num, den)) = exact_ratio(value) else {
        return (0, 1);
    };
    if den <= max {
        return (num as u32, den as u32);
    }

    // Continued-fraction convergents, then the best semiconvergent.
    let (mut p0, mut q0, mut p1, mut q1) = (0u128, 1u128, 1u128, 0u128);
    let (mut n, mut d) = (num, den);
    loop {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
        if d == 0 {
            break;
        }
    }

    let k = (max - q0) / q1;
    let bound1 = (p0 + k * p1, q0 + k * q1);
    let bound2 = (p1, q1);
    // |p/q - num/den| compared without division.
    let distance = |(p, q): (u128, u128)| (p * den).abs_diff(num * q);
    let closer = if distance(bound2) * bound1.1 <= distance(bound1) * bound2.1 { bound2 } else { bound1 };
    (closer.0 as u32, closer.1 as u32)
}

/// The float as an exact reduced fraction `num / den`, if it fits u128 arithmetic.
fn exact_ratio(value: f64) -> Option<(u128, u128)> {
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7FF) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut mantissa, mut exp) = if exponent == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exponent - 1075)
    };
    while mantissa & 1 == 0 && exp < 0 {
        mantissa >>= 1;
        exp += 1;
    }
    if exp >= 0 {
        let num = u128::from(mantissa).checked_shl(exp as u32)?;
        return (exp < 64).then_some((num, 1));
    }
    // Below 2^-90 the value rounds to zero at any denominator we use.
    if exp < -90 {
        return None;
    }
    Some((u128::from(mantissa), 1u128 << (-exp) as u32))
}

fn rational_to_f64((num, den): Rational) -> Option<f64> {
    (den != 0).then(|| f64::from(num) / f64::from(den))
}

fn coordinate(parts: &[Rational; 3], reference: char) -> Option<f64> {
    let [d, m, s] = (*parts).map(rational_to_f64);
    Some(dms_to_decimal(d?, m?, s?, &reference.to_string()))
}

/// The GPS position read from the photo. Latitude and longitude are only
/// reported as a complete pair; altitude needs both its value and its
/// reference. `tiff` is the block the values came from.
pub fn read_location(values: &ExifValues, tiff: &Tiff) -> Location {
    let has = |tag| tiff.contains(Ifd::Gps, tag);
    let complete = [TAG_GPS_LATITUDE, TAG_GPS_LATITUDE_REF, TAG_GPS_LONGITUDE, TAG_GPS_LONGITUDE_REF]
        .into_iter()
        .all(has);
    let Some(position) = values.gps().filter(|_| complete) else {
        return Location::default();
    };
    let (Some(latitude), Some(longitude)) = (
        coordinate(&position.latitude, position.latitude_ref),
        coordinate(&position.longitude, position.longitude_ref),
    ) else {
        return Location::default();
    };
    let altitude = rational_to_f64(position.altitude)
        .filter(|_| has(TAG_GPS_ALTITUDE) && has(TAG_GPS_ALTITUDE_REF))
        .map(|metres| if position.altitude_ref > 0 { -metres } else { metres });
    Location { latitude: Some(latitude), longitude: Some(longitude), altitude }
}

/// Write the components that are present, with their references and the datum.
pub fn write_location(tiff: &mut Tiff, location: &Location) {
    if location.is_empty() {
        return;
    }
    if let Some(lat) = location.latitude {
        tiff.set(Ifd::Gps, TAG_GPS_LATITUDE, TagValue::Rational(decimal_to_dms(lat).to_vec()));
        let reference = if lat >= 0.0 { "N" } else { "S" };
        tiff.set(Ifd::Gps, TAG_GPS_LATITUDE_REF, TagValue::Ascii(reference.into()));
    }
    if let Some(lng) = location.longitude {
        tiff.set(Ifd::Gps, TAG_GPS_LONGITUDE, TagValue::Rational(decimal_to_dms(lng).to_vec()));
        let reference = if lng >= 0.0 { "E" } else { "W" };
        tiff.set(Ifd::Gps, TAG_GPS_LONGITUDE_REF, TagValue::Ascii(reference.into()));
    }
    if let Some(alt) = location.altitude {
        let metres = approximate(alt.abs(), MAX_DENOMINATOR);
        tiff.set(Ifd::Gps, TAG_GPS_ALTITUDE, TagValue::Rational(vec![metres]));
        tiff.set(Ifd::Gps, TAG_GPS_ALTITUDE_REF, TagValue::Byte(vec![u8::from(alt < 0.0)]));
    }
    tiff.set(Ifd::Gps, TAG_GPS_MAP_DATUM, TagValue::Ascii(MAP_DATUM.into()));
    if !tiff.contains(Ifd::Gps, TAG_GPS_VERSION_ID) {
        tiff.set(Ifd::Gps, TAG_GPS_VERSION_ID, TagValue::Byte(GPS_VERSION.to_vec()));
    }
}
