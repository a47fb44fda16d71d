//! E2E tests for NMEA sentence encoding
//!
//! Tests checksum framing, coordinate conversion, and the per-fix burst
//! against the formats NMEA listeners validate.

use approx::assert_relative_eq;
use gpssim::nmea::checksum::parse;
use gpssim::nmea::{checksum, finalize, format_utc_time, render_burst, verify, BURST_LEN};
use gpssim::track::parse_line;
use gpssim::NavigationFix;

fn fix(latitude: f64, longitude: f64) -> NavigationFix {
    NavigationFix {
        utc_time: "083015".to_string(),
        latitude,
        longitude,
        satellites: 7,
        hdop: 0.86,
        course: 271.44,
        speed_knots: 12.3456,
        valid: true,
    }
}

#[test]
fn test_checksum_is_xor_of_body() {
    let body = "GNTXT,1,1,01,ANTENNA OK";
    let expected = body.bytes().fold(0u8, |acc, b| acc ^ b);
    assert_eq!(checksum(body), expected);
    assert_eq!(checksum(&format!("${}", body)), expected);
    assert_eq!(finalize(body), format!("${}*{:02X}", body, expected));
}

#[test]
fn test_finalize_idempotent() {
    let once = finalize("GNGGA,083015.00,5127.57570,N,00032.87688,W,1,7,0.86,56.3,M,46.9,M,,");
    assert_eq!(finalize(&once), once);
    assert!(verify(&once));
}

#[test]
fn test_corrupted_sentence_rejected() {
    let good = finalize("BDGSV,1,1,00");
    let bad = good.replace("BD", "GP");
    assert!(verify(&good));
    assert!(!verify(&bad));
    assert!(parse(&bad).is_none());
}

#[test]
fn test_southern_eastern_hemispheres() {
    let burst = render_burst(&fix(-33.5, 151.25)).unwrap();
    let (address, fields) = parse(&burst[0]).unwrap();
    assert_eq!(address, "GNRMC");
    assert_eq!(&fields[2..6], ["3330.00000", "S", "15115.00000", "E"]);
}

#[test]
fn test_northern_western_hemispheres() {
    let burst = render_burst(&fix(51.459595, -0.547948)).unwrap();
    let (address, fields) = parse(&burst[1]).unwrap();
    assert_eq!(address, "GNGGA");
    assert_eq!(&fields[1..5], ["5127.57570", "N", "00032.87688", "W"]);
}

#[test]
fn test_rmc_fields() {
    let burst = render_burst(&fix(10.0, 20.0)).unwrap();
    let (_, fields) = parse(&burst[0]).unwrap();
    assert_eq!(fields[0], "083015.00");
    assert_eq!(fields[1], "A");
    assert_eq!(fields[6], "12.346");
    assert_eq!(fields[7], "271.4");
    assert_eq!(fields[8], "220725");
    assert_eq!(fields.last(), Some(&"V"));
}

#[test]
fn test_gga_fields() {
    let burst = render_burst(&fix(10.0, 20.0)).unwrap();
    let (_, fields) = parse(&burst[1]).unwrap();
    assert_eq!(fields[5], "1");
    assert_eq!(fields[6], "07");
    assert_eq!(fields[7], "0.86");
    assert_eq!(&fields[8..12], ["56.3", "M", "46.9", "M"]);
}

#[test]
fn test_burst_order_and_framing() {
    let burst = render_burst(&fix(51.5, -0.1)).unwrap();
    assert_eq!(burst.len(), BURST_LEN);

    let addresses: Vec<&str> = burst.iter().map(|s| &s[1..6]).collect();
    assert_eq!(
        addresses,
        ["GNRMC", "GNGGA", "GNGSA", "GNGSA", "GPGSV", "GPGSV", "BDGSV", "GNTXT"]
    );
    for sentence in &burst {
        assert!(sentence.is_ascii());
        assert!(verify(sentence), "bad checksum: {}", sentence);
    }
    assert_eq!(burst[7], "$GNTXT,1,1,01,ANTENNA OK*2B");
}

#[test]
fn test_invalid_fix_not_rendered() {
    assert!(render_burst(&NavigationFix::invalid()).is_err());
}

#[test]
fn test_parsed_row_renders() {
    let mut fields = vec!["0"; 70];
    fields[3] = "101010";
    fields[6] = "\"[51.459595";
    fields[7] = " -0.547948]\"";
    fields[16] = "180";
    fields[17] = "3.2";
    fields[18] = "1.4";
    fields[60] = "0";
    let parsed = parse_line(&fields.join(","));
    assert!(parsed.valid);
    assert_eq!(parsed.satellites, 4);
    assert_relative_eq!(parsed.latitude, 51.459595);
    assert_relative_eq!(parsed.longitude, -0.547948);
    assert_relative_eq!(parsed.course, 180.0);
    assert_relative_eq!(parsed.speed_knots, 3.2);
    assert_relative_eq!(parsed.hdop, 1.4);

    let stamped = parsed.with_utc_time(format_utc_time(
        chrono::DateTime::from_timestamp(1_753_187_719, 0).unwrap(),
    ));
    let burst = render_burst(&stamped).unwrap();
    assert!(burst[0].starts_with("$GNRMC,123519.00,A,5127.57570,N,00032.87688,W,3.200,180.0,"));
    assert_eq!(
        burst[1],
        finalize("GNGGA,123519.00,5127.57570,N,00032.87688,W,1,4,1.40,56.3,M,46.9,M,,")
    );
}
