//! Sentence checksums and framing

/// XOR of every byte between the leading `$` and the `*` delimiter
///
/// The leading `$` is optional; bytes after a `*` are ignored.
pub fn checksum(sentence: &str) -> u8 {
    sentence
        .strip_prefix('$')
        .unwrap_or(sentence)
        .bytes()
        .take_while(|&b| b != b'*')
        .fold(0u8, |acc, b| acc ^ b)
}

/// Frame a sentence body as `$<body>*<CC>`
///
/// Accepts the body with or without its leading `$`. Any existing `*CC` tail is
/// dropped first, so finalizing an already framed sentence returns it unchanged.
pub fn finalize(body: &str) -> String {
    let body = body.strip_prefix('$').unwrap_or(body);
    let body = body.split_once('*').map_or(body, |(head, _)| head);
    format!("${}*{:02X}", body, checksum(body))
}

/// Check that a framed sentence carries the right checksum
pub fn verify(sentence: &str) -> bool {
    let sentence = sentence.trim_end_matches(['\r', '\n']);
    let Some((body, tail)) = sentence.split_once('*') else {
        return false;
    };
    if !body.starts_with('$') || tail.len() != 2 {
        return false;
    }
    u8::from_str_radix(tail, 16).is_ok_and(|expected| expected == checksum(body))
}

/// Split a framed sentence into its address field and data fields
///
/// Returns `None` when the sentence is not framed or its checksum is wrong.
pub fn parse(sentence: &str) -> Option<(&str, Vec<&str>)> {
    if !verify(sentence) {
        return None;
    }
    let body = sentence.trim_end_matches(['\r', '\n']);
    let body = &body[1..body.find('*')?];
    let mut fields = body.split(',');
    let address = fields.next()?;
    Some((address, fields.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_checksum() {
        // Reference sentence from the u-blox protocol manual
        assert_eq!(
            finalize("$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,"),
            "$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B"
        );
    }

    #[test]
    fn test_checksum_zero_padded() {
        // "A" ^ "A" == 0
        assert_eq!(finalize("AA"), "$AA*00");
        assert_eq!(finalize("$\u{1}"), "$\u{1}*01");
    }

    #[test]
    fn test_checksum_matches_manual_xor() {
        let body = "GNTXT,1,1,01,ANTENNA OK";
        let expected = body.bytes().fold(0u8, |a, b| a ^ b);
        assert_eq!(checksum(body), expected);
        assert_eq!(checksum(&format!("${}", body)), expected);
        assert_eq!(checksum(&format!("${}*FF", body)), expected);
    }

    #[test]
    fn test_finalize_idempotent() {
        let framed = finalize("GNGSA,A,3,01,02,04,31,,,,,,,,,6.27,4.89,3.92,1");
        assert_eq!(finalize(&framed), framed);

        let stripped = &framed[..framed.find('*').unwrap()];
        assert_eq!(finalize(stripped), framed);
    }

    #[test]
    fn test_finalize_with_or_without_dollar() {
        assert_eq!(finalize("BDGSV,1,1,00"), finalize("$BDGSV,1,1,00"));
    }

    #[test]
    fn test_verify() {
        let framed = finalize("GPGSV,2,2,05,31,17,085,30");
        assert!(verify(&framed));
        assert!(verify(&format!("{}\r\n", framed)));

        let mut tampered = framed.clone();
        tampered.replace_range(1..2, "X");
        assert!(!verify(&tampered));
        assert!(!verify("GPGSV,2,2,05*00"));
        assert!(!verify("$GPGSV,2,2,05"));
        assert!(!verify("$GPGSV*ZZ"));
    }

    #[test]
    fn test_parse_fields() {
        let framed = finalize("BDGSV,1,1,00");
        let (address, fields) = parse(&framed).unwrap();
        assert_eq!(address, "BDGSV");
        assert_eq!(fields, vec!["1", "1", "00"]);
        assert!(parse("$BDGSV,1,1,00*00").is_none());
    }
}
