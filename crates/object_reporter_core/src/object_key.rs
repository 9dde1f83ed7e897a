use percent_encoding::percent_decode_str;

use crate::contract::ValidationError;

/// Decodes an object key as delivered in S3 notifications, which use
/// form-style URL encoding (`+` for space, `%XX` byte escapes). A `%` that
/// does not start a valid escape is kept as is.
pub fn decode_object_key(raw: &str) -> Result<String, ValidationError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|error| {
            ValidationError::new(format!(
                "object key '{raw}' does not decode to UTF-8: {error}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_pass_through() {
        assert_eq!(
            decode_object_key("logs/2024/app.log").expect("key should decode"),
            "logs/2024/app.log"
        );
    }

    #[test]
    fn decodes_spaces_and_escapes() {
        assert_eq!(
            decode_object_key("my+file%281%29.txt").expect("key should decode"),
            "my file(1).txt"
        );
        assert_eq!(
            decode_object_key("caf%C3%A9.txt").expect("key should decode"),
            "café.txt"
        );
        assert_eq!(
            decode_object_key("a%2Bb.txt").expect("key should decode"),
            "a+b.txt"
        );
    }

    #[test]
    fn incomplete_escapes_are_kept_literally() {
        assert_eq!(decode_object_key("bad%2").expect("key should decode"), "bad%2");
        assert_eq!(
            decode_object_key("100%ZZ.txt").expect("key should decode"),
            "100%ZZ.txt"
        );
    }

    #[test]
    fn rejects_invalid_utf8() {
        let error = decode_object_key("%FF%FE").expect_err("key should fail");
        assert!(error.message().contains("does not decode to UTF-8"));
    }
}
