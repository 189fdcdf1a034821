//! Character masking operator

/// Default characters left in place when masking
pub const DEFAULT_PRESERVE: &[char] = &['@', '.'];

/// Mask a value character by character
///
/// Every character is replaced with `mask_char` except those in `preserve`,
/// which stay at their original position. With `keep_first`, the first
/// character of each segment between preserved characters is kept as well.
/// The output always has the same number of characters as the input.
pub fn mask(text: &str, mask_char: char, preserve: &[char], keep_first: bool) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut segment_start = true;

    for c in text.chars() {
        if preserve.contains(&c) {
            masked.push(c);
            segment_start = true;
        } else if keep_first && segment_start {
            masked.push(c);
            segment_start = false;
        } else {
            masked.push(mask_char);
            segment_start = false;
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_keeps_structure() {
        let masked = mask("john.smith@example.com", '*', DEFAULT_PRESERVE, false);
        assert_eq!(masked, "****.*****@*******.***");
        assert_eq!(masked.chars().count(), "john.smith@example.com".chars().count());
    }

    #[test]
    fn test_keep_first_per_segment() {
        let masked = mask("john.smith@example.com", '*', DEFAULT_PRESERVE, true);
        assert_eq!(masked, "j***.s****@e******.c**");
    }

    #[test]
    fn test_no_preserved_characters() {
        assert_eq!(mask("1617 8029", '#', &[], false), "#########");
        assert_eq!(mask("1617 8029", 'X', &[' '], false), "XXXX XXXX");
    }

    #[test]
    fn test_multibyte_input() {
        let masked = mask("Zoë", '*', &[], false);
        assert_eq!(masked, "***");
        assert_eq!(mask("", '*', DEFAULT_PRESERVE, true), "");
    }
}
