//! Traffic-control handle construction and parsing.
//!
//! A handle is a 32-bit value split into a 16-bit major and 16-bit
//! minor component. The textual form follows the `tc` convention:
//! hexadecimal parts joined by a colon, e.g. "1:" or "8001:10".

/// Root of the egress hierarchy (TC_H_ROOT).
pub const HANDLE_ROOT: u32 = 0xFFFF_FFFF;
/// Ingress pseudo-qdisc handle (TC_H_INGRESS).
pub const HANDLE_INGRESS: u32 = 0xFFFF_FFF1;
/// Clsact pseudo-qdisc handle (TC_H_CLSACT).
pub const HANDLE_CLSACT: u32 = 0xFFFF_FFF2;
/// Unset handle.
pub const HANDLE_NONE: u32 = 0;

/// Compose a handle from its major and minor parts.
pub const fn build_handle(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

/// Split a handle into its (major, minor) parts.
pub const fn split_handle(handle: u32) -> (u16, u16) {
    ((handle >> 16) as u16, handle as u16)
}

/// Parse a handle in `tc` notation.
///
/// Accepts "root", "ingress", "clsact", "none", a bare major ("1"),
/// "major:" or "major:minor" with hexadecimal parts.
pub fn parse(s: &str) -> Option<u32> {
    match s {
        "root" => return Some(HANDLE_ROOT),
        "ingress" => return Some(HANDLE_INGRESS),
        "clsact" => return Some(HANDLE_CLSACT),
        "none" => return Some(HANDLE_NONE),
        _ => {}
    }

    match s.split_once(':') {
        Some((major, minor)) => {
            let major = u16::from_str_radix(major, 16).ok()?;
            let minor = if minor.is_empty() {
                0
            } else {
                u16::from_str_radix(minor, 16).ok()?
            };
            Some(build_handle(major, minor))
        }
        None => {
            let major = u16::from_str_radix(s, 16).ok()?;
            Some(build_handle(major, 0))
        }
    }
}

/// Format a handle in `tc` notation.
pub fn format(handle: u32) -> String {
    match handle {
        HANDLE_ROOT => "root".to_string(),
        HANDLE_INGRESS => "ingress".to_string(),
        HANDLE_CLSACT => "clsact".to_string(),
        HANDLE_NONE => "none".to_string(),
        _ => {
            let (major, minor) = split_handle(handle);
            if minor == 0 {
                format!("{:x}:", major)
            } else {
                format!("{:x}:{:x}", major, minor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_handle() {
        assert_eq!(build_handle(0xFFFF, 0x0000), 0xFFFF0000);
        assert_eq!(build_handle(1, 0), 0x00010000);
        assert_eq!(build_handle(0x8001, 0x10), 0x80010010);
    }

    #[test]
    fn test_split_inverts_build() {
        for (major, minor) in [
            (0u16, 0u16),
            (1, 0),
            (0, 1),
            (0xFFFF, 0),
            (0, 0xFFFF),
            (0xFFFF, 0xFFFF),
            (0x1234, 0x5678),
        ] {
            assert_eq!(split_handle(build_handle(major, minor)), (major, minor));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("root"), Some(HANDLE_ROOT));
        assert_eq!(parse("ingress"), Some(HANDLE_INGRESS));
        assert_eq!(parse("clsact"), Some(HANDLE_CLSACT));
        assert_eq!(parse("none"), Some(HANDLE_NONE));
        assert_eq!(parse("1:"), Some(0x00010000));
        assert_eq!(parse("1:2"), Some(0x00010002));
        assert_eq!(parse("8001:10"), Some(0x80010010));
        assert_eq!(parse("ffff"), Some(0xFFFF0000));
        assert_eq!(parse("1:2:3"), None);
        assert_eq!(parse("zz:"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format(HANDLE_ROOT), "root");
        assert_eq!(format(HANDLE_INGRESS), "ingress");
        assert_eq!(format(HANDLE_CLSACT), "clsact");
        assert_eq!(format(0x00010000), "1:");
        assert_eq!(format(0x80010010), "8001:10");
    }

    #[test]
    fn test_parse_format_round_trip() {
        for s in ["root", "ingress", "clsact", "1:", "1:2", "8001:10"] {
            assert_eq!(format(parse(s).unwrap()), s);
        }
    }
}
