use uuid::Uuid;

const SEGMENT_SEPARATOR: char = '\r';
const FIELD_SEPARATOR: char = '|';
const HEADER_PREFIX: &str = "MSH|";
/// MSH-10, counting the segment name as field 0.
const CONTROL_ID_FIELD: usize = 9;

pub fn fresh_control_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Replaces the message control id (MSH-10) of `message` with `id`.
///
/// Only the first segment is touched. Returns `None` when that segment is not
/// an MSH header or carries fewer than ten fields, in which case the message
/// should be sent unchanged.
pub fn rewrite_control_id(message: &str, id: &str) -> Option<String> {
    let (header, rest) = match message.split_once(SEGMENT_SEPARATOR) {
        Some((header, rest)) => (header, Some(rest)),
        None => (message, None),
    };
    if !header.starts_with(HEADER_PREFIX) {
        return None;
    }

    let mut fields: Vec<&str> = header.split(FIELD_SEPARATOR).collect();
    if fields.len() <= CONTROL_ID_FIELD {
        return None;
    }
    fields[CONTROL_ID_FIELD] = id;

    let mut rewritten = fields.join("|");
    if let Some(rest) = rest {
        rewritten.push(SEGMENT_SEPARATOR);
        rewritten.push_str(rest);
    }
    Some(rewritten)
}

/// Field 10 of the first segment, if present.
pub fn control_id(message: &str) -> Option<&str> {
    message
        .split(SEGMENT_SEPARATOR)
        .next()?
        .split(FIELD_SEPARATOR)
        .nth(CONTROL_ID_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|A|B|C|D|E|F|G|H|I\rPID|1";

    #[test]
    fn rewrites_tenth_field_only() {
        let rewritten = rewrite_control_id(ADT, "XYZ").unwrap();
        assert_eq!(rewritten, "MSH|^~\\&|A|B|C|D|E|F|G|XYZ|I\rPID|1");
        assert_eq!(control_id(&rewritten), Some("XYZ"));
    }

    #[test]
    fn exactly_ten_fields_is_enough() {
        let rewritten = rewrite_control_id("MSH|^~\\&|A|B|C|D|E|F|G|H", "1").unwrap();
        assert_eq!(rewritten, "MSH|^~\\&|A|B|C|D|E|F|G|1");
    }

    #[test]
    fn short_header_is_left_alone() {
        assert_eq!(rewrite_control_id("MSH|^~\\&|A|B|C|D|E|F\rPID|1", "X"), None);
    }

    #[test]
    fn only_first_segment_counts() {
        assert_eq!(rewrite_control_id("EVN|A01\rMSH|^~\\&|A|B|C|D|E|F|G|H", "X"), None);
        assert_eq!(rewrite_control_id("MSHX|^~\\&|A|B|C|D|E|F|G|H", "X"), None);
    }

    #[test]
    fn later_segments_untouched() {
        let message = "MSH|^~\\&|A|B|C|D|E|F|G|H\rOBX|1|2|3|4|5|6|7|8|9|10\r";
        let rewritten = rewrite_control_id(message, "N").unwrap();
        assert!(rewritten.ends_with("\rOBX|1|2|3|4|5|6|7|8|9|10\r"));
    }

    #[test]
    fn fresh_ids_are_hyphenated_and_distinct() {
        let a = fresh_control_id();
        let b = fresh_control_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 4);
    }
}
