/// Wildcard characters are only valid in subscription filters; a topic name
/// in a PUBLISH must not contain them (MQTT-3.3.2-2).
///
/// The U+0000 and control-character rules are enforced when the string is
/// read off the wire, so this only needs to look for wildcards.
pub fn contains_wildcard(topic: &str) -> bool {
    topic.contains(['+', '#'])
}

#[cfg(test)]
mod tests {
    use super::contains_wildcard;

    #[test]
    fn wildcards_are_rejected_anywhere() {
        assert!(contains_wildcard("+"));
        assert!(contains_wildcard("#"));
        assert!(contains_wildcard("foo/+/baz"));
        assert!(contains_wildcard("foo/#"));
        assert!(contains_wildcard("foo/ba#r"));

        assert!(!contains_wildcard("foo/bar"));
        assert!(!contains_wildcard("/"));
        assert!(!contains_wildcard("foo bar"));
        // A `$` prefix is a valid topic; publishing to it is an
        // authorization question, not a framing one.
        assert!(!contains_wildcard("$SYS/notices"));
    }
}
