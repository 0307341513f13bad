//! Typographic punctuation normalization for verse text

/// Smart punctuation and its ASCII replacement
const SANITIZATIONS: [(char, char); 10] = [
    ('\u{2018}', '\''), // LEFT SINGLE QUOTATION MARK
    ('\u{2019}', '\''), // RIGHT SINGLE QUOTATION MARK
    ('\u{201A}', '\''), // SINGLE LOW-9 QUOTATION MARK
    ('\u{201B}', '\''), // SINGLE HIGH-REVERSED-9 QUOTATION MARK
    ('\u{201C}', '"'),  // LEFT DOUBLE QUOTATION MARK
    ('\u{201D}', '"'),  // RIGHT DOUBLE QUOTATION MARK
    ('\u{201E}', '"'),  // DOUBLE LOW-9 QUOTATION MARK
    ('\u{201F}', '"'),  // DOUBLE HIGH-REVERSED-9 QUOTATION MARK
    ('\u{2039}', '<'),  // SINGLE LEFT-POINTING ANGLE QUOTATION MARK
    ('\u{203A}', '>'),  // SINGLE RIGHT-POINTING ANGLE QUOTATION MARK
];

/// Replace smart quotes and single guillemets with their ASCII equivalents
pub fn sanitize(text: &str) -> String {
    text.chars().map(replacement_for).collect()
}

fn replacement_for(c: char) -> char {
    SANITIZATIONS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_every_mapped_character() {
        let input = "\u{2018}a\u{2019} \u{201A}b\u{201B} \u{201C}c\u{201D} \u{201E}d\u{201F} \u{2039}e\u{203A}";
        assert_eq!(sanitize(input), "'a' 'b' \"c\" \"d\" <e>");
    }

    #[test]
    fn test_leaves_other_text_alone() {
        let input = "Amazing grace, how sweet the sound \u{2014} caf\u{e9}";
        assert_eq!(sanitize(input), input);
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_is_idempotent() {
        let samples = [
            "",
            "plain ascii",
            "\u{201C}Holy, holy, holy\u{201D}",
            "Don\u{2019}t \u{2039}stop\u{203A}\n\u{201E}line two\u{201F}",
            "mixed \u{2018}\u{2019}\u{201A}\u{201B}\u{201C}\u{201D}\u{201E}\u{201F}\u{2039}\u{203A} \u{00AB}guillemets\u{00BB}",
        ];

        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
