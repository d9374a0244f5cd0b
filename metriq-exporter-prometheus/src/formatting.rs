//! Helpers for rendering metrics in the Prometheus and OpenMetrics text formats.

use std::borrow::Cow;

use metriq::Labels;

/// Writes a help (description) line in the Prometheus [exposition format].
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_help_line(buffer: &mut String, name: &str, desc: &str) {
    buffer.push_str("# HELP ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(&escape_string(desc));
    buffer.push('\n');
}

/// Writes a metric type line in the Prometheus [exposition format].
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_type_line(buffer: &mut String, name: &str, metric_type: &str) {
    buffer.push_str("# TYPE ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(metric_type);
    buffer.push('\n');
}

/// Writes a sample line in the Prometheus [exposition format].
///
/// When `suffix` is specified, it is appended to the `name` after an underscore, which is how the
/// bucket, sum and count samples of histograms and summaries are named.  Likewise,
/// `additional_label` is written after every other label, and carries the `le` label of histogram
/// buckets or the `quantile` label of summaries.
///
/// Labels without a value are written with an empty value.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_metric_line(
    buffer: &mut String,
    name: &str,
    suffix: Option<&'static str>,
    labels: &Labels,
    additional_label: Option<(&'static str, &str)>,
    value: f64,
) {
    buffer.push_str(name);
    if let Some(suffix) = suffix {
        buffer.push('_');
        buffer.push_str(suffix);
    }

    if !labels.is_empty() || additional_label.is_some() {
        buffer.push('{');

        let mut first = true;
        for (key, value) in labels.iter() {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            write_label(buffer, key, value.unwrap_or_default());
        }

        if let Some((key, value)) = additional_label {
            if !first {
                buffer.push(',');
            }
            write_label(buffer, key, value);
        }

        buffer.push('}');
    }

    buffer.push(' ');
    buffer.push_str(&encode_number(value));
    buffer.push('\n');
}

fn write_label(buffer: &mut String, key: &str, value: &str) {
    buffer.push_str(key);
    buffer.push_str("=\"");
    buffer.push_str(&escape_string(value));
    buffer.push('"');
}

/// Escapes a label value or description.
///
/// Backslashes, double quotes and line feeds are escaped; every other character passes through.
pub fn escape_string(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}

/// Encodes a sample value.
///
/// Non-finite values are written as `NaN`, `+Inf` and `-Inf`; everything else in plain decimal
/// notation.
pub fn encode_number(value: f64) -> Cow<'static, str> {
    if value.is_nan() {
        Cow::Borrowed("NaN")
    } else if value == f64::INFINITY {
        Cow::Borrowed("+Inf")
    } else if value == f64::NEG_INFINITY {
        Cow::Borrowed("-Inf")
    } else {
        Cow::Owned(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use metriq::{labels, Labels};
    use proptest::prelude::*;

    use crate::formatting::{
        encode_number, escape_string, write_help_line, write_metric_line, write_type_line,
    };

    #[test]
    fn test_escape_string_known_cases() {
        let cases = &[
            ("*", "*"),
            ("\"", "\\\""),
            ("\\", "\\\\"),
            ("\\\\", "\\\\\\\\"),
            ("\\n", "\\\\n"),
            ("\n", "\\n"),
            ("foo_bar", "foo_bar"),
            ("say \"hi\"\n", "say \\\"hi\\\"\\n"),
            ("ünïcödé", "ünïcödé"),
        ];

        for (input, expected) in cases {
            let result = escape_string(input);
            assert_eq!(expected, &result);
        }
    }

    #[test]
    fn test_encode_number_known_cases() {
        let cases = &[
            (f64::NAN, "NaN"),
            (f64::INFINITY, "+Inf"),
            (f64::NEG_INFINITY, "-Inf"),
            (5.0, "5"),
            (-2.5, "-2.5"),
            (0.005, "0.005"),
            (0.0, "0"),
        ];

        for (input, expected) in cases {
            let result = encode_number(*input);
            assert_eq!(expected, &result);
        }
    }

    #[test]
    fn test_write_lines() {
        let mut buffer = String::new();
        write_help_line(&mut buffer, "requests", "Total \"requests\"\nserved");
        write_type_line(&mut buffer, "requests", "counter");
        write_metric_line(&mut buffer, "requests", None, &Labels::new(), None, 1.0);
        write_metric_line(
            &mut buffer,
            "requests",
            Some("total"),
            &labels! { "path" => "C:\\temp" },
            None,
            2.0,
        );

        assert_eq!(
            buffer,
            "# HELP requests Total \\\"requests\\\"\\nserved\n\
             # TYPE requests counter\n\
             requests 1\n\
             requests_total{path=\"C:\\\\temp\"} 2\n"
        );
    }

    #[test]
    fn test_write_metric_line_additional_label() {
        let mut buffer = String::new();
        write_metric_line(&mut buffer, "latency", Some("bucket"), &Labels::new(), Some(("le", "+Inf")), 3.0);

        let mut labels = labels! { "method" => "GET" };
        labels.insert_optional("user", None::<String>);
        write_metric_line(&mut buffer, "latency", None, &labels, Some(("quantile", "0.5")), f64::NAN);

        assert_eq!(
            buffer,
            "latency_bucket{le=\"+Inf\"} 3\n\
             latency{method=\"GET\",user=\"\",quantile=\"0.5\"} NaN\n"
        );
    }

    proptest! {
        #[test]
        fn test_escape_string(input in "[\n\"\\\\]?.*[\n\"\\\\]?") {
            let result = escape_string(&input);

            // If any raw newlines are still present, then we messed up.
            assert!(!result.contains('\n'), "raw/unescaped newlines present");

            // Every backslash must start an escape sequence, and every double quote must be the
            // second half of one.
            let chars = result.chars().collect::<Vec<_>>();
            let mut i = 0;
            while i < chars.len() {
                match chars[i] {
                    '\\' => {
                        assert!(matches!(chars.get(i + 1), Some('\\' | '"' | 'n')),
                            "dangling backslash in {}", result);
                        i += 2;
                    }
                    '"' => panic!("unescaped double quote in {}", result),
                    _ => i += 1,
                }
            }
        }

        #[test]
        fn test_escape_string_reversible(input in ".*") {
            prop_assume!(!input.contains('\u{0}'));

            let escaped = escape_string(&input);
            let unescaped = escaped
                .replace("\\\\", "\u{0}")
                .replace("\\\"", "\"")
                .replace("\\n", "\n")
                .replace('\u{0}', "\\");
            assert_eq!(unescaped, input);
        }

        #[test]
        fn test_encode_number_finite(value in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let encoded = encode_number(value);
            assert_eq!(encoded.parse::<f64>().ok(), Some(value));
        }
    }
}
