//! Splitting a compound command line into independently screened parts.
//!
//! The input is never executed, only split: heredocs, substitutions and
//! expansions are left as-is inside their part.

/// Push the trimmed accumulator onto `out`, dropping empty parts.
fn flush_current(current: &mut String, out: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Consume a separator (`&&`, `||`, `|`, `;`, `&`) from the stream.
/// Returns `false` when the next character is not a separator.
fn try_parse_operator(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    match chars.peek().copied() {
        Some('&') => {
            chars.next();
            if matches!(chars.peek(), Some('&')) {
                chars.next();
            }
            true
        }
        Some('|') => {
            chars.next();
            if matches!(chars.peek(), Some('|')) {
                chars.next();
            }
            true
        }
        Some(';') => {
            chars.next();
            true
        }
        _ => false,
    }
}

/// Split a command line at top-level `&&`, `||`, `|`, `;` and `&`.
///
/// Separators inside single or double quotes are literal, a backslash
/// escapes the next character outside single quotes, and separators inside
/// `(...)` / `{...}` groupings do not split (a subshell or function body is
/// screened as one part). Each part is trimmed; empty parts are dropped.
///
/// Unbalanced quotes return the whole input as a single part; the matcher
/// still catches most patterns, and refusing to split is the permissive
/// failure mode.
#[must_use]
pub fn split(command: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();

    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut paren_depth: usize = 0;
    let mut brace_depth: usize = 0;

    while let Some(ch) = chars.peek().copied() {
        match ch {
            '\\' if !in_single_quote => {
                // Keep backslash and the escaped character literally.
                current.push(ch);
                chars.next();
                if let Some(next_ch) = chars.peek().copied() {
                    current.push(next_ch);
                    chars.next();
                }
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                current.push(ch);
                chars.next();
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                current.push(ch);
                chars.next();
            }
            '(' if !in_single_quote && !in_double_quote => {
                paren_depth = paren_depth.saturating_add(1);
                current.push(ch);
                chars.next();
            }
            ')' if !in_single_quote && !in_double_quote && paren_depth > 0 => {
                paren_depth -= 1;
                current.push(ch);
                chars.next();
            }
            '{' if !in_single_quote && !in_double_quote => {
                brace_depth = brace_depth.saturating_add(1);
                current.push(ch);
                chars.next();
            }
            '}' if !in_single_quote && !in_double_quote && brace_depth > 0 => {
                brace_depth -= 1;
                current.push(ch);
                chars.next();
            }
            _ => {
                let can_split =
                    !in_single_quote && !in_double_quote && paren_depth == 0 && brace_depth == 0;
                if can_split && try_parse_operator(&mut chars) {
                    flush_current(&mut current, &mut parts);
                } else {
                    current.push(ch);
                    chars.next();
                }
            }
        }
    }

    if in_single_quote || in_double_quote {
        // Unbalanced quotes: refuse to split.
        let whole = command.trim();
        return if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        };
    }

    flush_current(&mut current, &mut parts);
    parts
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::split;

    fn s(input: &str, expected: Vec<&str>) -> (String, Vec<String>) {
        (
            input.to_string(),
            expected.into_iter().map(String::from).collect(),
        )
    }

    fn very_long_case() -> (String, Vec<String>) {
        let long_string = "a".repeat(1000);
        let input = format!("echo '{long_string}' && echo world");
        let expected = vec![format!("echo '{long_string}'"), "echo world".to_string()];
        (input, expected)
    }

    #[rstest]
    #[case(s("echo hello", vec!["echo hello"]))]
    #[case(s("echo hello && echo world", vec!["echo hello", "echo world"]))]
    #[case(s("echo hello || echo world", vec!["echo hello", "echo world"]))]
    #[case(s("echo hello | grep world", vec!["echo hello", "grep world"]))]
    #[case(s("echo hello & echo world", vec!["echo hello", "echo world"]))]
    #[case(s("cd /tmp; rm -rf scratch", vec!["cd /tmp", "rm -rf scratch"]))]
    #[case(s("echo ok && rm -rf /", vec!["echo ok", "rm -rf /"]))]
    #[case(s("a && b || c; d", vec!["a", "b", "c", "d"]))]
    #[case(s("echo hello && echo world | grep test & echo done", vec!["echo hello", "echo world", "grep test", "echo done"]))]
    #[case(s("rm -rf '/tmp/test' && echo 'hello world'", vec!["rm -rf '/tmp/test'", "echo 'hello world'"]))]
    #[case(s("rm -rf \"/tmp/test\" && echo \"hello world\"", vec!["rm -rf \"/tmp/test\"", "echo \"hello world\""]))]
    #[case(s("echo 'hello && world' && echo \"test || done\"", vec!["echo 'hello && world'", "echo \"test || done\""]))]
    #[case(s("echo 'a | b' | grep c", vec!["echo 'a | b'", "grep c"]))]
    #[case(s("echo \"a ; b\"; echo c", vec!["echo \"a ; b\"", "echo c"]))]
    #[case(s("echo escaped\\;semicolon", vec!["echo escaped\\;semicolon"]))]
    #[case(s("", Vec::<&str>::new()))]
    #[case(s("&& || & | ;", Vec::<&str>::new()))]
    #[case(s("&& echo hello &&", vec!["echo hello"]))]
    #[case(s("& echo hello &", vec!["echo hello"]))]
    #[case(s("echo hello &&&& echo world", vec!["echo hello", "echo world"]))]
    #[case(s("echo hello  &&  echo world", vec!["echo hello", "echo world"]))]
    #[case(s("echo hello\t&&\techo world", vec!["echo hello", "echo world"]))]
    #[case(s("   \t\n  ", Vec::<&str>::new()))]
    #[case(s("(cd /tmp && rm -rf scratch)", vec!["(cd /tmp && rm -rf scratch)"]))]
    #[case(s("echo hello && :(){ :|:& };:", vec!["echo hello", ":(){ :|:& }", ":"]))]
    #[case(s("echo 'héllo wörld' && echo 'dönে'", vec!["echo 'héllo wörld'", "echo 'dönে'"]))]
    #[case(very_long_case())]
    fn split_all_cases(#[case] case: (String, Vec<String>)) {
        let (input, expected) = case;
        assert_eq!(split(&input), expected);
    }

    #[rstest]
    #[case("echo 'unterminated && rm -rf /")]
    #[case("echo \"half quoted | sh")]
    fn unbalanced_quotes_return_whole_input(#[case] input: &str) {
        assert_eq!(split(input), vec![input.to_string()]);
    }

    #[test]
    fn split_is_idempotent_over_rejoin() {
        let inputs = [
            "echo ok && rm -rf / | grep x; date & true",
            "echo 'a && b' && ls",
            "git add . && git commit -m 'wip' && git push",
        ];
        for input in inputs {
            let parts = split(input);
            let rejoined = parts.join(" && ");
            assert_eq!(split(&rejoined), parts, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn split_preserves_quoted_content() {
        let parts = split("echo 'keep | this ; intact' && echo done");
        assert_eq!(parts[0], "echo 'keep | this ; intact'");
    }
}
