/// Characters cmd.exe treats specially; each is prefixed with `^`.
const CMD_METACHARS: &[char] = &[
    '(', ')', '[', ']', '%', '!', '^', '"', '`', '<', '>', '&', '|', ';', ',', ' ', '*', '?',
];

/// Program and arguments that evaluate `script` with the runtime.
///
/// Elsewhere the runtime is spawned directly with `-e <script>`. On Windows it
/// goes through `cmd /d /s /c`, so the whole command line is built here: every
/// argument is quoted for the C runtime's parser and then caret-escaped for
/// cmd.exe. Those arguments must be passed verbatim (`raw_arg`).
pub fn runtime_command_line(runtime: &str, script: &str, windows: bool) -> (String, Vec<String>) {
    if !windows {
        return (
            runtime.to_string(),
            vec!["-e".to_string(), script.to_string()],
        );
    }

    let line = [
        escape_cmd_metachars(runtime),
        escape_cmd_metachars(&quote_windows_argument("-e")),
        escape_cmd_metachars(&quote_windows_argument(script)),
    ]
    .join(" ");
    (
        "cmd".to_string(),
        vec![
            "/d".to_string(),
            "/s".to_string(),
            "/c".to_string(),
            format!("\"{line}\""),
        ],
    )
}

fn quote_windows_argument(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for ch in arg.chars() {
        if ch == '\\' {
            backslashes += 1;
            continue;
        }
        let run = if ch == '"' {
            backslashes * 2 + 1
        } else {
            backslashes
        };
        quoted.extend(std::iter::repeat('\\').take(run));
        backslashes = 0;
        quoted.push(ch);
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

fn escape_cmd_metachars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 2);
    for ch in raw.chars() {
        if CMD_METACHARS.contains(&ch) {
            out.push('^');
        }
        out.push(ch);
    }
    out
}
