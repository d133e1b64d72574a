use crate::error::{Error, Result};
use std::fmt::Write;
use std::fs;

/// One thread of the current process, from /proc/self/task/[tid]/stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: u32,
    pub name: String,
    pub state: char,
}

/// List the threads of the current process.
pub fn list_threads() -> Result<Vec<ThreadInfo>> {
    if !cfg!(target_os = "linux") {
        return Err(Error::UnsupportedPlatform(
            "thread listing needs /proc (Linux only)".to_string(),
        ));
    }

    let mut threads = Vec::new();
    for entry in fs::read_dir("/proc/self/task")?.flatten() {
        // Threads can exit between readdir and the read
        let Ok(line) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(info) = parse_stat_line(&line) {
            threads.push(info);
        }
    }

    threads.sort_by_key(|t| t.tid);
    Ok(threads)
}

/// Parse "tid (comm) state ...". The name may itself contain spaces and
/// parentheses, so it runs from the first '(' to the last ')'.
pub fn parse_stat_line(line: &str) -> Option<ThreadInfo> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }

    let tid = line[..open].trim().parse().ok()?;
    let name = line[open + 1..close].to_string();
    let state = line[close + 1..].split_whitespace().next()?.chars().next()?;

    Some(ThreadInfo { tid, name, state })
}

/// Plain-text thread dump for the debug endpoint
pub fn render_threads(threads: &[ThreadInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "threads: {}", threads.len());
    let _ = writeln!(out);
    for t in threads {
        let _ = writeln!(out, "{:>8} {} {}", t.tid, t.state, t.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat_line() {
        let info = parse_stat_line("4242 (tokio-runtime-w) S 1 4242 4242 0 -1").unwrap();
        assert_eq!(info.tid, 4242);
        assert_eq!(info.name, "tokio-runtime-w");
        assert_eq!(info.state, 'S');
    }

    #[test]
    fn test_parse_stat_line_odd_name() {
        let info = parse_stat_line("7 (a (b) c) R 1 2 3").unwrap();
        assert_eq!(info.tid, 7);
        assert_eq!(info.name, "a (b) c");
        assert_eq!(info.state, 'R');
    }

    #[test]
    fn test_parse_stat_line_garbage() {
        assert!(parse_stat_line("").is_none());
        assert!(parse_stat_line("no parens here").is_none());
        assert!(parse_stat_line("x (name) S").is_none());
        assert!(parse_stat_line("12 (name)").is_none());
    }

    #[test]
    fn test_render_threads() {
        let threads = vec![ThreadInfo {
            tid: 1,
            name: "main".to_string(),
            state: 'R',
        }];
        let text = render_threads(&threads);
        assert!(text.starts_with("threads: 1\n"));
        assert!(text.contains("R main"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_threads_includes_current() {
        let threads = list_threads().unwrap();
        assert!(!threads.is_empty());
        let pid = std::process::id();
        // The main thread's tid equals the pid
        assert!(threads.iter().any(|t| t.tid == pid));
    }
}
