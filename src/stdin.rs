use std::collections::VecDeque;

/// Caller-provided standard input, consumed one line at a time
#[derive(Debug, Clone, Default)]
pub struct StdinQueue {
    lines: VecDeque<String>,
}

impl StdinQueue {
    pub fn new(stdin: &str) -> Self {
        let lines = if stdin.is_empty() {
            VecDeque::new()
        } else {
            stdin
                .lines()
                .map(|line| line.trim_end_matches('\r').to_string())
                .collect()
        };
        Self { lines }
    }

    /// Pops the next line, `None` once input is exhausted
    pub fn pop(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_pop_in_order() {
        let mut queue = StdinQueue::new("alice\r\n42\n");
        assert_eq!(queue.pop().as_deref(), Some("alice"));
        assert_eq!(queue.pop().as_deref(), Some("42"));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_input_has_no_lines() {
        let mut queue = StdinQueue::new("");
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
