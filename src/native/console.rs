//! Call-local capture of the `console` channels

/// Upper bound on captured text; a snippet printing in a loop until the
/// time budget runs out must not exhaust host memory
const MAX_TRANSCRIPT_BYTES: usize = 1 << 20;

const TRUNCATION_NOTICE: &str = "... output truncated\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Log,
    Info,
    Warn,
    Error,
}

/// Buffer standing in for the process streams during one evaluation
///
/// Every channel lands in the same transcript, in call order, so the caller
/// sees output the way a terminal would show it.
#[derive(Debug, Default)]
pub struct Console {
    transcript: String,
    truncated: bool,
    counts: [usize; 4],
}

impl Console {
    pub fn write(&mut self, channel: Channel, text: &str) {
        self.counts[channel as usize] += 1;
        self.push(text);
        self.push("\n");
    }

    /// Mirrors a consumed stdin line the way an interactive terminal echoes it
    pub fn echo(&mut self, line: &str) {
        self.push(line);
        self.push("\n");
    }

    fn push(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        if self.transcript.len() + text.len() > MAX_TRANSCRIPT_BYTES {
            self.truncated = true;
            self.transcript.push_str(TRUNCATION_NOTICE);
            return;
        }
        self.transcript.push_str(text);
    }

    pub fn count(&self, channel: Channel) -> usize {
        self.counts[channel as usize]
    }

    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_share_one_transcript() {
        let mut console = Console::default();
        console.write(Channel::Log, "a");
        console.write(Channel::Error, "b");
        console.echo("typed");
        assert_eq!(console.count(Channel::Error), 1);
        assert_eq!(console.take(), "a\nb\ntyped\n");
    }

    #[test]
    fn test_transcript_is_capped() {
        let mut console = Console::default();
        let chunk = "x".repeat(4096);
        for _ in 0..400 {
            console.write(Channel::Log, &chunk);
        }
        let text = console.take();
        assert!(text.len() <= MAX_TRANSCRIPT_BYTES + TRUNCATION_NOTICE.len());
        assert!(text.ends_with(TRUNCATION_NOTICE));
    }
}
