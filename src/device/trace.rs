// Capture of `debug` instruction output

use std::fmt;

use crate::memory::value::Val;

/// Lines produced by `debug`, in execution order
#[derive(Debug, Clone)]
pub struct TraceLog {
    pub lines: Vec<TraceLine>,
}

impl TraceLog {
    pub fn new() -> Self {
        TraceLog { lines: Vec::new() }
    }

    pub fn record(&mut self, tag: Val, text: String) {
        self.lines.push(TraceLine { tag, text });
    }

    /// Get all lines as `[tag] value` strings
    pub fn get_output(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.to_string()).collect()
    }

    /// Rendered values recorded under `tag`
    pub fn values_for(&self, tag: Val) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| line.tag == tag)
            .map(|line| line.text.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

/// One `debug` line: the instruction's tag and the rendered value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub tag: Val,
    pub text: String,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.tag, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format() {
        let mut log = TraceLog::new();
        log.record(Val::fix(7), "(+1 +2)".to_string());
        log.record(Val::fix(8), "#t".to_string());
        assert_eq!(log.get_output(), vec!["[+7] (+1 +2)", "[+8] #t"]);
        assert_eq!(log.values_for(Val::fix(8)), vec!["#t"]);
        assert_eq!(log.len(), 2);
    }
}
