// Parse trace recording for the step-through viewer

use crate::tokenizer::Mark;
use std::fmt;

/// One step of a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A memoized rule started at `mark`.
    Enter {
        rule: &'static str,
        mark: Mark,
        depth: usize,
    },
    /// A rule finished; `end` is the mark it left the stream at.
    Exit {
        rule: &'static str,
        mark: Mark,
        end: Mark,
        matched: bool,
        depth: usize,
    },
    /// A rule answered from the memo table.
    MemoHit {
        rule: &'static str,
        mark: Mark,
        end: Mark,
        matched: bool,
        depth: usize,
    },
    /// A left-recursive rule grew its match to `end`.
    Grow {
        rule: &'static str,
        mark: Mark,
        end: Mark,
        depth: usize,
    },
    /// The first pass failed; parsing restarts with diagnostic rules on.
    SecondPass,
}

impl TraceEvent {
    pub fn depth(&self) -> usize {
        match self {
            TraceEvent::Enter { depth, .. }
            | TraceEvent::Exit { depth, .. }
            | TraceEvent::MemoHit { depth, .. }
            | TraceEvent::Grow { depth, .. } => *depth,
            TraceEvent::SecondPass => 0,
        }
    }

    /// Token index the event is looking at.
    pub fn position(&self) -> Mark {
        match self {
            TraceEvent::Enter { mark, .. } => *mark,
            TraceEvent::Exit { end, .. }
            | TraceEvent::MemoHit { end, .. }
            | TraceEvent::Grow { end, .. } => *end,
            TraceEvent::SecondPass => 0,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = "  ".repeat(self.depth());
        match self {
            TraceEvent::Enter { rule, mark, .. } => write!(f, "{indent}{rule}() @{mark}"),
            TraceEvent::Exit {
                rule,
                mark,
                end,
                matched: true,
                ..
            } => write!(f, "{indent}{rule}() @{mark} -> {end}"),
            TraceEvent::Exit { rule, mark, .. } => write!(f, "{indent}{rule}() @{mark} failed"),
            TraceEvent::MemoHit {
                rule, mark, matched, ..
            } => write!(
                f,
                "{indent}{rule}() @{mark} memo {}",
                if *matched { "hit" } else { "fail" }
            ),
            TraceEvent::Grow { rule, mark, end, .. } => {
                write!(f, "{indent}{rule}() @{mark} grew to {end}")
            }
            TraceEvent::SecondPass => f.write_str("-- second pass with diagnostic rules --"),
        }
    }
}

/// Bounded event history. Events past the limit are counted but dropped.
#[derive(Debug, Clone)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
    limit: usize,
    dropped: usize,
}

impl TraceLog {
    pub fn new(limit: usize) -> Self {
        TraceLog {
            events: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    /// Record an event. Returns false once the limit has been reached.
    pub fn push(&mut self, event: TraceEvent) -> bool {
        if self.events.len() >= self.limit {
            self.dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn get(&self, index: usize) -> Option<&TraceEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Events that did not fit under the limit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_drops_extra_events() {
        let mut log = TraceLog::new(2);
        assert!(log.push(TraceEvent::SecondPass));
        assert!(log.push(TraceEvent::Enter {
            rule: "atom",
            mark: 0,
            depth: 1
        }));
        assert!(!log.push(TraceEvent::SecondPass));
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_display_indents_by_depth() {
        let event = TraceEvent::Exit {
            rule: "sum",
            mark: 2,
            end: 5,
            matched: true,
            depth: 2,
        };
        assert_eq!(event.to_string(), "    sum() @2 -> 5");
        assert_eq!(event.position(), 5);
    }
}
